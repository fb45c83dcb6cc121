//! Config command implementation.

use anyhow::Result;
use console::style;
use serde_json::json;

use super::common::Context;

/// Execute the config command. No network access.
pub fn execute(ctx: &Context) -> Result<()> {
    let credentials = ctx.credentials()?;

    if ctx.output.json {
        return ctx.output.print_json(&json!({
            "source": credentials.source_label(),
            "account": credentials.account_name,
            "config_path": credentials.source_path.as_ref().map(|p| p.display().to_string()),
            "base_url": credentials.base_url.as_str(),
            "api_version": credentials.api_version,
            "service_crn": credentials.service_crn,
        }));
    }

    println!("{} configuration\n", style("qcapi").cyan().bold());
    println!("  Source:       {}", credentials.source_label());
    println!("  Base URL:     {}", credentials.base_url);
    println!("  API version:  {}", credentials.api_version);
    println!("  Service CRN:  {}", credentials.service_crn);
    println!("  API key:      {}", style("(set)").dim());
    Ok(())
}
