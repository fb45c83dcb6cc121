//! Backend command implementations.

use anyhow::Result;
use console::style;

use qcapi_runtime::BackendSummary;

use super::common::{Context, cell, print_table, with_spinner};

/// Execute the backends command.
pub async fn execute_list(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let backends = with_spinner("Fetching backends...", service.list_backends(&ctx.cancel)).await?;

    if ctx.output.json {
        return ctx.output.print_json(&backends);
    }

    if backends.is_empty() {
        println!("{}", style("No backends found.").yellow());
        return Ok(());
    }

    println!(
        "{} {} backends\n",
        style("qcapi").cyan().bold(),
        backends.len()
    );
    let rows: Vec<Vec<String>> = backends.iter().map(backend_row).collect();
    print_table(&["NAME", "KIND", "STATUS"], &rows);
    Ok(())
}

fn backend_row(backend: &BackendSummary) -> Vec<String> {
    vec![
        backend.name.clone(),
        backend.kind_label().to_string(),
        cell(backend.status.as_deref()),
    ]
}

/// Execute the backend-status command.
pub async fn execute_status(ctx: &Context, name: &str) -> Result<()> {
    let service = ctx.service()?;
    let status = with_spinner(
        &format!("Fetching status of {name}..."),
        service.backend_status(name, &ctx.cancel),
    )
    .await?;
    ctx.output.print_value(&status);
    Ok(())
}

/// Execute the backend-properties command.
pub async fn execute_properties(ctx: &Context, name: &str) -> Result<()> {
    let service = ctx.service()?;
    let properties = with_spinner(
        &format!("Fetching properties of {name}..."),
        service.backend_properties(name, &ctx.cancel),
    )
    .await?;
    ctx.output.print_value(&properties);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_backend_row() {
        let backend = BackendSummary {
            name: "ibm_fez".into(),
            simulator: Some(false),
            status: None,
            raw: Value::Null,
        };
        assert_eq!(backend_row(&backend), ["ibm_fez", "quantum", "-"]);
    }
}
