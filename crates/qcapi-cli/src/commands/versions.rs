//! Versions command implementation.

use anyhow::Result;

use super::common::{Context, with_spinner};

/// Execute the versions command (`GET /versions`, unauthenticated).
pub async fn execute(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let versions = with_spinner(
        "Fetching API versions...",
        service.get_versions(&ctx.cancel),
    )
    .await?;
    ctx.output.print_value(&versions);
    Ok(())
}
