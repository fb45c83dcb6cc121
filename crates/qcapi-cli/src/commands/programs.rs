//! Program command implementations.

use anyhow::Result;

use super::common::{Context, with_spinner};

/// Execute the programs command.
pub async fn execute_list(ctx: &Context) -> Result<()> {
    let service = ctx.service()?;
    let root = with_spinner("Fetching programs...", service.list_programs(&ctx.cancel)).await?;
    ctx.output.print_value(&root);
    Ok(())
}

/// Execute the program command.
pub async fn execute_show(ctx: &Context, program_id: &str) -> Result<()> {
    let service = ctx.service()?;
    let program = with_spinner(
        &format!("Fetching program {program_id}..."),
        service.get_program(program_id, &ctx.cancel),
    )
    .await?;
    ctx.output.print_value(&program);
    Ok(())
}
