//! Job command implementations.

use anyhow::Result;
use console::style;
use serde_json::Value;

use qcapi_runtime::extract::extract_jobs;
use qcapi_runtime::{JobQuery, JobSummary};

use super::common::{Context, cell, print_table, with_spinner};

/// Execute the jobs command.
pub async fn execute_list(ctx: &Context, query: &JobQuery) -> Result<()> {
    let service = ctx.service()?;
    let root = with_spinner("Fetching jobs...", service.list_jobs(query, &ctx.cancel)).await?;

    if ctx.output.json {
        ctx.output.print_value(&root);
        return Ok(());
    }

    print_jobs(&extract_jobs(&root));
    Ok(())
}

/// Execute the job command.
pub async fn execute_show(ctx: &Context, id: &str) -> Result<()> {
    let service = ctx.service()?;
    let job = with_spinner(&format!("Fetching job {id}..."), service.get_job(id, &ctx.cancel)).await?;
    ctx.output.print_value(&job);
    Ok(())
}

/// Execute the job-results command.
pub async fn execute_results(ctx: &Context, id: &str) -> Result<()> {
    let service = ctx.service()?;
    let results = with_spinner(
        &format!("Fetching results of job {id}..."),
        service.get_job_results(id, &ctx.cancel),
    )
    .await?;
    ctx.output.print_value(&results);
    Ok(())
}

/// Execute the job-cancel command.
pub async fn execute_cancel(ctx: &Context, id: &str) -> Result<()> {
    let service = ctx.service()?;
    let response = with_spinner(
        &format!("Cancelling job {id}..."),
        service.cancel_job(id, &ctx.cancel),
    )
    .await?;

    if response.is_null() && !ctx.output.json {
        println!("{} for job {id}", style("Cancellation requested").green());
        return Ok(());
    }
    ctx.output.print_value(&response);
    Ok(())
}

/// Execute the latest-job command.
///
/// Without `--any-backend`, falls back to the latest job on any backend when
/// no job ran on quantum hardware, and says so.
pub async fn execute_latest(ctx: &Context, any_backend: bool) -> Result<()> {
    let service = ctx.service()?;
    let mut job = with_spinner(
        "Fetching latest job...",
        service.get_latest_job(!any_backend, &ctx.cancel),
    )
    .await?;

    let mut fell_back = false;
    if job.is_none() && !any_backend {
        job = with_spinner(
            "No quantum job found, checking all backends...",
            service.get_latest_job(false, &ctx.cancel),
        )
        .await?;
        fell_back = job.is_some();
    }

    if ctx.output.json {
        return match &job {
            Some(job) => ctx.output.print_json(job),
            None => {
                ctx.output.print_value(&Value::Null);
                Ok(())
            }
        };
    }

    let Some(job) = job else {
        println!("{}", style("No jobs found.").yellow());
        return Ok(());
    };

    if fell_back {
        println!(
            "{}",
            style("No job on a quantum backend; showing the latest job on any backend.").yellow()
        );
    }
    println!("{} {}\n", style("Job").cyan().bold(), style(&job.id).bold());
    println!("  Backend:  {}", cell(job.backend.as_deref()));
    println!("  Status:   {}", cell(job.status.as_deref()));
    println!("  Created:  {}", cell(job.created.as_deref()));
    Ok(())
}

/// Execute the recent-quantum-jobs command.
pub async fn execute_recent(ctx: &Context, limit: u32) -> Result<()> {
    let service = ctx.service()?;
    let limit = usize::try_from(limit)?;
    let jobs = with_spinner(
        "Fetching recent quantum jobs...",
        service.recent_quantum_jobs(limit, &ctx.cancel),
    )
    .await?;

    if ctx.output.json {
        return ctx.output.print_json(&jobs);
    }

    print_jobs(&jobs);
    Ok(())
}

fn job_row(job: &JobSummary) -> Vec<String> {
    vec![
        job.id.clone(),
        cell(job.backend.as_deref()),
        cell(job.status.as_deref()),
        cell(job.created.as_deref()),
    ]
}

fn print_jobs(jobs: &[JobSummary]) {
    if jobs.is_empty() {
        println!("{}", style("No jobs found.").yellow());
        return;
    }
    let rows: Vec<Vec<String>> = jobs.iter().map(job_row).collect();
    print_table(&["ID", "BACKEND", "STATUS", "CREATED"], &rows);
}
