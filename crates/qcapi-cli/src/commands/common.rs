//! Shared helpers for CLI commands.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use qcapi_runtime::{CredentialResolver, Credentials, QcapiResult, RuntimeService};

/// How command results are printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// JSON instead of tables.
    pub json: bool,
    /// Single-line JSON.
    pub compact: bool,
}

impl Output {
    /// Render a JSON value (pretty unless compact).
    pub fn render(&self, value: &Value) -> String {
        let rendered = if self.compact {
            serde_json::to_string(value)
        } else {
            serde_json::to_string_pretty(value)
        };
        rendered.unwrap_or_else(|_| value.to_string())
    }

    /// Print a raw API document.
    pub fn print_value(&self, value: &Value) {
        println!("{}", self.render(value));
    }

    /// Print any serializable record as JSON.
    pub fn print_json<T: Serialize>(&self, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)?;
        self.print_value(&value);
        Ok(())
    }
}

/// State shared by every command invocation.
pub struct Context {
    pub account: Option<String>,
    pub output: Output,
    /// Fired on Ctrl-C.
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a context whose cancellation token fires on Ctrl-C.
    pub fn new(account: Option<String>, output: Output) -> Self {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt received, cancelling");
                trigger.cancel();
            }
        });
        Self {
            account,
            output,
            cancel,
        }
    }

    /// Resolve credentials for the selected account.
    pub fn credentials(&self) -> QcapiResult<Credentials> {
        let mut resolver = CredentialResolver::from_env();
        if let Some(account) = &self.account {
            resolver = resolver.with_account(account);
        }
        resolver.resolve()
    }

    /// Build a service for the selected account.
    pub fn service(&self) -> Result<RuntimeService> {
        let credentials = self.credentials()?;
        tracing::info!(
            "using {} at {} (Service CRN {})",
            credentials.source_label(),
            credentials.base_url,
            credentials.service_crn_hint()
        );
        Ok(RuntimeService::new(credentials)?)
    }
}

/// Run `fut` behind a spinner on stderr.
pub async fn with_spinner<T, F>(message: &str, fut: F) -> QcapiResult<T>
where
    F: Future<Output = QcapiResult<T>>,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = fut.await;
    spinner.finish_and_clear();
    result
}

/// Left-aligned table with a bold header row.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .max(h.len())
        })
        .collect();

    let header = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| format!("{h:<w$}"))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", console::style(header.trim_end()).bold());

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line.trim_end());
    }
}

/// Cell text for an optional value.
pub fn cell(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_pretty_and_compact() {
        let value = json!({"a": [1, 2]});
        let pretty = Output { json: true, compact: false }.render(&value);
        assert!(pretty.contains('\n'));
        let compact = Output { json: true, compact: true }.render(&value);
        assert_eq!(compact, r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_cell() {
        assert_eq!(cell(Some("online")), "online");
        assert_eq!(cell(None), "-");
    }
}
