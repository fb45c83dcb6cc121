//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - IBM Quantum (Qiskit Runtime) REST client",
        style("qcapi").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qcapi-runtime  Credentials, IAM tokens, REST client, response extraction");
    println!("  qcapi-cli      Command-line interface");
    println!();
    println!(
        "User-Agent: {}",
        style(qcapi_runtime::client::USER_AGENT).dim()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
