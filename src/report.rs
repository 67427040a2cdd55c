//! Terminal rendering for probe reports

use crate::probe::{ProbeReport, ProbeResult};
use colored::Colorize;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Protocol")]
    protocol: String,
    #[tabled(rename = "Login")]
    login: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "HTTP")]
    http: String,
    #[tabled(rename = "Latency")]
    latency: String,
}

impl From<&ProbeResult> for ResultRow {
    fn from(result: &ProbeResult) -> Self {
        let descriptor = &result.descriptor;
        let status = if result.is_success() {
            "OK".to_string()
        } else {
            result
                .error_kind
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "failed".to_string())
        };

        Self {
            host: descriptor.host.clone(),
            port: descriptor.port,
            protocol: descriptor.protocol.to_string(),
            login: descriptor
                .auth
                .as_ref()
                .map(|auth| auth.username.clone())
                .unwrap_or_else(|| "-".to_string()),
            status,
            http: result
                .http_status
                .map(|code| code.to_string())
                .unwrap_or_else(|| "-".to_string()),
            latency: result
                .latency
                .map(|latency| format!("{}ms", latency.as_millis()))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// Print the report as a table plus a one-line summary.
pub fn print_report(report: &ProbeReport) {
    if report.is_empty() {
        println!("{}", "No proxies to check.".dimmed());
        return;
    }

    let rows: Vec<ResultRow> = report.results.iter().map(ResultRow::from).collect();
    println!("{}", Table::new(rows));

    let summary = format!(
        "{}/{} proxies reachable in {}ms",
        report.succeeded(),
        report.len(),
        report.elapsed().num_milliseconds()
    );
    if report.any_succeeded() {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}
