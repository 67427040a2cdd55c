use anyhow::{anyhow, Result};
use clap::Parser;
use proxy_pulse::{
    parse_descriptor, report, ProbeRequest, Prober, ProxyDescriptor, ProxyProtocol,
    DEFAULT_CONCURRENCY, DEFAULT_TARGET_URL, DEFAULT_TIMEOUT_SECS,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// A concurrent proxy connectivity prober
#[derive(Parser)]
#[command(name = "proxy-pulse")]
#[command(about = "Tests whether a list of proxies can reach a target URL")]
struct Cli {
    /// Path to a txt file containing proxies, one per line
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Space-separated proxy list (host:port or host:port:user:pass)
    #[arg(short, long, num_args = 1..)]
    proxies: Vec<String>,

    /// URL to test proxy connectivity
    #[arg(long, default_value = DEFAULT_TARGET_URL)]
    url: String,

    /// Protocol for proxies given without a scheme (http, https, socks4, socks5)
    #[arg(short = 't', long, default_value = "http")]
    protocol: String,

    /// Timeout per proxy in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Maximum number of concurrent probes
    #[arg(short = 'n', long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let protocol = parse_protocol(&cli.protocol)?;
    let descriptors = collect_descriptors(&cli, protocol)?;

    if descriptors.is_empty() {
        println!("No proxies to check.");
        return Ok(());
    }

    info!(
        count = descriptors.len(),
        url = %cli.url,
        timeout_secs = cli.timeout,
        concurrency = cli.concurrency,
        "starting probe"
    );

    let request = ProbeRequest::new(cli.url)
        .with_timeout(Duration::from_secs(cli.timeout))
        .with_concurrency(cli.concurrency)
        .with_descriptors(descriptors);

    // Ctrl-C abandons outstanding attempts; resolved results are kept.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, abandoning in-flight probes");
            let _ = cancel_tx.send(true);
        }
    });

    let prober = Prober::with_cancel(cancel_rx);
    let report = prober.probe(&request).await;

    report::print_report(&report);

    if !report.any_succeeded() {
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let default_filter = if debug {
        "proxy_pulse=debug"
    } else {
        "proxy_pulse=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();
}

/// Gather descriptors from --proxies and --file; malformed entries are logged
/// and skipped.
fn collect_descriptors(cli: &Cli, protocol: ProxyProtocol) -> Result<Vec<ProxyDescriptor>> {
    let mut lines: Vec<String> = cli.proxies.clone();

    if let Some(path) = &cli.file {
        let content = std::fs::read_to_string(path)?;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            for token in trimmed.split_whitespace() {
                lines.push(token.to_string());
            }
        }
    }

    let mut descriptors = Vec::with_capacity(lines.len());
    for raw in &lines {
        match parse_descriptor(raw, protocol.clone()) {
            Ok(descriptor) => {
                debug!(proxy = %descriptor.to_simple_string(), "proxy format passed");
                descriptors.push(descriptor);
            }
            Err(err) => warn!("proxy format failed: '{}': {}", raw, err),
        }
    }

    Ok(descriptors)
}

fn parse_protocol(s: &str) -> Result<ProxyProtocol> {
    match s.to_lowercase().as_str() {
        "http" => Ok(ProxyProtocol::Http),
        "https" => Ok(ProxyProtocol::Https),
        "socks4" => Ok(ProxyProtocol::Socks4),
        "socks5" => Ok(ProxyProtocol::Socks5),
        _ => Err(anyhow!(
            "Invalid proxy protocol: {}. Use: http, https, socks4, socks5",
            s
        )),
    }
}
