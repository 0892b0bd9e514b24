use anyhow::Result;
use clap::Parser;
use netwatch::{ConfigPatch, InternetMonitor, MonitorConfig};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "netwatch",
    about = "Internet connectivity watcher — probes public URLs and reports transitions",
    version
)]
struct Args {
    /// Probe URL (repeatable, or comma-separated). Defaults to a built-in
    /// list of captive-portal detection endpoints.
    #[arg(long = "url", env = "NETWATCH_URLS", value_delimiter = ',')]
    urls: Vec<String>,

    /// Milliseconds between scheduled probes
    #[arg(long, env = "NETWATCH_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Per-probe request timeout in milliseconds
    #[arg(long, env = "NETWATCH_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Path to a TOML config file (CLI flags override it)
    #[arg(long, env = "NETWATCH_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "NETWATCH_LOG")]
    log: Option<String>,

    /// Log output format: "pretty" (default) | "json"
    #[arg(long, env = "NETWATCH_LOG_FORMAT")]
    log_format: Option<String>,

    /// Emit transitions as JSON lines instead of plain text
    #[arg(long)]
    json: bool,

    /// Run a single probe and exit 0 (online) or 1 (offline)
    #[arg(long)]
    once: bool,
}

fn init_logging(log_level: &str, log_format: &str) {
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = args.log.clone().unwrap_or_else(|| "info".to_string());
    let log_format = args.log_format.clone().unwrap_or_else(|| "pretty".to_string());
    init_logging(&log_level, &log_format);

    // Priority: CLI / env  >  TOML file  >  built-in default.
    let config = match &args.config {
        Some(path) => MonitorConfig::from_file(path)?,
        None => MonitorConfig::default(),
    };
    let monitor = InternetMonitor::with_config(config, std::sync::Arc::new(netwatch::AssumedUp::default()));
    monitor
        .configure(ConfigPatch {
            urls: (!args.urls.is_empty()).then(|| args.urls.clone()),
            interval_ms: args.interval_ms,
            timeout_ms: args.timeout_ms,
        })
        .await?;

    if args.once {
        let online = monitor.check_once().await;
        print_status(online, args.json);
        std::process::exit(if online { 0 } else { 1 });
    }

    let mut status = monitor.start().await;
    loop {
        tokio::select! {
            received = status.recv() => {
                match received {
                    Ok(online) => print_status(online, args.json),
                    Err(_) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping monitor");
                monitor.stop().await;
                break;
            }
        }
    }

    Ok(())
}

fn print_status(online: bool, json: bool) {
    let now = chrono::Utc::now();
    if json {
        println!(
            "{}",
            serde_json::json!({ "online": online, "at": now.to_rfc3339() })
        );
    } else {
        let label = if online { "online" } else { "offline" };
        println!("{} {label}", now.format("%Y-%m-%dT%H:%M:%S%.3fZ"));
    }
}
