use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rtsp_scan_rs::config::ScanConfig;
use rtsp_scan_rs::scanner::{self, Discovery, ScanContext};
use rtsp_scan_rs::types::{ChannelResult, CredentialAttempt, Credentials, PlaybackResult, ScanReport};
use rtsp_scan_rs::{corpus, netdetect, ports, targets};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// rtsp-scan-rs: async RTSP camera discovery: port scan, protocol check, channel enumeration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rtsp-scan-rs",
    version,
    about = "Async RTSP camera discovery: port scan, protocol check, channel enumeration and stream fingerprinting.",
    long_about = None
)]
struct Cli {
    /// Comma-separated CIDRs, IP ranges (a-b), IPs or hostnames, or a file with one per line.
    /// If omitted, auto-detect the local /24.
    #[arg(long)]
    targets: Option<String>,

    /// Ports file or inline list (e.g. "554,8554,8000-8010"). Defaults to common RTSP ports.
    #[arg(long)]
    ports: Option<String>,

    /// Username sent with channel probes and playback checks.
    #[arg(short, long)]
    username: Option<String>,

    /// Password sent with channel probes and playback checks.
    #[arg(short, long)]
    password: Option<String>,

    /// Only find RTSP hosts; do not enumerate stream paths.
    #[arg(long = "skip-channels", default_value_t = false)]
    skip_channels: bool,

    /// Probe only the most common stream paths.
    #[arg(long, default_value_t = false, conflicts_with = "channels")]
    quick: bool,

    /// Probe numbered channel paths 1..=N instead of the path corpus.
    #[arg(long, value_name = "N")]
    channels: Option<u32>,

    /// Try the default credential list against each RTSP host.
    #[arg(long, default_value_t = false)]
    brute: bool,

    /// Confirm SETUP/PLAY is accepted for every channel found.
    #[arg(long, default_value_t = false)]
    verify: bool,

    /// Connect and read timeout in milliseconds.
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Max concurrent probes.
    #[arg(long)]
    workers: Option<usize>,

    /// Write results as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Verbose logging (same as RUST_LOG=debug).
    #[arg(long, default_value_t = false)]
    debug: bool,
}

#[derive(Serialize)]
struct Output<'a> {
    config: &'a ScanConfig,
    discovery: &'a Discovery,
    #[serde(skip_serializing_if = "Option::is_none")]
    credentials: Option<&'a ScanReport<CredentialAttempt>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    playback: Option<&'a ScanReport<PlaybackResult>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let mut config = ScanConfig::default().merge_env();
    if let Some(ms) = cli.timeout_ms {
        config = config.timeout(Duration::from_millis(ms));
    }
    if let Some(n) = cli.workers {
        config = config.workers(n);
    }

    let specs = match cli.targets.as_deref() {
        Some(arg) => load_target_specs(arg)?,
        None => {
            let (spec, ip) = netdetect::default_scan_target()?;
            info!(%ip, network = %spec, "auto-detected local network");
            vec![spec.to_string()]
        }
    };
    let port_list = ports::resolve_ports_arg(cli.ports.as_deref())?;
    let work = targets::expand_all(&specs, &port_list)?;

    let paths = if cli.skip_channels {
        Vec::new()
    } else if cli.quick {
        corpus::quick_paths()
    } else if let Some(n) = cli.channels {
        corpus::numbered_channel_paths(1..=n.max(1))
    } else {
        corpus::common_paths()
    };

    let creds = match (&cli.username, &cli.password) {
        (None, None) => None,
        (u, p) => Some(Credentials::new(
            u.clone().unwrap_or_default(),
            p.clone().unwrap_or_default(),
        )),
    };

    println!("rtsp-scan-rs configuration:");
    println!("  targets      : {}", specs.join(", "));
    println!("  ports        : {:?}", port_list);
    println!("  work items   : {}", work.len());
    println!("  paths        : {}", paths.len());
    println!("  workers      : {}", config.port_workers);
    println!("  timeout_ms   : {}", config.timeout.as_millis());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted; finishing in-flight probes");
                cancel.cancel();
            }
        });
    }
    let ctx = ScanContext::new(config.clone()).with_cancel(cancel);

    let mut discovery = scanner::discover(&work, &paths, creds.as_ref(), &ctx).await;
    scanner::sort_channels(&mut discovery.channels.entries);

    let credentials = if cli.brute && !ctx.cancel.is_cancelled() {
        let rtsp_hosts: Vec<_> = discovery
            .protocols
            .entries
            .iter()
            .map(|p| p.target.clone())
            .collect();
        let mut pairs = Vec::new();
        pairs.extend(creds.clone());
        pairs.extend(corpus::common_credentials());
        Some(scanner::scan_credentials(&rtsp_hosts, None, &pairs, &ctx).await)
    } else {
        None
    };

    let playback = if cli.verify && !ctx.cancel.is_cancelled() {
        Some(scanner::verify_channels(&discovery.channels.entries, creds.as_ref(), &ctx).await)
    } else {
        None
    };

    print_hosts_table(&discovery);
    if !cli.skip_channels {
        print_channels_table(&discovery.channels.entries, playback.as_ref());
    }
    if let Some(found) = &credentials {
        print_credentials(&found.entries);
    }

    if let Some(path) = cli.output.as_deref() {
        let out = Output {
            config: &config,
            discovery: &discovery,
            credentials: credentials.as_ref(),
            playback: playback.as_ref(),
        };
        match write_results_json(path, &out) {
            Ok(()) => println!("Wrote JSON results to {}", path.display()),
            Err(e) => eprintln!("Failed to write JSON to {}: {e:#}", path.display()),
        }
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

/// Either a file with one spec per line (`#` comments allowed) or an inline comma list.
fn load_target_specs(arg: &str) -> Result<Vec<String>> {
    let text = if Path::new(arg).is_file() {
        fs::read_to_string(arg).with_context(|| format!("failed to read targets file: {arg}"))?
    } else {
        arg.replace(',', "\n")
    };
    let specs: Vec<String> = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    anyhow::ensure!(!specs.is_empty(), "no targets given in {arg}");
    Ok(specs)
}

const SERVER_COL: usize = 40;
const URL_COL: usize = 70;

/// First `max` characters of `s`; banners are untrusted and may be multi-byte.
fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn print_hosts_table(d: &Discovery) {
    let mut host_w = "host".len();
    let mut server_w = "server".len();
    for p in &d.protocols.entries {
        host_w = host_w.max(p.target.host.len());
        if let Some(s) = &p.server_banner {
            server_w = server_w.max(s.chars().count().min(SERVER_COL));
        }
    }
    let port_w = 5usize;
    let vendor_w = 10usize;

    println!(
        "\nOpen ports: {} (scanned: {}), RTSP hosts: {}",
        d.ports.found, d.ports.scanned_done, d.protocols.found
    );
    println!(
        "{:<host_w$}  {:>port_w$}  {:<vendor_w$}  {:<server_w$}",
        "host", "port", "vendor", "server",
    );
    println!(
        "{:-<host_w$}  {:-<port_w$}  {:-<vendor_w$}  {:-<server_w$}",
        "", "", "", "",
    );
    for p in &d.protocols.entries {
        let server = clip(p.server_banner.as_deref().unwrap_or_default(), SERVER_COL);
        let vendor = p.manufacturer.map(|m| m.as_str()).unwrap_or("-");
        println!(
            "{:<host_w$}  {:>port_w$}  {:<vendor_w$}  {:<server_w$}",
            p.target.host, p.target.port, vendor, server,
        );
    }
    let other = d.non_rtsp();
    if !other.is_empty() {
        println!("Open but not RTSP: {}", other.len());
        for p in other {
            println!("  - {}", p.target);
        }
    }
    let vendors = d.manufacturer_summary();
    if !vendors.is_empty() {
        println!("Vendors:");
        for (name, count) in vendors {
            println!("  - {name}: {count}");
        }
    }
}

fn print_channels_table(channels: &[ChannelResult], playback: Option<&ScanReport<PlaybackResult>>) {
    println!("\nChannels found: {}", channels.len());
    if channels.is_empty() {
        return;
    }
    let url_w = channels
        .iter()
        .map(|c| c.url.chars().count().min(URL_COL))
        .max()
        .unwrap_or(3)
        .max("url".len());

    println!(
        "{:<url_w$}  {:>6}  {:<7}  {:<6}  {:<10}  {:<4}  {:<8}",
        "url", "status", "stream", "codec", "resolution", "auth", "playable",
    );
    println!(
        "{:-<url_w$}  {:-<6}  {:-<7}  {:-<6}  {:-<10}  {:-<4}  {:-<8}",
        "", "", "", "", "", "", "",
    );
    for c in channels {
        let url = clip(&c.url, URL_COL);
        let playable = playback
            .and_then(|r| r.entries.iter().find(|p| p.url == c.url))
            .map(|p| if p.playable { "yes" } else { "no" })
            .unwrap_or("-");
        println!(
            "{:<url_w$}  {:>6}  {:<7}  {:<6}  {:<10}  {:<4}  {:<8}",
            url,
            c.status_code,
            format!("{:?}", c.stream_type),
            c.codec.as_deref().unwrap_or("-"),
            c.resolution.as_deref().unwrap_or("-"),
            if c.requires_auth { "yes" } else { "no" },
            playable,
        );
    }
}

fn print_credentials(found: &[CredentialAttempt]) {
    println!("\nValid credentials: {}", found.len());
    for a in found {
        println!("  - {} {}:{} {}", a.target, a.username, a.password, a.path);
    }
}

fn write_results_json(path: &Path, out: &Output<'_>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, out)?;
    Ok(())
}
