use cecbridge::cec;
use cecbridge::server;
use cecbridge::tv;
use cecbridge::wol;

use clap::Parser;
use log::{info, warn};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the TV endpoints listen on
    #[arg(long, env = "CECBRIDGE_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port the TV endpoints listen on
    #[arg(long, env = "CECBRIDGE_PORT", default_value_t = 8080)]
    port: u16,

    /// Log filter, e.g. "info" or "cecbridge=debug"
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// If true, use a fake cec connection instead of directly using the hardware.
    #[arg(long)]
    use_fake_cec_conn: bool,

    /// Path to the cec-client binary
    #[arg(long, env = "CEC_CLIENT", default_value = "cec-client")]
    cec_client: PathBuf,

    /// Seconds to wait for a single cec-client run
    #[arg(long, default_value_t = 10)]
    cec_timeout_secs: u64,

    /// CEC logical address of the TV
    #[arg(long, default_value_t = 0)]
    tv_addr: u8,

    /// CEC logical address this adapter announces input switches from
    #[arg(long, default_value_t = 1)]
    logical_addr: u8,

    /// Address the Wake-on-LAN endpoint listens on, normally behind tailscale serve
    #[arg(long, default_value = "127.0.0.1")]
    wol_host: IpAddr,

    /// Port the Wake-on-LAN endpoint listens on
    #[arg(long, default_value_t = 5050)]
    wol_port: u16,

    /// JSON file mapping target names to MAC addresses
    #[arg(long, env = "WOL_TARGETS", default_value = "wol_targets.json")]
    wol_targets: PathBuf,

    /// Broadcast address for magic packets
    #[arg(long, default_value = "255.255.255.255")]
    wol_broadcast: Ipv4Addr,

    /// If true, don't start the Wake-on-LAN endpoint.
    #[arg(long)]
    no_wol: bool,
}

/// Rewrites Python-style level names such as `WARNING` into env_logger
/// filter syntax, leaving module paths alone.
fn log_filter(spec: &str) -> String {
    spec.split(',')
        .map(|directive| match directive.split_once('=') {
            Some((module, level)) => format!("{}={}", module.trim(), level_name(level)),
            None => level_name(directive),
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn level_name(word: &str) -> String {
    let word = word.trim();
    match word.to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        level @ ("error" | "warn" | "info" | "debug" | "trace" | "off") => level.to_string(),
        _ => word.to_string(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    env_logger::Builder::new()
        .parse_filters(&log_filter(&args.log_level))
        .format_timestamp(Some(env_logger::fmt::TimestampPrecision::Millis))
        .init();

    let tv: Box<dyn tv::TVConnection + Send> = if args.use_fake_cec_conn {
        info!("Using fake CEC connection");
        Box::new(cec::noop::LogOnlyConn::new())
    } else {
        info!("Using {} for CEC", args.cec_client.display());
        Box::new(cec::client::CecClient::new(
            args.cec_client,
            Duration::from_secs(args.cec_timeout_secs),
            cec::LogicalAddress::try_from(args.tv_addr)?,
            cec::LogicalAddress::try_from(args.logical_addr)?,
        ))
    };
    let app_state = server::AppState::new(tv);

    let lan_addr = SocketAddr::new(args.host, args.port);
    let lan = rouille::Server::new(lan_addr, move |request| {
        server::handle_lan(request, &app_state)
    })?;

    if args.no_wol {
        info!("WoL endpoint disabled");
    } else {
        let targets = wol::load_targets(&args.wol_targets);
        if targets.is_empty() {
            warn!("No WoL targets loaded");
        } else {
            let names: Vec<&str> = targets.keys().map(String::as_str).collect();
            info!("WoL targets: {}", names.join(", "));
        }
        let wol_state = server::WolState {
            targets,
            broadcast: args.wol_broadcast,
            wake: Box::new(wol::wake),
        };
        let wol_addr = SocketAddr::new(args.wol_host, args.wol_port);
        let wol_server = rouille::Server::new(wol_addr, move |request| {
            server::handle_wol(request, &wol_state)
        })?;
        info!("Starting WoL server on {}...", wol_server.server_addr());
        thread::Builder::new()
            .name("wol".into())
            .spawn(move || wol_server.run())?;
    }

    info!("Starting server on {}...", lan.server_addr());
    lan.run();
    Ok(())
}
