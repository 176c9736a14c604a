//! macsec-demo entry point.
//!
//! Brings up one emulated PHY port, protects PTP traffic with a 256-bit SA
//! and keeps the sequence-event monitor running until interrupted or the
//! run time elapses.

use clap::Parser;
use log::{error, info, warn};
use macsec_ctl::audit::{init_logging, init_logging_pretty};
use macsec_ctl::{run_monitor, MacsecBoard, MacsecCtlConfig, SecyId};
use macsec_hal::{
    BypassMode, Direction, EventMask, Frame, MacBlock, MacsecResult, MatchAction, MatchPattern,
    MatchPriority, PhyFamily, PortInfo, PortNo, SecyConf,
};
use macsec_sim::SimPhy;
use macsec_types::{AssocNum, CipherSuite, EtherType, MacAddress, Sak};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// MACsec PHY control-plane demo on an emulated board
#[derive(Parser, Debug)]
#[command(name = "macsec-demo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Emit JSON logs through tracing
    #[arg(long, conflicts_with = "pretty_logs")]
    json_logs: bool,

    /// Emit multi-line human-readable logs through tracing
    #[arg(long)]
    pretty_logs: bool,

    /// JSON configuration file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// PHY port number to bring up
    #[arg(short = 'p', long, default_value = "3")]
    port: u32,

    /// Run time in milliseconds; 0 runs until interrupted
    #[arg(long, default_value = "500")]
    duration_ms: u64,
}

const STATION: MacAddress = MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
const PTP_MULTICAST: MacAddress = MacAddress::new([0x01, 0x1b, 0x19, 0x00, 0x00, 0x00]);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.json_logs {
        init_logging(&args.log_level);
    } else if args.pretty_logs {
        init_logging_pretty(&args.log_level);
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
            .init();
    }

    let config = match &args.config {
        Some(path) => match MacsecCtlConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}; using defaults", path, e);
                MacsecCtlConfig::default()
            }
        },
        None => MacsecCtlConfig::default(),
    };
    info!("Tick interval: {}ms", config.tick_interval_ms);

    let port = PortNo::new(args.port);
    let sim = Arc::new(SimPhy::new());
    let mut board = MacsecBoard::new(sim.clone(), config);
    if let Err(e) = board.attach_port(port, PortInfo::new(PhyFamily::Viper, true)) {
        error!("Failed to attach port {}: {}", port, e);
        return ExitCode::FAILURE;
    }

    let id = SecyId::new(port, 0, 1);
    if let Err(e) = bring_up(&board, id) {
        error!("Failed to bring up SecY {}: {}", id, e);
        return ExitCode::FAILURE;
    }

    let ptp = Frame::new(PTP_MULTICAST, STATION, EtherType::PTP).with_payload(vec![0; 44]);
    let verdict = sim.egress(port, &ptp);
    info!("PTP frame dropped: {}", verdict.is_drop());
    match board.secy_counters_get(id) {
        Ok(c) => info!(
            "SecY {}: protected={} encrypted={}",
            id, c.out_pkts_protected, c.out_pkts_encrypted
        ),
        Err(e) => warn!("Failed to read SecY counters: {}", e),
    }
    if let Ok(c) = board.mac_counters_get(port, MacBlock::Line) {
        info!("Line MAC: tx_multicast={} tx_octets={}", c.tx_multicast, c.tx_octets);
    }

    let board = Arc::new(board);
    let shutdown = Arc::new(AtomicBool::new(false));
    let tick_interval = board.config().tick_interval();
    let monitor = tokio::spawn(run_monitor(
        Arc::clone(&board),
        tick_interval,
        Arc::clone(&shutdown),
    ));

    if args.duration_ms == 0 {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", err);
        }
        warn!("Received SIGINT, shutting down");
    } else {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(args.duration_ms)) => {}
            _ = tokio::signal::ctrl_c() => warn!("Received SIGINT, shutting down"),
        }
    }
    shutdown.store(true, Ordering::Relaxed);
    if let Err(e) = monitor.await {
        error!("Event monitor task failed: {}", e);
    }

    match board.event_poll(port) {
        Ok(events) if !events.is_empty() => info!("Pending events: {:?}", events),
        Ok(_) => {}
        Err(e) => warn!("Failed to poll events: {}", e),
    }
    info!("Stats: {:?}", board.stats());

    ExitCode::SUCCESS
}

/// Engine on, one SecY carrying PTP on its controlled port, AN0 encoding.
fn bring_up(board: &MacsecBoard, id: SecyId) -> MacsecResult<()> {
    board.engine_init(id.port, true, BypassMode::Disable)?;
    board.secy_create(
        id,
        SecyConf {
            mac_addr: STATION,
            cipher_suite: CipherSuite::GcmAes256,
            always_include_sci: true,
            ..Default::default()
        },
    )?;
    board.pattern_set(
        id,
        Direction::Egress,
        MatchAction::ControlledPort,
        MatchPattern::new(MatchPriority::High).with_ethertype(EtherType::PTP),
    )?;
    board.controlled_port_set(id, true)?;
    board.tx_sc_create(id)?;

    let key = Sak::new(&[0x5a; 32], [0x17; 16])?;
    board.tx_sa_set(id, AssocNum::AN0, 1, true, key)?;
    board.tx_sa_activate(id, AssocNum::AN0)?;
    board.event_enable_set(id.port, EventMask::ROLLOVER, true)?;
    Ok(())
}
