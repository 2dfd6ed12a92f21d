use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tracing::info;

use h42_can_bridge::bridge::{BackendAddr, PacketObserver, TcpBridge};
use h42_can_bridge::config::{Args, Config};
use h42_can_bridge::server::CanServer;
use h42_can_bridge::transport::SocketCanBus;
use h42_can_bridge::{logging, mqttdbg};

/// Bridges `recv_packet`/`send_packet` through the MQTT diagnostic decoder,
/// printing a human-readable view of every packet without altering it.
/// Mirrors the original daemon's `DgbShim`.
struct DiagnosticObserver;

impl PacketObserver for DiagnosticObserver {
    fn on_uplink(&self, src_addr: u8, data: &[u8]) {
        info!(src_addr, "Node -> Server");
        if let Some(decoded) = mqttdbg::describe(data) {
            for line in decoded.lines() {
                info!("{line}");
            }
        }
    }

    fn on_downlink(&self, dst_addr: u8, data: &[u8]) {
        info!(dst_addr, "Server -> Node");
        if let Some(decoded) = mqttdbg::describe(data) {
            for line in decoded.lines() {
                info!("{line}");
            }
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let config = Config::load(&args).wrap_err("failed to resolve configuration")?;
    logging::init(&config.log)?;

    info!(?config, "starting h42-can-bridge");
    run(&config)
}

fn run(config: &Config) -> Result<()> {
    let bus = Arc::new(
        SocketCanBus::open(&config.can_interface)
            .wrap_err_with(|| format!("failed to open CAN interface `{}`", config.can_interface))?,
    );
    let can_server = Arc::new(CanServer::new(bus));

    let backend = BackendAddr {
        host: config.backend_host.clone(),
        port: config.backend_port,
    };
    let mut bridge = TcpBridge::new(can_server, backend);
    if config.diagnostics {
        bridge = bridge.with_observer(Arc::new(DiagnosticObserver));
    }

    info!(host = %config.backend_host, port = config.backend_port, "running TCP fan-out bridge");
    bridge.run()
}
