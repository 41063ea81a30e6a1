// ic706-server -- relays the IC-706 panel link to one TCP client and
// drives the PWK power key line.
//
// Usage:
//   ic706-server
//   ic706-server --port 42000 --uart /dev/ttyO1 --pwk-gpio 20
//   ic706-server --no-pwk --power-on lcd -vv
//
// RUST_LOG overrides the verbosity flags.

use std::net::IpAddr;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ic706_bridge::{BridgeBuilder, DEFAULT_UART_PATH, PowerOnTrigger};
use ic706_transport::{DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_PWK_GPIO};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// IC-706 remote bridge -- serial panel link to TCP, with power key control.
#[derive(Parser)]
#[command(name = "ic706-server", version)]
struct Cli {
    /// TCP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind the listener to
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Serial device connected to the main unit
    #[arg(short, long, default_value = DEFAULT_UART_PATH)]
    uart: String,

    /// UART baud rate
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// GPIO number of the PWK line
    #[arg(long, default_value_t = DEFAULT_PWK_GPIO, conflicts_with = "no_pwk")]
    pwk_gpio: u32,

    /// Run without a PWK line; power requests are only logged
    #[arg(long)]
    no_pwk: bool,

    /// Packet that marks the rig as powered on
    #[arg(long, value_enum, default_value_t = PowerOn::Init2)]
    power_on: PowerOn,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PowerOn {
    /// Second handshake packet
    Init2,
    /// First display update
    Lcd,
}

impl From<PowerOn> for PowerOnTrigger {
    fn from(p: PowerOn) -> Self {
        match p {
            PowerOn::Init2 => PowerOnTrigger::Handshake,
            PowerOn::Lcd => PowerOnTrigger::Display,
        }
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel `token` on SIGINT or SIGTERM.
fn spawn_signal_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown requested");
        token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot watch SIGTERM, only Ctrl+C stops the bridge");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    info!(
        uart = %cli.uart,
        baud = cli.baud,
        port = cli.port,
        pwk_gpio = (!cli.no_pwk).then_some(cli.pwk_gpio),
        "starting ic706-server"
    );

    let cancel = CancellationToken::new();
    let bridge = BridgeBuilder::new()
        .uart_path(&cli.uart)
        .baud_rate(cli.baud)
        .bind_addr(cli.bind)
        .port(cli.port)
        .pwk_gpio((!cli.no_pwk).then_some(cli.pwk_gpio))
        .power_on_trigger(cli.power_on.into())
        .cancel_token(cancel.clone())
        .build()
        .await
        .context("failed to start bridge")?;

    spawn_signal_watcher(cancel);

    let report = bridge.run().await;
    report.log();
    Ok(())
}
