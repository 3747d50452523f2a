//! Entry point: parses the single configuration-string argument, opens one
//! peer session, and runs it to completion or until the process is
//! interrupted.

use anyhow::Context;
use log::{
    error,
    info,
    LevelFilter,
};
use octavius_bgpd::{
    config::PeerConfig,
    speaker::Speaker,
};
use std::process::ExitCode;

#[cfg(target_os = "linux")]
fn build_installer() -> anyhow::Result<octavius_bgp_route::linux::LinuxRouteTable> {
    Ok(octavius_bgp_route::linux::LinuxRouteTable::new()?)
}

#[cfg(not(target_os = "linux"))]
fn build_installer() -> anyhow::Result<octavius_bgp_route::fake::NullRouteTable> {
    Ok(octavius_bgp_route::fake::NullRouteTable)
}

#[tokio::main]
async fn main() -> ExitCode {
    simple_logger::SimpleLogger::new().with_level(LevelFilter::Info).init().expect("logger can only be initialized once");

    let Some(raw) = std::env::args().nth(1) else {
        error!("usage: bgpd <local-as> <local-ip> <remote-as> <remote-ip> <active|passive> [<prefix/len> ...]");
        return ExitCode::from(1);
    };

    let config = match PeerConfig::parse(&raw) {
        Ok(config) => config,
        Err(error) => {
            error!("invalid configuration string => {error}");
            return ExitCode::from(1);
        }
    };

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:?}");
            ExitCode::from(1)
        }
    }
}

async fn run(config: PeerConfig) -> anyhow::Result<()> {
    let installer = build_installer().context("building kernel routing table interface")?;
    let speaker = Speaker::new(config.local_as, config.local_ip, &config.originate, &installer)
        .await
        .context("building Loc-RIB")?;
    let peer = speaker.peer(config, installer);

    tokio::select! {
        result = peer.run() => result.context("peer session ended with an error"),
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
            Ok(())
        }
    }
}
