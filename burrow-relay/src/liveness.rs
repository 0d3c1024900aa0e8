//! Background liveness monitor.
//!
//! Runs periodically to demote peers that stopped sending heartbeats and,
//! when configured, to forget peers that have been offline for too long.

use crate::config::LivenessConfig;
use crate::peers::PeerRegistry;
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, MissedTickBehavior};

/// Spawn the liveness monitor.
///
/// Returns a handle that can be used to abort the task.
pub fn spawn_liveness_monitor(
    peers: Arc<PeerRegistry>,
    config: LivenessConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !config.enabled {
            tracing::info!("Liveness monitor disabled");
            return;
        }

        tracing::info!(
            "Liveness monitor started (interval: {}s, timeout: {}s)",
            config.interval().as_secs(),
            config.timeout_secs
        );

        let mut timer = interval(config.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; nobody can be stale yet.
        timer.tick().await;

        loop {
            timer.tick().await;

            // A panicking sweep must not take the monitor down with it.
            let peers = peers.clone();
            let timeout = config.timeout();
            let retention = config.offline_retention();
            let sweep = tokio::spawn(async move { peers.sweep(Utc::now(), timeout, retention).await });

            match sweep.await {
                Ok(report) if report.demoted > 0 || report.pruned > 0 => {
                    tracing::info!(
                        "Liveness: demoted {} peers, pruned {} offline peers",
                        report.demoted,
                        report.pruned
                    );
                }
                Ok(_) => {
                    tracing::debug!("Liveness: all peers fresh");
                }
                Err(e) => {
                    tracing::error!("Liveness sweep failed: {}", e);
                }
            }
        }
    })
}
