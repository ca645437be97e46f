//! Mover and stats loops.
//!
//! Each loop runs on its own named thread and waits on two channels: a
//! crossbeam ticker and the shutdown channel. Dropping the shutdown sender
//! wakes both loops; the mover then runs one last sweep so spooled content is
//! sharded before the threads are joined.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{select, tick, Receiver, Sender};
use fsa_cas::{ContentStore, SweepReport};
use fsa_config::{log_service_debug, log_service_error, log_service_info, ServiceConfig};

use crate::stats::{self, ReadStats};

/// Handles to the running background threads.
///
/// Stops the loops on [`shutdown`](Self::shutdown) or on drop.
pub struct BackgroundTasks {
    shutdown: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn spawn(
        content: ContentStore,
        stats: Arc<ReadStats>,
        settings: &ServiceConfig,
    ) -> std::io::Result<Self> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let mut tasks = Self {
            shutdown: Some(shutdown_tx),
            handles: Vec::with_capacity(2),
        };

        let mover_interval = Duration::from_millis(settings.mover_interval_ms);
        let rx = shutdown_rx.clone();
        tasks.handles.push(
            thread::Builder::new()
                .name("fsa-mover".into())
                .spawn(move || mover_loop(content, mover_interval, rx))?,
        );

        let stats_interval = Duration::from_secs(settings.stats_interval_secs);
        let show_stats = settings.show_stats;
        tasks.handles.push(
            thread::Builder::new()
                .name("fsa-stats".into())
                .spawn(move || stats_loop(stats, stats_interval, show_stats, shutdown_rx))?,
        );

        log_service_info!(
            "Background tasks started",
            mover_interval_ms = settings.mover_interval_ms,
            stats_interval_secs = settings.stats_interval_secs
        );
        Ok(tasks)
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    /// Signal both loops and wait for them, including the mover's final sweep.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(shutdown) = self.shutdown.take() else {
            return;
        };
        drop(shutdown);
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log_service_error!("Background thread panicked");
            }
        }
        log_service_info!("Background tasks stopped");
    }
}

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mover_loop(content: ContentStore, interval: Duration, shutdown: Receiver<()>) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                log_sweep(&content.sweep(), false);
            }
        }
    }
    log_sweep(&content.sweep(), true);
}

fn stats_loop(stats: Arc<ReadStats>, interval: Duration, show_stats: bool, shutdown: Receiver<()>) {
    let ticker = tick(interval);
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(ticker) -> _ => {
                stats::report(&stats, show_stats);
            }
        }
    }
}

fn log_sweep(report: &SweepReport, last: bool) {
    if report.is_empty() {
        return;
    }
    if last {
        log_service_info!(
            "Final sweep",
            moved = report.moved as u64,
            already_present = report.already_present as u64,
            deferred = report.deferred as u64
        );
    } else {
        log_service_debug!(
            "Sweep",
            moved = report.moved as u64,
            already_present = report.already_present as u64,
            deferred = report.deferred as u64,
            skipped = report.skipped as u64
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsa_cas::{HashAlgorithm, ShardLayout};
    use tempfile::TempDir;

    fn open_store(temp: &TempDir) -> ContentStore {
        ContentStore::open(
            temp.path().join("base"),
            temp.path().join("spool"),
            ShardLayout::Core,
            HashAlgorithm::Sha256,
        )
        .unwrap()
    }

    fn slow_settings() -> ServiceConfig {
        ServiceConfig {
            mover_interval_ms: 60_000,
            stats_interval_secs: 3600,
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn test_shutdown_runs_final_sweep() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let tasks =
            BackgroundTasks::spawn(store.clone(), Arc::new(ReadStats::default()), &slow_settings())
                .unwrap();

        let stored = store.put(b"left in spool").unwrap();
        assert!(store.spool().contains(&stored.hash));

        tasks.shutdown();

        assert!(!store.spool().contains(&stored.hash));
        assert!(store.shards().compressed_path(&stored.hash).exists());
    }

    #[test]
    fn test_drop_stops_threads() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let stored = store.put(b"dropped").unwrap();
        {
            let tasks = BackgroundTasks::spawn(
                store.clone(),
                Arc::new(ReadStats::default()),
                &slow_settings(),
            )
            .unwrap();
            assert!(tasks.is_running());
        }
        assert!(store.shards().compressed_path(&stored.hash).exists());
    }

    #[test]
    fn test_mover_drains_spool_on_tick() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp);
        let settings = ServiceConfig {
            mover_interval_ms: 10,
            ..slow_settings()
        };
        let tasks =
            BackgroundTasks::spawn(store.clone(), Arc::new(ReadStats::default()), &settings)
                .unwrap();

        let stored = store.put(b"swept by the loop").unwrap();
        let path = store.shards().compressed_path(&stored.hash);
        for _ in 0..200 {
            if path.exists() {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        assert!(path.exists());
        tasks.shutdown();
    }
}
