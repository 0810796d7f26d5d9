//! Scheduling envelope: cooldown, single-flight, connectivity trigger,
//! background reactivation.

use crate::engine::SyncEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Name under which the host registers the background task.
pub const BACKGROUND_SYNC_TASK: &str = "BACKGROUND_SYNC_TASK";

/// Minimum interval the host should request for the background task. The
/// actual cadence is OS-controlled and may be longer.
pub const MIN_BACKGROUND_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// A connectivity transition delivered by the network status collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
    /// Whether the device is now connected.
    pub connected: bool,
}

/// Clears the in-flight flag on every exit path.
struct SyncFlagGuard<'a>(&'a AtomicBool);

impl Drop for SyncFlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    /// Requests a push cycle, subject to the gates:
    ///
    /// 1. a closed store returns silently;
    /// 2. a cycle already in flight returns (single-flight);
    /// 3. a push within the cooldown window returns, leaving
    ///    `last_push_time` at the earlier cycle's timestamp;
    /// 4. otherwise the timestamp is taken and the push runs.
    pub fn trigger_push(&self) {
        if !self.store.is_open() {
            debug!("store closed, push not triggered");
            return;
        }

        if self
            .is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("push already in flight");
            return;
        }
        let _guard = SyncFlagGuard(&self.is_syncing);

        {
            let mut last = self.last_push_time.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.config.push_cooldown {
                    debug!("push cooldown active");
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        self.push();
    }

    /// Handler for the network status collaborator. A transition to
    /// connected starts a push-then-pull cycle; going offline does nothing.
    pub fn on_connectivity_change(&self, connected: bool) {
        if !connected {
            debug!("went offline");
            return;
        }
        info!("connectivity restored, starting sync cycle");
        self.trigger_push();
        self.pull();
    }

    /// Entry point for the background execution collaborator: push, pull,
    /// then prune. Each phase finishes its current record and stops at a
    /// transaction boundary, so a short background window leaves no partial
    /// state. The host owns opening and closing the store around the tick;
    /// a closed store makes this a no-op.
    pub fn background_tick(&self) {
        if !self.store.is_open() {
            debug!("store closed, skipping background tick");
            return;
        }
        info!(task = BACKGROUND_SYNC_TASK, "background tick");
        self.trigger_push();
        self.pull();
        self.prune();
    }
}

/// Consumes connectivity events on a dedicated thread, feeding
/// [`SyncEngine::on_connectivity_change`]. Exits when the sender side hangs
/// up.
pub fn spawn_connectivity_listener(
    engine: Arc<SyncEngine>,
    events: Receiver<ConnectivityEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(event) = events.recv() {
            engine.on_connectivity_change(event.connected);
        }
    })
}
