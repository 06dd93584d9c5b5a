//! Graceful shutdown controller with in-flight request tracking.
//!
//! Health state lives in an `ArcSwap` for lock-free reads by probes and
//! handlers. In-flight requests are counted by RAII guards; the last guard
//! to drop wakes anyone waiting for the drain.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::{watch, Notify};

/// Server health state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// Listener bound, not yet serving.
    Starting,
    /// Serving requests and subscriptions.
    Ready,
    /// Refusing new work while in-flight requests finish.
    Draining,
    /// All in-flight requests finished.
    Stopped,
}

impl HealthState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }

    /// Whether new requests and subscriptions may still be accepted.
    #[must_use]
    pub fn accepts_work(self) -> bool {
        matches!(self, Self::Starting | Self::Ready)
    }
}

#[derive(Debug, Default)]
struct InFlight {
    count: AtomicU64,
    idle: Notify,
}

/// Coordinates graceful shutdown across the server.
///
/// 1. Probes read `health_state()`
/// 2. Handlers hold an `InFlightGuard` per request and refuse new work once
///    draining
/// 3. `trigger_shutdown()` moves to Draining and signals all receivers
/// 4. `wait_for_drain()` resolves when the last guard drops
#[derive(Debug)]
pub struct ShutdownController {
    shutdown_signal: watch::Sender<bool>,
    in_flight: Arc<InFlight>,
    health_state: ArcSwap<HealthState>,
}

impl ShutdownController {
    /// Creates a new controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            shutdown_signal: tx,
            in_flight: Arc::new(InFlight::default()),
            health_state: ArcSwap::from_pointee(HealthState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.health_state.store(Arc::new(HealthState::Ready));
    }

    /// Returns a receiver that flips to `true` when shutdown is triggered.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_signal.subscribe()
    }

    /// Moves to `Draining` and notifies every shutdown receiver.
    pub fn trigger_shutdown(&self) {
        self.health_state.store(Arc::new(HealthState::Draining));
        // Receivers may all have been dropped already.
        let _ = self.shutdown_signal.send(true);
    }

    #[must_use]
    pub fn health_state(&self) -> HealthState {
        **self.health_state.load()
    }

    /// Tracks one in-flight request until the guard is dropped.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.count.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Waits for in-flight requests to finish, up to `timeout`.
    ///
    /// Returns `true` and moves to `Stopped` once the count reaches zero.
    /// Returns `false` on timeout, leaving the state at `Draining`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = tokio::time::timeout(timeout, async {
            loop {
                let idle = self.in_flight.idle.notified();
                if self.in_flight_count() == 0 {
                    return;
                }
                idle.await;
            }
        })
        .await
        .is_ok();

        if drained {
            self.health_state.store(Arc::new(HealthState::Stopped));
        }
        drained
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight count on drop, waking drain waiters at zero.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.in_flight.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.in_flight.idle.notify_waiters();
        }
    }
}
