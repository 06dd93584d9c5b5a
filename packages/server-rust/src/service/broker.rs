//! Broadcast broker for scheduled background operations.
//!
//! `schedule()` acknowledges immediately and arms a one-shot timer. When the
//! timer fires, a `ScheduledOperationEvent` is fanned out to every
//! subscriber registered at that moment. Delivery is best-effort: there is
//! no replay buffer and no queueing for absent subscribers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use shakegate_core::ScheduledOperationEvent;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::config::GatewayConfig;

/// Opaque handle identifying one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OperationBroker
// ---------------------------------------------------------------------------

/// Publish/subscribe broker owned by the server's composition root.
///
/// The subscriber set is a `DashMap`, so subscribe, unsubscribe, and
/// broadcast may run concurrently. A broadcast iterates a snapshot taken at
/// fire time: every subscriber live at that moment is offered the event.
pub struct OperationBroker {
    subscribers: DashMap<SubscriptionId, mpsc::Sender<ScheduledOperationEvent>>,
    /// Pending timers by id. Held under a mutex so a timer cannot remove
    /// its entry before `schedule()` has inserted it.
    timers: Mutex<HashMap<u64, AbortHandle>>,
    next_subscription: AtomicU64,
    next_timer: AtomicU64,
    delay: Duration,
    channel_capacity: usize,
    closed: AtomicBool,
}

impl OperationBroker {
    /// Creates a broker publishing completions `delay` after scheduling.
    ///
    /// Each subscriber gets a bounded channel of `channel_capacity` events.
    #[must_use]
    pub fn new(delay: Duration, channel_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: DashMap::new(),
            timers: Mutex::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
            next_timer: AtomicU64::new(1),
            delay,
            channel_capacity: channel_capacity.max(1),
            closed: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Arc<Self> {
        Self::new(config.schedule_delay, config.subscriber_channel_capacity)
    }

    /// Delay between scheduling and publishing.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Adds a subscriber. Dropping the returned `Subscription` removes it.
    ///
    /// After `teardown()` the subscription is never registered and its
    /// stream ends immediately.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        if self.closed.load(Ordering::SeqCst) {
            debug!(subscription = %id, "broker closed; subscription ends immediately");
        } else {
            self.subscribers.insert(id, tx);
            // A teardown that cleared the set between the check and the
            // insert must not leave this entry behind.
            if self.closed.load(Ordering::SeqCst) {
                self.subscribers.remove(&id);
                debug!(subscription = %id, "broker closed during subscribe");
            } else {
                debug!(subscription = %id, "subscriber added");
            }
            self.record_subscribers();
        }

        Subscription {
            id,
            rx,
            broker: Arc::downgrade(self),
        }
    }

    /// Removes a subscriber. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            self.record_subscribers();
            debug!(subscription = %id, "subscriber removed");
        }
        removed
    }

    /// Schedules a named background operation.
    ///
    /// Returns the acknowledgement immediately; the completion event is
    /// published once, `delay` later. Must be called within a tokio runtime.
    pub fn schedule(self: &Arc<Self>, name: &str) -> String {
        let ack = format!("operation {name} scheduled");

        // `closed` only flips under this lock, so a timer armed here is
        // always seen by `teardown`.
        let mut timers = self.timers.lock();
        if self.closed.load(Ordering::SeqCst) {
            drop(timers);
            warn!(operation = %name, "broker closed; completion will not be published");
            return ack;
        }

        let timer_id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let broker = Arc::downgrade(self);
        let delay = self.delay;
        let event_name = name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(broker) = broker.upgrade() {
                broker.timers.lock().remove(&timer_id);
                broker.publish(ScheduledOperationEvent {
                    name: event_name,
                    end_date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                });
            }
        });
        timers.insert(timer_id, handle.abort_handle());
        drop(timers);

        info!(operation = %name, delay_ms = delay_ms(delay), "operation scheduled");
        ack
    }

    /// Offers `event` to every current subscriber.
    ///
    /// A full channel drops the event for that subscriber only; closed
    /// channels are pruned. Returns the number of subscribers that received
    /// the event.
    pub fn publish(&self, event: ScheduledOperationEvent) -> usize {
        let targets: Vec<_> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        let mut stale = Vec::new();
        for (id, tx) in targets {
            match tx.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(subscription = %id, operation = %event.name, "subscriber lagging; event dropped");
                }
                Err(TrySendError::Closed(_)) => stale.push(id),
            }
        }

        for id in stale {
            self.unsubscribe(id);
        }

        metrics::counter!("shakegate_events_published_total").increment(1);
        info!(operation = %event.name, delivered, "operation finished");
        delivered
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Number of scheduled operations whose timers have not fired yet.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.timers.lock().len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Releases all pending timers and clears the subscriber set.
    ///
    /// Open subscriptions see their stream end. Idempotent.
    pub fn teardown(&self) {
        let timers: Vec<AbortHandle> = {
            let mut pending = self.timers.lock();
            self.closed.store(true, Ordering::SeqCst);
            pending.drain().map(|(_, h)| h).collect()
        };
        for handle in &timers {
            handle.abort();
        }

        let subscribers = self.subscribers.len();
        self.subscribers.clear();
        self.record_subscribers();

        info!(
            aborted_timers = timers.len(),
            subscribers, "operation broker torn down"
        );
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_subscribers(&self) {
        metrics::gauge!("shakegate_subscribers").set(self.subscribers.len() as f64);
    }
}

impl fmt::Debug for OperationBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationBroker")
            .field("subscribers", &self.subscribers.len())
            .field("pending", &self.pending_operations())
            .field("delay", &self.delay)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn delay_ms(delay: Duration) -> u64 {
    delay.as_millis() as u64
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live subscription to completion events.
///
/// RAII handle: dropping it unsubscribes, so closed connections never leave
/// entries behind in the broker.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: mpsc::Receiver<ScheduledOperationEvent>,
    broker: Weak<OperationBroker>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Waits for the next event. Returns `None` once the broker has been
    /// torn down or has pruned this subscriber.
    pub async fn recv(&mut self) -> Option<ScheduledOperationEvent> {
        self.rx.recv().await
    }

    /// Returns an already-delivered event without waiting.
    pub fn try_recv(&mut self) -> Option<ScheduledOperationEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(broker) = self.broker.upgrade() {
            broker.unsubscribe(self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
