//! Broadcast dispatcher.
//!
//! One shared poll per tick regardless of how many viewers are connected.
//! A tick that arrives while the previous fetch+push cycle is still running
//! is skipped, so a slow store never sees more than one poll at a time.

use crate::poller::WatermarkPoller;
use crate::registry::{ConnectionId, ConnectionRegistry};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sw_protocol::encode_batch;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub dropped: Vec<ConnectionId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A previous cycle was still in flight.
    Skipped,
    /// The poll returned nothing new; nobody was pushed to.
    Empty,
    Broadcast(FanoutReport),
}

/// Resets the in-flight flag when the cycle ends, including by panic.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Dispatcher {
    poller: Mutex<WatermarkPoller>,
    registry: ConnectionRegistry,
    interval: Duration,
    in_flight: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(poller: WatermarkPoller, registry: ConnectionRegistry, interval: Duration) -> Self {
        Self {
            poller: Mutex::new(poller),
            registry,
            interval,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn watermark(&self) -> Option<DateTime<Utc>> {
        self.poller.lock().await.watermark()
    }

    /// Run one fetch+broadcast cycle inline, unless one is already running.
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("previous poll still in flight; skipping tick");
            return TickOutcome::Skipped;
        };
        self.run_cycle().await
    }

    /// Drive ticks at the configured interval until `shutdown` turns true.
    ///
    /// Each cycle runs on its own task so shutdown is observed even while a
    /// fetch is stuck.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.interval.as_secs_f64(), "dispatcher started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    match InFlightGuard::acquire(&self.in_flight) {
                        Some(guard) => {
                            let this = Arc::clone(&self);
                            tokio::spawn(async move {
                                let _guard = guard;
                                this.run_cycle().await;
                            });
                        }
                        None => debug!("previous poll still in flight; skipping tick"),
                    }
                }
            }
        }
        info!("dispatcher stopped");
    }

    async fn run_cycle(&self) -> TickOutcome {
        let batch = self.poller.lock().await.fetch_new().await;
        if batch.is_empty() {
            return TickOutcome::Empty;
        }

        let payload: Arc<str> = match encode_batch(&batch) {
            Ok(json) => json.into(),
            Err(e) => {
                error!(error = %e, "failed to serialize event batch");
                return TickOutcome::Empty;
            }
        };

        let report = fan_out(&self.registry, payload).await;
        info!(
            events = batch.len(),
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "broadcast event batch"
        );
        TickOutcome::Broadcast(report)
    }
}

/// Push one payload to every registered session concurrently. Sessions whose
/// push fails are unregistered; the rest are unaffected.
pub async fn fan_out(registry: &ConnectionRegistry, payload: Arc<str>) -> FanoutReport {
    let members = registry.snapshot().await;
    let pushes = members.into_iter().map(|(id, channel)| {
        let payload = Arc::clone(&payload);
        async move { (id, channel.push(payload).await) }
    });

    let mut report = FanoutReport::default();
    for (id, result) in join_all(pushes).await {
        match result {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(connection = %id, error = %e, "push failed; dropping session");
                registry.unregister(id).await;
                report.dropped.push(id);
            }
        }
    }
    report
}
