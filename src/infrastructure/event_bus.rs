//! In-process event channel with topic-exchange semantics.
//!
//! Built on `tokio::sync::broadcast`: every queue bound to an exchange gets
//! its own receiver, so multiple consumers each observe every matching
//! message (fan-out, not competing consumers). Delivery is at-least-once
//! from the consumer's perspective; handlers must be idempotent. Messages a
//! consumer cannot process within its retry budget are routed to the queue's
//! dead-letter target and retained for inspection rather than dropped.
//!
//! A distributed deployment would back this with a real broker; the exchange,
//! queue, and routing-key names in `domain::events` are the broker topology.

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Maximum messages buffered per queue before the slowest consumer lags.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default handler retry budget before a message is dead-lettered.
pub const DEFAULT_RETRY_BUDGET: u32 = 3;

/// A published message: routing metadata plus the JSON-encoded event.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub message_id: uuid::Uuid,
    pub exchange: String,
    pub routing_key: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Envelope {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| LedgerError::Delivery(format!("Malformed event payload: {e}")))
    }
}

/// A message that exhausted its consumer's retry budget.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub target: String,
    pub queue: String,
    pub reason: String,
    pub envelope: Envelope,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Binds a named queue to an exchange with a routing-key pattern and a
/// dead-letter target.
#[derive(Debug, Clone)]
pub struct QueueBinding {
    pub exchange: String,
    pub queue: String,
    pub routing_key: String,
    pub dead_letter_target: String,
}

impl QueueBinding {
    pub fn new(exchange: &str, queue: &str, routing_key: &str, dead_letter_target: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            routing_key: routing_key.to_string(),
            dead_letter_target: dead_letter_target.to_string(),
        }
    }
}

/// In-process event bus keyed by exchange name.
pub struct EventBus {
    exchanges: RwLock<HashMap<String, broadcast::Sender<Envelope>>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    published: AtomicU64,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            exchanges: RwLock::new(HashMap::new()),
            dead_letters: Mutex::new(Vec::new()),
            published: AtomicU64::new(0),
            capacity,
        }
    }

    fn sender(&self, exchange: &str) -> broadcast::Sender<Envelope> {
        if let Some(sender) = self
            .exchanges
            .read()
            .expect("exchange registry poisoned")
            .get(exchange)
        {
            return sender.clone();
        }
        let mut exchanges = self.exchanges.write().expect("exchange registry poisoned");
        exchanges
            .entry(exchange.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Publishes an event to `exchange` under `routing_key`.
    ///
    /// Returns the number of queues that received the message. Zero bound
    /// queues is not an error: the message is simply unroutable, as with a
    /// topic exchange without bindings.
    pub fn publish<T: Serialize>(
        &self,
        exchange: &str,
        routing_key: &str,
        event: &T,
    ) -> Result<usize> {
        let payload = serde_json::to_value(event)
            .map_err(|e| LedgerError::Delivery(format!("Event serialization failed: {e}")))?;
        let envelope = Envelope {
            message_id: uuid::Uuid::new_v4(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            payload,
            published_at: Utc::now(),
        };

        self.published.fetch_add(1, Ordering::Relaxed);
        let delivered = self.sender(exchange).send(envelope).unwrap_or(0);
        debug!(exchange, routing_key, delivered, "Event published");
        Ok(delivered)
    }

    /// Binds a queue and returns its subscription handle.
    pub fn subscribe(&self, binding: QueueBinding) -> QueueSubscription {
        let receiver = self.sender(&binding.exchange).subscribe();
        debug!(
            exchange = %binding.exchange,
            queue = %binding.queue,
            routing_key = %binding.routing_key,
            "Queue bound"
        );
        QueueSubscription { binding, receiver }
    }

    /// Routes a message to a dead-letter target. Dead letters are retained
    /// for inspection, never dropped.
    pub fn dead_letter(&self, binding: &QueueBinding, envelope: Envelope, reason: &str) {
        warn!(
            queue = %binding.queue,
            target = %binding.dead_letter_target,
            message_id = %envelope.message_id,
            reason,
            "Message dead-lettered"
        );
        let mut dead_letters = self.dead_letters.lock().expect("dead letter store poisoned");
        dead_letters.push(DeadLetter {
            target: binding.dead_letter_target.clone(),
            queue: binding.queue.clone(),
            reason: reason.to_string(),
            envelope,
            dead_lettered_at: Utc::now(),
        });
    }

    pub fn dead_letters(&self, target: &str) -> Vec<DeadLetter> {
        let dead_letters = self.dead_letters.lock().expect("dead letter store poisoned");
        dead_letters
            .iter()
            .filter(|d| d.target == target)
            .cloned()
            .collect()
    }

    pub fn events_published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

/// A bound queue's receiving side. Filters the exchange stream down to
/// messages whose routing key matches the binding pattern.
pub struct QueueSubscription {
    binding: QueueBinding,
    receiver: broadcast::Receiver<Envelope>,
}

impl QueueSubscription {
    pub fn binding(&self) -> &QueueBinding {
        &self.binding
    }

    /// Receives the next matching message, or `None` once the exchange is
    /// closed. A lagged receiver logs and keeps consuming; skipped messages
    /// are the in-process analogue of broker redelivery pressure.
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if binding_matches(&self.binding.routing_key, &envelope.routing_key) {
                        return Some(envelope);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(queue = %self.binding.queue, skipped, "Queue lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by the scenario runner to drain messages
    /// already published.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    if binding_matches(&self.binding.routing_key, &envelope.routing_key) {
                        return Some(envelope);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(queue = %self.binding.queue, skipped, "Queue lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

/// AMQP-style topic matching: `*` matches exactly one dot-separated word,
/// `#` matches zero or more.
pub fn binding_matches(pattern: &str, routing_key: &str) -> bool {
    let pattern: Vec<&str> = pattern.split('.').collect();
    let key: Vec<&str> = routing_key.split('.').collect();
    match_segments(&pattern, &key)
}

fn match_segments(pattern: &[&str], key: &[&str]) -> bool {
    match pattern.split_first() {
        None => key.is_empty(),
        Some((&"#", rest)) => (0..=key.len()).any(|i| match_segments(rest, &key[i..])),
        Some((word, rest)) => match key.split_first() {
            Some((head, tail)) => (*word == "*" || word == head) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Runs a handler against a queue binding until the exchange closes.
///
/// The handler is retried up to `retry_budget` times per message; after that
/// the message goes to the binding's dead-letter target and consumption
/// continues. Handler errors never roll back state already committed by
/// earlier steps.
pub fn spawn_consumer<F, Fut>(
    bus: Arc<EventBus>,
    binding: QueueBinding,
    retry_budget: u32,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    let mut subscription = bus.subscribe(binding.clone());
    tokio::spawn(async move {
        while let Some(envelope) = subscription.recv().await {
            deliver(&bus, &binding, retry_budget, &handler, envelope).await;
        }
        debug!(queue = %binding.queue, "Consumer stopped");
    })
}

/// One delivery attempt cycle: handler with retries, then dead-letter.
pub async fn deliver<F, Fut>(
    bus: &EventBus,
    binding: &QueueBinding,
    retry_budget: u32,
    handler: &F,
    envelope: Envelope,
) where
    F: Fn(Envelope) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut attempts = 0;
    loop {
        match handler(envelope.clone()).await {
            Ok(()) => return,
            Err(e) => {
                attempts += 1;
                if attempts >= retry_budget {
                    bus.dead_letter(binding, envelope, &e.to_string());
                    return;
                }
                debug!(
                    queue = %binding.queue,
                    message_id = %envelope.message_id,
                    attempts,
                    error = %e,
                    "Handler failed, retrying"
                );
            }
        }
    }
}
