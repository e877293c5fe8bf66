//! Categorization consumer: reacts to completed transactions and emits
//! `TransactionCategorized` events. Off the orchestrator's critical path.

use crate::application::idempotency::IdempotencyGuard;
use crate::domain::category::{CategoryRule, categorize, default_rules};
use crate::domain::events::{
    CATEGORIZATION_EXCHANGE, EventKind, TRANSACTION_CATEGORIZED_KEY, TransactionCategorized,
    TransactionCompleted,
};
use crate::error::Result;
use crate::infrastructure::event_bus::{Envelope, EventBus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Categorizer {
    rules: Arc<Vec<CategoryRule>>,
    bus: Arc<EventBus>,
    guard: Arc<IdempotencyGuard>,
}

impl Categorizer {
    /// Uses the compiled-in default rule set.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self::with_rules(bus, default_rules())
    }

    pub fn with_rules(bus: Arc<EventBus>, rules: Vec<CategoryRule>) -> Self {
        Self {
            rules: Arc::new(rules),
            bus,
            guard: Arc::new(IdempotencyGuard::new()),
        }
    }

    /// Handles a `TransactionCompleted` delivery: matches the description
    /// against the rule set and publishes the categorization. Idempotent
    /// under duplicate delivery; the key is marked only after the
    /// categorization went out, so a failed publish is retried.
    pub async fn handle_completed(&self, envelope: Envelope) -> Result<()> {
        let event: TransactionCompleted = envelope.decode()?;
        if self.guard.seen(event.transaction_id, EventKind::Categorized) {
            debug!(transaction_id = %event.transaction_id, "Duplicate completed event ignored");
            return Ok(());
        }

        let result = categorize(event.description.as_deref(), &self.rules);
        info!(
            transaction_id = %event.transaction_id,
            category = %result.category,
            sub_category = %result.sub_category,
            "Transaction categorized"
        );

        self.bus.publish(
            CATEGORIZATION_EXCHANGE,
            TRANSACTION_CATEGORIZED_KEY,
            &TransactionCategorized {
                transaction_id: event.transaction_id,
                user_id: event.user_id,
                category: result.category,
                sub_category: result.sub_category,
                confidence_score: result.confidence_score,
                categorization_method: result.method,
                categorized_at: Utc::now(),
            },
        )?;
        self.guard.mark(event.transaction_id, EventKind::Categorized);
        Ok(())
    }
}
