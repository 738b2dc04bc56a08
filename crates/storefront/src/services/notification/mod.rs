//! Order confirmation dispatch.
//!
//! Confirmations are sent after the checkout transaction commits, from a
//! background worker fed by a bounded queue:
//! 1. Checkout enqueues an [`OrderConfirmation`] (never waits on delivery)
//! 2. The worker hands it to the configured [`OrderNotifier`]
//! 3. Failed deliveries are retried with a linear backoff
//! 4. Deliveries that exhaust their attempts are reported on the
//!    delivery-failure log and dropped; the order is unaffected

pub mod email;

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{CurrentUser, Order};

pub use email::EmailNotifier;

/// Errors that can occur when delivering a confirmation.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// The delivery channel is temporarily unavailable.
    #[error("Notifier unavailable: {0}")]
    Unavailable(String),
}

/// A confirmation waiting to be delivered.
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    /// Name to greet the customer with.
    pub recipient_name: String,
    /// Address to deliver to.
    pub recipient_email: String,
    /// The committed order.
    pub order: Order,
}

impl OrderConfirmation {
    /// Confirmation of `order` for the user who placed it.
    #[must_use]
    pub fn new(customer: &CurrentUser, order: Order) -> Self {
        Self {
            recipient_name: customer.name.clone(),
            recipient_email: customer.email.clone(),
            order,
        }
    }
}

/// Delivers order confirmations to customers.
pub trait OrderNotifier: Send + Sync + 'static {
    /// Deliver one confirmation.
    fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> impl Future<Output = Result<(), NotificationError>> + Send;
}

/// Notifier used when no mail transport is configured.
///
/// Logs the confirmation instead of sending it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl OrderNotifier for LogNotifier {
    async fn send_order_confirmation(
        &self,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotificationError> {
        info!(
            order_id = %confirmation.order.id,
            to = %confirmation.recipient_email,
            total = %confirmation.order.total,
            "Email not configured, order confirmation logged only"
        );
        Ok(())
    }
}

/// How failed deliveries are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total delivery attempts per confirmation (at least one is always made).
    pub max_attempts: u32,
    /// Base delay; attempt `n` waits `n * delay` before the next try.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Handle for enqueueing confirmations onto the delivery worker.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<OrderConfirmation>,
}

impl NotificationQueue {
    /// Spawn the delivery worker and return a handle to its queue.
    ///
    /// The worker exits once every queue handle has been dropped and the
    /// queue has drained.
    #[must_use]
    pub fn start<N: OrderNotifier>(
        notifier: N,
        policy: RetryPolicy,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(run_worker(notifier, policy, receiver));
        (Self { sender }, worker)
    }

    /// Queue a confirmation without waiting.
    ///
    /// Returns `false` (after logging) if the queue is full or the worker has
    /// stopped. The order itself is unaffected either way.
    pub fn enqueue(&self, confirmation: OrderConfirmation) -> bool {
        match self.sender.try_send(confirmation) {
            Ok(()) => true,
            Err(TrySendError::Full(confirmation)) => {
                error!(
                    order_id = %confirmation.order.id,
                    "Notification queue full, order confirmation dropped"
                );
                false
            }
            Err(TrySendError::Closed(confirmation)) => {
                error!(
                    order_id = %confirmation.order.id,
                    "Notification worker stopped, order confirmation dropped"
                );
                false
            }
        }
    }
}

async fn run_worker<N: OrderNotifier>(
    notifier: N,
    policy: RetryPolicy,
    mut receiver: mpsc::Receiver<OrderConfirmation>,
) {
    while let Some(confirmation) = receiver.recv().await {
        deliver(&notifier, policy, &confirmation).await;
    }
    debug!("Notification queue closed, worker exiting");
}

/// Deliver one confirmation, retrying per `policy`.
///
/// Returns whether delivery eventually succeeded.
pub async fn deliver<N: OrderNotifier>(
    notifier: &N,
    policy: RetryPolicy,
    confirmation: &OrderConfirmation,
) -> bool {
    let max_attempts = policy.max_attempts.max(1);
    let order_id = confirmation.order.id;

    for attempt in 1..=max_attempts {
        match notifier.send_order_confirmation(confirmation).await {
            Ok(()) => {
                info!(%order_id, attempt, "Order confirmation delivered");
                return true;
            }
            Err(e) if attempt < max_attempts => {
                warn!(%order_id, attempt, error = %e, "Order confirmation attempt failed, retrying");
                tokio::time::sleep(policy.delay * attempt).await;
            }
            Err(e) => {
                // Delivery-failure log: the order stays confirmed.
                error!(
                    %order_id,
                    attempts = attempt,
                    to = %confirmation.recipient_email,
                    error = %e,
                    "Order confirmation delivery failed"
                );
            }
        }
    }

    false
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use quitanda_core::{Money, OrderId, OrderStatus, PaymentMethod, UserId};

    use super::*;

    fn confirmation(order_id: i64) -> OrderConfirmation {
        OrderConfirmation {
            recipient_name: "Ana".to_owned(),
            recipient_email: "ana@example.com".to_owned(),
            order: Order {
                id: OrderId::new(order_id),
                user_id: UserId::new(1),
                total: Money::from_cents(9000),
                status: OrderStatus::Confirmed,
                payment_method: PaymentMethod::Card,
                created_at: Utc::now(),
                items: Vec::new(),
            },
        }
    }

    /// Fails the first `failures` calls, then records deliveries.
    #[derive(Clone, Default)]
    struct FlakyNotifier {
        failures: u32,
        calls: Arc<AtomicU32>,
        delivered: Arc<Mutex<Vec<OrderId>>>,
    }

    impl OrderNotifier for FlakyNotifier {
        async fn send_order_confirmation(
            &self,
            confirmation: &OrderConfirmation,
        ) -> Result<(), NotificationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(NotificationError::Unavailable("smtp down".to_owned()));
            }
            self.delivered.lock().unwrap().push(confirmation.order.id);
            Ok(())
        }
    }

    const FAST: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_millis(1),
    };

    #[tokio::test]
    async fn test_deliver_first_try() {
        let notifier = FlakyNotifier::default();
        assert!(deliver(&notifier, FAST, &confirmation(1)).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deliver_retries_until_success() {
        let notifier = FlakyNotifier {
            failures: 2,
            ..FlakyNotifier::default()
        };
        assert!(deliver(&notifier, FAST, &confirmation(1)).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*notifier.delivered.lock().unwrap(), vec![OrderId::new(1)]);
    }

    #[tokio::test]
    async fn test_deliver_gives_up_after_max_attempts() {
        let notifier = FlakyNotifier {
            failures: 10,
            ..FlakyNotifier::default()
        };
        assert!(!deliver(&notifier, FAST, &confirmation(1)).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let notifier = FlakyNotifier::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            delay: Duration::from_millis(1),
        };
        assert!(deliver(&notifier, policy, &confirmation(1)).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_drains_queue_then_exits() {
        let notifier = FlakyNotifier::default();
        let delivered = Arc::clone(&notifier.delivered);
        let (queue, worker) = NotificationQueue::start(notifier, FAST, 8);

        assert!(queue.enqueue(confirmation(1)));
        assert!(queue.enqueue(confirmation(2)));
        drop(queue);
        worker.await.unwrap();

        assert_eq!(
            *delivered.lock().unwrap(),
            vec![OrderId::new(1), OrderId::new(2)]
        );
    }

    #[tokio::test]
    async fn test_enqueue_after_worker_stopped_returns_false() {
        let (queue, worker) = NotificationQueue::start(LogNotifier, FAST, 1);
        worker.abort();
        let _ = worker.await;
        assert!(!queue.enqueue(confirmation(1)));
    }
}
