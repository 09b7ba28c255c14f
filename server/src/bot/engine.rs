//! Bot Engine
//!
//! The bot's cooperative event loop: a single task that drains one queue and
//! handles one item at a time. HTTP handlers never touch sessions directly;
//! they send an [`EngineTask`] through an [`EngineHandle`].
//!
//! Blocking fulfillment is submitted to the [`FulfillmentPool`] and its result
//! comes back through the same queue, so a slow delivery never holds up other
//! conversations. Outbound chat messages go through an ordered outbox drained
//! by a separate task, so a slow Bot API delays replies but not transitions.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::conversation::{self, Confirmation, ConversationState, Effect, Input};
use super::messages;
use super::sessions::{OrderLedger, SessionKey, SessionStore};
use super::telegram::{ChatApi, Update};
use crate::fulfillment::{FulfillmentPool, FulfillmentRequest};

/// How long a processed order is remembered for duplicate detection. The
/// processor stops resending long before this.
const ORDER_RETENTION_DAYS: i64 = 30;

/// Work items for the engine.
#[derive(Debug)]
pub enum EngineTask {
    /// A chat update received on `/chat-webhook`.
    Update(Box<Update>),
    /// A verified "finished" payment notification.
    ProcessPayment { order_id: String },
    /// A fulfillment job completed.
    FulfillmentFinished {
        chat_id: i64,
        request: FulfillmentRequest,
        delivered: bool,
    },
}

/// Engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Bot engine is not running")]
    NotRunning,
}

/// Thread-safe way into the engine. Cheap to clone.
#[derive(Clone, Debug)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineTask>,
}

impl EngineHandle {
    /// Create a handle and the queue receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EngineTask>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a task for the engine. Waits if the queue is full.
    pub async fn schedule(&self, task: EngineTask) -> Result<(), EngineError> {
        self.tx.send(task).await.map_err(|_| EngineError::NotRunning)
    }

    /// Whether the engine loop is still consuming tasks.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A reply waiting in the outbox.
#[derive(Debug)]
struct Outgoing {
    chat_id: i64,
    text: String,
}

/// The bot engine. Build with [`Engine::new`], then [`Engine::spawn`] it.
pub struct Engine {
    rx: mpsc::Receiver<EngineTask>,
    completions: mpsc::WeakSender<EngineTask>,
    chat: Arc<dyn ChatApi>,
    outbox: mpsc::Sender<Outgoing>,
    outbox_rx: Option<mpsc::Receiver<Outgoing>>,
    fulfillment: FulfillmentPool,
    sessions: SessionStore,
    ledger: OrderLedger,
}

impl Engine {
    pub fn new(
        chat: Arc<dyn ChatApi>,
        fulfillment: FulfillmentPool,
        queue_capacity: usize,
    ) -> (Self, EngineHandle) {
        let (handle, rx) = EngineHandle::channel(queue_capacity);
        let (outbox, outbox_rx) = mpsc::channel(queue_capacity.max(1));
        let engine = Self {
            rx,
            // Weak so the loop ends once every external handle is dropped.
            completions: handle.tx.downgrade(),
            chat,
            outbox,
            outbox_rx: Some(outbox_rx),
            fulfillment,
            sessions: SessionStore::new(),
            ledger: OrderLedger::new(),
        };
        (engine, handle)
    }

    /// Shared view of active sessions.
    pub fn sessions(&self) -> SessionStore {
        self.sessions.clone()
    }

    /// Shared view of processed payment orders.
    pub fn ledger(&self) -> OrderLedger {
        self.ledger.clone()
    }

    /// Run the loop on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain the queue until every handle is dropped, then flush the outbox.
    pub async fn run(mut self) {
        info!("Bot engine started");
        let delivery = self
            .outbox_rx
            .take()
            .map(|rx| tokio::spawn(deliver_messages(Arc::clone(&self.chat), rx)));

        while let Some(task) = self.rx.recv().await {
            self.handle(task).await;
        }

        // Dropping the engine closes the outbox; the delivery task then drains.
        drop(self);
        if let Some(delivery) = delivery {
            if let Err(e) = delivery.await {
                error!("Outbound message task panicked: {}", e);
            }
        }
        info!("Bot engine stopped");
    }

    async fn handle(&self, task: EngineTask) {
        match task {
            EngineTask::Update(update) => self.handle_update(*update).await,
            EngineTask::ProcessPayment { order_id } => self.process_payment(&order_id),
            EngineTask::FulfillmentFinished {
                chat_id,
                request,
                delivered,
            } => self.report_fulfillment(chat_id, &request, delivered).await,
        }
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            debug!(update_id = update.update_id, "Ignoring non-message update");
            return;
        };
        let (Some(sender), Some(text)) = (message.from.as_ref(), message.text.as_deref()) else {
            debug!(
                update_id = update.update_id,
                chat_id = message.chat.id,
                "Ignoring message without sender or text"
            );
            return;
        };

        let key = SessionKey {
            chat_id: message.chat.id,
            user_id: sender.id,
        };
        let current = self.sessions.get(&key);
        let step = conversation::step(current.as_ref(), Input { text, sender });

        let from = current.as_ref().map_or("NONE", ConversationState::name);
        let to = step.next.as_ref().map_or("NONE", ConversationState::name);
        if from != to {
            debug!(
                chat_id = key.chat_id,
                user_id = key.user_id,
                from,
                to,
                "Conversation transition"
            );
        }

        match step.next {
            Some(next) => self.sessions.insert(key, next),
            None => {
                self.sessions.remove(&key);
            }
        }

        match step.effect {
            Effect::None => {}
            Effect::Reply(reply) => self.send(key.chat_id, &reply).await,
            Effect::Confirm(confirmation) => self.confirm(key.chat_id, confirmation).await,
        }
    }

    async fn confirm(&self, chat_id: i64, confirmation: Confirmation) {
        self.send(chat_id, &confirmation.reply()).await;

        let Some(request) = confirmation.fulfillment_request() else {
            // TODO: verify the Stars actually arrived before paying out.
            info!(chat_id, "Sell request acknowledged");
            return;
        };

        info!(
            chat_id,
            stars_amount = %request.stars_amount,
            recipient = %request.recipient,
            "Buy confirmed, queueing fulfillment"
        );

        let done = match self.fulfillment.submit(request.clone()) {
            Ok(done) => done,
            Err(e) => {
                error!(chat_id, error = %e, "Could not queue fulfillment");
                self.send(chat_id, messages::RESTART_NEEDED).await;
                return;
            }
        };

        let completions = self.completions.clone();
        tokio::spawn(async move {
            // A dropped sender means the worker died mid-job.
            let delivered = done.await.unwrap_or(false);
            let Some(tx) = completions.upgrade() else {
                warn!(chat_id, delivered, "Engine stopped before fulfillment result was reported");
                return;
            };
            let task = EngineTask::FulfillmentFinished {
                chat_id,
                request,
                delivered,
            };
            if tx.send(task).await.is_err() {
                warn!(chat_id, delivered, "Engine stopped before fulfillment result was reported");
            }
        });
    }

    async fn report_fulfillment(&self, chat_id: i64, request: &FulfillmentRequest, delivered: bool) {
        if delivered {
            info!(
                chat_id,
                stars_amount = %request.stars_amount,
                recipient = %request.recipient,
                "Stars delivered"
            );
            self.send(
                chat_id,
                &messages::fulfillment_succeeded(request.stars_amount, &request.recipient),
            )
            .await;
        } else {
            warn!(
                chat_id,
                stars_amount = %request.stars_amount,
                recipient = %request.recipient,
                "Stars delivery failed"
            );
            self.send(chat_id, &messages::fulfillment_failed(request.stars_amount))
                .await;
        }
    }

    /// Record a finished payment. Recording (and pruning expired records) is
    /// all the processing a payment gets; Stars are delivered from the chat
    /// flow, not from the IPN.
    fn process_payment(&self, order_id: &str) {
        let pruned = self
            .ledger
            .prune_before(Utc::now() - chrono::Duration::days(ORDER_RETENTION_DAYS));
        if pruned > 0 {
            debug!(pruned, "Pruned expired processed orders");
        }

        if self.ledger.record(order_id) {
            info!(order_id, "Payment finished, order recorded for fulfillment");
        } else {
            info!(order_id, "Order already processed, skipping duplicate notification");
        }
    }

    /// Queue a reply. Waits only when the outbox is full.
    async fn send(&self, chat_id: i64, text: &str) {
        let message = Outgoing {
            chat_id,
            text: text.to_string(),
        };
        if self.outbox.send(message).await.is_err() {
            warn!(chat_id, "Outbound message task stopped, dropping reply");
        }
    }
}

/// Send queued replies one at a time, preserving order.
async fn deliver_messages(chat: Arc<dyn ChatApi>, mut outbox: mpsc::Receiver<Outgoing>) {
    while let Some(Outgoing { chat_id, text }) = outbox.recv().await {
        if let Err(e) = chat.send_message(chat_id, &text).await {
            warn!(chat_id, error = %e, "Failed to send chat message");
        }
    }
}
