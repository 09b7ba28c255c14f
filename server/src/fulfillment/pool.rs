//! Fulfillment Worker Pool
//!
//! Bounded queue in front of a fixed number of workers. Each job runs the
//! blocking invoker on tokio's blocking thread pool, so a slow delivery never
//! stalls the bot engine or other users' conversations.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{error, info, warn};

use super::invoker::FulfillmentInvoker;
use super::types::{FulfillmentError, FulfillmentRequest};

struct Job {
    request: FulfillmentRequest,
    done: oneshot::Sender<bool>,
}

/// Handle for submitting fulfillment jobs. Cheap to clone.
#[derive(Clone)]
pub struct FulfillmentPool {
    tx: mpsc::Sender<Job>,
}

impl FulfillmentPool {
    /// Spawn `workers` workers sharing a queue of `capacity` pending jobs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(invoker: Arc<dyn FulfillmentInvoker>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for worker in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            let invoker = Arc::clone(&invoker);
            tokio::spawn(async move {
                loop {
                    let job = rx.lock().await.recv().await;
                    let Some(job) = job else {
                        break;
                    };
                    let delivered = run_job(Arc::clone(&invoker), job.request).await;
                    // Receiver may be gone if the engine shut down; nothing to report to.
                    let _ = job.done.send(delivered);
                }
                info!(worker, "Fulfillment worker stopped");
            });
        }

        Self { tx }
    }

    /// Queue a job. Resolves to `true` once the automation reports delivery.
    pub fn submit(
        &self,
        request: FulfillmentRequest,
    ) -> Result<oneshot::Receiver<bool>, FulfillmentError> {
        let (done, rx) = oneshot::channel();
        self.tx
            .try_send(Job { request, done })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => FulfillmentError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => FulfillmentError::PoolClosed,
            })?;
        Ok(rx)
    }
}

/// Run one attempt. Errors and panics both count as a failed delivery.
async fn run_job(invoker: Arc<dyn FulfillmentInvoker>, request: FulfillmentRequest) -> bool {
    let stars_amount = request.stars_amount;
    let recipient = request.recipient.clone();

    let handle = tokio::task::spawn_blocking(move || {
        invoker.attempt_fulfillment(request.stars_amount, &request.recipient)
    });

    match handle.await {
        Ok(Ok(delivered)) => delivered,
        Ok(Err(e)) => {
            warn!(
                stars_amount = %stars_amount,
                recipient = %recipient,
                error = %e,
                "Fulfillment attempt failed"
            );
            false
        }
        Err(e) => {
            error!(
                stars_amount = %stars_amount,
                recipient = %recipient,
                "Fulfillment task panicked: {}", e
            );
            false
        }
    }
}
