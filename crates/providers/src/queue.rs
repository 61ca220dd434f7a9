//! One-at-a-time request queue.
//!
//! Jobs run strictly in submission order on a single background task, with
//! a fixed pause between the end of one request and the start of the next.

use crate::dispatcher::Dispatch;
use crate::error::DispatchError;
use crate::request::{ImageData, Reply, RequestOptions};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

struct QueuedRequest {
    provider: String,
    message: String,
    api_key: String,
    options: RequestOptions,
    image: Option<ImageData>,
    reply: oneshot::Sender<Result<Reply, DispatchError>>,
}

pub struct RequestQueue {
    tx: mpsc::UnboundedSender<QueuedRequest>,
}

impl RequestQueue {
    /// Start the worker on the current tokio runtime.
    pub fn spawn(dispatcher: Arc<dyn Dispatch>) -> Self {
        Self::with_pacing(dispatcher, DEFAULT_PACING)
    }

    pub fn with_pacing(dispatcher: Arc<dyn Dispatch>, pacing: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(dispatcher, rx, pacing));
        Self { tx }
    }

    pub async fn submit(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(QueuedRequest {
                provider: provider.to_string(),
                message: message.to_string(),
                api_key: api_key.to_string(),
                options: options.clone(),
                image: image.cloned(),
                reply: reply_tx,
            })
            .map_err(|_| DispatchError::QueueClosed)?;
        reply_rx.await.map_err(|_| DispatchError::QueueClosed)?
    }
}

async fn run_worker(
    dispatcher: Arc<dyn Dispatch>,
    mut rx: mpsc::UnboundedReceiver<QueuedRequest>,
    pacing: Duration,
) {
    let mut last_finished: Option<Instant> = None;
    while let Some(job) = rx.recv().await {
        if let Some(at) = last_finished {
            tokio::time::sleep_until(at + pacing).await;
        }
        let result = dispatcher
            .dispatch(
                &job.provider,
                &job.message,
                &job.api_key,
                &job.options,
                job.image.as_ref(),
            )
            .await;
        if job.reply.send(result).is_err() {
            tracing::debug!("queued request was abandoned by its caller");
        }
        last_finished = Some(Instant::now());
    }
    tracing::debug!("request queue worker stopped");
}

#[async_trait]
impl Dispatch for RequestQueue {
    async fn dispatch(
        &self,
        provider: &str,
        message: &str,
        api_key: &str,
        options: &RequestOptions,
        image: Option<&ImageData>,
    ) -> Result<Reply, DispatchError> {
        self.submit(provider, message, api_key, options, image).await
    }
}
