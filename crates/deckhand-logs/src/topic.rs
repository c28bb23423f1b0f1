//! Per-app log topics with independent subscribers
//!
//! Delivery is strictly non-blocking: a subscriber whose channel is full
//! is dropped from the topic rather than backpressuring the publisher.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

/// Buffered lines a subscriber may lag behind before being dropped
const SUBSCRIBER_BUFFER: usize = 256;

/// Named stream of log lines with independent subscribers
#[derive(Default)]
pub struct LogTopic {
    subscribers: Mutex<Vec<mpsc::Sender<String>>>,
}

impl LogTopic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a subscriber. Detaching is just dropping the receiver.
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver one line to every subscriber; full or closed subscribers
    /// are removed.
    pub fn publish(&self, line: &str) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| match tx.try_send(line.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// All topics, keyed by app name. Topics outlive the child process so
/// subscribers can attach and detach independently of process lifecycle.
#[derive(Default)]
pub struct LogHub {
    topics: Mutex<HashMap<String, Arc<LogTopic>>>,
}

impl LogHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the topic for an app.
    pub fn topic(&self, name: &str) -> Arc<LogTopic> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(LogTopic::new()))
            .clone()
    }

    /// Drop an app's topic (on delete). Existing receivers simply stop
    /// getting lines.
    pub fn remove(&self, name: &str) {
        if self.topics.lock().remove(name).is_some() {
            debug!(name, "removed log topic");
        }
    }
}
