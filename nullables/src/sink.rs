//! Nullable response sink: record deliveries instead of making them.

use gora_consensus::{Delivery, ResponseSink};
use std::sync::Mutex;

/// Records every delivery. Can be switched to refuse them, which makes the
/// engine abort the vote that reached quorum.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Delivery>>,
    failure: Mutex<Option<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that refuses every delivery with `reason`.
    pub fn failing(reason: &str) -> Self {
        let sink = Self::new();
        sink.fail_with(Some(reason));
        sink
    }

    /// Refuse deliveries from now on, or accept them again with `None`.
    pub fn fail_with(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }

    /// All deliveries made so far (for assertions).
    pub fn delivered(&self) -> Vec<Delivery> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().map(|d| d.len()).unwrap_or(0)
    }
}

impl ResponseSink for RecordingSink {
    fn deliver(&self, delivery: &Delivery) -> Result<(), String> {
        if let Some(reason) = self.failure.lock().map_err(|e| e.to_string())?.clone() {
            return Err(reason);
        }
        self.delivered
            .lock()
            .map_err(|e| e.to_string())?
            .push(delivery.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
