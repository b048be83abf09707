//! Outbound delivery of agreed values.

use gora_types::{AccountId, RequestId};
use serde::{Deserialize, Serialize};

use crate::request::Destination;

/// The value a completed request hands to its destination.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub request_id: RequestId,
    pub requester: AccountId,
    pub destination: Destination,
    pub value: Vec<u8>,
}

/// Receives exactly one delivery per completed request.
///
/// A failed delivery aborts the vote that triggered it, so the request stays
/// open and the next vote retries.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, delivery: &Delivery) -> Result<(), String>;

    /// Human-readable name of this sink.
    fn name(&self) -> &str;
}

/// Sink that accepts every delivery and keeps nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardSink;

impl ResponseSink for DiscardSink {
    fn deliver(&self, _delivery: &Delivery) -> Result<(), String> {
        Ok(())
    }

    fn name(&self) -> &str {
        "discard"
    }
}
