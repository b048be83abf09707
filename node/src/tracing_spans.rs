//! [`tracing::Span`] constructors for node operations, so every log line
//! emitted while handling one operation carries the same identifying fields.

use gora_types::{AccountId, RequestId};
use tracing::{info_span, Span};

pub fn submit_span(requester: &AccountId) -> Span {
    info_span!("submit", requester = %requester)
}

pub fn vote_span(request: &RequestId, voter: &AccountId) -> Span {
    info_span!("vote", request = %request, voter = %voter)
}

pub fn claim_span(request: &RequestId, voter: &AccountId) -> Span {
    info_span!("claim", request = %request, voter = %voter)
}

pub fn refund_span(request: &RequestId) -> Span {
    info_span!("refund", request = %request)
}

pub fn pool_span(pool: &AccountId, action: &str) -> Span {
    info_span!("pool", pool = %pool, action = %action)
}
