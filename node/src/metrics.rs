//! Prometheus metrics for the oracle node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`] so several nodes can live in
//! one process (tests) without clashing on the default registry.

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, IntCounter, IntGauge, Opts,
    Registry, TextEncoder,
};

use crate::NodeError;

pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub requests_submitted: IntCounter,
    pub requests_completed: IntCounter,
    /// Requester refunds, closed or waiting on voter refunds.
    pub requests_refunded: IntCounter,
    pub requests_expired: IntCounter,
    pub votes_accepted: IntCounter,
    pub votes_rejected: IntCounter,
    /// Claims that moved funds to a voter.
    pub claims_paid: IntCounter,
    pub pool_rollovers: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub live_requests: IntGauge,
    pub total_stake: IntGauge,
    pub pools: IntGauge,
}

impl NodeMetrics {
    pub fn new() -> Result<Self, NodeError> {
        let registry = Registry::new();

        let requests_submitted = register_int_counter_with_registry!(
            Opts::new("gora_requests_submitted_total", "Requests accepted by the registry"),
            registry
        )?;
        let requests_completed = register_int_counter_with_registry!(
            Opts::new("gora_requests_completed_total", "Requests that reached quorum"),
            registry
        )?;
        let requests_refunded = register_int_counter_with_registry!(
            Opts::new("gora_requests_refunded_total", "Requests refunded to their requester"),
            registry
        )?;
        let requests_expired = register_int_counter_with_registry!(
            Opts::new("gora_requests_expired_total", "Requests moved to refund_available"),
            registry
        )?;
        let votes_accepted = register_int_counter_with_registry!(
            Opts::new("gora_votes_accepted_total", "Ballots tallied"),
            registry
        )?;
        let votes_rejected = register_int_counter_with_registry!(
            Opts::new("gora_votes_rejected_total", "Ballots refused"),
            registry
        )?;
        let claims_paid = register_int_counter_with_registry!(
            Opts::new("gora_claims_paid_total", "Reward or refund claims that paid out"),
            registry
        )?;
        let pool_rollovers = register_int_counter_with_registry!(
            Opts::new("gora_pool_rollovers_total", "Delegation pool aggregation rollovers"),
            registry
        )?;

        let live_requests = register_int_gauge_with_registry!(
            Opts::new("gora_live_requests", "Requests currently holding their key"),
            registry
        )?;
        let total_stake = register_int_gauge_with_registry!(
            Opts::new("gora_total_stake", "Network-wide stake"),
            registry
        )?;
        let pools = register_int_gauge_with_registry!(Opts::new("gora_pools", "Delegation pools"), registry)?;

        Ok(Self {
            registry,
            requests_submitted,
            requests_completed,
            requests_refunded,
            requests_expired,
            votes_accepted,
            votes_rejected,
            claims_paid,
            pool_rollovers,
            live_requests,
            total_stake,
            pools,
        })
    }

    /// Render every metric in the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, NodeError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| NodeError::Other(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separate_registries_do_not_clash() {
        let a = NodeMetrics::new().unwrap();
        let b = NodeMetrics::new().unwrap();
        a.votes_accepted.inc();
        assert_eq!(a.votes_accepted.get(), 1);
        assert_eq!(b.votes_accepted.get(), 0);
    }

    #[test]
    fn encodes_text_format() {
        let m = NodeMetrics::new().unwrap();
        m.requests_submitted.inc_by(3);
        m.total_stake.set(42);
        let text = m.encode().unwrap();
        assert!(text.contains("gora_requests_submitted_total 3"));
        assert!(text.contains("gora_total_stake 42"));
    }
}
