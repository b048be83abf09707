//! Vote tickets and the per-voter lease book.
//!
//! A ticket is the voter's claim to one vote: a validity window and a lease
//! naming the request. The lease book refuses a second ticket with the same
//! lease whose window overlaps one already accepted, so a voter gets at most
//! one vote per request.

use std::collections::HashMap;

use gora_types::{AccountId, Round};
use serde::{Deserialize, Serialize};

/// Validity window and lease carried by a ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub first_valid: Round,
    pub last_valid: Round,
    pub lease: [u8; 32],
}

impl Ticket {
    pub fn overlaps(&self, other: &Ticket) -> bool {
        self.lease == other.lease
            && self.first_valid <= other.last_valid
            && other.first_valid <= self.last_valid
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LeaseBook {
    held: HashMap<AccountId, Vec<Ticket>>,
}

impl LeaseBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflicts(&self, voter: &AccountId, ticket: &Ticket) -> bool {
        self.held
            .get(voter)
            .map_or(false, |tickets| tickets.iter().any(|t| t.overlaps(ticket)))
    }

    pub fn record(&mut self, voter: AccountId, ticket: Ticket) {
        self.held.entry(voter).or_default().push(ticket);
    }

    /// Drop tickets whose window closed before `now`. They can no longer
    /// overlap anything a voter could submit.
    pub fn prune(&mut self, now: Round) -> usize {
        let mut removed = 0;
        self.held.retain(|_, tickets| {
            let before = tickets.len();
            tickets.retain(|t| t.last_valid >= now);
            removed += before - tickets.len();
            !tickets.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.held.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
