//! Claims against a voter's history entry.
//!
//! Anyone may trigger a claim for any voter; funds always go to the voter.
//! Each entry pays out at most once.

use gora_consensus::{Fee, Request, RequestStatus, VoteEngine, VoterHistoryEntry};
use gora_stake::StakeLedger;
use gora_types::{AccountId, AlgoAmount, GoraAmount, RequestId, Round};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::SettlementError;
use crate::rewards::{share_of, voter_share};

/// What a claim did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimOutcome {
    /// The voter backed the winning answer and received its share of the fees.
    Rewarded { algo: AlgoAmount, gora: GoraAmount },
    /// The voter backed an answer that lost, or the record is already gone.
    Nothing,
    /// The request never completed; the voter received a refund payment.
    /// `closed` is set when this claim also wound up the request.
    Refunded { algo: AlgoAmount, closed: bool },
    /// The request is still open. The entry is left unclaimed.
    Pending,
    /// The entry was claimed before. Nothing moved.
    AlreadyClaimed,
}

/// Settle `voter`'s recorded vote on `request_id`.
pub fn claim(
    engine: &mut VoteEngine,
    ledger: &mut StakeLedger,
    caller: &AccountId,
    voter: &AccountId,
    request_id: &RequestId,
    now: Round,
) -> Result<ClaimOutcome, SettlementError> {
    let entry = match engine.history.get(voter) {
        Some(entry) if &entry.request_id == request_id => entry.clone(),
        _ => {
            return Err(SettlementError::NotInHistory {
                voter: *voter,
                request_id: *request_id,
            })
        }
    };
    if entry.claimed {
        return Ok(ClaimOutcome::AlreadyClaimed);
    }

    let params = engine.params().clone();
    let Some(request) = engine.registry.get_request_info(request_id).cloned() else {
        mark_claimed(engine, voter);
        return Ok(ClaimOutcome::Nothing);
    };

    let outcome = match request.status {
        RequestStatus::Completed => pay_winner(engine, ledger, voter, &entry, &request)?,
        RequestStatus::Refunded | RequestStatus::RefundAvailable => {
            pay_refund(engine, ledger, voter, &entry, &request, params.vote_refund_amount)?
        }
        RequestStatus::Made | RequestStatus::Processing if request.timed_out(params.time_lock, now) => {
            pay_refund(engine, ledger, voter, &entry, &request, params.vote_refund_amount)?
        }
        RequestStatus::Made | RequestStatus::Processing => return Ok(ClaimOutcome::Pending),
    };
    debug!(caller = %caller, voter = %voter, request = %request_id, ?outcome, "claim settled");
    Ok(outcome)
}

/// The request a voter can still claim on, if any.
pub fn claimable(engine: &VoteEngine, voter: &AccountId) -> Option<RequestId> {
    engine
        .history
        .get(voter)
        .filter(|entry| !entry.claimed)
        .map(|entry| entry.request_id)
}

fn mark_claimed(engine: &mut VoteEngine, voter: &AccountId) {
    if let Some(entry) = engine.history.get_mut(voter) {
        entry.claimed = true;
    }
}

fn pay_winner(
    engine: &mut VoteEngine,
    ledger: &mut StakeLedger,
    voter: &AccountId,
    entry: &VoterHistoryEntry,
    request: &Request,
) -> Result<ClaimOutcome, SettlementError> {
    let winning = request
        .winning
        .as_ref()
        .ok_or(SettlementError::MissingWinner(request.id))?;
    if entry.vote_hash != winning.vote_hash {
        mark_claimed(engine, voter);
        return Ok(ClaimOutcome::Nothing);
    }

    let share = voter_share(entry.vote_count, winning.vote_count);
    let algo = AlgoAmount::new(share_of(share, request.algo_fee.raw()));
    let gora = GoraAmount::new(share_of(share, request.gora_fee.raw()));
    ledger.release(voter, algo, gora)?;
    mark_claimed(engine, voter);

    let paid_out = winning
        .rewards_paid_out
        .checked_add(entry.stake_count)
        .ok_or(SettlementError::Overflow)?;
    let fees_paid = Fee {
        algo: request.fees_paid.algo.checked_add(algo).ok_or(SettlementError::Overflow)?,
        gora: request.fees_paid.gora.checked_add(gora).ok_or(SettlementError::Overflow)?,
    };
    if paid_out >= winning.stake_count {
        // rounding leftovers go back to whoever paid the fee
        let dust_algo = request.algo_fee.saturating_sub(fees_paid.algo);
        let dust_gora = request.gora_fee.saturating_sub(fees_paid.gora);
        ledger.release(&request.requester, dust_algo, dust_gora)?;
        engine.registry.remove_request(&request.id);
        info!(request = %request.id, %dust_algo, %dust_gora, "all winning voters paid, request closed");
    } else if let Some(stored) = engine.registry.get_request_mut(&request.id) {
        stored.fees_paid = fees_paid;
        if let Some(w) = stored.winning.as_mut() {
            w.rewards_paid_out = paid_out;
        }
    }
    Ok(ClaimOutcome::Rewarded { algo, gora })
}

fn pay_refund(
    engine: &mut VoteEngine,
    ledger: &mut StakeLedger,
    voter: &AccountId,
    entry: &VoterHistoryEntry,
    request: &Request,
    vote_refund_amount: u64,
) -> Result<ClaimOutcome, SettlementError> {
    let algo = request.algo_fee.min(AlgoAmount::new(vote_refund_amount));
    ledger.release(voter, algo, GoraAmount::ZERO)?;
    mark_claimed(engine, voter);

    let remaining = request.algo_fee.saturating_sub(algo);
    let refunded_votes = request
        .total_votes_refunded
        .checked_add(entry.vote_count)
        .ok_or(SettlementError::Overflow)?;

    let drained = refunded_votes >= request.total_votes || remaining.is_zero();
    if request.status == RequestStatus::Refunded && drained {
        let back = remaining
            .checked_add(request.storage_deposit)
            .ok_or(SettlementError::Overflow)?;
        ledger.release(&request.requester, back, GoraAmount::ZERO)?;
        engine.registry.remove_request(&request.id);
        info!(request = %request.id, returned = %back, "voter refunds drained, request closed");
        return Ok(ClaimOutcome::Refunded { algo, closed: true });
    }

    if let Some(stored) = engine.registry.get_request_mut(&request.id) {
        stored.algo_fee = remaining;
        stored.total_votes_refunded = refunded_votes;
    }
    Ok(ClaimOutcome::Refunded { algo, closed: false })
}
