//! Everything the node mutates, behind one writer.

use std::collections::BTreeMap;

use gora_consensus::VoteEngine;
use gora_delegation::DelegationPool;
use gora_stake::StakeLedger;
use gora_types::{AccountId, ProtocolParams};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OracleState {
    pub ledger: StakeLedger,
    pub engine: VoteEngine,
    pub pools: BTreeMap<AccountId, DelegationPool>,
}

impl OracleState {
    pub fn new(params: &ProtocolParams) -> Self {
        Self {
            ledger: StakeLedger::new(params),
            engine: VoteEngine::new(params.clone()),
            pools: BTreeMap::new(),
        }
    }

    pub fn params(&self) -> &ProtocolParams {
        self.engine.params()
    }
}
