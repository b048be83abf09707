//! JSON-lines operation scripts for `gora-daemon replay`.
//!
//! One operation per line, tagged by `op`. Accounts are either 64 hex
//! characters or a label hashed into an id. Requests are referenced by the
//! alias given at submission or by hex id. Blank lines and lines starting
//! with `#` are skipped.

use std::collections::HashMap;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::{json, Value};

use gora_consensus::{Ballot, Destination, Fee, Ticket};
use gora_crypto::{account_from_label, blake2b_256_multi};
use gora_delegation::{PoolBalance, PoolSettings};
use gora_node::OracleNode;
use gora_sortition::{votes_for_stake, HashVrf};
use gora_types::{AccountId, RequestId, Round};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    DepositAlgo { account: String, amount: u64 },
    WithdrawAlgo { account: String, amount: u64 },
    DepositTokens { account: String, amount: u64 },
    WithdrawTokens { account: String, amount: u64 },
    Stake { account: String, amount: u64, round: u64 },
    Unstake { account: String, amount: u64, round: u64 },
    /// Without `key`, the account's default development key is used.
    RegisterKey {
        account: String,
        key: Option<String>,
        round: u64,
    },
    Submit {
        requester: String,
        key: String,
        #[serde(default)]
        source: String,
        app_id: u64,
        /// Four ASCII characters or eight hex digits.
        method: String,
        algo_fee: u64,
        gora_fee: u64,
        alias: Option<String>,
        round: u64,
    },
    /// Cast an honest ballot with the development VRF.
    Vote { voter: String, request: String, value: String, round: u64 },
    Refund { requester: String, request: String, round: u64 },
    Claim {
        caller: Option<String>,
        voter: String,
        request: String,
        round: u64,
    },
    Expire { round: u64 },
    CreatePool {
        pool: String,
        manager: String,
        #[serde(default)]
        algo_bp: u64,
        #[serde(default)]
        gora_bp: u64,
        round: u64,
    },
    PoolStake {
        pool: String,
        depositor: String,
        amount: u64,
        vesting_source: Option<String>,
        round: u64,
    },
    PoolUnstake { pool: String, depositor: String, amount: u64, round: u64 },
    PoolClaim { pool: String, depositor: String, round: u64 },
    PoolWithdraw {
        pool: String,
        depositor: String,
        #[serde(default)]
        algo: u64,
        #[serde(default)]
        gora: u64,
        round: u64,
    },
    PoolWithdrawVested { pool: String, source: String, beneficiary: String, round: u64 },
    ProcessAggregation { pool: String, round: u64 },
    GetRequest { request: String },
    GetStake { account: String },
    GetPool { pool: String },
    Metrics,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::DepositAlgo { .. } => "deposit_algo",
            Op::WithdrawAlgo { .. } => "withdraw_algo",
            Op::DepositTokens { .. } => "deposit_tokens",
            Op::WithdrawTokens { .. } => "withdraw_tokens",
            Op::Stake { .. } => "stake",
            Op::Unstake { .. } => "unstake",
            Op::RegisterKey { .. } => "register_key",
            Op::Submit { .. } => "submit",
            Op::Vote { .. } => "vote",
            Op::Refund { .. } => "refund",
            Op::Claim { .. } => "claim",
            Op::Expire { .. } => "expire",
            Op::CreatePool { .. } => "create_pool",
            Op::PoolStake { .. } => "pool_stake",
            Op::PoolUnstake { .. } => "pool_unstake",
            Op::PoolClaim { .. } => "pool_claim",
            Op::PoolWithdraw { .. } => "pool_withdraw",
            Op::PoolWithdrawVested { .. } => "pool_withdraw_vested",
            Op::ProcessAggregation { .. } => "process_aggregation",
            Op::GetRequest { .. } => "get_request",
            Op::GetStake { .. } => "get_stake",
            Op::GetPool { .. } => "get_pool",
            Op::Metrics => "metrics",
        }
    }
}

/// Parse one script line. `None` for blank lines and comments.
pub fn parse_line(line: &str) -> Option<anyhow::Result<Op>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(serde_json::from_str(trimmed).map_err(anyhow::Error::from))
}

pub fn account(s: &str) -> AccountId {
    if s.len() == 64 {
        if let Ok(id) = AccountId::from_hex(s) {
            return id;
        }
    }
    account_from_label(s)
}

/// Development participation key for `account`, the one `register_key`
/// uses when no key is given.
pub fn default_participation_key(account: &AccountId) -> [u8; 32] {
    blake2b_256_multi(&[b"gora-participation", account.as_bytes()])
}

fn method_selector(s: &str) -> anyhow::Result<[u8; 4]> {
    let bytes = if s.len() == 8 {
        hex::decode(s).with_context(|| format!("method selector {s:?}"))?
    } else {
        s.as_bytes().to_vec()
    };
    bytes
        .try_into()
        .map_err(|_| anyhow!("method selector must be 4 bytes, got {s:?}"))
}

fn key_bytes(s: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(s).with_context(|| format!("participation key {s:?}"))?;
    bytes
        .try_into()
        .map_err(|_| anyhow!("participation key must be 32 bytes"))
}

/// Applies script operations to a node, remembering request aliases.
pub struct Runner<'a> {
    node: &'a OracleNode,
    aliases: HashMap<String, RequestId>,
}

impl<'a> Runner<'a> {
    pub fn new(node: &'a OracleNode) -> Self {
        Self {
            node,
            aliases: HashMap::new(),
        }
    }

    fn request(&self, s: &str) -> anyhow::Result<RequestId> {
        if let Some(id) = self.aliases.get(s) {
            return Ok(*id);
        }
        RequestId::from_hex(s).map_err(|e| anyhow!("unknown request {s:?}: {e}"))
    }

    /// Apply one operation and describe what it returned.
    pub async fn apply(&mut self, op: Op) -> anyhow::Result<Value> {
        let node = self.node;
        let value = match op {
            Op::DepositAlgo { account: a, amount } => {
                json!({ "balance": node.deposit_algo(&account(&a), amount).await?.raw() })
            }
            Op::WithdrawAlgo { account: a, amount } => {
                json!({ "balance": node.withdraw_algo(&account(&a), amount).await?.raw() })
            }
            Op::DepositTokens { account: a, amount } => {
                json!({ "balance": node.deposit_tokens(&account(&a), amount).await?.raw() })
            }
            Op::WithdrawTokens { account: a, amount } => {
                json!({ "balance": node.withdraw_tokens(&account(&a), amount).await?.raw() })
            }
            Op::Stake { account: a, amount, round } => {
                json!({ "stake": node.stake(&account(&a), amount, Round::new(round)).await? })
            }
            Op::Unstake { account: a, amount, round } => {
                json!({ "stake": node.unstake(&account(&a), amount, Round::new(round)).await? })
            }
            Op::RegisterKey { account: a, key, round } => {
                let id = account(&a);
                let key = match key {
                    Some(k) => key_bytes(&k)?,
                    None => default_participation_key(&id),
                };
                node.register_participation_key(&id, key, Round::new(round)).await?;
                json!({ "key": hex::encode(key) })
            }
            Op::Submit {
                requester,
                key,
                source,
                app_id,
                method,
                algo_fee,
                gora_fee,
                alias,
                round,
            } => {
                let destination = Destination {
                    app_id,
                    method: method_selector(&method)?,
                };
                let id = node
                    .submit_request(
                        &account(&requester),
                        key.as_bytes(),
                        source.into_bytes(),
                        destination,
                        Fee::new(algo_fee, gora_fee),
                        Round::new(round),
                    )
                    .await?;
                if let Some(alias) = alias {
                    self.aliases.insert(alias, id);
                }
                json!({ "request_id": id.to_string() })
            }
            Op::Vote {
                voter,
                request,
                value,
                round,
            } => {
                let ballot = self.honest_ballot(&account(&voter), self.request(&request)?, value, round).await?;
                serde_json::to_value(node.vote(ballot, Round::new(round)).await?)?
            }
            Op::Refund {
                requester,
                request,
                round,
            } => {
                let id = self.request(&request)?;
                serde_json::to_value(node.refund_request(&account(&requester), &id, Round::new(round)).await?)?
            }
            Op::Claim {
                caller,
                voter,
                request,
                round,
            } => {
                let voter = account(&voter);
                let caller = caller.as_deref().map(account).unwrap_or(voter);
                let id = self.request(&request)?;
                serde_json::to_value(node.claim(&caller, &voter, &id, Round::new(round)).await?)?
            }
            Op::Expire { round } => {
                let expired: Vec<String> = node
                    .expire_requests(Round::new(round))
                    .await
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                json!({ "expired": expired })
            }
            Op::CreatePool {
                pool,
                manager,
                algo_bp,
                gora_bp,
                round,
            } => {
                let settings = PoolSettings {
                    manager: account(&manager),
                    manager_algo_share_bp: algo_bp,
                    manager_gora_share_bp: gora_bp,
                };
                node.create_pool(&account(&pool), settings, Round::new(round)).await?;
                Value::Null
            }
            Op::PoolStake {
                pool,
                depositor,
                amount,
                vesting_source,
                round,
            } => {
                let source = vesting_source.as_deref().map(account);
                node.pool_stake(&account(&pool), &account(&depositor), amount, source, Round::new(round))
                    .await?;
                Value::Null
            }
            Op::PoolUnstake {
                pool,
                depositor,
                amount,
                round,
            } => {
                node.pool_unstake(&account(&pool), &account(&depositor), amount, Round::new(round))
                    .await?;
                Value::Null
            }
            Op::PoolClaim { pool, depositor, round } => serde_json::to_value(
                node.pool_user_claim(&account(&pool), &account(&depositor), Round::new(round))
                    .await?,
            )?,
            Op::PoolWithdraw {
                pool,
                depositor,
                algo,
                gora,
                round,
            } => serde_json::to_value(
                node.pool_withdraw_non_stake(
                    &account(&pool),
                    &account(&depositor),
                    PoolBalance::new(algo, gora),
                    Round::new(round),
                )
                .await?,
            )?,
            Op::PoolWithdrawVested {
                pool,
                source,
                beneficiary,
                round,
            } => {
                let amount = node
                    .pool_withdraw_vested(&account(&pool), &account(&source), &account(&beneficiary), Round::new(round))
                    .await?;
                json!({ "returned": amount })
            }
            Op::ProcessAggregation { pool, round } => {
                json!({ "rolled_over": node.process_aggregation(&account(&pool), Round::new(round)).await? })
            }
            Op::GetRequest { request } => {
                let id = self.request(&request)?;
                match node.get_request_info(&id).await {
                    Some(r) => json!({
                        "request_id": r.id.to_string(),
                        "status": format!("{:?}", r.status),
                        "total_votes": r.total_votes,
                        "algo_fee": r.algo_fee.raw(),
                        "gora_fee": r.gora_fee.raw(),
                        "proposals": r.proposals.len(),
                    }),
                    None => Value::Null,
                }
            }
            Op::GetStake { account: a } => serde_json::to_value(node.get_stake(&account(&a)).await)?,
            Op::GetPool { pool } => serde_json::to_value(node.get_pool(&account(&pool)).await)?,
            Op::Metrics => Value::String(node.metrics.encode()?),
        };
        Ok(value)
    }

    async fn honest_ballot(
        &self,
        voter: &AccountId,
        request_id: RequestId,
        value: String,
        round: u64,
    ) -> anyhow::Result<Ballot> {
        let node = self.node;
        let request = node
            .get_request_info(&request_id)
            .await
            .ok_or_else(|| anyhow!("request {request_id} not found"))?;
        let key = node
            .get_stake(voter)
            .await
            .participation_key
            .ok_or_else(|| anyhow!("voter {voter} has no participation key"))?
            .key;
        let stake = node.stake_at(voter, request.submitted_round).await?;
        let time_lock = node.params().await.time_lock;
        let vrf = HashVrf::new().evaluate(&key, &request.seed);
        Ok(Ballot {
            voter: *voter,
            request_id,
            ticket: Ticket {
                first_valid: request.submitted_round.saturating_add(1),
                last_valid: request.submitted_round.saturating_add(time_lock),
                lease: *request_id.as_bytes(),
            },
            weight: votes_for_stake(vrf.q(), stake),
            vrf,
            value: value.into_bytes(),
        })
    }
}
