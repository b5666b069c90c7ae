//! Proposal data model
//!
//! Proposals arrive either as decoded contract return data or as JSON from
//! tooling/indexer endpoints, and the JSON shapes drift between deployments.
//! Parsing is therefore defensive: alternate field names are probed and
//! missing optional fields degrade to placeholders instead of failing the
//! whole fetch.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::abi;
use crate::errors::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProposalState {
    /// Voting window still open
    Active,
    /// Window closed, majority in favor, awaiting execution
    Passed,
    /// Window closed, majority against
    Rejected,
    /// Executed on chain
    Executed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: u128,
    pub proposer: String,
    pub title: String,
    pub description: String,
    pub votes_for: u128,
    pub votes_against: u128,
    pub deadline: DateTime<Utc>,
    pub executed: bool,
}

impl Proposal {
    /// Derived lifecycle state at `now`
    pub fn state_at(&self, now: DateTime<Utc>) -> ProposalState {
        if self.executed {
            ProposalState::Executed
        } else if now < self.deadline {
            ProposalState::Active
        } else if self.votes_for > self.votes_against {
            ProposalState::Passed
        } else {
            ProposalState::Rejected
        }
    }

    pub fn state(&self) -> ProposalState {
        self.state_at(Utc::now())
    }

    /// Decode the getProposal return tuple:
    /// (id, proposer, title, description, votesFor, votesAgainst, deadline, executed)
    ///
    /// Vote tallies and flags must decode; malformed strings fall back to
    /// placeholders so one bad title cannot hide the voting numbers.
    pub fn from_abi_hex(data: &str) -> Result<Self, ClientError> {
        let id = abi::decode_uint(data, 0)?;
        let proposer = abi::decode_address(data, 1)?;
        let title = abi::decode_string(data, 2).unwrap_or_else(|_| format!("Proposal #{}", id));
        let description = abi::decode_string(data, 3).unwrap_or_default();
        let votes_for = abi::decode_uint(data, 4)?;
        let votes_against = abi::decode_uint(data, 5)?;
        let deadline_secs = abi::decode_uint(data, 6)?;
        let executed = abi::decode_bool(data, 7)?;

        Ok(Self {
            id,
            proposer,
            title,
            description,
            votes_for,
            votes_against,
            deadline: timestamp_to_datetime(deadline_secs),
            executed,
        })
    }

    /// Parse a proposal from loosely-shaped JSON
    pub fn from_json(value: &Value) -> Result<Self, ClientError> {
        let id = pick_uint(value, &["id", "proposalId", "proposal_id"])
            .ok_or_else(|| ClientError::DataShape("proposal missing id".to_string()))?;

        Ok(Self {
            id,
            proposer: pick_str(value, &["proposer", "creator", "author"])
                .unwrap_or_else(|| "0x0000000000000000000000000000000000000000".to_string()),
            title: pick_str(value, &["title", "name"])
                .unwrap_or_else(|| format!("Proposal #{}", id)),
            description: pick_str(value, &["description", "body", "details"]).unwrap_or_default(),
            votes_for: pick_uint(value, &["votesFor", "votes_for", "yesVotes", "forVotes"])
                .unwrap_or(0),
            votes_against: pick_uint(
                value,
                &["votesAgainst", "votes_against", "noVotes", "againstVotes"],
            )
            .unwrap_or(0),
            deadline: pick_uint(value, &["deadline", "endTime", "end_time", "expiresAt"])
                .map(timestamp_to_datetime)
                .unwrap_or_else(Utc::now),
            executed: pick_bool(value, &["executed", "isExecuted"]).unwrap_or(false),
        })
    }
}

fn timestamp_to_datetime(secs: u128) -> DateTime<Utc> {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

/// First present key, accepting numbers, decimal strings, or hex strings
fn pick_uint(value: &Value, keys: &[&str]) -> Option<u128> {
    for key in keys {
        match value.get(*key) {
            Some(Value::Number(n)) => {
                if let Some(u) = n.as_u64() {
                    return Some(u as u128);
                }
            }
            Some(Value::String(s)) => {
                let s = s.trim();
                let parsed = if let Some(hex) = s.strip_prefix("0x") {
                    u128::from_str_radix(hex, 16).ok()
                } else {
                    s.parse::<u128>().ok()
                };
                if parsed.is_some() {
                    return parsed;
                }
            }
            _ => {}
        }
    }
    None
}

fn pick_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(|s| s.to_string())
}

fn pick_bool(value: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_bool))
}
