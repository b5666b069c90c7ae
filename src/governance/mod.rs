//! Governance contract operations
//!
//! High-level operations against the governance and token contracts. Every
//! RPC goes through the request governor, so callers get caching, coalescing,
//! rate limiting, and circuit-breaker behavior without thinking about it.
//! Reads additionally run under the retry policy; writes (transactions) are
//! never auto-retried, since a resubmitted transaction is not idempotent.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::abi::{self, Token};
use crate::config::{ClientConfig, GovernorConfig, RetryConfig};
use crate::constants::{ETH_ACCOUNTS, ETH_CALL, ETH_CHAIN_ID, ETH_SEND_TRANSACTION};
use crate::errors::ClientError;
use crate::governor::RequestGovernor;
use crate::logger::{self, LogTag};
use crate::provider::{EventListener, ListenerId, WalletProvider};
use crate::retry::RetryPolicy;

pub mod types;

pub use types::{Proposal, ProposalState};

pub struct GovernanceClient {
    governor: RequestGovernor,
    provider: Arc<dyn WalletProvider>,
    governance_address: String,
    token_address: String,
    expected_chain_id: u64,
    retry: RetryPolicy,
}

impl GovernanceClient {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        config: &ClientConfig,
        governor_config: GovernorConfig,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            governor: RequestGovernor::new(provider.clone(), governor_config),
            provider,
            governance_address: config.governance_address.clone(),
            token_address: config.token_address.clone(),
            expected_chain_id: config.chain_id,
            retry: RetryPolicy::new(retry_config),
        }
    }

    pub fn governor(&self) -> &RequestGovernor {
        &self.governor
    }

    /// Subscribe to provider events (accountsChanged, chainChanged, ...)
    pub fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.provider.on(event, listener)
    }

    pub fn remove_listener(&self, event: &str, id: ListenerId) {
        self.provider.remove_listener(event, id);
    }

    /// Request accounts and verify the wallet is on the expected chain,
    /// returning the active account
    pub async fn connect(&self) -> Result<String, ClientError> {
        let account = self.active_account().await?;

        let chain = self.governor.request(ETH_CHAIN_ID, json!([])).await?;
        let chain_id = parse_chain_id(&chain)?;
        if chain_id != self.expected_chain_id {
            return Err(ClientError::Configuration(format!(
                "wallet is on chain {} but this deployment expects chain {}",
                chain_id, self.expected_chain_id
            )));
        }

        logger::info(
            LogTag::Governance,
            &format!("Connected as {} on chain {}", account, chain_id),
        );
        Ok(account)
    }

    /// First account from eth_accounts
    pub async fn active_account(&self) -> Result<String, ClientError> {
        let accounts = self.governor.request(ETH_ACCOUNTS, json!([])).await?;
        accounts
            .as_array()
            .and_then(|a| a.first())
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::Configuration("no wallet account connected".to_string()))
    }

    /// Submit a proposal with a voting window of `duration_secs`, returning
    /// the transaction hash
    pub async fn create_proposal(
        &self,
        title: &str,
        description: &str,
        duration_secs: u64,
    ) -> Result<String, ClientError> {
        let calldata = abi::encode_call(
            abi::SEL_CREATE_PROPOSAL,
            &[
                Token::Str(title.to_string()),
                Token::Str(description.to_string()),
                Token::Uint(duration_secs as u128),
            ],
        );
        self.send_transaction(&calldata).await
    }

    /// Cast a for/against vote, returning the transaction hash
    pub async fn vote(&self, proposal_id: u128, support: bool) -> Result<String, ClientError> {
        let calldata = abi::encode_call(
            abi::SEL_VOTE,
            &[Token::Uint(proposal_id), Token::Bool(support)],
        );
        self.send_transaction(&calldata).await
    }

    /// Execute a passed proposal, returning the transaction hash
    pub async fn execute_proposal(&self, proposal_id: u128) -> Result<String, ClientError> {
        let calldata = abi::encode_call(abi::SEL_EXECUTE_PROPOSAL, &[Token::Uint(proposal_id)]);
        self.send_transaction(&calldata).await
    }

    /// Whether `voter` has already voted on a proposal
    ///
    /// Read errors degrade to `false` so a flaky RPC endpoint cannot lock the
    /// voting controls; the contract still rejects an actual double vote.
    pub async fn has_voted(&self, proposal_id: u128, voter: &str) -> bool {
        let calldata = abi::encode_call(
            abi::SEL_HAS_VOTED,
            &[
                Token::Uint(proposal_id),
                Token::Address(voter.to_string()),
            ],
        );
        match self.call_contract(&self.governance_address, &calldata).await {
            Ok(data) => abi::decode_bool(&data, 0).unwrap_or(false),
            Err(e) => {
                logger::warning(
                    LogTag::Governance,
                    &format!("hasVoted({}) failed, assuming false: {}", proposal_id, e),
                );
                false
            }
        }
    }

    /// Fetch one proposal; None when the id does not decode to one
    pub async fn get_proposal(&self, proposal_id: u128) -> Result<Option<Proposal>, ClientError> {
        let calldata = abi::encode_call(abi::SEL_GET_PROPOSAL, &[Token::Uint(proposal_id)]);
        let data = self
            .retry
            .run("getProposal", || {
                self.call_contract(&self.governance_address, &calldata)
            })
            .await?;

        match Proposal::from_abi_hex(&data) {
            Ok(proposal) => Ok(Some(proposal)),
            Err(e) => {
                logger::warning(
                    LogTag::Governance,
                    &format!("Proposal {} did not decode: {}", proposal_id, e),
                );
                Ok(None)
            }
        }
    }

    /// Fetch all proposals, skipping any that fail to load
    pub async fn get_proposals(&self) -> Result<Vec<Proposal>, ClientError> {
        let calldata = abi::encode_call(abi::SEL_GET_PROPOSALS, &[]);
        let data = self
            .retry
            .run("getProposals", || {
                self.call_contract(&self.governance_address, &calldata)
            })
            .await?;
        let ids = abi::decode_uint_array(&data, 0)?;

        let mut proposals = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_proposal(id).await {
                Ok(Some(proposal)) => proposals.push(proposal),
                Ok(None) => {}
                Err(e) => {
                    logger::warning(
                        LogTag::Governance,
                        &format!("Skipping proposal {}: {}", id, e),
                    );
                }
            }
        }
        Ok(proposals)
    }

    /// Voting weight of an address (token balance)
    pub async fn vote_weight(&self, address: &str) -> Result<u128, ClientError> {
        let calldata =
            abi::encode_call(abi::SEL_BALANCE_OF, &[Token::Address(address.to_string())]);
        let data = self
            .retry
            .run("balanceOf", || {
                self.call_contract(&self.token_address, &calldata)
            })
            .await?;
        abi::decode_uint(&data, 0)
    }

    async fn call_contract(&self, to: &str, calldata: &str) -> Result<String, ClientError> {
        let params = json!([{"to": to, "data": calldata}, "latest"]);
        let result = self.governor.request(ETH_CALL, params).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::DataShape("eth_call returned non-string".to_string()))
    }

    async fn send_transaction(&self, calldata: &str) -> Result<String, ClientError> {
        let from = self.active_account().await?;
        let params = json!([{
            "from": from,
            "to": self.governance_address,
            "data": calldata,
        }]);
        let result = self.governor.request(ETH_SEND_TRANSACTION, params).await?;
        let hash = result
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ClientError::DataShape("transaction hash missing".to_string()))?;
        logger::info(LogTag::Governance, &format!("Submitted tx {}", hash));
        Ok(hash)
    }
}

fn parse_chain_id(value: &Value) -> Result<u64, ClientError> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Some(hex) = s.strip_prefix("0x") {
                u64::from_str_radix(hex, 16)
            } else {
                s.parse::<u64>()
            }
            .map_err(|e| ClientError::DataShape(format!("bad chain id {:?}: {}", s, e)))
        }
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ClientError::DataShape(format!("bad chain id {}", n))),
        other => Err(ClientError::DataShape(format!(
            "unexpected chain id shape: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode_u256;
    use crate::provider::{MockProvider, ProviderError};

    const ACCOUNT: &str = "0xab5801a7d398351b8be11c439e05c5b3259aec9b";
    const GOV_ADDR: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
    const TOKEN_ADDR: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";

    fn test_config() -> ClientConfig {
        ClientConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            governance_address: GOV_ADDR.to_string(),
            token_address: TOKEN_ADDR.to_string(),
            session_path: "session.json".to_string(),
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            max_attempts: 2,
            base_delay_ms: 5,
            max_delay_ms: 10,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    fn open_governor_config() -> GovernorConfig {
        let mut config = GovernorConfig::default();
        config.calls_per_second_limit = 10_000;
        config.calls_per_minute_limit = 100_000;
        config.method_call_limit_default = 10_000;
        config.method_call_limits.clear();
        config.trip_threshold = 10_000;
        // Every eth_call must reach the handler; responses differ per calldata
        config.method_ttl_ms.insert(ETH_CALL.to_string(), 0);
        config
    }

    fn client(provider: Arc<MockProvider>) -> GovernanceClient {
        GovernanceClient::new(provider, &test_config(), open_governor_config(), fast_retry())
    }

    /// getProposal return tuple for a minimal proposal
    fn proposal_hex(id: u128, votes_for: u128, votes_against: u128) -> String {
        format!(
            "0x{}{}{}{}{}{}{}{}{}{}{}",
            encode_u256(id),
            "000000000000000000000000ab5801a7d398351b8be11c439e05c5b3259aec9b",
            encode_u256(0x100),
            encode_u256(0x140),
            encode_u256(votes_for),
            encode_u256(votes_against),
            encode_u256(1_900_000_000),
            encode_u256(0),
            encode_u256(2),
            "676d000000000000000000000000000000000000000000000000000000000000",
            encode_u256(0)
        )
    }

    fn selector_of(params: &Value) -> String {
        params[0]["data"]
            .as_str()
            .unwrap_or("")
            .chars()
            .take(10)
            .collect()
    }

    fn standard_handler(
        method: &str,
        params: &Value,
    ) -> Result<Value, ProviderError> {
        match method {
            ETH_ACCOUNTS => Ok(json!([ACCOUNT])),
            ETH_CHAIN_ID => Ok(json!("0x7a69")),
            ETH_SEND_TRANSACTION => Ok(json!("0xdeadbeef")),
            ETH_CALL => match selector_of(params).as_str() {
                "0xc7f758a8" => {
                    let id_hex = &params[0]["data"].as_str().unwrap()[10..];
                    let id = u128::from_str_radix(id_hex, 16).unwrap();
                    Ok(json!(proposal_hex(id, 10, 2)))
                }
                "0x62564c48" => Ok(json!(format!(
                    "0x{}{}{}{}",
                    encode_u256(0x20),
                    encode_u256(2),
                    encode_u256(1),
                    encode_u256(2)
                ))),
                "0x43859632" => Ok(json!(format!("0x{}", encode_u256(1)))),
                "0x70a08231" => Ok(json!(format!("0x{}", encode_u256(5_000)))),
                other => Err(ProviderError::Rpc {
                    code: 3,
                    message: format!("execution reverted: unknown selector {}", other),
                    data: None,
                }),
            },
            _ => Err(ProviderError::Transport(format!("unhandled {}", method))),
        }
    }

    #[tokio::test]
    async fn connect_verifies_chain_and_returns_account() {
        let provider = Arc::new(MockProvider::with_handler(standard_handler));
        let c = client(provider);
        assert_eq!(c.connect().await.unwrap(), ACCOUNT);
    }

    #[tokio::test]
    async fn connect_rejects_wrong_chain() {
        let provider = Arc::new(MockProvider::with_handler(|method, _| match method {
            ETH_ACCOUNTS => Ok(json!(["0x1"])),
            ETH_CHAIN_ID => Ok(json!("0x1")),
            _ => Err(ProviderError::Transport("unhandled".to_string())),
        }));
        let c = client(provider);
        assert!(matches!(
            c.connect().await,
            Err(ClientError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn vote_builds_calldata_and_returns_tx_hash() {
        let provider = Arc::new(MockProvider::with_handler(|method, params| match method {
            ETH_ACCOUNTS => Ok(json!([ACCOUNT])),
            ETH_SEND_TRANSACTION => {
                let tx = &params[0];
                assert_eq!(tx["from"], json!(ACCOUNT));
                assert_eq!(tx["to"], json!(GOV_ADDR));
                let data = tx["data"].as_str().unwrap();
                assert!(data.starts_with("0xc9d27afe"));
                Ok(json!("0xfeedface"))
            }
            _ => Err(ProviderError::Transport("unhandled".to_string())),
        }));
        let c = client(provider);
        assert_eq!(c.vote(1, true).await.unwrap(), "0xfeedface");
    }

    #[tokio::test]
    async fn user_rejection_surfaces_from_create_proposal() {
        let provider = Arc::new(MockProvider::with_handler(|method, _| match method {
            ETH_ACCOUNTS => Ok(json!([ACCOUNT])),
            ETH_SEND_TRANSACTION => Err(ProviderError::Rpc {
                code: 4001,
                message: "User rejected the request.".to_string(),
                data: None,
            }),
            _ => Err(ProviderError::Transport("unhandled".to_string())),
        }));
        let c = client(provider);
        let err = c.create_proposal("t", "d", 3_600).await.unwrap_err();
        assert!(matches!(err, ClientError::UserRejected(_)));
    }

    #[tokio::test]
    async fn get_proposal_decodes_tuple() {
        let provider = Arc::new(MockProvider::with_handler(standard_handler));
        let c = client(provider);

        let p = c.get_proposal(7).await.unwrap().unwrap();
        assert_eq!(p.id, 7);
        assert_eq!(p.votes_for, 10);
        assert_eq!(p.votes_against, 2);
        assert_eq!(p.title, "gm");
    }

    #[tokio::test]
    async fn get_proposals_lists_then_fetches_each() {
        let provider = Arc::new(MockProvider::with_handler(standard_handler));
        let c = client(provider);

        let proposals = c.get_proposals().await.unwrap();
        assert_eq!(proposals.len(), 2);
        assert_eq!(proposals[0].id, 1);
        assert_eq!(proposals[1].id, 2);
    }

    #[tokio::test]
    async fn get_proposals_skips_entries_that_fail_to_load() {
        let provider = Arc::new(MockProvider::with_handler(|method, params| match method {
            ETH_CALL => match selector_of(params).as_str() {
                "0x62564c48" => Ok(json!(format!(
                    "0x{}{}{}{}",
                    encode_u256(0x20),
                    encode_u256(2),
                    encode_u256(1),
                    encode_u256(2)
                ))),
                "0xc7f758a8" => {
                    let id_hex = &params[0]["data"].as_str().unwrap()[10..];
                    let id = u128::from_str_radix(id_hex, 16).unwrap();
                    if id == 2 {
                        // Garbage too short to decode
                        Ok(json!("0x1234"))
                    } else {
                        Ok(json!(proposal_hex(id, 3, 1)))
                    }
                }
                _ => Err(ProviderError::Transport("unhandled".to_string())),
            },
            _ => Err(ProviderError::Transport("unhandled".to_string())),
        }));
        let c = client(provider);

        let proposals = c.get_proposals().await.unwrap();
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].id, 1);
    }

    #[tokio::test]
    async fn has_voted_degrades_to_false_on_error() {
        let provider = Arc::new(MockProvider::with_handler(|_, _| {
            Err(ProviderError::Transport("down".to_string()))
        }));
        let c = client(provider);
        assert!(!c.has_voted(1, ACCOUNT).await);
    }

    #[tokio::test]
    async fn has_voted_true_decodes() {
        let provider = Arc::new(MockProvider::with_handler(standard_handler));
        let c = client(provider);
        assert!(c.has_voted(1, ACCOUNT).await);
    }

    #[tokio::test]
    async fn vote_weight_reads_token_balance() {
        let provider = Arc::new(MockProvider::with_handler(|method, params| {
            if method == ETH_CALL {
                assert_eq!(params[0]["to"], json!(TOKEN_ADDR));
                return standard_handler(method, params);
            }
            standard_handler(method, params)
        }));
        let c = client(provider);
        assert_eq!(c.vote_weight(ACCOUNT).await.unwrap(), 5_000);
    }

    #[tokio::test]
    async fn read_retries_transient_network_failures() {
        let mut first = true;
        let provider = Arc::new(MockProvider::with_handler(move |method, params| {
            if method == ETH_CALL && first {
                first = false;
                return Err(ProviderError::Transport("reset".to_string()));
            }
            standard_handler(method, params)
        }));
        let c = client(provider.clone());

        let p = c.get_proposal(4).await.unwrap().unwrap();
        assert_eq!(p.id, 4);
        assert_eq!(provider.call_count(ETH_CALL), 2);
    }
}
