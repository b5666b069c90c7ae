// Common imports that are used throughout the project
pub use crate::config::{ClientConfig, GovernorConfig, RetryConfig};
pub use crate::errors::ClientError;
pub use crate::governance::{GovernanceClient, Proposal, ProposalState};
pub use crate::governor::RequestGovernor;
pub use crate::provider::{ProviderError, WalletProvider};
pub use crate::retry::RetryPolicy;

pub use async_trait::async_trait;
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use serde_json::Value;
pub use std::collections::HashMap;
