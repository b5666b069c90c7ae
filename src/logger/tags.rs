/// Log tags identifying the subsystem a message came from
///
/// Tags drive both the colored console prefix and per-module debug gating
/// (GOVCLIENT_DEBUG=governor,cache enables debug logs for those tags only).

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Rpc,
    Governor,
    Cache,
    Breaker,
    Governance,
    Provider,
    Session,
}

impl LogTag {
    /// Plain uppercase name used in the console prefix
    pub fn as_str(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Rpc => "RPC",
            LogTag::Governor => "GOVERNOR",
            LogTag::Cache => "CACHE",
            LogTag::Breaker => "BREAKER",
            LogTag::Governance => "GOVERNANCE",
            LogTag::Provider => "PROVIDER",
            LogTag::Session => "SESSION",
        }
    }

    /// Lowercase key used in GOVCLIENT_DEBUG
    pub fn to_debug_key(&self) -> &'static str {
        match self {
            LogTag::System => "system",
            LogTag::Rpc => "rpc",
            LogTag::Governor => "governor",
            LogTag::Cache => "cache",
            LogTag::Breaker => "breaker",
            LogTag::Governance => "governance",
            LogTag::Provider => "provider",
            LogTag::Session => "session",
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
