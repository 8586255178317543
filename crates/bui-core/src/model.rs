//! Request/response shapes relayed by the API
//!
//! Nothing here is persisted by this crate: backends produce these values
//! and the server filters and serializes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel used for `last` when a client never completed a backup
pub const NEVER: &str = "never";

/// Status line for one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    /// Client name
    pub name: String,
    /// Current state (idle, running, ...)
    pub state: String,
    /// Date of the last backup, or `never`
    pub last: String,
    /// Phase of the running backup
    #[serde(default)]
    pub phase: Option<String>,
    /// Percentage done of the running backup
    #[serde(default)]
    pub percent: Option<u8>,
}

impl ClientSummary {
    /// An idle client that never ran a backup
    pub fn idle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: "idle".to_string(),
            last: NEVER.to_string(),
            phase: None,
            percent: None,
        }
    }
}

/// Aggregate statistics of one client
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStats {
    /// Number of files
    pub total: u64,
    /// Total size occupied by all the backups of this client
    pub totsize: u64,
    /// Whether the client is a windows machine ("true", "false", "unknown")
    pub windows: String,
}

/// Report entry for one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReportEntry {
    pub name: String,
    pub stats: ClientStats,
}

/// Number of backups kept for one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupCount {
    pub name: String,
    pub number: u64,
}

/// Global report about a set of clients
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientsReport {
    pub backups: Vec<BackupCount>,
    pub clients: Vec<ClientReportEntry>,
}

/// Clients currently running a backup.
///
/// Backends answer with a flat list for a single server and with a map
/// keyed by server name when asked about every agent at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunningClients {
    Flat(Vec<String>),
    PerServer(BTreeMap<String, Vec<String>>),
}

impl RunningClients {
    /// True iff at least one list is non-empty
    pub fn any_running(&self) -> bool {
        match self {
            Self::Flat(clients) => !clients.is_empty(),
            Self::PerServer(servers) => servers.values().any(|clients| !clients.is_empty()),
        }
    }
}

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Warning,
    Error,
    Info,
}

impl NotificationLevel {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Warning => 1,
            Self::Error => 2,
            Self::Info => 3,
        }
    }
}

impl From<u8> for NotificationLevel {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Warning,
            2 => Self::Error,
            _ => Self::Info,
        }
    }
}

/// User-facing feedback from a mutating operation, serialized as
/// `[level, "message"]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u8, String)", into = "(u8, String)")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, message)
    }
}

impl From<(u8, String)> for Notification {
    fn from((code, message): (u8, String)) -> Self {
        Self::new(NotificationLevel::from(code), message)
    }
}

impl From<Notification> for (u8, String) {
    fn from(n: Notification) -> Self {
        (n.level.code(), n.message)
    }
}

/// A `{name, value}` configuration entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setting<T> {
    pub name: String,
    pub value: T,
}

impl<T> Setting<T> {
    pub fn new(name: &str, value: T) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}

/// Parsed configuration file, partitioned by value type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigResults {
    pub boolean: Vec<Setting<bool>>,
    pub common: Vec<Setting<String>>,
    pub integer: Vec<Setting<i64>>,
    pub multi: Vec<Setting<Vec<String>>>,
    pub includes: Vec<String>,
    pub includes_ext: Vec<String>,
    /// Per-client configuration files (server scope only)
    pub clients: Vec<Setting<String>>,
}

/// Which configuration file family a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigScope {
    Server,
    Client,
}

impl ConfigScope {
    /// Attributes listing the typed field names for this scope, in
    /// `boolean`, `string`, `integer`, `multi` order
    pub fn typed_attrs(self) -> [ParserAttr; 4] {
        match self {
            Self::Server => [
                ParserAttr::BooleanSrv,
                ParserAttr::StringSrv,
                ParserAttr::IntegerSrv,
                ParserAttr::MultiSrv,
            ],
            Self::Client => [
                ParserAttr::BooleanCli,
                ParserAttr::StringCli,
                ParserAttr::IntegerCli,
                ParserAttr::MultiCli,
            ],
        }
    }
}

/// Schema metadata exposed by the configuration parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParserAttr {
    BooleanSrv,
    StringSrv,
    IntegerSrv,
    MultiSrv,
    BooleanCli,
    StringCli,
    IntegerCli,
    MultiCli,
    Doc,
    Values,
    Placeholders,
    Defaults,
}

impl ParserAttr {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BooleanSrv => "boolean_srv",
            Self::StringSrv => "string_srv",
            Self::IntegerSrv => "integer_srv",
            Self::MultiSrv => "multi_srv",
            Self::BooleanCli => "boolean_cli",
            Self::StringCli => "string_cli",
            Self::IntegerCli => "integer_cli",
            Self::MultiCli => "multi_cli",
            Self::Doc => "doc",
            Self::Values => "values",
            Self::Placeholders => "placeholders",
            Self::Defaults => "defaults",
        }
    }
}

/// Entry of the raw client list (`name` and configuration file path)
pub type ClientEntry = Setting<String>;

/// Submitted form fields, in submission order. Repeated keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, String)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// First value submitted for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value submitted for `key`
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Distinct keys, in first-seen order
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for (k, _) in &self.fields {
            if !keys.contains(&k.as_str()) {
                keys.push(k);
            }
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
