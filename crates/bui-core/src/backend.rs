//! Backend client trait
//!
//! The backend answers every backup-domain question for one or more burp
//! servers. `server` is `None` in standalone mode.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BackendResult;
use crate::model::{
    ClientEntry, ClientSummary, ClientsReport, ConfigResults, Form, Notification, ParserAttr,
    RunningClients,
};

/// Running-state queries
#[async_trait]
pub trait StatusReader: Send + Sync {
    /// Check if a given client is currently running a backup
    async fn is_backup_running(&self, client: &str, server: Option<&str>) -> BackendResult<bool>;

    /// List clients currently running a backup.
    ///
    /// Multi-agent backends asked without a server answer with
    /// [`RunningClients::PerServer`].
    async fn is_one_backup_running(&self, server: Option<&str>) -> BackendResult<RunningClients>;

    /// Status of every client of a server
    async fn get_all_clients(&self, server: Option<&str>) -> BackendResult<Vec<ClientSummary>>;

    /// Aggregate report restricted to the given clients
    async fn get_clients_report(
        &self,
        clients: &[ClientSummary],
        server: Option<&str>,
    ) -> BackendResult<ClientsReport>;
}

/// Configuration files and client roster
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the server configuration (`conf` selects an included file)
    async fn read_conf_srv(&self, conf: Option<&str>, server: Option<&str>)
        -> BackendResult<ConfigResults>;

    /// Store a submitted server configuration
    async fn store_conf_srv(
        &self,
        form: &Form,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>>;

    /// Read a client configuration
    async fn read_conf_cli(
        &self,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<ConfigResults>;

    /// Store a client configuration, creating the client if needed
    async fn store_conf_cli(
        &self,
        form: &Form,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>>;

    /// Schema metadata of the configuration parser
    async fn get_parser_attr(&self, attr: ParserAttr, server: Option<&str>) -> BackendResult<Value>;

    /// Raw client roster
    async fn clients_list(&self, server: Option<&str>) -> BackendResult<Vec<ClientEntry>>;

    /// Expand a path template (globs) on the server, optionally relative
    /// to a client
    async fn expand_path(
        &self,
        path: &str,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<String>>;

    /// Remove a client configuration
    async fn delete_client(
        &self,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>>;
}

/// Full backend client
pub trait Backend: StatusReader + ConfigStore {
    /// Backend name/type
    fn name(&self) -> &str;

    /// Whether the backend drives a single implicit server
    fn is_standalone(&self) -> bool;
}
