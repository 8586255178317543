//! In-memory backend
//!
//! Serves every backend query from a JSON fixture held in memory. Useful for
//! demos, tests and API development without a running burp server.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::backend::{Backend, ConfigStore, StatusReader};
use crate::error::{BackendError, BackendResult};
use crate::model::{
    BackupCount, ClientEntry, ClientReportEntry, ClientStats, ClientSummary, ClientsReport,
    ConfigResults, Form, Notification, ParserAttr, RunningClients, Setting,
};

/// State reported by clients with a backup in progress
pub const RUNNING_STATE: &str = "running";

/// One client as described in a fixture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFixture {
    #[serde(flatten)]
    pub summary: ClientSummary,
    #[serde(default)]
    pub stats: Option<ClientStats>,
    /// Number of backups kept
    #[serde(default)]
    pub backups: u64,
    #[serde(default)]
    pub config: ConfigResults,
}

impl ClientFixture {
    pub fn new(summary: ClientSummary) -> Self {
        Self {
            summary,
            stats: None,
            backups: 0,
            config: ConfigResults::default(),
        }
    }
}

/// One burp server as described in a fixture
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerFixture {
    pub clients: Vec<ClientFixture>,
    /// Main configuration file
    pub config: ConfigResults,
    /// Included configuration files, by path
    pub included: BTreeMap<String, ConfigResults>,
    /// Directory holding per-client configuration files
    pub clientconfdir: String,
    /// Paths known to the server, used for path expansion
    pub paths: Vec<String>,
    /// Parser metadata, keyed by attribute name (`boolean_srv`, `doc`, ...)
    pub parser: BTreeMap<String, Value>,
}

impl ServerFixture {
    fn client(&self, name: &str) -> BackendResult<&ClientFixture> {
        self.clients
            .iter()
            .find(|c| c.summary.name == name)
            .ok_or_else(|| BackendError::UnknownClient(name.to_string()))
    }

    fn client_mut(&mut self, name: &str) -> Option<&mut ClientFixture> {
        self.clients.iter_mut().find(|c| c.summary.name == name)
    }

    fn running(&self) -> Vec<String> {
        self.clients
            .iter()
            .filter(|c| c.summary.state == RUNNING_STATE)
            .map(|c| c.summary.name.clone())
            .collect()
    }

    fn names_for(&self, attr: ParserAttr) -> Vec<String> {
        match self.parser.get(attr.as_str()) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Whole fixture file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fixture {
    /// Single implicit server
    #[serde(default)]
    pub standalone: bool,
    pub servers: BTreeMap<String, ServerFixture>,
}

/// Backend answering from an in-memory fixture
pub struct MemoryBackend {
    standalone: bool,
    servers: RwLock<BTreeMap<String, ServerFixture>>,
}

impl MemoryBackend {
    /// Create a backend from a fixture
    pub fn new(fixture: Fixture) -> BackendResult<Self> {
        if fixture.standalone && fixture.servers.len() != 1 {
            return Err(BackendError::Server(format!(
                "standalone fixture must describe exactly one server, found {}",
                fixture.servers.len()
            )));
        }
        Ok(Self {
            standalone: fixture.standalone,
            servers: RwLock::new(fixture.servers),
        })
    }

    /// Standalone backend around a single server
    pub fn standalone(name: &str, server: ServerFixture) -> Self {
        let mut servers = BTreeMap::new();
        servers.insert(name.to_string(), server);
        Self {
            standalone: true,
            servers: RwLock::new(servers),
        }
    }

    /// Load a fixture from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> BackendResult<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let fixture: Fixture = serde_json::from_slice(&data)?;
        info!(
            "Loaded fixture {} ({} servers, standalone={})",
            path.display(),
            fixture.servers.len(),
            fixture.standalone
        );
        Self::new(fixture)
    }

    /// Snapshot the current state as a fixture
    pub async fn snapshot(&self) -> Fixture {
        Fixture {
            standalone: self.standalone,
            servers: self.servers.read().await.clone(),
        }
    }

    /// Resolve the server key a request targets
    fn server_key<'a>(
        &self,
        servers: &'a BTreeMap<String, ServerFixture>,
        server: Option<&str>,
    ) -> BackendResult<&'a str> {
        if self.standalone {
            return servers
                .keys()
                .next()
                .map(String::as_str)
                .ok_or_else(|| BackendError::Server("No server configured".to_string()));
        }
        let name = server.ok_or_else(|| BackendError::Server("No agent specified".to_string()))?;
        servers
            .get_key_value(name)
            .map(|(k, _)| k.as_str())
            .ok_or_else(|| BackendError::UnknownServer(name.to_string()))
    }

    async fn with_server<T>(
        &self,
        server: Option<&str>,
        f: impl FnOnce(&ServerFixture) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let servers = self.servers.read().await;
        let key = self.server_key(&servers, server)?;
        f(&servers[key])
    }

    async fn with_server_mut<T>(
        &self,
        server: Option<&str>,
        f: impl FnOnce(&mut ServerFixture) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let mut servers = self.servers.write().await;
        let key = self.server_key(&servers, server)?.to_string();
        match servers.get_mut(&key) {
            Some(data) => f(data),
            None => Err(BackendError::UnknownServer(key)),
        }
    }
}

/// Turn a submitted form into typed settings, using the parser's typed
/// field lists. Values that fail to parse are reported and skipped.
fn form_to_config(
    form: &Form,
    booleans: &[String],
    integers: &[String],
    multis: &[String],
) -> (ConfigResults, Vec<Notification>) {
    let mut config = ConfigResults::default();
    let mut errors = Vec::new();

    for key in form.keys() {
        if booleans.iter().any(|b| b == key) {
            let value = matches!(form.get(key), Some("true" | "on" | "1" | "yes"));
            config.boolean.push(Setting::new(key, value));
        } else if integers.iter().any(|i| i == key) {
            let raw = form.get(key).unwrap_or_default();
            match raw.trim().parse::<i64>() {
                Ok(value) => config.integer.push(Setting::new(key, value)),
                Err(_) => errors.push(Notification::error(format!(
                    "Invalid integer value for '{}': '{}'",
                    key, raw
                ))),
            }
        } else if multis.iter().any(|m| m == key) {
            let values = form
                .get_all(key)
                .into_iter()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            config.multi.push(Setting::new(key, values));
        } else if key == "includes" {
            config.includes = form.get_all(key).into_iter().map(str::to_string).collect();
        } else {
            config
                .common
                .push(Setting::new(key, form.get(key).unwrap_or_default().to_string()));
        }
    }

    (config, errors)
}

/// Compile a shell-style path template. Wildcards never cross a `/`.
fn path_pattern(template: &str) -> BackendResult<Pattern> {
    Pattern::new(template)
        .map_err(|e| BackendError::Server(format!("Invalid path template '{}': {}", template, e)))
}

const PATH_MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[async_trait]
impl StatusReader for MemoryBackend {
    async fn is_backup_running(&self, client: &str, server: Option<&str>) -> BackendResult<bool> {
        self.with_server(server, |data| {
            Ok(data.client(client)?.summary.state == RUNNING_STATE)
        })
        .await
    }

    async fn is_one_backup_running(&self, server: Option<&str>) -> BackendResult<RunningClients> {
        if !self.standalone && server.is_none() {
            let servers = self.servers.read().await;
            let map = servers
                .iter()
                .map(|(name, data)| (name.clone(), data.running()))
                .collect();
            return Ok(RunningClients::PerServer(map));
        }
        self.with_server(server, |data| Ok(RunningClients::Flat(data.running())))
            .await
    }

    async fn get_all_clients(&self, server: Option<&str>) -> BackendResult<Vec<ClientSummary>> {
        self.with_server(server, |data| {
            Ok(data.clients.iter().map(|c| c.summary.clone()).collect())
        })
        .await
    }

    async fn get_clients_report(
        &self,
        clients: &[ClientSummary],
        server: Option<&str>,
    ) -> BackendResult<ClientsReport> {
        self.with_server(server, |data| {
            let mut report = ClientsReport::default();
            for summary in clients {
                let fixture = data.client(&summary.name)?;
                let stats = fixture.stats.clone().unwrap_or_else(|| ClientStats {
                    windows: "unknown".to_string(),
                    ..Default::default()
                });
                report.clients.push(ClientReportEntry {
                    name: summary.name.clone(),
                    stats,
                });
                report.backups.push(BackupCount {
                    name: summary.name.clone(),
                    number: fixture.backups,
                });
            }
            Ok(report)
        })
        .await
    }
}

#[async_trait]
impl ConfigStore for MemoryBackend {
    async fn read_conf_srv(
        &self,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<ConfigResults> {
        self.with_server(server, |data| match conf {
            None => Ok(data.config.clone()),
            Some(path) => data
                .included
                .get(path)
                .cloned()
                .ok_or_else(|| BackendError::Server(format!("File not found: {}", path))),
        })
        .await
    }

    async fn store_conf_srv(
        &self,
        form: &Form,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        self.with_server_mut(server, |data| {
            let (mut config, mut notifs) = form_to_config(
                form,
                &data.names_for(ParserAttr::BooleanSrv),
                &data.names_for(ParserAttr::IntegerSrv),
                &data.names_for(ParserAttr::MultiSrv),
            );
            let target = match conf {
                None => &mut data.config,
                Some(path) => data.included.entry(path.to_string()).or_default(),
            };
            config.clients = std::mem::take(&mut target.clients);
            config.includes_ext = std::mem::take(&mut target.includes_ext);
            *target = config;
            debug!("Stored server configuration {}", conf.unwrap_or("<main>"));
            notifs.push(Notification::success("Configuration successfully saved."));
            Ok(notifs)
        })
        .await
    }

    async fn read_conf_cli(
        &self,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<ConfigResults> {
        self.with_server(server, |data| {
            let fixture = data.client(client)?;
            match conf {
                None => Ok(fixture.config.clone()),
                Some(path) => data
                    .included
                    .get(path)
                    .cloned()
                    .ok_or_else(|| BackendError::Server(format!("File not found: {}", path))),
            }
        })
        .await
    }

    async fn store_conf_cli(
        &self,
        form: &Form,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        self.with_server_mut(server, |data| {
            let (config, mut notifs) = form_to_config(
                form,
                &data.names_for(ParserAttr::BooleanCli),
                &data.names_for(ParserAttr::IntegerCli),
                &data.names_for(ParserAttr::MultiCli),
            );
            if let Some(path) = conf {
                data.included.insert(path.to_string(), config);
            } else if let Some(existing) = data.client_mut(client) {
                existing.config = config;
            } else {
                let mut fixture = ClientFixture::new(ClientSummary::idle(client));
                fixture.config = config;
                data.clients.push(fixture);
                info!("Created client {}", client);
            }
            notifs.push(Notification::success(format!(
                "Configuration of '{}' successfully saved.",
                client
            )));
            Ok(notifs)
        })
        .await
    }

    async fn get_parser_attr(&self, attr: ParserAttr, server: Option<&str>) -> BackendResult<Value> {
        self.with_server(server, |data| {
            Ok(data.parser.get(attr.as_str()).cloned().unwrap_or_else(|| {
                match attr {
                    ParserAttr::Doc
                    | ParserAttr::Values
                    | ParserAttr::Placeholders
                    | ParserAttr::Defaults => Value::Object(Map::new()),
                    _ => Value::Array(Vec::new()),
                }
            }))
        })
        .await
    }

    async fn clients_list(&self, server: Option<&str>) -> BackendResult<Vec<ClientEntry>> {
        self.with_server(server, |data| {
            let dir = data.clientconfdir.trim_end_matches('/');
            Ok(data
                .clients
                .iter()
                .map(|c| Setting::new(&c.summary.name, format!("{}/{}", dir, c.summary.name)))
                .collect())
        })
        .await
    }

    async fn expand_path(
        &self,
        path: &str,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<String>> {
        let pattern = path_pattern(path)?;
        self.with_server(server, |data| {
            if let Some(client) = client {
                data.client(client)?;
            }
            Ok(data
                .paths
                .iter()
                .filter(|p| pattern.matches_with(p, PATH_MATCH))
                .cloned()
                .collect())
        })
        .await
    }

    async fn delete_client(
        &self,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        let client = client.ok_or_else(|| BackendError::Server("No client provided".to_string()))?;
        self.with_server_mut(server, |data| {
            let before = data.clients.len();
            data.clients.retain(|c| c.summary.name != client);
            if data.clients.len() == before {
                return Err(BackendError::UnknownClient(client.to_string()));
            }
            info!("Deleted client {}", client);
            Ok(vec![Notification::success(format!(
                "Client '{}' successfully removed",
                client
            ))])
        })
        .await
    }
}

impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn is_standalone(&self) -> bool {
        self.standalone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn client(name: &str, state: &str) -> ClientFixture {
        let mut summary = ClientSummary::idle(name);
        summary.state = state.to_string();
        ClientFixture::new(summary)
    }

    fn server(clients: Vec<ClientFixture>) -> ServerFixture {
        let mut parser = BTreeMap::new();
        parser.insert("boolean_srv".to_string(), serde_json::json!(["fork"]));
        parser.insert("integer_srv".to_string(), serde_json::json!(["port"]));
        parser.insert("multi_srv".to_string(), serde_json::json!(["keep"]));
        ServerFixture {
            clients,
            clientconfdir: "/etc/burp/clientconfdir/".to_string(),
            paths: vec![
                "/etc/burp/burp-server.conf".to_string(),
                "/etc/burp/clientconfdir/client1".to_string(),
                "/home/user/docs".to_string(),
            ],
            parser,
            ..Default::default()
        }
    }

    fn multi() -> MemoryBackend {
        let mut servers = BTreeMap::new();
        servers.insert(
            "srv1".to_string(),
            server(vec![client("a", RUNNING_STATE), client("b", "idle")]),
        );
        servers.insert("srv2".to_string(), server(vec![client("c", "idle")]));
        MemoryBackend::new(Fixture {
            standalone: false,
            servers,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_running_multi_agent() {
        let backend = multi();
        match backend.is_one_backup_running(None).await.unwrap() {
            RunningClients::PerServer(map) => {
                assert_eq!(map["srv1"], vec!["a"]);
                assert!(map["srv2"].is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            backend.is_one_backup_running(Some("srv1")).await.unwrap(),
            RunningClients::Flat(vec!["a".to_string()])
        );
        assert!(backend.is_backup_running("a", Some("srv1")).await.unwrap());
        assert!(!backend.is_backup_running("b", Some("srv1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_server_and_client() {
        let backend = multi();
        let err = backend.get_all_clients(Some("nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown server: nope");
        let err = backend.is_backup_running("zz", Some("srv1")).await.unwrap_err();
        assert!(matches!(err, BackendError::UnknownClient(_)));
        assert!(backend.get_all_clients(None).await.is_err());
    }

    #[tokio::test]
    async fn test_standalone_ignores_server() {
        let backend = MemoryBackend::standalone("local", server(vec![client("a", "idle")]));
        assert!(backend.is_standalone());
        let clients = backend.get_all_clients(Some("whatever")).await.unwrap();
        assert_eq!(clients.len(), 1);
        assert_eq!(
            backend.is_one_backup_running(None).await.unwrap(),
            RunningClients::Flat(vec![])
        );
    }

    #[tokio::test]
    async fn test_report_defaults() {
        let backend = multi();
        let clients = backend.get_all_clients(Some("srv1")).await.unwrap();
        let report = backend.get_clients_report(&clients[..1], Some("srv1")).await.unwrap();
        assert_eq!(report.clients.len(), 1);
        assert_eq!(report.clients[0].stats.windows, "unknown");
        assert_eq!(report.backups[0].number, 0);
    }

    #[tokio::test]
    async fn test_create_and_delete_client() {
        let backend = multi();
        backend
            .store_conf_cli(&Form::new(), "newbie", None, Some("srv2"))
            .await
            .unwrap();
        let list = backend.clients_list(Some("srv2")).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].value, "/etc/burp/clientconfdir/newbie");

        let snapshot = backend.snapshot().await;
        assert!(!snapshot.standalone);
        assert_eq!(snapshot.servers["srv2"].clients[1].summary.last, "never");

        let notifs = backend.delete_client(Some("newbie"), Some("srv2")).await.unwrap();
        assert_eq!(notifs.len(), 1);
        assert_eq!(backend.clients_list(Some("srv2")).await.unwrap().len(), 1);
        let snapshot = backend.snapshot().await;
        assert_eq!(snapshot.servers["srv2"].clients.len(), 1);
        assert_eq!(snapshot.servers["srv1"].clients.len(), 2);
        assert!(backend.delete_client(Some("newbie"), Some("srv2")).await.is_err());
        assert!(backend.delete_client(None, Some("srv2")).await.is_err());
    }

    #[tokio::test]
    async fn test_store_server_config_types() {
        let backend = multi();
        let form = Form::from_pairs([
            ("fork", "on"),
            ("port", "4971"),
            ("keep", "7"),
            ("keep", "4"),
            ("mode", "server"),
        ]);
        let notifs = backend.store_conf_srv(&form, None, Some("srv1")).await.unwrap();
        assert_eq!(notifs.len(), 1);

        let conf = backend.read_conf_srv(None, Some("srv1")).await.unwrap();
        assert_eq!(conf.boolean, vec![Setting::new("fork", true)]);
        assert_eq!(conf.integer, vec![Setting::new("port", 4971)]);
        assert_eq!(conf.multi[0].value, vec!["7", "4"]);
        assert_eq!(conf.common, vec![Setting::new("mode", "server".to_string())]);
    }

    #[tokio::test]
    async fn test_store_reports_bad_integer() {
        let backend = multi();
        let form = Form::from_pairs([("port", "abc")]);
        let notifs = backend.store_conf_srv(&form, None, Some("srv1")).await.unwrap();
        assert_eq!(notifs.len(), 2);
        assert_eq!(notifs[0].level, crate::model::NotificationLevel::Error);
    }

    #[tokio::test]
    async fn test_expand_path() {
        let backend = multi();
        let paths = backend
            .expand_path("/etc/burp/*", None, Some("srv1"))
            .await
            .unwrap();
        assert_eq!(paths, vec!["/etc/burp/burp-server.conf"]);

        let none = backend.expand_path("/var/*", None, Some("srv1")).await.unwrap();
        assert!(none.is_empty());

        let exact = backend
            .expand_path("/home/user/docs", Some("a"), Some("srv1"))
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);

        let class = backend
            .expand_path("/etc/burp/[bc]*", None, Some("srv1"))
            .await
            .unwrap();
        assert_eq!(class, vec!["/etc/burp/burp-server.conf"]);

        // wildcards stay within one path component
        let nested = backend
            .expand_path("/etc/*/client?", None, Some("srv1"))
            .await
            .unwrap();
        assert!(nested.is_empty());
        let deep = backend
            .expand_path("/etc/*/*/client?", None, Some("srv1"))
            .await
            .unwrap();
        assert_eq!(deep, vec!["/etc/burp/clientconfdir/client1"]);

        assert!(backend.expand_path("/etc/[", None, Some("srv1")).await.is_err());
    }

    #[tokio::test]
    async fn test_parser_attr_defaults() {
        let backend = multi();
        let doc = backend.get_parser_attr(ParserAttr::Doc, Some("srv1")).await.unwrap();
        assert!(doc.is_object());
        let cli = backend
            .get_parser_attr(ParserAttr::BooleanCli, Some("srv1"))
            .await
            .unwrap();
        assert!(cli.is_array());
        let srv = backend
            .get_parser_attr(ParserAttr::BooleanSrv, Some("srv1"))
            .await
            .unwrap();
        assert_eq!(srv, serde_json::json!(["fork"]));
    }

    #[tokio::test]
    async fn test_load_fixture_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "standalone": true,
                "servers": {{
                    "local": {{
                        "clients": [
                            {{"name": "client1", "state": "running", "last": "2015-05-17 11:40:02",
                              "phase": "phase1", "percent": 12, "backups": 15}}
                        ]
                    }}
                }}
            }}"#
        )
        .unwrap();

        let backend = MemoryBackend::load(file.path()).await.unwrap();
        assert!(backend.is_standalone());
        let clients = backend.get_all_clients(None).await.unwrap();
        assert_eq!(clients[0].percent, Some(12));
        assert!(backend.is_backup_running("client1", None).await.unwrap());
    }

    #[test]
    fn test_standalone_fixture_needs_one_server() {
        let fixture = Fixture {
            standalone: true,
            servers: BTreeMap::new(),
        };
        assert!(MemoryBackend::new(fixture).is_err());
    }
}
