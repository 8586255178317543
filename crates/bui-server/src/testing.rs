//! Test fixtures shared by the handler and server tests

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bui_core::memory::RUNNING_STATE;
use bui_core::{
    Backend, BackendError, BackendResult, BasicAcl, ClientEntry, ClientFixture, ClientStats,
    ClientSummary, ClientsReport, ConfigResults, ConfigStore, Fixture, Form, MemoryBackend,
    Notification, ParserAttr, RunningClients, ServerFixture, StatusReader,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::Method;
use serde_json::{json, Value};
use tokio::sync::Notify;

use crate::auth::hash_token;
use crate::config::{AuthConfig, ServerConfig, UserConfig};
use crate::server::{handle_api, ServerState};

/// Holds `delete_client` inside the backend until released
#[derive(Default)]
pub struct DeleteGate {
    pub entered: Notify,
    pub release: Notify,
}

/// Memory backend recording every call, optionally failing status queries
pub struct CountingBackend {
    inner: MemoryBackend,
    calls: Mutex<Vec<&'static str>>,
    fail_status: Option<String>,
    delete_gate: Option<Arc<DeleteGate>>,
}

impl CountingBackend {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            fail_status: None,
            delete_gate: None,
        }
    }

    /// Backend whose `delete_client` waits on the returned gate
    pub fn gated(inner: MemoryBackend) -> (Self, Arc<DeleteGate>) {
        let gate = Arc::new(DeleteGate::default());
        let backend = Self {
            delete_gate: Some(gate.clone()),
            ..Self::new(inner)
        };
        (backend, gate)
    }

    pub fn failing(inner: MemoryBackend, message: &str) -> Self {
        Self {
            fail_status: Some(message.to_string()),
            ..Self::new(inner)
        }
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn check(&self) -> BackendResult<()> {
        match &self.fail_status {
            Some(message) => Err(BackendError::Server(message.clone())),
            None => Ok(()),
        }
    }

    /// Number of calls made to a backend operation
    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl StatusReader for CountingBackend {
    async fn is_backup_running(&self, client: &str, server: Option<&str>) -> BackendResult<bool> {
        self.record("is_backup_running");
        self.check()?;
        self.inner.is_backup_running(client, server).await
    }

    async fn is_one_backup_running(&self, server: Option<&str>) -> BackendResult<RunningClients> {
        self.record("is_one_backup_running");
        self.check()?;
        self.inner.is_one_backup_running(server).await
    }

    async fn get_all_clients(&self, server: Option<&str>) -> BackendResult<Vec<ClientSummary>> {
        self.record("get_all_clients");
        self.check()?;
        self.inner.get_all_clients(server).await
    }

    async fn get_clients_report(
        &self,
        clients: &[ClientSummary],
        server: Option<&str>,
    ) -> BackendResult<ClientsReport> {
        self.record("get_clients_report");
        self.inner.get_clients_report(clients, server).await
    }
}

#[async_trait]
impl ConfigStore for CountingBackend {
    async fn read_conf_srv(
        &self,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<ConfigResults> {
        self.record("read_conf_srv");
        self.inner.read_conf_srv(conf, server).await
    }

    async fn store_conf_srv(
        &self,
        form: &Form,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        self.record("store_conf_srv");
        self.inner.store_conf_srv(form, conf, server).await
    }

    async fn read_conf_cli(
        &self,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<ConfigResults> {
        self.record("read_conf_cli");
        self.inner.read_conf_cli(client, conf, server).await
    }

    async fn store_conf_cli(
        &self,
        form: &Form,
        client: &str,
        conf: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        self.record("store_conf_cli");
        self.inner.store_conf_cli(form, client, conf, server).await
    }

    async fn get_parser_attr(&self, attr: ParserAttr, server: Option<&str>) -> BackendResult<Value> {
        self.record("get_parser_attr");
        self.inner.get_parser_attr(attr, server).await
    }

    async fn clients_list(&self, server: Option<&str>) -> BackendResult<Vec<ClientEntry>> {
        self.record("clients_list");
        self.inner.clients_list(server).await
    }

    async fn expand_path(
        &self,
        path: &str,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<String>> {
        self.record("expand_path");
        self.inner.expand_path(path, client, server).await
    }

    async fn delete_client(
        &self,
        client: Option<&str>,
        server: Option<&str>,
    ) -> BackendResult<Vec<Notification>> {
        self.record("delete_client");
        if let Some(gate) = &self.delete_gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.inner.delete_client(client, server).await
    }
}

impl Backend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn is_standalone(&self) -> bool {
        self.inner.is_standalone()
    }
}

fn client(name: &str, state: &str, backups: u64) -> ClientFixture {
    let mut summary = ClientSummary::idle(name);
    summary.state = state.to_string();
    if state == RUNNING_STATE {
        summary.phase = Some("phase1".to_string());
        summary.percent = Some(42);
    }
    let mut fixture = ClientFixture::new(summary);
    fixture.backups = backups;
    fixture.stats = Some(ClientStats {
        total: 100 * backups,
        totsize: 1024 * backups,
        windows: "false".to_string(),
    });
    fixture
}

fn server(clients: Vec<ClientFixture>) -> ServerFixture {
    let mut parser = BTreeMap::new();
    parser.insert("boolean_srv".to_string(), json!(["fork", "daemon"]));
    parser.insert("string_srv".to_string(), json!(["mode"]));
    parser.insert("integer_srv".to_string(), json!(["port"]));
    parser.insert("multi_srv".to_string(), json!(["keep"]));
    parser.insert("boolean_cli".to_string(), json!(["hardlinked_archive"]));
    parser.insert("doc".to_string(), json!({"port": "Port the server listens on"}));
    parser.insert("values".to_string(), json!({"mode": ["client", "server"]}));
    ServerFixture {
        clients,
        clientconfdir: "/etc/burp/clientconfdir".to_string(),
        paths: vec![
            "/etc/burp/burp-server.conf".to_string(),
            "/etc/burp/burp.conf".to_string(),
        ],
        parser,
        ..Default::default()
    }
}

/// srv1: a (running), b, c (running); srv2: d, e (running)
pub fn multi_fixture() -> Fixture {
    let mut servers = BTreeMap::new();
    servers.insert(
        "srv1".to_string(),
        server(vec![
            client("a", RUNNING_STATE, 3),
            client("b", "idle", 1),
            client("c", RUNNING_STATE, 7),
        ]),
    );
    servers.insert(
        "srv2".to_string(),
        server(vec![client("d", "idle", 2), client("e", RUNNING_STATE, 5)]),
    );
    Fixture {
        standalone: false,
        servers,
    }
}

/// Single server with clients a (running), b, c
pub fn standalone_fixture() -> Fixture {
    let mut servers = BTreeMap::new();
    servers.insert(
        "local".to_string(),
        server(vec![
            client("a", RUNNING_STATE, 3),
            client("b", "idle", 1),
            client("c", "idle", 0),
        ]),
    );
    Fixture {
        standalone: true,
        servers,
    }
}

/// `admin` sees everything; `bob` sees a, b on srv1 and d on srv2;
/// `alice` sees a (flat grant); `carol` sees d on srv2 only
pub fn acl() -> BasicAcl {
    BasicAcl::new(vec!["admin".to_string()])
        .with_server_clients("bob", "srv1", &["a", "b"])
        .with_server_clients("bob", "srv2", &["d"])
        .with_clients("alice", &["a"])
        .with_server_clients("carol", "srv2", &["d"])
}

/// Users authenticate with a token equal to their name
fn auth_config() -> AuthConfig {
    AuthConfig {
        enabled: true,
        users: ["admin", "bob", "alice", "carol", "nobody"]
            .iter()
            .map(|u| UserConfig {
                username: u.to_string(),
                token_sha256: hash_token(u),
            })
            .collect(),
    }
}

/// Build server state around a counting backend
pub fn state_with(
    backend: CountingBackend,
    acl: Option<BasicAcl>,
) -> (ServerState, Arc<CountingBackend>) {
    let backend = Arc::new(backend);
    let mut config = ServerConfig {
        auth: auth_config(),
        ..Default::default()
    };
    if let Some(rules) = acl {
        config = config.with_acl(rules);
    }
    let state = ServerState::new(config, backend.clone()).unwrap();
    (state, backend)
}

pub fn state(fixture: Fixture, acl: Option<BasicAcl>) -> (ServerState, Arc<CountingBackend>) {
    state_with(
        CountingBackend::new(MemoryBackend::new(fixture).unwrap()),
        acl,
    )
}

/// Issue a request as `user` and decode the JSON answer
pub async fn request(
    state: &ServerState,
    user: &str,
    method: Method,
    uri: &str,
    body: &str,
) -> (u16, Value) {
    let (path, query) = match uri.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (uri, None),
    };
    let authorization = format!("Bearer {}", user);
    let response = handle_api(
        state,
        &method,
        path,
        query,
        Some(&authorization),
        None,
        Bytes::from(body.to_string()),
    )
    .await;
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub async fn get(state: &ServerState, user: &str, uri: &str) -> (u16, Value) {
    request(state, user, Method::GET, uri, "").await
}
