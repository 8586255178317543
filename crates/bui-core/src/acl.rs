//! Access control
//!
//! The ACL decides which servers and clients an authenticated user may see.
//! Deployments without access control use [`NoAcl`], which treats every
//! caller as an administrator, so handlers never branch on whether an ACL
//! is configured.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Access-control queries
pub trait Acl: Send + Sync {
    /// Whether `user` may see and modify everything
    fn is_admin(&self, user: &str) -> bool;

    /// Whether `user` may see `client` on `server`
    fn is_client_allowed(&self, user: &str, client: &str, server: Option<&str>) -> bool;

    /// Servers `user` may see
    fn servers(&self, user: &str) -> Vec<String>;

    /// Clients `user` may see on `server`
    fn clients(&self, user: &str, server: Option<&str>) -> Vec<String>;
}

/// Null object used when no ACL module is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAcl;

impl Acl for NoAcl {
    fn is_admin(&self, _user: &str) -> bool {
        true
    }

    fn is_client_allowed(&self, _user: &str, _client: &str, _server: Option<&str>) -> bool {
        true
    }

    fn servers(&self, _user: &str) -> Vec<String> {
        Vec::new()
    }

    fn clients(&self, _user: &str, _server: Option<&str>) -> Vec<String> {
        Vec::new()
    }
}

/// Clients granted to a user.
///
/// A plain list applies to whatever server is asked (standalone setups); a
/// map grants clients per server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grant {
    Clients(Vec<String>),
    PerServer(BTreeMap<String, Vec<String>>),
}

/// Static ACL loaded from the server configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicAcl {
    /// Users with full access
    pub admins: Vec<String>,
    /// Per-user grants
    pub grants: HashMap<String, Grant>,
}

impl BasicAcl {
    pub fn new(admins: Vec<String>) -> Self {
        Self {
            admins,
            grants: HashMap::new(),
        }
    }

    /// Grant a flat list of clients
    pub fn with_clients(mut self, user: &str, clients: &[&str]) -> Self {
        self.grants.insert(
            user.to_string(),
            Grant::Clients(clients.iter().map(|c| c.to_string()).collect()),
        );
        self
    }

    /// Grant clients on a specific server
    pub fn with_server_clients(mut self, user: &str, server: &str, clients: &[&str]) -> Self {
        let entry = self
            .grants
            .entry(user.to_string())
            .or_insert_with(|| Grant::PerServer(BTreeMap::new()));
        if let Grant::Clients(_) = entry {
            *entry = Grant::PerServer(BTreeMap::new());
        }
        if let Grant::PerServer(map) = entry {
            map.insert(
                server.to_string(),
                clients.iter().map(|c| c.to_string()).collect(),
            );
        }
        self
    }
}

impl Acl for BasicAcl {
    fn is_admin(&self, user: &str) -> bool {
        self.admins.iter().any(|a| a == user)
    }

    fn is_client_allowed(&self, user: &str, client: &str, server: Option<&str>) -> bool {
        self.is_admin(user) || self.clients(user, server).iter().any(|c| c == client)
    }

    fn servers(&self, user: &str) -> Vec<String> {
        match self.grants.get(user) {
            Some(Grant::PerServer(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    fn clients(&self, user: &str, server: Option<&str>) -> Vec<String> {
        match (self.grants.get(user), server) {
            (Some(Grant::Clients(clients)), _) => clients.clone(),
            (Some(Grant::PerServer(map)), Some(server)) => {
                map.get(server).cloned().unwrap_or_default()
            }
            (Some(Grant::PerServer(map)), None) => {
                let all: BTreeSet<&String> = map.values().flatten().collect();
                all.into_iter().cloned().collect()
            }
            (None, _) => Vec::new(),
        }
    }
}
