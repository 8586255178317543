//! ACL filtering of backend results
//!
//! Non-admin callers only ever see servers from `Acl::servers` and clients
//! from `Acl::clients` for the server at hand. Admins (and every caller when
//! no ACL is configured) see backend results untouched.

use std::collections::BTreeMap;

use bui_core::{Acl, RunningClients};

use crate::protocol::ApiError;

/// Reject non-admin callers of the configuration panel
pub fn require_admin(acl: &dyn Acl, user: &str) -> Result<(), ApiError> {
    if acl.is_admin(user) {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Sorry, you don't have rights to access the setting panel",
        ))
    }
}

/// Reject non-admin callers asking about a server they were not granted.
/// Standalone deployments have a single implicit server and skip the check.
pub fn require_server(
    acl: &dyn Acl,
    user: &str,
    server: Option<&str>,
    standalone: bool,
) -> Result<(), ApiError> {
    if standalone || acl.is_admin(user) {
        return Ok(());
    }
    let allowed = server.is_some_and(|s| acl.servers(user).iter().any(|a| a == s));
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(
            "Sorry, you don't have any rights on this server",
        ))
    }
}

/// Keep only the items naming a client the caller may see on `server`
pub fn allowed_items<T>(
    acl: &dyn Acl,
    user: &str,
    server: Option<&str>,
    items: Vec<T>,
    name: impl Fn(&T) -> &str,
) -> Vec<T> {
    if acl.is_admin(user) {
        return items;
    }
    let allowed = acl.clients(user, server);
    items
        .into_iter()
        .filter(|item| allowed.iter().any(|a| a == name(item)))
        .collect()
}

/// Restrict a running-clients result to what the caller may see
pub fn filter_running(
    acl: &dyn Acl,
    user: &str,
    running: RunningClients,
    server: Option<&str>,
) -> RunningClients {
    if acl.is_admin(user) {
        return running;
    }
    match running {
        RunningClients::PerServer(mut map) => {
            let mut filtered = BTreeMap::new();
            for serv in acl.servers(user) {
                // allowed servers the backend did not report are skipped
                let Some(clients) = map.remove(&serv) else {
                    continue;
                };
                let clients = allowed_items(acl, user, Some(&serv), clients, |c| c.as_str());
                filtered.insert(serv, clients);
            }
            RunningClients::PerServer(filtered)
        }
        RunningClients::Flat(clients) => {
            RunningClients::Flat(allowed_items(acl, user, server, clients, |c| c.as_str()))
        }
    }
}
