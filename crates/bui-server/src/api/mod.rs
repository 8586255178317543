//! Request handlers
//!
//! Handlers resolve nothing themselves: the router hands them the caller and
//! the target server, they apply the ACL, call the backend and shape the
//! JSON reply.

pub mod clients;
pub mod settings;

use bui_core::{Acl, Backend};

use crate::server::ServerState;

/// Inputs common to every handler
pub struct Call<'a> {
    pub state: &'a ServerState,
    /// Authenticated username
    pub user: &'a str,
    /// Target server, `None` in standalone mode
    pub server: Option<&'a str>,
}

impl<'a> Call<'a> {
    pub fn new(state: &'a ServerState, user: &'a str, server: Option<&'a str>) -> Self {
        Self {
            state,
            user,
            server,
        }
    }

    pub fn acl(&self) -> &dyn Acl {
        self.state.acl.as_ref()
    }

    pub fn backend(&self) -> &dyn Backend {
        self.state.backend.as_ref()
    }
}
