//! Core types for the burp monitoring API
//!
//! This crate defines the data shapes relayed by the API, the backend and
//! ACL collaborator traits, and simple implementations of both.

pub mod acl;
pub mod backend;
pub mod error;
pub mod memory;
pub mod model;

pub use acl::{Acl, BasicAcl, Grant, NoAcl};
pub use backend::{Backend, ConfigStore, StatusReader};
pub use error::{BackendError, BackendResult};
pub use memory::{ClientFixture, Fixture, MemoryBackend, ServerFixture};
pub use model::{
    BackupCount, ClientEntry, ClientReportEntry, ClientStats, ClientSummary, ClientsReport,
    ConfigResults, ConfigScope, Form, Notification, NotificationLevel, ParserAttr,
    RunningClients, Setting,
};
