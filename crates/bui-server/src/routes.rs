//! URL routing
//!
//! API routes live in two namespaces, `/api/clients` and `/api/settings`.
//! Each accepts an optional leading `<server>` segment for multi-agent
//! deployments.

use hyper::Method;
use percent_encoding::percent_decode_str;

/// Endpoint addressed by a request path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    RunningClients { client: Option<String> },
    RunningBackup,
    ClientsReport,
    ClientsStats,
    ServerSettings { conf: Option<String> },
    ClientsList,
    ClientSettings { client: String, conf: Option<String> },
    NewClient,
    PathExpander { client: Option<String> },
    DeleteClient { client: Option<String> },
    Version,
    Metrics,
}

impl Endpoint {
    /// Stable name, used for metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            Self::RunningClients { .. } => "running_clients",
            Self::RunningBackup => "running_backup",
            Self::ClientsReport => "clients_report",
            Self::ClientsStats => "clients_stats",
            Self::ServerSettings { .. } => "server_settings",
            Self::ClientsList => "clients_list",
            Self::ClientSettings { .. } => "client_settings",
            Self::NewClient => "new_client",
            Self::PathExpander { .. } => "path_expander",
            Self::DeleteClient { .. } => "delete_client",
            Self::Version => "version",
            Self::Metrics => "metrics",
        }
    }

    pub fn allows(&self, method: &Method) -> bool {
        match self {
            Self::ServerSettings { .. } | Self::ClientSettings { .. } => {
                method == Method::GET || method == Method::POST
            }
            Self::NewClient => method == Method::PUT,
            Self::DeleteClient { .. } => method == Method::DELETE,
            _ => method == Method::GET,
        }
    }

    /// Responses of these endpoints go through the response cache
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::ClientsReport | Self::ClientsStats)
    }

    /// Served without authentication
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Version)
    }
}

/// A matched route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub endpoint: Endpoint,
    /// Server named in the path
    pub server: Option<String>,
}

fn decode_segments(path: &str) -> Option<Vec<String>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8().ok().map(|c| c.into_owned()))
        .collect()
}

/// Match `<keyword>/<tail...>`, then `<server>/<keyword>/<tail...>`.
///
/// The server-less form wins when both fit, so a server may carry the name
/// of a keyword as long as the rest of the path only fits with a server.
fn with_optional_server(
    segments: &[String],
    endpoint: impl Fn(&str, &[String]) -> Option<Endpoint>,
) -> Option<Route> {
    let (first, rest) = segments.split_first()?;
    if let Some(endpoint) = endpoint(first.as_str(), rest) {
        return Some(Route {
            endpoint,
            server: None,
        });
    }
    let (keyword, tail) = rest.split_first()?;
    endpoint(keyword.as_str(), tail).map(|endpoint| Route {
        endpoint,
        server: Some(first.clone()),
    })
}

fn optional_client(tail: &[String]) -> Option<Option<String>> {
    match tail {
        [] => Some(None),
        [client] => Some(Some(client.clone())),
        _ => None,
    }
}

fn optional_conf(tail: &[String]) -> Option<String> {
    if tail.is_empty() {
        None
    } else {
        Some(tail.join("/"))
    }
}

fn clients_endpoint(keyword: &str, tail: &[String]) -> Option<Endpoint> {
    let endpoint = match (keyword, tail.is_empty()) {
        ("running-clients.json", _) => Endpoint::RunningClients {
            client: optional_client(tail)?,
        },
        ("running.json", true) => Endpoint::RunningBackup,
        ("clients-report.json", true) => Endpoint::ClientsReport,
        ("clients.json", true) => Endpoint::ClientsStats,
        _ => return None,
    };
    Some(endpoint)
}

fn settings_endpoint(keyword: &str, tail: &[String]) -> Option<Endpoint> {
    let endpoint = match keyword {
        "server-config" => Endpoint::ServerSettings {
            conf: optional_conf(tail),
        },
        "clients.json" if tail.is_empty() => Endpoint::ClientsList,
        "client" => match tail {
            [client, config, rest @ ..] if config == "config" => Endpoint::ClientSettings {
                client: client.clone(),
                conf: optional_conf(rest),
            },
            _ => return None,
        },
        "new-client" if tail.is_empty() => Endpoint::NewClient,
        "path-expander" => Endpoint::PathExpander {
            client: optional_client(tail)?,
        },
        "delete-client" => Endpoint::DeleteClient {
            client: optional_client(tail)?,
        },
        _ => return None,
    };
    Some(endpoint)
}

/// Match a request path
pub fn parse(path: &str) -> Option<Route> {
    if path == "/metrics" {
        return Some(Route {
            endpoint: Endpoint::Metrics,
            server: None,
        });
    }

    let segments = decode_segments(path.strip_prefix("/api/")?)?;
    match segments.split_first()? {
        (ns, []) if ns == "version" => Some(Route {
            endpoint: Endpoint::Version,
            server: None,
        }),
        (ns, rest) if ns == "clients" => with_optional_server(rest, clients_endpoint),
        (ns, rest) if ns == "settings" => with_optional_server(rest, settings_endpoint),
        _ => None,
    }
}
