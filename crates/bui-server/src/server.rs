//! HTTP server implementation
//!
//! Accepts HTTP/1.1 and HTTP/2 (optionally over TLS), authenticates the
//! caller, routes to the API handlers and serves cacheable reports from the
//! response cache.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bui_core::{Acl, Backend, BasicAcl, Form, MemoryBackend, NoAcl};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::service::service_fn;
use hyper::{body::Incoming, header, Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{clients, settings, Call};
use crate::auth::{AuthManager, Identity};
use crate::cache::ResponseCache;
use crate::config::ServerConfig;
use crate::metrics::{Metrics, MetricsConfig, SharedMetrics};
use crate::protocol::{ApiError, ApiResult};
use crate::routes::{self, Endpoint, Route};
use crate::tls::create_tls_acceptor;

/// Server state
pub struct ServerState {
    /// Configuration
    pub config: ServerConfig,
    /// Backend client
    pub backend: Arc<dyn Backend>,
    /// Access control
    pub acl: Arc<dyn Acl>,
    /// Caller authentication
    pub auth: AuthManager,
    /// Response cache
    pub cache: ResponseCache,
    /// Metrics
    pub metrics: SharedMetrics,
    /// TLS acceptor (None if TLS disabled)
    pub tls_acceptor: Option<TlsAcceptor>,
}

impl ServerState {
    /// Assemble state around an existing backend, without TLS
    pub fn new(config: ServerConfig, backend: Arc<dyn Backend>) -> anyhow::Result<Self> {
        let acl: Arc<dyn Acl> = if config.acl.enabled {
            Arc::new(config.acl.rules.clone())
        } else {
            Arc::new(NoAcl)
        };
        let cache = ResponseCache::new(
            config.cache.enabled,
            Duration::from_secs(config.cache.ttl_secs),
        );
        Ok(Self {
            auth: AuthManager::new(&config.auth),
            metrics: Arc::new(Metrics::new(MetricsConfig::default())?),
            config,
            backend,
            acl,
            cache,
            tls_acceptor: None,
        })
    }

    /// Create a new server state from config
    pub async fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let backend: Arc<dyn Backend> = match &config.fixture {
            Some(path) => Arc::new(MemoryBackend::load(path).await?),
            None => {
                warn!("No fixture configured, starting with an empty standalone backend");
                Arc::new(MemoryBackend::standalone("local", Default::default()))
            }
        };
        info!(
            "Backend: {} (standalone={})",
            backend.name(),
            backend.is_standalone()
        );

        let tls_acceptor = create_tls_acceptor(&config.tls)?;
        let mut state = Self::new(config, backend)?;
        state.tls_acceptor = tls_acceptor;

        if state.config.acl.enabled {
            let BasicAcl { admins, grants } = &state.config.acl.rules;
            info!("ACL enabled: {} admins, {} grants", admins.len(), grants.len());
        }
        if state.auth.is_enabled() {
            info!("Token authentication enabled for {} users", state.auth.user_count());
        }
        Ok(state)
    }

    /// Drop every cached response
    pub fn invalidate_cache(&self) {
        self.cache.clear();
        self.metrics.record_cache_clear();
    }
}

/// Start the HTTP server
#[instrument(skip(state))]
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr: SocketAddr = state.config.listen_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    let protocol = if state.tls_acceptor.is_some() { "https" } else { "http" };
    info!("Burp-UI API listening on {}://{}", protocol, addr);

    // Sweep expired cache entries
    let state_for_cleanup = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            state_for_cleanup.cache.cleanup();
        }
    });

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            let service = {
                let state = state.clone();
                service_fn(move |req| handle_request(state.clone(), peer_addr, req))
            };
            let builder = auto::Builder::new(TokioExecutor::new());

            let result = match &state.tls_acceptor {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        builder
                            .serve_connection(TokioIo::new(tls_stream), service)
                            .await
                    }
                    Err(e) => {
                        debug!("TLS handshake failed: {:?}", e);
                        return;
                    }
                },
                None => builder.serve_connection(TokioIo::new(stream), service).await,
            };

            if let Err(err) = result {
                error!("Error serving connection: {:?}", err);
            }
        });
    }
}

/// Handle an HTTP request
async fn handle_request(
    state: Arc<ServerState>,
    peer_addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let uri = req.uri().clone();
    debug!("{} {} from {}", method, uri, peer_addr);

    let (authorization, cookie) = {
        let headers = req.headers();
        let get = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        (get(header::AUTHORIZATION), get(header::COOKIE))
    };

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Ok(error_response(ApiError::bad_request("Failed to read request body"))),
    };

    Ok(handle_api(
        &state,
        &method,
        uri.path(),
        uri.query(),
        authorization.as_deref(),
        cookie.as_deref(),
        body,
    )
    .await)
}

/// Authenticate, route and answer one API request
pub async fn handle_api(
    state: &ServerState,
    method: &Method,
    path: &str,
    query: Option<&str>,
    authorization: Option<&str>,
    cookie: Option<&str>,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let start = Instant::now();

    let Some(route) = routes::parse(path) else {
        state
            .metrics
            .record_request("unknown", method.as_str(), 404, start.elapsed().as_secs_f64());
        return error_response(ApiError::not_found("Not found"));
    };
    let endpoint = route.endpoint.name();

    let response = if !route.endpoint.allows(method) {
        error_response(ApiError::method_not_allowed("Method not allowed"))
    } else if route.endpoint == Endpoint::Metrics {
        handle_metrics(state, authorization, cookie)
    } else if route.endpoint.is_public() {
        handle_version(state)
    } else {
        match authenticate(state, authorization, cookie) {
            Ok(identity) => {
                dispatch(state, &identity, method, path, query, route, body).await
            }
            Err(e) => error_response(e),
        }
    };

    let status = response.status().as_u16();
    if status == 500 {
        state.metrics.record_internal_error(endpoint);
    }
    state
        .metrics
        .record_request(endpoint, method.as_str(), status, start.elapsed().as_secs_f64());
    response
}

fn authenticate(
    state: &ServerState,
    authorization: Option<&str>,
    cookie: Option<&str>,
) -> Result<Identity, ApiError> {
    let result = state.auth.authenticate(authorization, cookie);
    if state.auth.is_enabled() {
        state.metrics.record_auth_attempt(result.is_ok());
    }
    result
}

fn parse_form(data: &[u8]) -> Form {
    Form::from_pairs(url::form_urlencoded::parse(data).into_owned())
}

/// Route an authenticated request, going through the cache when the
/// endpoint allows it
async fn dispatch(
    state: &ServerState,
    identity: &Identity,
    method: &Method,
    path: &str,
    query: Option<&str>,
    route: Route,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let args = parse_form(query.unwrap_or("").as_bytes());
    let server = route.server.as_deref().or_else(|| args.get("server"));
    let call = Call::new(state, &identity.username, server);

    if !route.endpoint.is_cacheable() {
        return reply_response(call_endpoint(&call, method, &route.endpoint, &args, &body).await);
    }

    let key = state
        .cache
        .key(method.as_str(), path, query, &identity.username);
    if let Some(cached) = state.cache.get(&key) {
        state.metrics.record_cache(true);
        return bytes_response(StatusCode::OK, cached);
    }
    if state.cache.is_enabled() {
        state.metrics.record_cache(false);
    }

    match call_endpoint(&call, method, &route.endpoint, &args, &body).await {
        Ok(reply) if reply.status == 200 => {
            let body = Bytes::from(serialize(&reply.body));
            state.cache.insert(key, body.clone());
            bytes_response(StatusCode::OK, body)
        }
        result => reply_response(result),
    }
}

async fn call_endpoint(
    call: &Call<'_>,
    method: &Method,
    endpoint: &Endpoint,
    args: &Form,
    body: &[u8],
) -> ApiResult {
    match endpoint {
        Endpoint::RunningClients { client } => {
            clients::running_clients(call, client.as_deref()).await
        }
        Endpoint::RunningBackup => clients::running_backup(call).await,
        Endpoint::ClientsReport => clients::clients_report(call).await,
        Endpoint::ClientsStats => clients::clients_stats(call).await,
        Endpoint::ServerSettings { conf } if method == Method::POST => {
            settings::store_server_config(call, conf.as_deref(), &parse_form(body)).await
        }
        Endpoint::ServerSettings { conf } => settings::server_config(call, conf.as_deref()).await,
        Endpoint::ClientsList => settings::clients_list(call).await,
        Endpoint::ClientSettings { client, conf } if method == Method::POST => {
            settings::store_client_config(call, client, conf.as_deref(), &parse_form(body)).await
        }
        Endpoint::ClientSettings { client, conf } => {
            settings::client_config(call, client, conf.as_deref()).await
        }
        Endpoint::NewClient => {
            let form = parse_form(body);
            let name = args
                .get("newclient")
                .or_else(|| form.get("newclient"))
                .map(str::to_string);
            settings::new_client(call, name.as_deref()).await
        }
        Endpoint::PathExpander { client } => {
            settings::path_expander(call, client.as_deref(), args.get("path")).await
        }
        Endpoint::DeleteClient { client } => {
            settings::delete_client(call, client.as_deref()).await
        }
        Endpoint::Version | Endpoint::Metrics => Err(ApiError::not_found("Not found")),
    }
}

fn handle_version(state: &ServerState) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "backend": state.backend.name(),
            "standalone": state.backend.is_standalone(),
        }),
    )
}

fn handle_metrics(
    state: &ServerState,
    authorization: Option<&str>,
    cookie: Option<&str>,
) -> Response<Full<Bytes>> {
    if !state.config.metrics_public {
        if let Err(e) = authenticate(state, authorization, cookie) {
            return error_response(e);
        }
    }
    let mut response = Response::new(Full::new(Bytes::from(state.metrics.export())));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

// === Response helpers ===

fn serialize(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}

fn bytes_response(status: StatusCode, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

fn json_response<T: serde::Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(data).unwrap_or_else(|_| "{}".to_string());
    bytes_response(status, Bytes::from(json))
}

fn reply_response(result: ApiResult) -> Response<Full<Bytes>> {
    match result {
        Ok(reply) => {
            let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::OK);
            bytes_response(status, Bytes::from(serialize(&reply.body)))
        }
        Err(e) => error_response(e),
    }
}

fn error_response(error: ApiError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!("Request failed: {}", error.message);
    }
    json_response(status, &error)
}
