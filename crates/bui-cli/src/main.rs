use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use reqwest::{Client, Method, Url};

#[derive(Parser)]
#[command(name = "bui", version, about = "Burp-UI API CLI")]
struct Cli {
    /// API base URL (e.g. http://localhost:5000)
    #[arg(long, env = "BUI_API_URL", default_value = "http://127.0.0.1:5000")]
    url: String,
    /// API token
    #[arg(long, env = "BUI_API_TOKEN")]
    token: Option<String>,
    /// Target burp server (multi-agent deployments)
    #[arg(long, env = "BUI_SERVER")]
    server: Option<String>,
    /// Allow invalid TLS certificates
    #[arg(long)]
    insecure: bool,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// Print raw response body
    #[arg(long)]
    raw: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Clients running a backup
    Running(RunningArgs),
    /// Status of every visible client
    Clients,
    /// Backup report of every visible client
    Report,
    /// Show or update the server configuration
    ServerConfig(ServerConfigArgs),
    /// Show or update a client configuration
    ClientConfig(ClientConfigArgs),
    /// Create a client
    NewClient { name: String },
    /// Remove a client
    DeleteClient { name: String },
    /// Expand a path template on the server
    Expand(ExpandArgs),
}

#[derive(Args)]
struct RunningArgs {
    /// Only ask about this client
    client: Option<String>,
    /// Only report whether any backup is running
    #[arg(long, conflicts_with = "client")]
    any: bool,
}

#[derive(Args)]
struct ServerConfigArgs {
    /// Included configuration file (absolute path)
    #[arg(long)]
    conf: Option<String>,
    /// Settings to store, as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Args)]
struct ClientConfigArgs {
    client: String,
    #[arg(long)]
    conf: Option<String>,
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

#[derive(Args)]
struct ExpandArgs {
    path: String,
    /// Expand relative to this client
    #[arg(long)]
    client: Option<String>,
}

/// An API call, before it is bound to a base URL
#[derive(Debug, PartialEq)]
struct ApiCall {
    method: Method,
    namespace: &'static str,
    segments: Vec<String>,
    query: Vec<(&'static str, String)>,
    form: Vec<(String, String)>,
}

impl ApiCall {
    fn new(method: Method, namespace: &'static str, server: Option<&str>) -> Self {
        Self {
            method,
            namespace,
            segments: server.map(str::to_string).into_iter().collect(),
            query: Vec::new(),
            form: Vec::new(),
        }
    }

    fn get(namespace: &'static str, server: Option<&str>) -> Self {
        Self::new(Method::GET, namespace, server)
    }

    fn segment(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    fn query(mut self, key: &'static str, value: &str) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    /// Turn the call into a POST carrying `key=value` settings
    fn settings(mut self, settings: &[String]) -> Result<Self> {
        if settings.is_empty() {
            return Ok(self);
        }
        for setting in settings {
            let (key, value) = setting
                .split_once('=')
                .ok_or_else(|| anyhow!("invalid setting '{}', expected KEY=VALUE", setting))?;
            self.form.push((key.to_string(), value.to_string()));
        }
        self.method = Method::POST;
        Ok(self)
    }

    fn url(&self, base: &str) -> Result<Url> {
        let mut url = Url::parse(base).with_context(|| format!("invalid API URL {}", base))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow!("API URL cannot be a base: {}", base))?;
            path.pop_if_empty().push("api").push(self.namespace);
            for segment in &self.segments {
                path.push(segment);
            }
        }
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

fn build_call(command: Command, server: Option<&str>) -> Result<ApiCall> {
    let call = match command {
        Command::Running(args) if args.any => ApiCall::get("clients", server).segment("running.json"),
        Command::Running(args) => {
            let call = ApiCall::get("clients", server).segment("running-clients.json");
            match args.client {
                Some(client) => call.segment(&client),
                None => call,
            }
        }
        Command::Clients => ApiCall::get("clients", server).segment("clients.json"),
        Command::Report => ApiCall::get("clients", server).segment("clients-report.json"),
        Command::ServerConfig(args) => {
            let call = ApiCall::get("settings", server).segment("server-config");
            let call = match args.conf {
                Some(conf) => call.segment(&conf),
                None => call,
            };
            call.settings(&args.set)?
        }
        Command::ClientConfig(args) => {
            let call = ApiCall::get("settings", server)
                .segment("client")
                .segment(&args.client)
                .segment("config");
            let call = match args.conf {
                Some(conf) => call.segment(&conf),
                None => call,
            };
            call.settings(&args.set)?
        }
        Command::NewClient { name } => ApiCall::new(Method::PUT, "settings", server)
            .segment("new-client")
            .query("newclient", &name),
        Command::DeleteClient { name } => ApiCall::new(Method::DELETE, "settings", server)
            .segment("delete-client")
            .segment(&name),
        Command::Expand(args) => {
            let call = ApiCall::get("settings", server).segment("path-expander");
            let call = match args.client {
                Some(client) => call.segment(&client),
                None => call,
            };
            call.query("path", &args.path)
        }
    };
    Ok(call)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = build_client(cli.insecure, cli.timeout)?;
    let call = build_call(cli.command, cli.server.as_deref())?;
    send_and_print(&client, &cli.url, &call, cli.token.as_deref(), cli.raw).await
}

fn build_client(insecure: bool, timeout_secs: u64) -> Result<Client> {
    let timeout = Duration::from_secs(timeout_secs);
    let builder = Client::builder().timeout(timeout);
    if insecure {
        Ok(builder.danger_accept_invalid_certs(true).build()?)
    } else {
        Ok(builder.build()?)
    }
}

async fn send_and_print(
    client: &Client,
    base: &str,
    call: &ApiCall,
    token: Option<&str>,
    raw: bool,
) -> Result<()> {
    let url = call.url(base)?;
    let mut request = client.request(call.method.clone(), url);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    if !call.form.is_empty() {
        request = request.form(&call.form);
    }

    let response = request.send().await.context("request failed")?;
    let status = response.status();
    let body = response.text().await.context("failed to read body")?;
    if !status.is_success() {
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        return Err(anyhow!("HTTP {}: {}", status, message));
    }

    if raw {
        println!("{}", body);
        return Ok(());
    }

    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        Err(_) => {
            println!("{}", body);
            Ok(())
        }
    }
}
