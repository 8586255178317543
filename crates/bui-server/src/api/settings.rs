//! Settings namespace: configuration editing and client roster management.
//!
//! Everything here except the raw client list is reserved to administrators.

use bui_core::{ConfigScope, Form, Notification, ParserAttr};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::{json, Map, Value};
use tracing::info;

use crate::api::Call;
use crate::filter::require_admin;
use crate::protocol::{ApiError, ApiResult, Reply};

/// Characters escaped in generated links
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Bundle configuration values with the parser schema so a UI can render
/// an editable form in one round trip
async fn config_bundle(call: &Call<'_>, scope: ConfigScope, results: Value) -> ApiResult {
    let backend = call.backend();
    let mut bundle = Map::new();
    bundle.insert("results".to_string(), results);

    let [boolean, string, integer, multi] = scope.typed_attrs();
    let attrs = [
        ("boolean", boolean),
        ("string", string),
        ("integer", integer),
        ("multi", multi),
        ("server_doc", ParserAttr::Doc),
        ("suggest", ParserAttr::Values),
        ("placeholders", ParserAttr::Placeholders),
        ("defaults", ParserAttr::Defaults),
    ];
    for (key, attr) in attrs {
        let value = backend.get_parser_attr(attr, call.server).await?;
        bundle.insert(key.to_string(), value);
    }

    Ok(Reply::ok(Value::Object(bundle)))
}

fn to_value<T: serde::Serialize>(data: &T) -> Result<Value, ApiError> {
    serde_json::to_value(data).map_err(|e| ApiError::internal(&e.to_string()))
}

fn notif_reply(notifs: &[Notification]) -> ApiResult {
    Ok(Reply::ok(json!({ "notif": to_value(&notifs)? })))
}

/// Server configuration with its schema
pub async fn server_config(call: &Call<'_>, conf: Option<&str>) -> ApiResult {
    require_admin(call.acl(), call.user)?;
    let results = call.backend().read_conf_srv(conf, call.server).await?;
    config_bundle(call, ConfigScope::Server, to_value(&results)?).await
}

/// Store a submitted server configuration
pub async fn store_server_config(call: &Call<'_>, conf: Option<&str>, form: &Form) -> ApiResult {
    require_admin(call.acl(), call.user)?;
    let notifs = call.backend().store_conf_srv(form, conf, call.server).await?;
    notif_reply(&notifs)
}

/// Raw client roster
pub async fn clients_list(call: &Call<'_>) -> ApiResult {
    let clients = call.backend().clients_list(call.server).await?;
    Ok(Reply::ok(json!({ "result": to_value(&clients)? })))
}

/// Client configuration with its schema
pub async fn client_config(call: &Call<'_>, client: &str, conf: Option<&str>) -> ApiResult {
    require_admin(call.acl(), call.user)?;
    let results = call.backend().read_conf_cli(client, conf, call.server).await?;
    config_bundle(call, ConfigScope::Client, to_value(&results)?).await
}

/// Store a submitted client configuration
pub async fn store_client_config(
    call: &Call<'_>,
    client: &str,
    conf: Option<&str>,
    form: &Form,
) -> ApiResult {
    require_admin(call.acl(), call.user)?;
    let notifs = call
        .backend()
        .store_conf_cli(form, client, conf, call.server)
        .await?;
    notif_reply(&notifs)
}

/// Link to the configuration editor of a client
pub fn client_settings_link(server: Option<&str>, client: &str) -> String {
    let client = utf8_percent_encode(client, PATH_SEGMENT);
    match server {
        Some(server) => format!(
            "/settings/{}/client/{}",
            utf8_percent_encode(server, PATH_SEGMENT),
            client
        ),
        None => format!("/settings/client/{}", client),
    }
}

/// Create a client with an empty configuration
pub async fn new_client(call: &Call<'_>, name: Option<&str>) -> ApiResult {
    require_admin(call.acl(), call.user)?;

    let name = match name {
        Some(n) if !n.is_empty() => n,
        _ => return Err(ApiError::bad_request("No client name provided")),
    };

    let backend = call.backend();
    let clients = backend.clients_list(call.server).await?;
    if clients.iter().any(|c| c.name == name) {
        return Err(ApiError::conflict(&format!(
            "Client '{}' already exists",
            name
        )));
    }

    let mut notifs = backend
        .store_conf_cli(&Form::new(), name, None, call.server)
        .await?;
    notifs.push(Notification::info(format!(
        "<a href=\"{}\">Click here</a> to edit '{}' configuration",
        client_settings_link(call.server, name),
        name
    )));

    call.state.invalidate_cache();
    info!("Client {} created by {}", name, call.user);
    Ok(Reply::created(json!({ "notif": to_value(&notifs)? })))
}

/// Expand a path template on the server.
///
/// No match at all is reported as an internal failure.
pub async fn path_expander(call: &Call<'_>, client: Option<&str>, path: Option<&str>) -> ApiResult {
    require_admin(call.acl(), call.user)?;

    let path = path.ok_or_else(|| ApiError::bad_request("No path provided"))?;
    let paths = call.backend().expand_path(path, client, call.server).await?;
    if paths.is_empty() {
        return Err(ApiError::internal("Path not found"));
    }
    Ok(Reply::ok(json!({ "result": paths })))
}

/// Remove a client
pub async fn delete_client(call: &Call<'_>, client: Option<&str>) -> ApiResult {
    require_admin(call.acl(), call.user)?;

    let notifs = call.backend().delete_client(client, call.server).await?;
    call.state.invalidate_cache();
    info!("Client {} deleted by {}", client.unwrap_or("<none>"), call.user);
    notif_reply(&notifs)
}
