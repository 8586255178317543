//! Clients namespace: running state, status lists and reports

use serde_json::json;

use crate::api::Call;
use crate::filter::{allowed_items, filter_running, require_server};
use crate::protocol::{ApiResult, Reply};

/// Clients currently running a backup, optionally scoped to one client.
///
/// Asking about a client the caller may not see yields an empty list so the
/// client's existence is not disclosed.
pub async fn running_clients(call: &Call<'_>, client: Option<&str>) -> ApiResult {
    if let Some(client) = client {
        let acl = call.acl();
        if !acl.is_admin(call.user) && !acl.is_client_allowed(call.user, client, call.server) {
            return Ok(Reply::ok(json!([])));
        }
        let running = call.backend().is_backup_running(client, call.server).await?;
        let body = if running { json!([client]) } else { json!([]) };
        return Ok(Reply::ok(body));
    }

    let running = call.backend().is_one_backup_running(call.server).await?;
    let running = filter_running(call.acl(), call.user, running, call.server);
    Reply::json(&running)
}

/// Whether at least one visible client is running a backup
pub async fn running_backup(call: &Call<'_>) -> ApiResult {
    let running = call.backend().is_one_backup_running(call.server).await?;
    let running = filter_running(call.acl(), call.user, running, call.server);
    Ok(Reply::ok(json!({ "running": running.any_running() })))
}

/// Report about every client the caller may see
pub async fn clients_report(call: &Call<'_>) -> ApiResult {
    let backend = call.backend();
    require_server(call.acl(), call.user, call.server, backend.is_standalone())?;

    let clients = backend.get_all_clients(call.server).await?;
    let clients = allowed_items(call.acl(), call.user, call.server, clients, |c| c.name.as_str());
    let report = backend.get_clients_report(&clients, call.server).await?;
    Reply::json(&report)
}

/// Status of every client the caller may see
pub async fn clients_stats(call: &Call<'_>) -> ApiResult {
    let backend = call.backend();
    require_server(call.acl(), call.user, call.server, backend.is_standalone())?;

    let clients = backend.get_all_clients(call.server).await?;
    let clients = allowed_items(call.acl(), call.user, call.server, clients, |c| c.name.as_str());
    Reply::json(&clients)
}
