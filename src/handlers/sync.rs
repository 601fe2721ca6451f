// src/handlers/sync.rs

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{actor::Actor, auth::verify_sync_auth},
    models::ledger::LedgerState,
    services::SyncService,
};

// Todos os campos do payload são opcionais na desserialização: a checagem de
// presença é nossa, para ausência virar 400 com mensagem, nunca uma rejeição
// genérica do extrator.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    #[serde(default)]
    #[schema(example = "meu-workspace")]
    pub workspace_id: Option<String>,

    // Validado e tipado manualmente; o shape inválido é 400
    #[serde(default)]
    #[schema(value_type = Object)]
    pub state: Option<Value>,

    #[serde(default)]
    #[schema(example = 3)]
    pub schema_version: Option<i64>,

    #[serde(default)]
    #[schema(example = 7)]
    pub revision: Option<i64>,

    // Alternativa ao cabeçalho x-device-id
    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub state: LedgerState,
    #[schema(example = "2025-06-01T12:00:00.000Z")]
    pub server_updated_at: String,
    #[schema(example = 8)]
    pub revision: i64,
}

fn sync_service(app_state: &AppState) -> Result<&SyncService, AppError> {
    app_state
        .sync_service
        .as_ref()
        .ok_or(AppError::ServiceUnconfigured("storage"))
}

// POST /api/sync
#[utoipa::path(
    post,
    path = "/api/sync",
    tag = "Sync",
    request_body = SyncPayload,
    responses(
        (status = 200, description = "Estado combinado e revisão nova", body = SyncResponse),
        (status = 400, description = "Workspace, ator ou estado inválido"),
        (status = 401, description = "Assinatura ou chave de sincronização inválida"),
        (status = 409, description = "Revisão desatualizada; rebuscar e reenviar"),
        (status = 503, description = "Storage ou segredo de sincronização não configurado")
    ),
    params(
        ("x-device-id" = Option<String>, Header, description = "Dispositivo do ator (ou deviceId no corpo)"),
        ("x-sync-signature" = Option<String>, Header, description = "HMAC-SHA256 da chave do workspace"),
        ("x-sync-key" = Option<String>, Header, description = "Chave estática compartilhada")
    )
)]
pub async fn sync(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SyncPayload>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = payload
        .workspace_id
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::validation("workspaceId é obrigatório."))?;

    // A assinatura cobre a chave do workspace, então a autorização só pode
    // acontecer depois de ler o corpo
    verify_sync_auth(&app_state.secrets, &headers, workspace_key)?;
    let actor = Actor::resolve(&headers, payload.device_id.clone(), payload.user_id.clone())?;

    let state_value = payload
        .state
        .ok_or_else(|| AppError::validation("state é obrigatório."))?;
    let state: LedgerState = serde_json::from_value(state_value)
        .map_err(|e| AppError::validation(format!("Formato de estado inválido: {e}")))?;

    let outcome = sync_service(&app_state)?
        .sync(
            workspace_key,
            state,
            payload.schema_version,
            payload.revision,
            &actor,
        )
        .await?;

    Ok((
        StatusCode::OK,
        Json(SyncResponse {
            state: outcome.state,
            server_updated_at: outcome.server_updated_at,
            revision: outcome.revision,
        }),
    ))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PullParams {
    #[param(example = "meu-workspace")]
    pub workspace_id: Option<String>,
}

// GET /api/sync
#[utoipa::path(
    get,
    path = "/api/sync",
    tag = "Sync",
    params(
        PullParams,
        ("x-sync-signature" = Option<String>, Header, description = "HMAC-SHA256 da chave do workspace"),
        ("x-sync-key" = Option<String>, Header, description = "Chave estática compartilhada")
    ),
    responses(
        (status = 200, description = "Estado guardado e revisão atual", body = SyncResponse),
        (status = 401, description = "Assinatura ou chave de sincronização inválida"),
        (status = 404, description = "Workspace nunca sincronizou"),
        (status = 503, description = "Storage ou segredo de sincronização não configurado")
    )
)]
pub async fn pull(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PullParams>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = params
        .workspace_id
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::validation("workspaceId é obrigatório."))?;

    verify_sync_auth(&app_state.secrets, &headers, workspace_key)?;

    let outcome = sync_service(&app_state)?.pull(workspace_key).await?;
    Ok((
        StatusCode::OK,
        Json(SyncResponse {
            state: outcome.state,
            server_updated_at: outcome.server_updated_at,
            revision: outcome.revision,
        }),
    ))
}
