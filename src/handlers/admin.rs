// src/handlers/admin.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::actor::Actor,
    models::rows::{AdminTransaction, TransactionPage},
    services::{
        admin_service::{ListQuery, TransactionPatch},
        AdminService,
    },
};

// Rotas administrativas: leitura paginada e mutação guardada de transações.
// A autorização (bearer/x-admin-key) fica no middleware admin_guard; aqui só
// chega requisição autorizada.

fn admin_service(app_state: &AppState) -> Result<&AdminService, AppError> {
    app_state
        .admin_service
        .as_ref()
        .ok_or(AppError::ServiceUnconfigured("storage"))
}

fn required_workspace(workspace_id: &Option<String>) -> Result<&str, AppError> {
    workspace_id
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AppError::validation("workspaceId é obrigatório."))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[param(example = "meu-workspace")]
    pub workspace_id: Option<String>,

    #[param(example = "2025-03")]
    pub month: Option<String>,

    #[param(example = "expense")]
    pub kind: Option<String>,

    pub category_id: Option<String>,
    pub card_id: Option<String>,

    #[param(example = "pending")]
    pub status: Option<String>,

    // Texto livre sobre descrição e pessoa
    pub q: Option<String>,

    #[param(example = 50)]
    pub limit: Option<i64>,

    // Offset numérico opaco; ausente = início
    pub cursor: Option<i64>,
}

// GET /api/admin/transactions
#[utoipa::path(
    get,
    path = "/api/admin/transactions",
    tag = "Admin",
    params(ListParams),
    responses(
        (status = 200, description = "Página de transações com flags derivadas", body = TransactionPage),
        (status = 400, description = "Parâmetros inválidos"),
        (status = 401, description = "Credencial administrativa inválida"),
        (status = 503, description = "Storage ou segredo administrativo não configurado")
    ),
    security(("admin_secret" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = required_workspace(&params.workspace_id)?;
    let page = admin_service(&app_state)?
        .list_transactions(
            workspace_key,
            ListQuery {
                month: params.month,
                kind: params.kind,
                status: params.status,
                category_id: params.category_id,
                card_id: params.card_id,
                q: params.q,
                limit: params.limit,
                cursor: params.cursor,
            },
        )
        .await?;
    Ok((StatusCode::OK, Json(page)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceParam {
    #[param(example = "meu-workspace")]
    pub workspace_id: Option<String>,
}

// Campos mutáveis de uma transação; só os presentes são aplicados.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionPayload {
    #[schema(example = "150.00")]
    pub amount: Option<Decimal>,

    #[schema(example = "2025-03-14")]
    pub date: Option<String>,

    #[schema(example = "2025-03")]
    pub competence_month: Option<String>,

    #[schema(example = "paid")]
    pub status: Option<String>,

    pub description: Option<String>,
    pub person_id: Option<String>,
    pub category_id: Option<String>,
    pub card_id: Option<String>,
}

// PATCH /api/admin/transactions/{id}
#[utoipa::path(
    patch,
    path = "/api/admin/transactions/{id}",
    tag = "Admin",
    request_body = UpdateTransactionPayload,
    params(
        ("id" = String, Path, description = "ID da transação (local ou substituto)"),
        WorkspaceParam,
        ("x-device-id" = String, Header, description = "Dispositivo do ator")
    ),
    responses(
        (status = 200, description = "Linha após a atualização", body = AdminTransaction),
        (status = 400, description = "Patch vazio ou campo inválido"),
        (status = 401, description = "Credencial administrativa inválida"),
        (status = 404, description = "Transação não encontrada"),
        (status = 503, description = "Storage ou segredo administrativo não configurado")
    ),
    security(("admin_secret" = []))
)]
pub async fn update_transaction(
    State(app_state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Query(params): Query<WorkspaceParam>,
    Json(payload): Json<UpdateTransactionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = required_workspace(&params.workspace_id)?;
    let patch = TransactionPatch {
        amount: payload.amount,
        date: payload.date,
        competence_month: payload.competence_month,
        status: payload.status,
        description: payload.description,
        person_id: payload.person_id,
        category_id: payload.category_id,
        card_id: payload.card_id,
    };
    let row = admin_service(&app_state)?
        .patch_transaction(workspace_key, &id, patch, &actor)
        .await?;
    Ok((StatusCode::OK, Json(AdminTransaction::from(row))))
}

// DELETE /api/admin/transactions/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/transactions/{id}",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "ID da transação (local ou substituto)"),
        WorkspaceParam,
        ("x-device-id" = String, Header, description = "Dispositivo do ator")
    ),
    responses(
        (status = 200, description = "Linha com o timestamp de deleção", body = AdminTransaction),
        (status = 401, description = "Credencial administrativa inválida"),
        (status = 404, description = "Transação não encontrada"),
        (status = 503, description = "Storage ou segredo administrativo não configurado")
    ),
    security(("admin_secret" = []))
)]
pub async fn delete_transaction(
    State(app_state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Query(params): Query<WorkspaceParam>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = required_workspace(&params.workspace_id)?;
    let row = admin_service(&app_state)?
        .delete_transaction(workspace_key, &id, &actor)
        .await?;
    Ok((StatusCode::OK, Json(AdminTransaction::from(row))))
}

// POST /api/admin/transactions/{id}/restore
#[utoipa::path(
    post,
    path = "/api/admin/transactions/{id}/restore",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "ID da transação (local ou substituto)"),
        WorkspaceParam,
        ("x-device-id" = String, Header, description = "Dispositivo do ator")
    ),
    responses(
        (status = 200, description = "Linha com o marcador de deleção limpo", body = AdminTransaction),
        (status = 401, description = "Credencial administrativa inválida"),
        (status = 404, description = "Transação não encontrada"),
        (status = 503, description = "Storage ou segredo administrativo não configurado")
    ),
    security(("admin_secret" = []))
)]
pub async fn restore_transaction(
    State(app_state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    Query(params): Query<WorkspaceParam>,
) -> Result<impl IntoResponse, AppError> {
    let workspace_key = required_workspace(&params.workspace_id)?;
    let row = admin_service(&app_state)?
        .restore_transaction(workspace_key, &id, &actor)
        .await?;
    Ok((StatusCode::OK, Json(AdminTransaction::from(row))))
}
