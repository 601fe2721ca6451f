// src/docs.rs

use utoipa::openapi::security::{ApiKey, ApiKeyValue, Http, HttpAuthScheme, SecurityScheme};
use utoipa::OpenApi;

use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Sync ---
        handlers::sync::sync,
        handlers::sync::pull,

        // --- Admin ---
        handlers::admin::list_transactions,
        handlers::admin::update_transaction,
        handlers::admin::delete_transaction,
        handlers::admin::restore_transaction,
    ),
    components(
        schemas(
            // --- Estado do cliente ---
            models::ledger::LedgerState,
            models::ledger::Transaction,
            models::ledger::Card,
            models::ledger::InstallmentPlan,
            models::ledger::InstallmentRef,
            models::ledger::Direction,
            models::ledger::TransactionKind,
            models::ledger::PaymentMethod,
            models::ledger::TransactionStatus,
            models::ledger::PlanStatus,

            // --- Linhas achatadas ---
            models::rows::TransactionRow,
            models::rows::AdminTransaction,
            models::rows::TransactionPage,

            // --- Payloads ---
            handlers::sync::SyncPayload,
            handlers::sync::SyncResponse,
            handlers::admin::UpdateTransactionPayload,
        )
    ),
    tags(
        (name = "Sync", description = "Sincronização offline-first do ledger por workspace"),
        (name = "Admin", description = "Leitura e correção administrativa das transações")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "admin_secret",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        components.add_security_scheme(
            "admin_key_header",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-key"))),
        );
    }
}
