// src/services/admin_service.rs

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::common::error::AppError;
use crate::db::LedgerStore;
use crate::middleware::actor::Actor;
use crate::models::audit::{AuditAction, AuditEvent};
use crate::models::rows::{AdminTransaction, TransactionFilter, TransactionPage, TransactionRow};
use crate::services::audit_service::AuditService;
use crate::sync::identity::{self, NS_CARD, NS_CATEGORY, NS_TRANSACTION};
use crate::sync::temporal;

// Surface administrativo: leitura paginada/filtrada das linhas achatadas e
// mutação guardada de uma transação por vez, sempre com auditoria
// antes/depois.

const DEFAULT_PAGE_SIZE: i64 = 50;
// Teto fixo, independente do que o chamador pedir
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub month: Option<String>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<String>,
    pub card_id: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

// Patch parcial: só campos explicitamente presentes são aplicados.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub amount: Option<Decimal>,
    pub date: Option<String>,
    pub competence_month: Option<String>,
    pub status: Option<String>,
    pub description: Option<String>,
    pub person_id: Option<String>,
    pub category_id: Option<String>,
    pub card_id: Option<String>,
}

impl TransactionPatch {
    pub fn is_empty(&self) -> bool {
        self.amount.is_none()
            && self.date.is_none()
            && self.competence_month.is_none()
            && self.status.is_none()
            && self.description.is_none()
            && self.person_id.is_none()
            && self.category_id.is_none()
            && self.card_id.is_none()
    }
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn LedgerStore>,
    audit: AuditService,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl AdminService {
    pub fn new(store: Arc<dyn LedgerStore>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    fn workspace(&self, workspace_key: &str) -> Result<uuid::Uuid, AppError> {
        if workspace_key.trim().is_empty() {
            return Err(AppError::validation("workspaceId é obrigatório."));
        }
        Ok(identity::workspace_id(workspace_key))
    }

    pub async fn list_transactions(
        &self,
        workspace_key: &str,
        query: ListQuery,
    ) -> Result<TransactionPage, AppError> {
        let workspace_id = self.workspace(workspace_key)?;

        let limit = query
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = query.cursor.unwrap_or(0).max(0);

        let month = match non_empty(query.month) {
            Some(raw) => Some(temporal::to_month_start(&raw).ok_or_else(|| {
                AppError::validation(format!("Mês inválido \"{raw}\"."))
            })?),
            None => None,
        };

        let filter = TransactionFilter {
            month,
            kind: non_empty(query.kind),
            status: non_empty(query.status),
            category_id: non_empty(query.category_id)
                .map(|c| identity::resolve(NS_CATEGORY, workspace_id, &c)),
            card_id: non_empty(query.card_id)
                .map(|c| identity::resolve(NS_CARD, workspace_id, &c)),
            q: non_empty(query.q),
            // Busca um a mais para saber se existe próxima página
            limit: limit + 1,
            offset,
        };

        let mut rows = self.store.list_transactions(workspace_id, &filter).await?;
        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            Some(offset + limit)
        } else {
            None
        };

        Ok(TransactionPage {
            data: rows.into_iter().map(AdminTransaction::from).collect(),
            next_cursor,
        })
    }

    pub async fn patch_transaction(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        patch: TransactionPatch,
        actor: &Actor,
    ) -> Result<TransactionRow, AppError> {
        self.patch_transaction_at(workspace_key, transaction_id, patch, actor, Utc::now())
            .await
    }

    pub async fn patch_transaction_at(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        patch: TransactionPatch,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransactionRow, AppError> {
        // Patch vazio é erro do cliente, não um no-op aceito em silêncio
        if patch.is_empty() {
            return Err(AppError::validation(
                "Nenhum campo reconhecido para atualizar.",
            ));
        }
        let workspace_id = self.workspace(workspace_key)?;
        let id = identity::resolve(NS_TRANSACTION, workspace_id, transaction_id);

        let before = self
            .store
            .get_transaction(workspace_id, id)
            .await?
            .ok_or(AppError::NotFound("Transação"))?;
        let mut after = before.clone();

        if let Some(amount) = patch.amount {
            if amount < Decimal::ZERO {
                return Err(AppError::validation("Valor não pode ser negativo."));
            }
            after.amount = amount;
        }
        if let Some(raw) = &patch.date {
            after.date = temporal::to_calendar_date(raw)
                .ok_or_else(|| AppError::validation(format!("Data inválida \"{raw}\".")))?;
        }
        if let Some(raw) = &patch.competence_month {
            after.competence_month = temporal::to_month_start(raw).ok_or_else(|| {
                AppError::validation(format!("Mês de competência inválido \"{raw}\"."))
            })?;
        }
        if let Some(status) = &patch.status {
            match status.as_str() {
                "pending" | "paid" => after.status = status.clone(),
                other => {
                    return Err(AppError::validation(format!(
                        "Status inválido \"{other}\" (esperado pending ou paid)."
                    )));
                }
            }
        }
        if let Some(description) = patch.description {
            after.description = Some(description);
        }
        if let Some(person_id) = patch.person_id {
            after.person_id = Some(person_id);
        }
        if let Some(category) = &patch.category_id {
            after.category_id = Some(identity::resolve(NS_CATEGORY, workspace_id, category));
        }
        if let Some(card) = &patch.card_id {
            after.card_id = Some(identity::resolve(NS_CARD, workspace_id, card));
        }
        after.updated_at = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));

        self.write_and_audit(workspace_id, before, after, AuditAction::Update, actor, now)
            .await
    }

    pub async fn delete_transaction(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        actor: &Actor,
    ) -> Result<TransactionRow, AppError> {
        self.delete_transaction_at(workspace_key, transaction_id, actor, Utc::now())
            .await
    }

    // Soft-delete: carimba o timestamp de deleção; a linha nunca some.
    pub async fn delete_transaction_at(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransactionRow, AppError> {
        let workspace_id = self.workspace(workspace_key)?;
        let id = identity::resolve(NS_TRANSACTION, workspace_id, transaction_id);
        let before = self
            .store
            .get_transaction(workspace_id, id)
            .await?
            .ok_or(AppError::NotFound("Transação"))?;

        let now_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut after = before.clone();
        after.deleted_at = Some(now_iso.clone());
        after.updated_at = Some(now_iso);

        self.write_and_audit(workspace_id, before, after, AuditAction::Delete, actor, now)
            .await
    }

    pub async fn restore_transaction(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        actor: &Actor,
    ) -> Result<TransactionRow, AppError> {
        self.restore_transaction_at(workspace_key, transaction_id, actor, Utc::now())
            .await
    }

    pub async fn restore_transaction_at(
        &self,
        workspace_key: &str,
        transaction_id: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransactionRow, AppError> {
        let workspace_id = self.workspace(workspace_key)?;
        let id = identity::resolve(NS_TRANSACTION, workspace_id, transaction_id);
        let before = self
            .store
            .get_transaction(workspace_id, id)
            .await?
            .ok_or(AppError::NotFound("Transação"))?;

        let mut after = before.clone();
        after.deleted_at = None;
        after.updated_at = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));

        self.write_and_audit(workspace_id, before, after, AuditAction::Restore, actor, now)
            .await
    }

    // Escreve a linha e grava a auditoria em seguida. Se a auditoria falhar,
    // a mutação já está durável, mas a requisição falha mesmo assim (lacuna
    // documentada, registrada pelo AuditService).
    async fn write_and_audit(
        &self,
        workspace_id: uuid::Uuid,
        before: TransactionRow,
        after: TransactionRow,
        action: AuditAction,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransactionRow, AppError> {
        self.store.save_transaction(&after).await?;

        let event = AuditEvent::new(
            workspace_id,
            "transaction",
            Some(after.id.to_string()),
            action,
            Some(serde_json::to_value(&before).map_err(anyhow::Error::from)?),
            Some(serde_json::to_value(&after).map_err(anyhow::Error::from)?),
            actor.device_id.clone(),
            actor.user_id.clone(),
            now,
        );
        self.audit.record(event).await?;

        Ok(after)
    }
}
