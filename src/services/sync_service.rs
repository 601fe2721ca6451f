// src/services/sync_service.rs

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;

use crate::common::error::AppError;
use crate::db::{LedgerStore, SyncCommit};
use crate::middleware::actor::Actor;
use crate::models::audit::{AuditAction, AuditEvent};
use crate::models::ledger::{LedgerState, PaymentMethod};
use crate::models::rows::WorkspaceRecord;
use crate::sync::{identity, merge, project, revision, temporal};

// Orquestra um sync completo: valida e normaliza a entrada, aplica a guarda
// de revisão, combina com o estado guardado, projeta as linhas achatadas e
// commita tudo em escritas sequenciadas.

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub state: LedgerState,
    pub revision: i64,
    pub server_updated_at: String,
}

#[derive(Clone)]
pub struct SyncService {
    store: Arc<dyn LedgerStore>,
}

impl SyncService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Leitura do estado guardado, para o cliente buscar a base antes de um
    /// sync (e rebuscar depois de um 409).
    pub async fn pull(&self, workspace_key: &str) -> Result<SyncOutcome, AppError> {
        if workspace_key.trim().is_empty() {
            return Err(AppError::validation("workspaceId é obrigatório."));
        }
        let workspace_id = identity::workspace_id(workspace_key);
        let record = self
            .store
            .load_workspace(workspace_id)
            .await?
            .ok_or(AppError::NotFound("Workspace"))?;
        Ok(SyncOutcome {
            state: record.state,
            revision: record.revision,
            server_updated_at: record.updated_at,
        })
    }

    pub async fn sync(
        &self,
        workspace_key: &str,
        incoming: LedgerState,
        schema_version: Option<i64>,
        requested_revision: Option<i64>,
        actor: &Actor,
    ) -> Result<SyncOutcome, AppError> {
        self.sync_at(
            workspace_key,
            incoming,
            schema_version,
            requested_revision,
            actor,
            Utc::now(),
        )
        .await
    }

    // `now` injetado: todo timestamp que o merge e o projetor carimbam sai
    // daqui, e os testes ficam determinísticos.
    pub async fn sync_at(
        &self,
        workspace_key: &str,
        incoming: LedgerState,
        schema_version: Option<i64>,
        requested_revision: Option<i64>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, AppError> {
        if workspace_key.trim().is_empty() {
            return Err(AppError::validation("workspaceId é obrigatório."));
        }
        validate_state(&incoming)?;

        let now_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let workspace_id = identity::workspace_id(workspace_key);

        let stored = self.store.load_workspace(workspace_id).await?;
        let (stored_state, stored_revision, stored_updated_at) = match &stored {
            Some(record) => (Some(&record.state), record.revision, record.updated_at.clone()),
            None => (None, 0, now_iso.clone()),
        };

        // Revisão desatualizada nunca chega ao merge: o conflito volta com a
        // revisão atual e o estado guardado fica intacto.
        revision::check_revision(stored_revision, requested_revision, &stored_updated_at)?;

        let merged = merge::merge_states(stored_state, &incoming, now, schema_version);
        let rows = project::project(&merged, workspace_key, &now_iso);
        let new_revision = stored_revision + 1;

        let before = match &stored {
            Some(record) => {
                Some(serde_json::to_value(&record.state).map_err(anyhow::Error::from)?)
            }
            None => None,
        };
        let after = serde_json::to_value(&merged).map_err(anyhow::Error::from)?;
        let audit = AuditEvent::new(
            workspace_id,
            "workspace",
            Some(workspace_key.to_string()),
            AuditAction::Sync,
            before,
            Some(after),
            actor.device_id.clone(),
            actor.user_id.clone(),
            now,
        );

        let commit = SyncCommit {
            workspace: WorkspaceRecord {
                id: workspace_id,
                workspace_key: workspace_key.to_string(),
                state: merged.clone(),
                revision: new_revision,
                schema_version: merged.schema_version,
                updated_at: now_iso.clone(),
            },
            rows,
            audit,
        };
        self.store.commit_sync(commit).await?;

        tracing::info!(
            "Sync aceito: workspace={} revisão={} transações={}",
            workspace_key,
            new_revision,
            merged.transactions.len()
        );

        Ok(SyncOutcome {
            state: merged,
            revision: new_revision,
            server_updated_at: now_iso,
        })
    }
}

// Tipos malformados são rejeitados aqui, antes da projeção; referência
// ausente NÃO é tipo malformado: degrada para placeholder lá no projetor.
fn validate_state(state: &LedgerState) -> Result<(), AppError> {
    for tx in &state.transactions {
        if temporal::to_calendar_date(&tx.date).is_none() {
            return Err(AppError::validation(format!(
                "Transação {}: data inválida \"{}\".",
                tx.id, tx.date
            )));
        }
        if let Some(month) = tx.competence_month.as_deref() {
            if temporal::to_month_start(month).is_none() {
                return Err(AppError::validation(format!(
                    "Transação {}: mês de competência inválido \"{month}\".",
                    tx.id
                )));
            }
        }
        if tx.amount < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Transação {}: valor não pode ser negativo.",
                tx.id
            )));
        }
        if tx.payment_method == PaymentMethod::Credit
            && tx.card_id.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(AppError::validation(format!(
                "Transação {}: cartão é obrigatório quando o pagamento é crédito.",
                tx.id
            )));
        }
        if let Some(inst) = &tx.installment {
            if inst.total < 1 || inst.number < 1 || inst.number > inst.total {
                return Err(AppError::validation(format!(
                    "Transação {}: parcela {}/{} fora do intervalo.",
                    tx.id, inst.number, inst.total
                )));
            }
        }
    }
    for plan in &state.installment_plans {
        if plan.total_installments < 1 {
            return Err(AppError::validation(format!(
                "Plano {}: total de parcelas deve ser positivo.",
                plan.id
            )));
        }
    }
    Ok(())
}
