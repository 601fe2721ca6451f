// src/db/store.rs

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::audit::AuditEvent;
use crate::models::rows::{TransactionFilter, TransactionRow, WorkspaceRecord};
use crate::sync::project::ProjectedRows;

// A interface genérica de upsert/query sobre o storage relacional. Os
// services enxergam só este trait; a implementação de produção é Postgres
// (pg_repo) e os testes injetam uma versão em memória sem tocar estado
// ambiente nenhum.

// O plano de escrita de um sync aceito: o registro do workspace (blob
// merged + revisão nova), as linhas achatadas e o evento de auditoria.
// A implementação sequencia workspace → lotes filhos → auditoria, para um
// sync parcialmente aplicado nunca deixar transação apontando para
// workspace inexistente.
#[derive(Debug, Clone)]
pub struct SyncCommit {
    pub workspace: WorkspaceRecord,
    pub rows: ProjectedRows,
    pub audit: AuditEvent,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_workspace(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<WorkspaceRecord>, AppError>;

    async fn commit_sync(&self, commit: SyncCommit) -> Result<(), AppError>;

    async fn get_transaction(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TransactionRow>, AppError>;

    async fn list_transactions(
        &self,
        workspace_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRow>, AppError>;

    async fn save_transaction(&self, row: &TransactionRow) -> Result<(), AppError>;

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), AppError>;
}
