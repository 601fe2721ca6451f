// src/db/memory.rs

// Storage em memória para os testes de service: mesma interface do Postgres,
// injetado na construção; nenhum teste toca estado ambiente.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::store::{LedgerStore, SyncCommit};
use crate::models::audit::AuditEvent;
use crate::models::rows::{
    CardRow, CategoryRow, PlanRow, TransactionFilter, TransactionRow, WorkspaceRecord,
};

#[derive(Default)]
struct Inner {
    workspaces: HashMap<Uuid, WorkspaceRecord>,
    cards: HashMap<Uuid, CardRow>,
    categories: HashMap<Uuid, CategoryRow>,
    plans: HashMap<Uuid, PlanRow>,
    transactions: HashMap<Uuid, TransactionRow>,
    audits: Vec<AuditEvent>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    // Simula a janela de auditoria quebrada: a mutação grava, o evento não.
    fail_audit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_audits(&self, fail: bool) {
        self.fail_audit.store(fail, Ordering::SeqCst);
    }

    pub fn audit_events(&self) -> Vec<AuditEvent> {
        self.inner.lock().unwrap().audits.clone()
    }

    pub fn card_names(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        let mut names: Vec<String> = inner.cards.values().map(|c| c.name.clone()).collect();
        names.sort();
        names
    }

    pub fn plan_count(&self) -> usize {
        self.inner.lock().unwrap().plans.len()
    }
}

fn matches(row: &TransactionRow, filter: &TransactionFilter) -> bool {
    if let Some(month) = filter.month {
        if row.competence_month != month {
            return false;
        }
    }
    if let Some(kind) = &filter.kind {
        if &row.kind != kind {
            return false;
        }
    }
    if let Some(status) = &filter.status {
        if &row.status != status {
            return false;
        }
    }
    if let Some(category_id) = filter.category_id {
        if row.category_id != Some(category_id) {
            return false;
        }
    }
    if let Some(card_id) = filter.card_id {
        if row.card_id != Some(card_id) {
            return false;
        }
    }
    if let Some(q) = &filter.q {
        let needle = q.to_lowercase();
        let description = row
            .description
            .as_deref()
            .map(|d| d.to_lowercase().contains(&needle))
            .unwrap_or(false);
        let person = row
            .person_id
            .as_deref()
            .map(|p| p.to_lowercase().contains(&needle))
            .unwrap_or(false);
        if !description && !person {
            return false;
        }
    }
    true
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn load_workspace(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<WorkspaceRecord>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .workspaces
            .get(&workspace_id)
            .cloned())
    }

    async fn commit_sync(&self, commit: SyncCommit) -> Result<(), AppError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::AuditWriteFailed("storage em memória configurado para falhar".into()));
        }
        let mut inner = self.inner.lock().unwrap();
        inner
            .workspaces
            .insert(commit.workspace.id, commit.workspace.clone());
        for card in commit.rows.cards {
            inner.cards.insert(card.id, card);
        }
        for category in commit.rows.categories {
            inner.categories.insert(category.id, category);
        }
        for plan in commit.rows.plans {
            inner.plans.insert(plan.id, plan);
        }
        for row in commit.rows.transactions {
            inner.transactions.insert(row.id, row);
        }
        inner.audits.push(commit.audit);
        Ok(())
    }

    async fn get_transaction(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TransactionRow>, AppError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .transactions
            .get(&id)
            .filter(|row| row.workspace_id == workspace_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        workspace_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRow>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<TransactionRow> = inner
            .transactions
            .values()
            .filter(|row| row.workspace_id == workspace_id && matches(row, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }

    async fn save_transaction(&self, row: &TransactionRow) -> Result<(), AppError> {
        self.inner
            .lock()
            .unwrap()
            .transactions
            .insert(row.id, row.clone());
        Ok(())
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), AppError> {
        if self.fail_audit.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError(sqlx::Error::PoolClosed));
        }
        self.inner.lock().unwrap().audits.push(event.clone());
        Ok(())
    }
}
