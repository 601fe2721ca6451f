// src/db/pg_repo.rs

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::common::error::AppError;
use crate::db::store::{LedgerStore, SyncCommit};
use crate::models::audit::AuditEvent;
use crate::models::ledger::LedgerState;
use crate::models::rows::{TransactionFilter, TransactionRow, WorkspaceRecord};

// Implementação Postgres da interface de storage. Cada statement roda com
// timeout limitado; estourar o timeout falha a operação, e retry, se houver,
// é do chamador, nunca daqui.

const STORAGE_TIMEOUT: Duration = Duration::from_secs(10);

// Coleções grandes são upsertadas em lotes limitados; a falha de um lote
// aborta os lotes restantes da chamada.
const UPSERT_BATCH: usize = 200;

async fn timed<T, F>(fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(STORAGE_TIMEOUT, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AppError::StorageTimeout),
    }
}

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TRANSACTION_COLUMNS: &str = "id, workspace_id, date, competence_month, direction, kind, \
     amount, description, person_id, category_id, payment_method, card_id, status, plan_id, \
     installment_number, installment_count, is_recurring, created_at, updated_at, deleted_at";

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn load_workspace(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<WorkspaceRecord>, AppError> {
        let row = timed(
            sqlx::query(
                "SELECT id, workspace_key, state, revision, schema_version, updated_at \
                 FROM workspaces WHERE id = $1",
            )
            .bind(workspace_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let state_json: serde_json::Value = row.try_get("state")?;
        let state: LedgerState = serde_json::from_value(state_json)
            .map_err(|e| anyhow::anyhow!("blob de estado corrompido no storage: {e}"))?;

        Ok(Some(WorkspaceRecord {
            id: row.try_get("id")?,
            workspace_key: row.try_get("workspace_key")?,
            state,
            revision: row.try_get("revision")?,
            schema_version: row.try_get("schema_version")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    // Escritas sequenciadas de um sync aceito: workspace → lotes filhos →
    // auditoria, dentro de uma única transação. Ou o sync inteiro commita
    // (com a revisão nova), ou nada muda.
    async fn commit_sync(&self, commit: SyncCommit) -> Result<(), AppError> {
        let SyncCommit {
            workspace,
            rows,
            audit,
        } = commit;

        let state_json = serde_json::to_value(&workspace.state)
            .map_err(|e| anyhow::anyhow!("falha ao serializar estado: {e}"))?;

        let mut tx = self.pool.begin().await?;

        timed(
            sqlx::query(
                "INSERT INTO workspaces (id, workspace_key, state, revision, schema_version, updated_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET \
                     workspace_key = EXCLUDED.workspace_key, \
                     state = EXCLUDED.state, \
                     revision = EXCLUDED.revision, \
                     schema_version = EXCLUDED.schema_version, \
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(workspace.id)
            .bind(&workspace.workspace_key)
            .bind(&state_json)
            .bind(workspace.revision)
            .bind(workspace.schema_version)
            .bind(&workspace.updated_at)
            .execute(&mut *tx),
        )
        .await?;

        for chunk in rows.cards.chunks(UPSERT_BATCH) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO cards (id, workspace_id, name, closing_day, due_day, apr_monthly, \
                 credit_limit, balance, archived_at, created_at, updated_at) ",
            );
            qb.push_values(chunk, |mut b, card| {
                b.push_bind(card.id)
                    .push_bind(card.workspace_id)
                    .push_bind(&card.name)
                    .push_bind(card.closing_day)
                    .push_bind(card.due_day)
                    .push_bind(card.apr_monthly)
                    .push_bind(card.credit_limit)
                    .push_bind(card.balance)
                    .push_bind(&card.archived_at)
                    .push_bind(&card.created_at)
                    .push_bind(&card.updated_at);
            });
            qb.push(
                " ON CONFLICT (id) DO UPDATE SET \
                     name = EXCLUDED.name, \
                     closing_day = EXCLUDED.closing_day, \
                     due_day = EXCLUDED.due_day, \
                     apr_monthly = EXCLUDED.apr_monthly, \
                     credit_limit = EXCLUDED.credit_limit, \
                     balance = EXCLUDED.balance, \
                     archived_at = EXCLUDED.archived_at, \
                     created_at = EXCLUDED.created_at, \
                     updated_at = EXCLUDED.updated_at",
            );
            timed(qb.build().execute(&mut *tx)).await?;
        }

        for chunk in rows.categories.chunks(UPSERT_BATCH) {
            let mut qb: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO categories (id, workspace_id, name) ");
            qb.push_values(chunk, |mut b, category| {
                b.push_bind(category.id)
                    .push_bind(category.workspace_id)
                    .push_bind(&category.name);
            });
            qb.push(" ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name");
            timed(qb.build().execute(&mut *tx)).await?;
        }

        for chunk in rows.plans.chunks(UPSERT_BATCH) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO installment_plans (id, workspace_id, description, category_id, \
                 card_id, purchase_date, first_installment_date, installment_count, total_amount, \
                 per_installment_amount, status, remaining_installments, deleted_at, created_at, \
                 updated_at) ",
            );
            qb.push_values(chunk, |mut b, plan| {
                b.push_bind(plan.id)
                    .push_bind(plan.workspace_id)
                    .push_bind(&plan.description)
                    .push_bind(plan.category_id)
                    .push_bind(plan.card_id)
                    .push_bind(plan.purchase_date)
                    .push_bind(plan.first_installment_date)
                    .push_bind(plan.installment_count)
                    .push_bind(plan.total_amount)
                    .push_bind(plan.per_installment_amount)
                    .push_bind(&plan.status)
                    .push_bind(plan.remaining_installments)
                    .push_bind(&plan.deleted_at)
                    .push_bind(&plan.created_at)
                    .push_bind(&plan.updated_at);
            });
            qb.push(
                " ON CONFLICT (id) DO UPDATE SET \
                     description = EXCLUDED.description, \
                     category_id = EXCLUDED.category_id, \
                     card_id = EXCLUDED.card_id, \
                     purchase_date = EXCLUDED.purchase_date, \
                     first_installment_date = EXCLUDED.first_installment_date, \
                     installment_count = EXCLUDED.installment_count, \
                     total_amount = EXCLUDED.total_amount, \
                     per_installment_amount = EXCLUDED.per_installment_amount, \
                     status = EXCLUDED.status, \
                     remaining_installments = EXCLUDED.remaining_installments, \
                     deleted_at = EXCLUDED.deleted_at, \
                     created_at = EXCLUDED.created_at, \
                     updated_at = EXCLUDED.updated_at",
            );
            timed(qb.build().execute(&mut *tx)).await?;
        }

        for chunk in rows.transactions.chunks(UPSERT_BATCH) {
            let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO transactions (id, workspace_id, date, competence_month, direction, \
                 kind, amount, description, person_id, category_id, payment_method, card_id, \
                 status, plan_id, installment_number, installment_count, is_recurring, \
                 created_at, updated_at, deleted_at) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.id)
                    .push_bind(row.workspace_id)
                    .push_bind(row.date)
                    .push_bind(row.competence_month)
                    .push_bind(&row.direction)
                    .push_bind(&row.kind)
                    .push_bind(row.amount)
                    .push_bind(&row.description)
                    .push_bind(&row.person_id)
                    .push_bind(row.category_id)
                    .push_bind(&row.payment_method)
                    .push_bind(row.card_id)
                    .push_bind(&row.status)
                    .push_bind(row.plan_id)
                    .push_bind(row.installment_number)
                    .push_bind(row.installment_count)
                    .push_bind(row.is_recurring)
                    .push_bind(&row.created_at)
                    .push_bind(&row.updated_at)
                    .push_bind(&row.deleted_at);
            });
            qb.push(
                " ON CONFLICT (id) DO UPDATE SET \
                     date = EXCLUDED.date, \
                     competence_month = EXCLUDED.competence_month, \
                     direction = EXCLUDED.direction, \
                     kind = EXCLUDED.kind, \
                     amount = EXCLUDED.amount, \
                     description = EXCLUDED.description, \
                     person_id = EXCLUDED.person_id, \
                     category_id = EXCLUDED.category_id, \
                     payment_method = EXCLUDED.payment_method, \
                     card_id = EXCLUDED.card_id, \
                     status = EXCLUDED.status, \
                     plan_id = EXCLUDED.plan_id, \
                     installment_number = EXCLUDED.installment_number, \
                     installment_count = EXCLUDED.installment_count, \
                     is_recurring = EXCLUDED.is_recurring, \
                     created_at = EXCLUDED.created_at, \
                     updated_at = EXCLUDED.updated_at, \
                     deleted_at = EXCLUDED.deleted_at",
            );
            timed(qb.build().execute(&mut *tx)).await?;
        }

        timed(insert_audit(&mut tx, &audit)).await?;

        timed(tx.commit()).await?;
        Ok(())
    }

    async fn get_transaction(
        &self,
        workspace_id: Uuid,
        id: Uuid,
    ) -> Result<Option<TransactionRow>, AppError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE workspace_id = $1 AND id = $2"
        );
        let row = timed(
            sqlx::query_as::<_, TransactionRow>(&sql)
                .bind(workspace_id)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?;
        Ok(row)
    }

    async fn list_transactions(
        &self,
        workspace_id: Uuid,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRow>, AppError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE workspace_id = "
        ));
        qb.push_bind(workspace_id);

        if let Some(month) = filter.month {
            qb.push(" AND competence_month = ");
            qb.push_bind(month);
        }
        if let Some(kind) = &filter.kind {
            qb.push(" AND kind = ");
            qb.push_bind(kind);
        }
        if let Some(status) = &filter.status {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND category_id = ");
            qb.push_bind(category_id);
        }
        if let Some(card_id) = filter.card_id {
            qb.push(" AND card_id = ");
            qb.push_bind(card_id);
        }
        if let Some(q) = &filter.q {
            let pattern = format!("%{q}%");
            qb.push(" AND (description ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" OR person_id ILIKE ");
            qb.push_bind(pattern);
            qb.push(")");
        }

        qb.push(" ORDER BY date DESC, created_at DESC NULLS LAST LIMIT ");
        qb.push_bind(filter.limit);
        qb.push(" OFFSET ");
        qb.push_bind(filter.offset);

        let rows = timed(
            qb.build_query_as::<TransactionRow>()
                .fetch_all(&self.pool),
        )
        .await?;
        Ok(rows)
    }

    async fn save_transaction(&self, row: &TransactionRow) -> Result<(), AppError> {
        timed(
            sqlx::query(
                "UPDATE transactions SET \
                     date = $3, competence_month = $4, amount = $5, description = $6, \
                     person_id = $7, category_id = $8, card_id = $9, status = $10, \
                     updated_at = $11, deleted_at = $12 \
                 WHERE workspace_id = $1 AND id = $2",
            )
            .bind(row.workspace_id)
            .bind(row.id)
            .bind(row.date)
            .bind(row.competence_month)
            .bind(row.amount)
            .bind(&row.description)
            .bind(&row.person_id)
            .bind(row.category_id)
            .bind(row.card_id)
            .bind(&row.status)
            .bind(&row.updated_at)
            .bind(&row.deleted_at)
            .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn append_audit(&self, event: &AuditEvent) -> Result<(), AppError> {
        let mut conn = self.pool.acquire().await?;
        timed(insert_audit_conn(&mut conn, event)).await?;
        Ok(())
    }
}

async fn insert_audit(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    event: &AuditEvent,
) -> Result<sqlx::postgres::PgQueryResult, sqlx::Error> {
    audit_insert_query(event).execute(&mut **tx).await
}

async fn insert_audit_conn(
    conn: &mut sqlx::pool::PoolConnection<Postgres>,
    event: &AuditEvent,
) -> Result<sqlx::postgres::PgQueryResult, sqlx::Error> {
    audit_insert_query(event).execute(&mut **conn).await
}

// Append-only: só INSERT, nunca UPDATE ou DELETE em audit_events.
fn audit_insert_query(
    event: &AuditEvent,
) -> sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(
        "INSERT INTO audit_events (id, workspace_id, entity_type, entity_id, action, before, \
         after, actor_user_id, actor_device_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(event.id)
    .bind(event.workspace_id)
    .bind(&event.entity_type)
    .bind(&event.entity_id)
    .bind(event.action.as_str())
    .bind(&event.before)
    .bind(&event.after)
    .bind(&event.actor_user_id)
    .bind(&event.actor_device_id)
    .bind(event.created_at)
}
