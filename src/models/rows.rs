// src/models/rows.rs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::ledger::LedgerState;

// Linhas achatadas que o projetor emite e o surface administrativo lê.
// Timestamps de linha (createdAt/updatedAt/deletedAt/archivedAt) são strings
// opacas ordenáveis; só date/competenceMonth são datas SQL normalizadas.

// O registro do workspace: o blob de estado que o motor de merge lê, mais o
// contador de revisão monotônico usado como token de concorrência otimista.
#[derive(Debug, Clone)]
pub struct WorkspaceRecord {
    pub id: Uuid,
    pub workspace_key: String,
    pub state: LedgerState,
    pub revision: i64,
    pub schema_version: i64,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub closing_day: Option<i32>,
    pub due_day: Option<i32>,
    pub apr_monthly: Option<Decimal>,
    pub credit_limit: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub archived_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

// Categorias não têm identidade além do nome; o nome é a chave natural.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
    pub purchase_date: Option<NaiveDate>,
    pub first_installment_date: Option<NaiveDate>,
    pub installment_count: i32,
    pub total_amount: Option<Decimal>,
    pub per_installment_amount: Option<Decimal>,
    pub status: String,
    pub remaining_installments: Option<i32>,
    pub deleted_at: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: Uuid,

    #[schema(ignore)]
    pub workspace_id: Uuid,

    #[schema(value_type = String, format = Date, example = "2025-03-14")]
    pub date: NaiveDate,

    #[schema(value_type = String, format = Date, example = "2025-03-01")]
    pub competence_month: NaiveDate,

    #[schema(example = "out")]
    pub direction: String,

    #[schema(example = "expense")]
    pub kind: String,

    #[schema(example = "150.00")]
    pub amount: Decimal,

    pub description: Option<String>,
    pub person_id: Option<String>,
    pub category_id: Option<Uuid>,

    #[schema(example = "pix")]
    pub payment_method: String,

    pub card_id: Option<Uuid>,

    #[schema(example = "pending")]
    pub status: String,

    // Plano de parcelamento resolvido (groupId substituto)
    pub plan_id: Option<Uuid>,
    pub installment_number: Option<i32>,
    pub installment_count: Option<i32>,

    pub is_recurring: bool,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

// Visão administrativa: a linha mais as flags booleanas derivadas. O boolean
// de soft-delete existe só aqui, na borda de apresentação; no storage a
// representação é o timestamp anulável.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminTransaction {
    #[serde(flatten)]
    pub row: TransactionRow,

    #[schema(example = false)]
    pub deleted: bool,

    #[schema(example = true)]
    pub installment: bool,
}

impl From<TransactionRow> for AdminTransaction {
    fn from(row: TransactionRow) -> Self {
        let deleted = row.deleted_at.is_some();
        let installment = row.plan_id.is_some();
        AdminTransaction {
            row,
            deleted,
            installment,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub data: Vec<AdminTransaction>,
    #[schema(example = 50)]
    pub next_cursor: Option<i64>,
}

// Filtros da listagem administrativa, já normalizados pelo handler.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub month: Option<NaiveDate>,
    pub kind: Option<String>,
    pub status: Option<String>,
    pub category_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
    pub q: Option<String>,
    pub limit: i64,
    pub offset: i64,
}
