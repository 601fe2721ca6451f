// src/models/ledger.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

// O agregado que o cliente guarda localmente e envia inteiro a cada sync.
// A unidade de sincronização é o estado completo do workspace, não patches
// por campo.

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
    DebtPayment,
    FeeInterest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Pix,
    Debit,
    Cash,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Active,
    Finished,
    Cancelled,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
            TransactionKind::Transfer => "transfer",
            TransactionKind::DebtPayment => "debt_payment",
            TransactionKind::FeeInterest => "fee_interest",
        }
    }
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Credit => "credit",
        }
    }
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Paid => "paid",
        }
    }
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Finished => "finished",
            PlanStatus::Cancelled => "cancelled",
        }
    }
}

// --- Structs ---

// Vínculo de parcelamento carregado por cada transação-parcela. O groupId
// liga a parcela ao plano; number é 1-based dentro de [1, total].
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentRef {
    #[schema(example = "plano-notebook")]
    pub group_id: String,

    #[schema(example = 3)]
    pub number: i32,

    #[schema(example = 10)]
    pub total: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_total_amount: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_installment_amount: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    // ID local do cliente; vira ID substituto determinístico por workspace
    #[schema(example = "tx-1")]
    pub id: String,

    #[schema(example = "2025-03-14")]
    pub date: String,

    // Mês de competência (período contábil), distinto da data de ocorrência
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2025-03")]
    pub competence_month: Option<String>,

    pub direction: Direction,
    pub kind: TransactionKind,

    #[schema(example = "150.00")]
    pub amount: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "Mercado da semana")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    pub payment_method: PaymentMethod,

    // Obrigatório quando paymentMethod = credit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,

    #[serde(default = "default_tx_status")]
    pub status: TransactionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment: Option<InstallmentRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_recurring: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,

    // Flag de sujeira exclusiva do cliente; removida antes de persistir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_sync: Option<bool>,
}

fn default_tx_status() -> TransactionStatus {
    TransactionStatus::Pending
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    #[schema(example = "cartao-nubank")]
    pub id: String,

    #[schema(example = "Nubank")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 28)]
    pub closing_day: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = 7)]
    pub due_day: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apr_monthly: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "5000.00")]
    pub limit: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentPlan {
    #[schema(example = "plano-notebook")]
    pub id: String,

    #[schema(example = "Notebook em 10x")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2025-01-10")]
    pub purchase_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "2025-02-07")]
    pub first_installment_date: Option<String>,

    #[schema(example = 10)]
    pub total_installments: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "3500.00")]
    pub total_amount: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "350.00")]
    pub per_installment_amount: Option<Decimal>,

    #[serde(default = "default_plan_status")]
    pub status: PlanStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_installments: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<String>,
}

fn default_plan_status() -> PlanStatus {
    PlanStatus::Active
}

// O estado completo de um workspace, como o cliente envia. Timestamps de
// createdAt/updatedAt atravessam o storage como strings opacas ordenáveis;
// só `date` e `competenceMonth` passam pelo normalizador temporal.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    #[serde(default)]
    #[schema(example = 3)]
    pub schema_version: i64,

    #[serde(default)]
    #[schema(example = "7500.00")]
    pub monthly_income: Decimal,

    #[serde(default)]
    #[schema(example = "2200.00")]
    pub variable_cap: Decimal,

    #[serde(default)]
    #[schema(example = json!(["Alimentação", "Transporte"]))]
    pub categories: Vec<String>,

    #[serde(default)]
    pub transactions: Vec<Transaction>,

    #[serde(default)]
    pub cards: Vec<Card>,

    #[serde(default)]
    pub installment_plans: Vec<InstallmentPlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}
