// src/sync/project.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Datelike;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::ledger::{LedgerState, PlanStatus};
use crate::models::rows::{CardRow, CategoryRow, PlanRow, TransactionRow};
use crate::sync::identity::{self, NS_CARD, NS_CATEGORY, NS_PLAN, NS_TRANSACTION};
use crate::sync::temporal;

// Projetor de linhas: achata a árvore de estado do cliente em registros
// independentes, prontos para upsert. Referência sem entidade correspondente
// nunca rejeita o payload: degrada para uma linha placeholder, para o sync
// parcial de um dispositivo atrasado não perder dados. Tipos malformados são
// rejeitados antes, no service.

#[derive(Debug, Clone)]
pub struct ProjectedRows {
    pub workspace_id: Uuid,
    pub cards: Vec<CardRow>,
    pub categories: Vec<CategoryRow>,
    pub plans: Vec<PlanRow>,
    pub transactions: Vec<TransactionRow>,
}

// O flag booleano do cliente colapsa no timestamp anulável do servidor:
// timestamp explícito passa direto; flag sem timestamp carimba o `now`
// injetado.
fn soft_delete_stamp(flag: Option<bool>, stamped_at: &Option<String>, now_iso: &str) -> Option<String> {
    match stamped_at {
        Some(ts) => Some(ts.clone()),
        None if flag == Some(true) => Some(now_iso.to_string()),
        None => None,
    }
}

/// Projeta `state` nas linhas achatadas do workspace `workspace_key`.
/// Transformação pura: determinística dado o mesmo `now_iso` (injetado, não
/// lido de relógio nenhum).
pub fn project(state: &LedgerState, workspace_key: &str, now_iso: &str) -> ProjectedRows {
    let ws = identity::workspace_id(workspace_key);

    // Colete toda referência de cartão, categoria (por nome) e groupId de
    // parcelamento, mesmo sem entidade top-level correspondente no payload.
    let mut card_refs: BTreeSet<&str> = BTreeSet::new();
    let mut category_refs: BTreeSet<&str> = BTreeSet::new();
    let mut group_refs: BTreeSet<&str> = BTreeSet::new();
    for tx in &state.transactions {
        if let Some(card) = tx.card_id.as_deref() {
            card_refs.insert(card);
        }
        if let Some(category) = tx.category_id.as_deref() {
            category_refs.insert(category);
        }
        if let Some(inst) = &tx.installment {
            group_refs.insert(&inst.group_id);
        }
    }
    for plan in &state.installment_plans {
        if let Some(card) = plan.card_id.as_deref() {
            card_refs.insert(card);
        }
        if let Some(category) = plan.category_id.as_deref() {
            category_refs.insert(category);
        }
    }

    // Uma linha por cartão do payload; ID duplicado dentro do mesmo payload
    // fica com a primeira ocorrência (upsert em lote não aceita a mesma
    // chave duas vezes).
    let mut cards = Vec::with_capacity(state.cards.len() + card_refs.len());
    let mut seen_cards: HashSet<Uuid> = HashSet::new();
    for card in &state.cards {
        let id = identity::resolve(NS_CARD, ws, &card.id);
        if !seen_cards.insert(id) {
            continue;
        }
        cards.push(CardRow {
            id,
            workspace_id: ws,
            name: card.name.clone(),
            closing_day: card.closing_day,
            due_day: card.due_day,
            apr_monthly: card.apr_monthly,
            credit_limit: card.limit,
            balance: card.balance,
            archived_at: soft_delete_stamp(card.deleted, &card.deleted_at, now_iso),
            created_at: card.created_at.clone(),
            updated_at: card.updated_at.clone(),
        });
    }
    // ...e um placeholder (nome = referência crua, opcionais nulos) para
    // cada cardId referenciado sem cartão correspondente. Isso garante
    // completude referencial da saída mesmo com estado parcial.
    for raw in &card_refs {
        let id = identity::resolve(NS_CARD, ws, raw);
        if seen_cards.insert(id) {
            cards.push(CardRow {
                id,
                workspace_id: ws,
                name: raw.to_string(),
                closing_day: None,
                due_day: None,
                apr_monthly: None,
                credit_limit: None,
                balance: None,
                archived_at: None,
                created_at: None,
                updated_at: None,
            });
        }
    }

    // Uma linha por nome de categoria referenciado; o nome é a chave natural.
    let categories = category_refs
        .iter()
        .map(|name| CategoryRow {
            id: identity::resolve(NS_CATEGORY, ws, name),
            workspace_id: ws,
            name: name.to_string(),
        })
        .collect();

    // Uma linha por plano do payload; o mapa de contagens alimenta o passo
    // das transações (o plano é autoritativo sobre o `total` da parcela).
    let mut plans = Vec::with_capacity(state.installment_plans.len() + group_refs.len());
    let mut plan_counts: HashMap<Uuid, i32> = HashMap::new();
    for plan in &state.installment_plans {
        let id = identity::resolve(NS_PLAN, ws, &plan.id);
        if plan_counts.contains_key(&id) {
            continue;
        }
        plan_counts.insert(id, plan.total_installments);
        plans.push(PlanRow {
            id,
            workspace_id: ws,
            description: Some(plan.description.clone()),
            category_id: plan
                .category_id
                .as_deref()
                .map(|c| identity::resolve(NS_CATEGORY, ws, c)),
            card_id: plan
                .card_id
                .as_deref()
                .map(|c| identity::resolve(NS_CARD, ws, c)),
            purchase_date: plan
                .purchase_date
                .as_deref()
                .and_then(temporal::to_calendar_date),
            first_installment_date: plan
                .first_installment_date
                .as_deref()
                .and_then(temporal::to_calendar_date),
            installment_count: plan.total_installments,
            total_amount: plan.total_amount,
            per_installment_amount: plan.per_installment_amount,
            status: plan.status.as_str().to_string(),
            remaining_installments: plan.remaining_installments,
            deleted_at: soft_delete_stamp(plan.deleted, &plan.deleted_at, now_iso),
            created_at: plan.created_at.clone(),
            updated_at: plan.updated_at.clone(),
        });
    }
    // groupId referenciado sem plano: sintetize um da primeira transação
    // vista para o grupo, preservando total/valores para leituras futuras
    // continuarem autoconsistentes.
    for group in &group_refs {
        let id = identity::resolve(NS_PLAN, ws, group);
        if plan_counts.contains_key(&id) {
            continue;
        }
        let Some((tx, inst)) = state.transactions.iter().find_map(|t| {
            t.installment
                .as_ref()
                .filter(|i| i.group_id == *group)
                .map(|i| (t, i))
        }) else {
            continue;
        };
        let total_amount = inst.original_total_amount.or_else(|| {
            inst.per_installment_amount
                .map(|per| per * Decimal::from(inst.total))
        });
        plan_counts.insert(id, inst.total);
        plans.push(PlanRow {
            id,
            workspace_id: ws,
            description: tx.description.clone(),
            category_id: tx
                .category_id
                .as_deref()
                .map(|c| identity::resolve(NS_CATEGORY, ws, c)),
            card_id: tx
                .card_id
                .as_deref()
                .map(|c| identity::resolve(NS_CARD, ws, c)),
            purchase_date: inst
                .start_date
                .as_deref()
                .or(Some(tx.date.as_str()))
                .and_then(temporal::to_calendar_date),
            first_installment_date: inst
                .start_date
                .as_deref()
                .and_then(temporal::to_calendar_date),
            installment_count: inst.total,
            total_amount,
            per_installment_amount: inst.per_installment_amount,
            status: PlanStatus::Active.as_str().to_string(),
            remaining_installments: None,
            deleted_at: None,
            created_at: tx.created_at.clone(),
            updated_at: tx.updated_at.clone(),
        });
    }

    // Uma linha por transação, com referências resolvidas para IDs
    // substitutos.
    let mut seen_txs: HashSet<Uuid> = HashSet::new();
    let transactions = state
        .transactions
        .iter()
        .filter_map(|tx| {
            let id = identity::resolve(NS_TRANSACTION, ws, &tx.id);
            if !seen_txs.insert(id) {
                return None;
            }
            let date = temporal::to_calendar_date(&tx.date).unwrap_or_default();
            let competence_month = tx
                .competence_month
                .as_deref()
                .and_then(temporal::to_month_start)
                .or_else(|| date.with_day(1))
                .unwrap_or_default();
            let plan_id = tx
                .installment
                .as_ref()
                .map(|inst| identity::resolve(NS_PLAN, ws, &inst.group_id));
            let installment_count = plan_id
                .and_then(|p| plan_counts.get(&p).copied())
                .or_else(|| tx.installment.as_ref().map(|inst| inst.total));
            Some(TransactionRow {
                id,
                workspace_id: ws,
                date,
                competence_month,
                direction: tx.direction.as_str().to_string(),
                kind: tx.kind.as_str().to_string(),
                amount: tx.amount,
                description: tx.description.clone(),
                person_id: tx.person_id.clone(),
                category_id: tx
                    .category_id
                    .as_deref()
                    .map(|c| identity::resolve(NS_CATEGORY, ws, c)),
                payment_method: tx.payment_method.as_str().to_string(),
                card_id: tx
                    .card_id
                    .as_deref()
                    .map(|c| identity::resolve(NS_CARD, ws, c)),
                status: tx.status.as_str().to_string(),
                plan_id,
                installment_number: tx.installment.as_ref().map(|inst| inst.number),
                installment_count,
                is_recurring: tx.is_recurring.unwrap_or(false),
                created_at: tx.created_at.clone(),
                updated_at: tx.updated_at.clone(),
                deleted_at: soft_delete_stamp(tx.deleted, &tx.deleted_at, now_iso),
            })
        })
        .collect();

    ProjectedRows {
        workspace_id: ws,
        cards,
        categories,
        plans,
        transactions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::{
        Card, Direction, InstallmentPlan, InstallmentRef, PaymentMethod, Transaction,
        TransactionKind, TransactionStatus,
    };
    use chrono::NaiveDate;

    const NOW: &str = "2025-06-01T12:00:00.000Z";

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: "2025-03-14".to_string(),
            competence_month: Some("2025-03".to_string()),
            direction: Direction::Out,
            kind: TransactionKind::Expense,
            amount: Decimal::from(100),
            description: Some("Notebook".to_string()),
            person_id: None,
            category_id: None,
            payment_method: PaymentMethod::Credit,
            card_id: Some("cartao-1".to_string()),
            status: TransactionStatus::Pending,
            installment: None,
            is_recurring: None,
            created_at: None,
            updated_at: None,
            deleted: None,
            deleted_at: None,
            needs_sync: None,
        }
    }

    fn empty_state() -> LedgerState {
        LedgerState {
            schema_version: 1,
            monthly_income: Decimal::ZERO,
            variable_cap: Decimal::ZERO,
            categories: vec![],
            transactions: vec![],
            cards: vec![],
            installment_plans: vec![],
            updated_at: None,
        }
    }

    #[test]
    fn references_never_dangle() {
        let mut state = empty_state();
        let mut t = tx("tx-1");
        t.category_id = Some("Mercado".to_string());
        t.installment = Some(InstallmentRef {
            group_id: "plano-1".to_string(),
            number: 1,
            total: 10,
            original_total_amount: None,
            per_installment_amount: Some(Decimal::from(350)),
            start_date: None,
        });
        state.transactions = vec![t];

        let rows = project(&state, "meu-workspace", NOW);

        // Cartão referenciado sem entidade vira placeholder com nome cru
        assert_eq!(rows.cards.len(), 1);
        assert_eq!(rows.cards[0].name, "cartao-1");
        assert_eq!(rows.cards[0].credit_limit, None);

        assert_eq!(rows.categories.len(), 1);
        assert_eq!(rows.categories[0].name, "Mercado");

        // Plano sintetizado do primeiro tx do grupo
        assert_eq!(rows.plans.len(), 1);
        assert_eq!(rows.plans[0].installment_count, 10);
        assert_eq!(rows.plans[0].total_amount, Some(Decimal::from(3500)));

        // A transação aponta exatamente para as linhas emitidas
        let tx_row = &rows.transactions[0];
        assert_eq!(tx_row.card_id, Some(rows.cards[0].id));
        assert_eq!(tx_row.category_id, Some(rows.categories[0].id));
        assert_eq!(tx_row.plan_id, Some(rows.plans[0].id));
        assert_eq!(tx_row.installment_count, Some(10));
    }

    #[test]
    fn payload_card_wins_over_placeholder() {
        let mut state = empty_state();
        state.transactions = vec![tx("tx-1")];
        state.cards = vec![Card {
            id: "cartao-1".to_string(),
            name: "Nubank".to_string(),
            closing_day: Some(28),
            due_day: Some(7),
            apr_monthly: None,
            limit: Some(Decimal::from(5000)),
            balance: None,
            created_at: None,
            updated_at: None,
            deleted: None,
            deleted_at: None,
        }];

        let rows = project(&state, "meu-workspace", NOW);
        assert_eq!(rows.cards.len(), 1);
        assert_eq!(rows.cards[0].name, "Nubank");
        assert_eq!(rows.cards[0].credit_limit, Some(Decimal::from(5000)));
    }

    #[test]
    fn plan_row_is_authoritative_over_installment_total() {
        let mut state = empty_state();
        let mut t = tx("tx-1");
        t.installment = Some(InstallmentRef {
            group_id: "plano-1".to_string(),
            number: 1,
            total: 10,
            original_total_amount: None,
            per_installment_amount: None,
            start_date: None,
        });
        state.transactions = vec![t];
        state.installment_plans = vec![InstallmentPlan {
            id: "plano-1".to_string(),
            description: "Notebook em 12x".to_string(),
            category_id: None,
            card_id: None,
            purchase_date: Some("2025-01-10".to_string()),
            first_installment_date: Some("2025-02-07".to_string()),
            total_installments: 12,
            total_amount: Some(Decimal::from(4200)),
            per_installment_amount: Some(Decimal::from(350)),
            status: crate::models::ledger::PlanStatus::Active,
            remaining_installments: Some(9),
            created_at: None,
            updated_at: None,
            deleted: None,
            deleted_at: None,
        }];

        let rows = project(&state, "meu-workspace", NOW);
        assert_eq!(rows.plans.len(), 1);
        // O plano editado manda; o total da parcela não causa drift
        assert_eq!(rows.transactions[0].installment_count, Some(12));
    }

    #[test]
    fn soft_delete_flag_becomes_timestamp() {
        let mut state = empty_state();
        let mut t = tx("tx-1");
        t.deleted = Some(true);
        state.transactions = vec![t];
        let mut t2 = tx("tx-2");
        t2.deleted = Some(true);
        t2.deleted_at = Some("2025-05-20T08:00:00Z".to_string());
        state.transactions.push(t2);

        let rows = project(&state, "meu-workspace", NOW);
        assert_eq!(rows.transactions[0].deleted_at.as_deref(), Some(NOW));
        assert_eq!(
            rows.transactions[1].deleted_at.as_deref(),
            Some("2025-05-20T08:00:00Z")
        );
    }

    #[test]
    fn competence_month_falls_back_to_date() {
        let mut state = empty_state();
        let mut t = tx("tx-1");
        t.competence_month = None;
        state.transactions = vec![t];

        let rows = project(&state, "meu-workspace", NOW);
        assert_eq!(
            rows.transactions[0].competence_month,
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
        );
    }

    #[test]
    fn projection_is_deterministic() {
        let mut state = empty_state();
        let mut t = tx("tx-1");
        t.installment = Some(InstallmentRef {
            group_id: "plano-1".to_string(),
            number: 2,
            total: 6,
            original_total_amount: Some(Decimal::from(600)),
            per_installment_amount: Some(Decimal::from(100)),
            start_date: Some("2025-02-01".to_string()),
        });
        state.transactions = vec![t, tx("tx-2")];

        let a = project(&state, "meu-workspace", NOW);
        let b = project(&state, "meu-workspace", NOW);
        assert_eq!(a.workspace_id, b.workspace_id);
        assert_eq!(a.cards, b.cards);
        assert_eq!(a.categories, b.categories);
        assert_eq!(a.plans, b.plans);
        assert_eq!(a.transactions, b.transactions);
    }
}
