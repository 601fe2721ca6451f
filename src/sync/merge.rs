// src/sync/merge.rs

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::ledger::{Card, InstallmentPlan, LedgerState, Transaction};
use crate::sync::temporal;

// Motor de merge: combina o estado guardado com o estado que chegou usando
// last-writer-wins por entidade. Coleções são comparadas item a item pelo
// updatedAt; categorias fazem união de conjunto; os escalares seguem o
// updatedAt do documento inteiro.

// Itens sincronizáveis: chave por ID, comparados pelo updatedAt próprio.
trait SyncItem {
    fn item_id(&self) -> &str;
    fn item_updated_at(&self) -> Option<&str>;
}

impl SyncItem for Transaction {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn item_updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }
}

impl SyncItem for Card {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn item_updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }
}

impl SyncItem for InstallmentPlan {
    fn item_id(&self) -> &str {
        &self.id
    }
    fn item_updated_at(&self) -> Option<&str> {
        self.updated_at.as_deref()
    }
}

// updatedAt ausente ou imprestável conta como época zero: item com timestamp
// sempre ganha de item sem.
fn item_timestamp<T: SyncItem>(item: &T) -> DateTime<Utc> {
    item.item_updated_at()
        .and_then(temporal::parse_timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn doc_timestamp(state: &LedgerState) -> DateTime<Utc> {
    state
        .updated_at
        .as_deref()
        .and_then(temporal::parse_timestamp)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

// LWW por ID. Chave nos dois lados: fica quem tiver updatedAt maior, empate
// exato favorece o que chegou (reenviar o mesmo payload é no-op). Chave em
// um lado só: fica.
fn merge_collection<T: SyncItem + Clone>(stored: &[T], incoming: &[T]) -> Vec<T> {
    let mut incoming_by_id: HashMap<&str, &T> =
        incoming.iter().map(|item| (item.item_id(), item)).collect();

    let mut merged = Vec::with_capacity(stored.len() + incoming.len());
    for prev in stored {
        match incoming_by_id.remove(prev.item_id()) {
            Some(new) => {
                if item_timestamp(new) >= item_timestamp(prev) {
                    merged.push(new.clone());
                } else {
                    merged.push(prev.clone());
                }
            }
            None => merged.push(prev.clone()),
        }
    }
    // O que sobrou só existe no payload que chegou
    for item in incoming {
        if incoming_by_id.remove(item.item_id()).is_some() {
            merged.push(item.clone());
        }
    }
    merged
}

// Categorias: conjunto ordenado, case-sensitive, sem duplicatas. A união
// nunca encolhe por sync; remoção só existe como ação administrativa
// explícita, nunca por ausência no payload.
fn union_categories(stored: &[String], incoming: &[String]) -> Vec<String> {
    let set: BTreeSet<String> = stored.iter().chain(incoming.iter()).cloned().collect();
    set.into_iter().collect()
}

fn strip_dirty_flags(state: &mut LedgerState) {
    // needsSync é do cliente; nunca persiste
    for tx in &mut state.transactions {
        tx.needs_sync = None;
    }
}

/// Combina `stored` e `incoming` em um único estado. Sem estado guardado, o
/// que chegou vira o estado guardado (com `updatedAt` renovado para o
/// timestamp do merge). `schemaVersion` nunca regride: máximo entre os dois
/// lados e o override explícito do chamador.
pub fn merge_states(
    stored: Option<&LedgerState>,
    incoming: &LedgerState,
    now: DateTime<Utc>,
    schema_override: Option<i64>,
) -> LedgerState {
    let now_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    let override_version = schema_override.unwrap_or(0);

    let Some(prev) = stored else {
        let mut merged = incoming.clone();
        merged.schema_version = merged.schema_version.max(override_version);
        merged.categories = union_categories(&merged.categories, &[]);
        merged.updated_at = Some(now_iso);
        strip_dirty_flags(&mut merged);
        return merged;
    };

    // Os dois escalares vêm juntos do lado com updatedAt de documento mais
    // novo, nunca campo a campo, para não parear renda velha com teto novo.
    let incoming_is_newer = doc_timestamp(incoming) >= doc_timestamp(prev);
    let (monthly_income, variable_cap) = if incoming_is_newer {
        (incoming.monthly_income, incoming.variable_cap)
    } else {
        (prev.monthly_income, prev.variable_cap)
    };

    let mut merged = LedgerState {
        schema_version: prev
            .schema_version
            .max(incoming.schema_version)
            .max(override_version),
        monthly_income,
        variable_cap,
        categories: union_categories(&prev.categories, &incoming.categories),
        transactions: merge_collection(&prev.transactions, &incoming.transactions),
        cards: merge_collection(&prev.cards, &incoming.cards),
        installment_plans: merge_collection(&prev.installment_plans, &incoming.installment_plans),
        updated_at: Some(now_iso),
    };
    strip_dirty_flags(&mut merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::{Direction, PaymentMethod, TransactionKind, TransactionStatus};
    use rust_decimal::Decimal;

    fn tx(id: &str, amount: i64, updated_at: Option<&str>) -> Transaction {
        Transaction {
            id: id.to_string(),
            date: "2025-03-14".to_string(),
            competence_month: Some("2025-03".to_string()),
            direction: Direction::Out,
            kind: TransactionKind::Expense,
            amount: Decimal::from(amount),
            description: None,
            person_id: None,
            category_id: None,
            payment_method: PaymentMethod::Pix,
            card_id: None,
            status: TransactionStatus::Pending,
            installment: None,
            is_recurring: None,
            created_at: None,
            updated_at: updated_at.map(|s| s.to_string()),
            deleted: None,
            deleted_at: None,
            needs_sync: None,
        }
    }

    fn state(txs: Vec<Transaction>, categories: &[&str], updated_at: Option<&str>) -> LedgerState {
        LedgerState {
            schema_version: 1,
            monthly_income: Decimal::from(5000),
            variable_cap: Decimal::from(1500),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            transactions: txs,
            cards: vec![],
            installment_plans: vec![],
            updated_at: updated_at.map(|s| s.to_string()),
        }
    }

    fn now() -> DateTime<Utc> {
        temporal::parse_timestamp("2025-06-01T12:00:00Z").unwrap()
    }

    #[test]
    fn first_sync_adopts_incoming_verbatim() {
        let incoming = state(vec![tx("tx-1", 100, None)], &["Mercado"], None);
        let merged = merge_states(None, &incoming, now(), None);
        assert_eq!(merged.transactions.len(), 1);
        assert_eq!(merged.categories, vec!["Mercado".to_string()]);
        assert!(merged.updated_at.is_some());
    }

    #[test]
    fn resync_of_same_state_is_idempotent() {
        let s = state(
            vec![tx("tx-1", 100, Some("2025-05-01T00:00:00Z"))],
            &["Mercado", "Aluguel"],
            Some("2025-05-01T00:00:00Z"),
        );
        let merged = merge_states(Some(&s), &s, now(), None);
        assert_eq!(merged.transactions.len(), s.transactions.len());
        assert_eq!(merged.transactions[0].amount, s.transactions[0].amount);
        assert_eq!(merged.categories.len(), 2);
        assert_eq!(merged.monthly_income, s.monthly_income);
    }

    #[test]
    fn newer_item_wins_per_id() {
        // Cenário da revisão: tx-1 de 100 em T0; chega tx-1 de 150 em T1 > T0
        // mais uma tx-2 nova
        let stored = state(
            vec![tx("tx-1", 100, Some("2025-05-01T00:00:00Z"))],
            &[],
            Some("2025-05-01T00:00:00Z"),
        );
        let incoming = state(
            vec![
                tx("tx-1", 150, Some("2025-05-02T00:00:00Z")),
                tx("tx-2", 30, Some("2025-05-02T00:00:00Z")),
            ],
            &[],
            Some("2025-05-02T00:00:00Z"),
        );
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        assert_eq!(merged.transactions.len(), 2);
        let tx1 = merged.transactions.iter().find(|t| t.id == "tx-1").unwrap();
        assert_eq!(tx1.amount, Decimal::from(150));
        assert!(merged.transactions.iter().any(|t| t.id == "tx-2"));
    }

    #[test]
    fn stored_item_survives_when_newer() {
        let stored = state(
            vec![tx("tx-1", 100, Some("2025-05-09T00:00:00Z"))],
            &[],
            None,
        );
        let incoming = state(
            vec![tx("tx-1", 150, Some("2025-05-02T00:00:00Z"))],
            &[],
            None,
        );
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        assert_eq!(merged.transactions[0].amount, Decimal::from(100));
    }

    #[test]
    fn exact_tie_prefers_incoming() {
        let ts = Some("2025-05-01T00:00:00Z");
        let stored = state(vec![tx("tx-1", 100, ts)], &[], None);
        let incoming = state(vec![tx("tx-1", 150, ts)], &[], None);
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        assert_eq!(merged.transactions[0].amount, Decimal::from(150));
    }

    #[test]
    fn timestamped_item_beats_untimestamped() {
        let stored = state(vec![tx("tx-1", 100, Some("2020-01-01T00:00:00Z"))], &[], None);
        let incoming = state(vec![tx("tx-1", 150, None)], &[], None);
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        // Sem updatedAt conta como época zero: o lado guardado ganha
        assert_eq!(merged.transactions[0].amount, Decimal::from(100));
    }

    #[test]
    fn categories_union_never_shrinks() {
        let stored = state(vec![], &["Mercado", "Aluguel"], None);
        let incoming = state(vec![], &["Transporte"], None);
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        assert_eq!(
            merged.categories,
            vec!["Aluguel".to_string(), "Mercado".to_string(), "Transporte".to_string()]
        );
        assert!(merged.categories.len() >= stored.categories.len());
        assert!(merged.categories.len() >= incoming.categories.len());
    }

    #[test]
    fn scalars_move_as_a_pair() {
        let mut stored = state(vec![], &[], Some("2025-05-09T00:00:00Z"));
        stored.monthly_income = Decimal::from(9000);
        stored.variable_cap = Decimal::from(3000);
        let mut incoming = state(vec![], &[], Some("2025-05-01T00:00:00Z"));
        incoming.monthly_income = Decimal::from(100);
        incoming.variable_cap = Decimal::from(50);

        // Documento guardado é mais novo: os DOIS escalares vêm dele
        let merged = merge_states(Some(&stored), &incoming, now(), None);
        assert_eq!(merged.monthly_income, Decimal::from(9000));
        assert_eq!(merged.variable_cap, Decimal::from(3000));
    }

    #[test]
    fn schema_version_never_regresses() {
        let mut stored = state(vec![], &[], None);
        stored.schema_version = 4;
        let mut incoming = state(vec![], &[], None);
        incoming.schema_version = 2;
        let merged = merge_states(Some(&stored), &incoming, now(), Some(3));
        assert_eq!(merged.schema_version, 4);

        let merged = merge_states(Some(&stored), &incoming, now(), Some(9));
        assert_eq!(merged.schema_version, 9);
    }

    #[test]
    fn dirty_flags_are_stripped() {
        let mut incoming = state(vec![tx("tx-1", 100, None)], &[], None);
        incoming.transactions[0].needs_sync = Some(true);
        let merged = merge_states(None, &incoming, now(), None);
        assert_eq!(merged.transactions[0].needs_sync, None);
    }
}
