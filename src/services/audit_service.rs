// src/services/audit_service.rs

use std::sync::Arc;

use crate::common::error::AppError;
use crate::db::LedgerStore;
use crate::models::audit::AuditEvent;

// Gravador de auditoria: uma linha imutável por operação mutante, nunca
// atualizada nem apagada.

#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn LedgerStore>,
}

impl AuditService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    // Falha de auditoria não passa em silêncio: pertence ao mesmo domínio de
    // falha da mutação que descreve. Nas rotas administrativas a mutação já
    // está durável quando chegamos aqui; a requisição falha mesmo assim e a
    // lacuna fica registrada no log como condição monitorada.
    pub async fn record(&self, event: AuditEvent) -> Result<(), AppError> {
        if let Err(err) = self.store.append_audit(&event).await {
            tracing::error!(
                "Auditoria não gravada ({} {} em {}): {} (mutação correspondente já está durável)",
                event.action.as_str(),
                event.entity_type,
                event.workspace_id,
                err
            );
            return Err(AppError::AuditWriteFailed(err.to_string()));
        }
        Ok(())
    }
}
