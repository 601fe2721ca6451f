// src/models/audit.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

// Evento de auditoria append-only: uma linha por chamada mutante, nunca
// alterada ou apagada depois de gravada.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    Sync,
    Update,
    Delete,
    Restore,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Sync => "sync",
            AuditAction::Update => "update",
            AuditAction::Delete => "delete",
            AuditAction::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub action: AuditAction,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub actor_user_id: Option<String>,
    pub actor_device_id: String,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    // Snapshot completo antes/depois; `after` fica None em deleções que não
    // retornam linha.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        workspace_id: Uuid,
        entity_type: &str,
        entity_id: Option<String>,
        action: AuditAction,
        before: Option<Value>,
        after: Option<Value>,
        actor_device_id: String,
        actor_user_id: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        AuditEvent {
            id: Uuid::new_v4(),
            workspace_id,
            entity_type: entity_type.to_string(),
            entity_id,
            action,
            before,
            after,
            actor_user_id,
            actor_device_id,
            created_at,
        }
    }
}
