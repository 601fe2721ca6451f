use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// Nosso tipo de erro central. Cada variante corresponde a uma classe de
// resposta HTTP: configuração ausente (503), credencial (401), entrada
// inválida (400), conflito de revisão (409), não encontrado (404) e falhas
// de storage/inesperadas (500).
#[derive(Debug, Error)]
pub enum AppError {
    // O recurso existe mas o operador não configurou o backend (storage ou
    // segredos de autenticação). Diferente de 401: "desligado" != "negado".
    #[error("Serviço não configurado: {0}")]
    ServiceUnconfigured(&'static str),

    #[error("Credencial inválida ou ausente")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    // Guarda de revisão: o chamador precisa rebuscar o estado e tentar de
    // novo com a revisão atual (única classe de erro com protocolo de retry).
    #[error("Revisão desatualizada")]
    RevisionConflict {
        current_revision: i64,
        server_updated_at: String,
    },

    #[error("{0} não encontrado")]
    NotFound(&'static str),

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Timeout ao acessar o storage")]
    StorageTimeout,

    // A mutação já está durável mas a trilha de auditoria não foi gravada.
    // Tratado como falha da requisição inteira; ver services/audit_service.rs.
    #[error("Falha ao gravar evento de auditoria: {0}")]
    AuditWriteFailed(String),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }
}

// Diagnóstico truncado: o corpo 500 nunca carrega a mensagem inteira do
// driver, só um prefixo.
fn truncated(msg: &str, max: usize) -> String {
    if msg.len() <= max {
        msg.to_string()
    } else {
        let mut cut = max;
        while !msg.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &msg[..cut])
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ServiceUnconfigured(what) => {
                tracing::warn!("Recurso desabilitado por configuração: {}", what);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    format!("Serviço não configurado: {what}"),
                )
            }
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Credencial inválida ou ausente.".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),

            // O 409 carrega a revisão atual e o timestamp do servidor para o
            // cliente rebuscar e reenviar.
            AppError::RevisionConflict {
                current_revision,
                server_updated_at,
            } => {
                let body = Json(json!({
                    "error": "Conflito de revisão: estado do servidor mudou.",
                    "currentRevision": current_revision,
                    "serverUpdatedAt": server_updated_at,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }

            AppError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("{what} não encontrado."))
            }

            // Falhas de storage e inesperadas viram 500 com diagnóstico
            // truncado; o detalhe completo vai para o log.
            ref e @ (AppError::DatabaseError(_)
            | AppError::StorageTimeout
            | AppError::AuditWriteFailed(_)
            | AppError::InternalServerError(_)) => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    truncated(&e.to_string(), 180),
                )
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_keeps_short_messages() {
        assert_eq!(truncated("curto", 180), "curto");
    }

    #[test]
    fn truncated_cuts_long_messages() {
        let long = "x".repeat(500);
        let out = truncated(&long, 180);
        assert!(out.len() < 200);
        assert!(out.ends_with('…'));
    }
}
