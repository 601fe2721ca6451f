// src/sync/revision.rs

use crate::common::error::AppError;

// Guarda de revisão: checagem de concorrência otimista. A guarda nunca
// resolve uma revisão velha fazendo merge mesmo assim: o contador só serve
// de lock token se o conflito for devolvido ao chamador.

/// Compara a revisão guardada com a que o chamador espera. Sem revisão no
/// pedido, a checagem é pulada (primeiro sync e chamadores agnósticos sempre
/// passam). Com revisão divergente, devolve o conflito carregando a revisão
/// atual e o timestamp do servidor, para o cliente rebuscar e reenviar.
pub fn check_revision(
    stored_revision: i64,
    requested: Option<i64>,
    server_updated_at: &str,
) -> Result<(), AppError> {
    match requested {
        None => Ok(()),
        Some(revision) if revision == stored_revision => Ok(()),
        Some(_) => Err(AppError::RevisionConflict {
            current_revision: stored_revision,
            server_updated_at: server_updated_at.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_revision_skips_the_check() {
        assert!(check_revision(7, None, "2025-06-01T00:00:00Z").is_ok());
    }

    #[test]
    fn matching_revision_passes() {
        assert!(check_revision(7, Some(7), "2025-06-01T00:00:00Z").is_ok());
    }

    #[test]
    fn stale_revision_conflicts_with_current_value() {
        let err = check_revision(7, Some(6), "2025-06-01T00:00:00Z").unwrap_err();
        match err {
            AppError::RevisionConflict {
                current_revision,
                server_updated_at,
            } => {
                assert_eq!(current_revision, 7);
                assert_eq!(server_updated_at, "2025-06-01T00:00:00Z");
            }
            other => panic!("esperava conflito, veio {other:?}"),
        }
    }
}
