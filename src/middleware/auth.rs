// src/middleware/auth.rs

use std::fmt::Write as _;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
    common::error::AppError,
    config::{AppState, AuthSecrets},
};

type HmacSha256 = Hmac<Sha256>;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";
pub const SYNC_SIGNATURE_HEADER: &str = "x-sync-signature";
pub const SYNC_KEY_HEADER: &str = "x-sync-key";

// Comparação em tempo constante; comprimentos diferentes já falham direto.
fn secrets_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn header_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

// O middleware das rotas administrativas: bearer token ou x-admin-key igual
// ao segredo configurado. Segredo ausente é 503 ("desligado"), credencial
// errada é 401 ("negado") e nunca se confundem.
pub async fn admin_guard(
    State(app_state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(secret) = app_state.secrets.admin_secret.as_deref() else {
        return Err(AppError::ServiceUnconfigured("segredo administrativo"));
    };

    let headers = request.headers();
    let presented = header_value(headers, "Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| header_value(headers, ADMIN_KEY_HEADER));

    match presented {
        Some(token) if secrets_match(token, secret) => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

/// Assinatura esperada para um workspace: HMAC-SHA256 da chave do workspace,
/// chaveado pelo segredo de sincronização, em hex minúsculo.
pub fn sync_signature(secret: &str, workspace_key: &str) -> Result<String, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("segredo de sincronização inválido: {e}"))?;
    mac.update(workspace_key.as_bytes());
    let bytes = mac.finalize().into_bytes();
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    Ok(out)
}

// Autorização do sync, verificada no handler porque a assinatura depende da
// chave do workspace que vem no corpo: ou x-sync-signature (HMAC), ou
// x-sync-key (chave estática compartilhada).
pub fn verify_sync_auth(
    secrets: &AuthSecrets,
    headers: &HeaderMap,
    workspace_key: &str,
) -> Result<(), AppError> {
    let hmac_secret = secrets.sync_hmac_secret.as_deref();
    let static_key = secrets.sync_static_key.as_deref();

    if hmac_secret.is_none() && static_key.is_none() {
        return Err(AppError::ServiceUnconfigured("segredo de sincronização"));
    }

    if let (Some(secret), Some(signature)) =
        (hmac_secret, header_value(headers, SYNC_SIGNATURE_HEADER))
    {
        let expected = sync_signature(secret, workspace_key)?;
        if secrets_match(signature, &expected) {
            return Ok(());
        }
        return Err(AppError::Unauthorized);
    }

    if let (Some(expected), Some(presented)) = (static_key, header_value(headers, SYNC_KEY_HEADER))
    {
        if secrets_match(presented, expected) {
            return Ok(());
        }
    }

    Err(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn secrets(hmac: Option<&str>, static_key: Option<&str>) -> AuthSecrets {
        AuthSecrets {
            admin_secret: None,
            sync_hmac_secret: hmac.map(|s| s.to_string()),
            sync_static_key: static_key.map(|s| s.to_string()),
        }
    }

    #[test]
    fn signature_is_deterministic() {
        let a = sync_signature("segredo", "meu-workspace").unwrap();
        let b = sync_signature("segredo", "meu-workspace").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, sync_signature("outro", "meu-workspace").unwrap());
    }

    #[test]
    fn unconfigured_sync_auth_is_not_a_denial() {
        let headers = HeaderMap::new();
        let err = verify_sync_auth(&secrets(None, None), &headers, "ws").unwrap_err();
        assert!(matches!(err, AppError::ServiceUnconfigured(_)));
    }

    #[test]
    fn valid_hmac_signature_passes() {
        let signature = sync_signature("segredo", "meu-workspace").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            SYNC_SIGNATURE_HEADER,
            HeaderValue::from_str(&signature).unwrap(),
        );
        assert!(verify_sync_auth(&secrets(Some("segredo"), None), &headers, "meu-workspace").is_ok());
    }

    #[test]
    fn wrong_signature_is_denied() {
        let mut headers = HeaderMap::new();
        headers.insert(SYNC_SIGNATURE_HEADER, HeaderValue::from_static("deadbeef"));
        let err = verify_sync_auth(&secrets(Some("segredo"), None), &headers, "meu-workspace")
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }

    #[test]
    fn static_key_fallback_passes() {
        let mut headers = HeaderMap::new();
        headers.insert(SYNC_KEY_HEADER, HeaderValue::from_static("chave-fixa"));
        assert!(
            verify_sync_auth(&secrets(None, Some("chave-fixa")), &headers, "meu-workspace").is_ok()
        );
    }

    #[test]
    fn missing_credential_is_denied() {
        let headers = HeaderMap::new();
        let err = verify_sync_auth(&secrets(Some("segredo"), None), &headers, "ws").unwrap_err();
        assert!(matches!(err, AppError::Unauthorized));
    }
}
