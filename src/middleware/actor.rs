// src/middleware/actor.rs

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};

use crate::common::error::AppError;

// Identificação do ator em toda rota mutante: dispositivo obrigatório,
// usuário opcional. Ausência de dispositivo é requisição rejeitada, nunca
// uma gravação anônima silenciosa.

pub const DEVICE_ID_HEADER: &str = "x-device-id";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone)]
pub struct Actor {
    pub device_id: String,
    pub user_id: Option<String>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

impl Actor {
    // O sync aceita o ator por cabeçalho ou por campos do corpo; o cabeçalho
    // ganha quando os dois vierem.
    pub fn resolve(
        headers: &HeaderMap,
        body_device_id: Option<String>,
        body_user_id: Option<String>,
    ) -> Result<Self, AppError> {
        let device_id = header_value(headers, DEVICE_ID_HEADER)
            .or(body_device_id)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| {
                AppError::validation(
                    "Identificador de dispositivo ausente (cabeçalho x-device-id ou deviceId no corpo).",
                )
            })?;
        let user_id = header_value(headers, USER_ID_HEADER)
            .or(body_user_id)
            .filter(|value| !value.trim().is_empty());
        Ok(Actor { device_id, user_id })
    }
}

// Extrator para as rotas administrativas, que só olham cabeçalhos.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::resolve(&parts.headers, None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn device_id_is_mandatory() {
        let headers = HeaderMap::new();
        assert!(Actor::resolve(&headers, None, None).is_err());
    }

    #[test]
    fn header_wins_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert(DEVICE_ID_HEADER, HeaderValue::from_static("device-a"));
        let actor = Actor::resolve(&headers, Some("device-b".to_string()), None).unwrap();
        assert_eq!(actor.device_id, "device-a");
    }

    #[test]
    fn body_fallback_applies() {
        let headers = HeaderMap::new();
        let actor =
            Actor::resolve(&headers, Some("device-b".to_string()), Some("user-1".to_string()))
                .unwrap();
        assert_eq!(actor.device_id, "device-b");
        assert_eq!(actor.user_id.as_deref(), Some("user-1"));
    }
}
