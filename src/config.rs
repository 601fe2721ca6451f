// src/config.rs

use std::{env, sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::db::{LedgerStore, PgLedgerStore};
use crate::services::{AdminService, AuditService, SyncService};

// Configuração resolvida uma única vez no arranque e injetada na construção
// dos handlers. Nada lê o ambiente depois daqui; os testes substituem o
// storage na construção dos services sem mexer em estado ambiente.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: Option<String>,
    pub port: u16,
    pub db_max_connections: u32,
    pub admin_secret: Option<String>,
    pub sync_hmac_secret: Option<String>,
    pub sync_static_key: Option<String>,
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Settings {
            database_url: env_opt("DATABASE_URL"),
            port: env_opt("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000),
            db_max_connections: env_opt("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            admin_secret: env_opt("ADMIN_API_SECRET"),
            sync_hmac_secret: env_opt("SYNC_HMAC_SECRET"),
            sync_static_key: env_opt("SYNC_STATIC_KEY"),
        }
    }
}

// Segredos compartilhados dos dois surfaces. Qualquer um ausente desliga o
// surface correspondente (503), sem derrubar o processo.
#[derive(Debug, Clone)]
pub struct AuthSecrets {
    pub admin_secret: Option<String>,
    pub sync_hmac_secret: Option<String>,
    pub sync_static_key: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Option<PgPool>,
    pub secrets: AuthSecrets,
    pub sync_service: Option<SyncService>,
    pub admin_service: Option<AdminService>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        let db_pool = match &settings.database_url {
            Some(url) => {
                // Conecta ao banco de dados, usando '?' para propagar erros
                let pool = PgPoolOptions::new()
                    .max_connections(settings.db_max_connections)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(url)
                    .await?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");
                Some(pool)
            }
            None => {
                tracing::warn!(
                    "DATABASE_URL ausente; sync e admin responderão 503 até o storage ser configurado"
                );
                None
            }
        };

        // --- Monta o gráfico de dependências ---
        let (sync_service, admin_service) = match &db_pool {
            Some(pool) => {
                let store: Arc<dyn LedgerStore> = Arc::new(PgLedgerStore::new(pool.clone()));
                let audit_service = AuditService::new(store.clone());
                (
                    Some(SyncService::new(store.clone())),
                    Some(AdminService::new(store, audit_service)),
                )
            }
            None => (None, None),
        };

        Ok(Self {
            db_pool,
            secrets: AuthSecrets {
                admin_secret: settings.admin_secret.clone(),
                sync_hmac_secret: settings.sync_hmac_secret.clone(),
                sync_static_key: settings.sync_static_key.clone(),
            },
            sync_service,
            admin_service,
        })
    }
}
