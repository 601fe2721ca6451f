//src/main.rs

use axum::{
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

// Declaração dos nossos módulos
mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;
mod sync;

// Importações principais
use crate::config::{AppState, Settings};
use crate::middleware::auth::admin_guard;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).compact().init();

    // Configuração resolvida uma vez e injetada; nada mais lê o ambiente
    let settings = Settings::from_env();

    // .expect() é bom aqui: se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new(&settings)
        .await
        .expect("Falha ao inicializar o estado da aplicação.");

    // Roda as migrações do SQLx na inicialização, quando há storage
    if let Some(pool) = &app_state.db_pool {
        sqlx::migrate!()
            .run(pool)
            .await
            .expect("Falha ao rodar as migrações do banco de dados.");
        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
    }

    // Rotas administrativas (protegidas pelo middleware de segredo)
    let admin_routes = Router::new()
        .route("/transactions", get(handlers::admin::list_transactions))
        .route(
            "/transactions/{id}",
            patch(handlers::admin::update_transaction)
                .delete(handlers::admin::delete_transaction),
        )
        .route(
            "/transactions/{id}/restore",
            post(handlers::admin::restore_transaction),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            admin_guard,
        ));

    // Combina tudo no router principal. A autorização do sync fica no
    // handler porque a assinatura HMAC depende da chave do workspace no corpo.
    let app = Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route(
            "/api/sync",
            post(handlers::sync::sync).get(handlers::sync::pull),
        )
        .nest("/api/admin", admin_routes)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .with_state(app_state);

    // Inicia o servidor
    let addr = format!("0.0.0.0:{}", settings.port);
    let listener = TcpListener::bind(&addr)
        .await
        .expect("Falha ao iniciar o listener TCP");
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .await
        .expect("Erro no servidor Axum");
}
