use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpResponse, HttpServer, middleware, web};
use std::sync::Arc;

use clubflow::config::{AppConfig, StoreKind};
use clubflow::notify::LogNotifier;
use clubflow::workflow::{MemoryStore, PgStore, ProposalStore, WorkflowEngine};
use clubflow::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let store: Arc<dyn ProposalStore> = match config.store {
        StoreKind::Postgres => {
            let pool = db::connect(&config).await.map_err(std::io::Error::other)?;
            Arc::new(PgStore::new(pool))
        }
        StoreKind::Memory => {
            log::warn!("Using in-memory store; all data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let engine = web::Data::new(WorkflowEngine::new(store, Arc::new(LogNotifier)));
    let secret_key = config.session_key();

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(engine.clone())
            .app_data(handlers::json_config())
            .route("/health", web::get().to(|| async { HttpResponse::Ok().body("ok") }))
            .service(web::scope("/api/v1").configure(handlers::api_v1::configure))
            .default_service(web::to(|| async {
                HttpResponse::NotFound().json(serde_json::json!({
                    "error": "Not found",
                    "kind": "not_found",
                }))
            }))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
