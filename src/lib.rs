pub mod auth;
pub mod config;
pub mod db;
pub mod error;

use std::sync::Arc;
use std::time::Duration as StdDuration;
use actix_web::{web, HttpResponse};
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use config::Settings;

use auth::{
    handlers, AttemptLedger, AuthGate, CredentialVerifier, LoginOrchestrator, RouteTable,
    SecretHasher, SignupService, SigningKey, TokenCodec,
};
use config::DatabaseBackend;
use db::{AttemptStore, DbOperations, InMemoryStore, UserStore};

/// Health check endpoint handler
/// Returns a JSON response with server status and timestamp
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Registers every route. The gate's route table must agree with the public
/// endpoints listed here.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        AppError::ValidationError(format!("Validation of request failed: {}", err)).into()
    }))
    .route("/health", web::get().to(health_check))
    .service(
        web::scope("/api/auth")
            .route("/signup", web::post().to(handlers::signup))
            .route("/login", web::post().to(handlers::login))
            .route("/loginAttempts", web::get().to(handlers::login_attempts)),
    );
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub tokens: Arc<TokenCodec>,
    pub users: Arc<dyn UserStore>,
    pub routes: Arc<RouteTable>,
    pub login: Arc<LoginOrchestrator>,
    pub signup: Arc<SignupService>,
    db: Option<DbOperations>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        match config.database.backend {
            DatabaseBackend::Postgres => {
                let db = DbOperations::new_with_options(
                    &config.database.url,
                    config.database.max_connections,
                    StdDuration::from_secs(config.database.acquire_timeout_secs),
                )
                .await?;

                if config.database.run_migrations {
                    db.run_migrations().await?;
                    info!("Database migrations applied");
                }

                let mut state = Self::with_stores(config, Arc::new(db.clone()), Arc::new(db.clone()))?;
                state.db = Some(db);
                Ok(state)
            }
            DatabaseBackend::Memory => {
                warn!("Using in-memory storage; accounts and login attempts are lost on restart");
                let store = InMemoryStore::new();
                Self::with_stores(config, Arc::new(store.clone()), Arc::new(store))
            }
        }
    }

    /// Wires the auth components over the given persistence collaborators.
    pub fn with_stores(
        config: Settings,
        users: Arc<dyn UserStore>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Result<Self> {
        config.validate()?;
        let (key, generated) = SigningKey::from_config(&config.auth)?;
        if generated {
            warn!("No auth.jwt_secret configured; generated a per-process signing key, tokens will not survive a restart");
        }

        let tokens = Arc::new(TokenCodec::new(
            &key,
            chrono::Duration::minutes(config.auth.token_ttl_minutes),
        ));
        let hasher = SecretHasher::new();
        let verifier = CredentialVerifier::new(users.clone(), hasher.clone())?;
        let ledger = AttemptLedger::new(attempts, config.auth.recent_attempts_limit);

        Ok(Self {
            config: Arc::new(config),
            login: Arc::new(LoginOrchestrator::new(verifier, tokens.clone(), ledger)),
            signup: Arc::new(SignupService::new(users.clone(), hasher)),
            routes: Arc::new(RouteTable::default()),
            tokens,
            users,
            db: None,
        })
    }

    pub fn gate(&self) -> AuthGate {
        AuthGate::new(self.tokens.clone(), self.users.clone(), self.routes.clone())
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}
