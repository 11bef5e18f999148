pub mod api;
pub mod websocket;

use axum::{ routing::get, Router };
use axum_server::tls_rustls::RustlsConfig;
use log::{ error, info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{ Any, CorsLayer };

use crate::assistant::PolicyAssistant;
use crate::cli::Args;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<PolicyAssistant>,
    pub sessions: Arc<SessionStore>,
    pub api_key: Option<String>,
}

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

impl AppState {
    pub fn new(assistant: Arc<PolicyAssistant>, api_key: Option<String>) -> Self {
        Self::with_sessions(assistant, api_key, Arc::new(SessionStore::new()))
    }

    pub fn with_sessions(
        assistant: Arc<PolicyAssistant>,
        api_key: Option<String>,
        sessions: Arc<SessionStore>
    ) -> Self {
        Self {
            assistant,
            sessions,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/api/sessions/{id}/messages", get(api::session_messages))
        .route("/ws", get(websocket::ws_handler))
        .layer(cors)
        .with_state(state)
}

struct TlsPaths {
    cert_path: String,
    key_path: String,
}

pub struct Server {
    addr: String,
    state: AppState,
    tls: Option<TlsPaths>,
}

impl Server {
    pub fn new(
        addr: String,
        assistant: Arc<PolicyAssistant>,
        api_key: Option<String>,
        args: &Args
    ) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let sessions = Arc::new(
            SessionStore::with_idle_ttl(Duration::from_secs(args.session_idle_ttl_secs))
        );
        let state = AppState::with_sessions(assistant, api_key, sessions);
        if state.api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        let tls = if args.enable_tls {
            match (&args.tls_cert_path, &args.tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    Some(TlsPaths { cert_path: cert_path.clone(), key_path: key_path.clone() })
                }
                (Some(_), None) | (None, Some(_)) => {
                    error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                    return Err("Missing TLS certificate or key path".into());
                }
                (None, None) => {
                    error!("--enable-tls was set but no certificate/key paths provided.");
                    return Err("TLS enabled without cert/key".into());
                }
            }
        } else {
            None
        };

        Ok(Self { addr, state, tls })
    }

    pub async fn run(self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr: SocketAddr = self.addr
            .parse()
            .map_err(|e| format!("Invalid server address '{}': {}", self.addr, e))?;
        let sweep_every = SESSION_SWEEP_INTERVAL.min(self.state.sessions.idle_ttl()).max(
            Duration::from_secs(1)
        );
        self.state.sessions.spawn_sweeper(sweep_every);
        let app = router(self.state);

        match self.tls {
            Some(tls) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    tls.cert_path,
                    tls.key_path
                );
                let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
                info!("HTTPS server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
            }
            None => {
                let listener = TcpListener::bind(addr).await.map_err(|e|
                    format!("Failed to bind HTTP server to {}: {}", addr, e)
                )?;
                info!("HTTP server listening on: http://{}", addr);
                axum::serve(listener, app).await?;
            }
        }

        Ok(())
    }
}
