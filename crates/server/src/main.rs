//! evote server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use evote_api::AppState;
use evote_common::{Config, config::BlockchainMode};
use evote_core::{
    AdminActionLog, AdminAuthService, ElectionService, InMemoryChain, MirrorService,
    VoterService, VotingService, WebAuthnConfig, WebAuthnService,
};
use evote_db::repositories::{
    ElectionRepository, VoterCredentialRepository, VoterRepository, VotingRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often expired admin sessions and `WebAuthn` challenges are dropped.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "evote=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting evote server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(evote_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    evote_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let election_repo = ElectionRepository::new(Arc::clone(&db));
    let voter_repo = VoterRepository::new(Arc::clone(&db));
    let voting_repo = VotingRepository::new(Arc::clone(&db));
    let credential_repo = VoterCredentialRepository::new(Arc::clone(&db));

    // Initialize services
    let action_log = AdminActionLog::new();
    let election_service = ElectionService::new(election_repo.clone(), action_log.clone());
    let voter_service = VoterService::new(
        voter_repo.clone(),
        voting_repo.clone(),
        config.verification.clone(),
        action_log.clone(),
    );

    let mut voting_service = VotingService::new(
        election_repo,
        voter_repo,
        voting_repo,
        action_log.clone(),
        config.verification.require_verified_voter,
    );
    match config.blockchain.mode {
        BlockchainMode::Mock => {
            let mirror: MirrorService = Arc::new(InMemoryChain::new());
            voting_service = voting_service.with_mirror(mirror);
            info!("Blockchain mirror: in-memory");
        }
        BlockchainMode::Disabled => info!("Blockchain mirror disabled"),
    }

    let webauthn_config =
        WebAuthnConfig::from_server_url(&config.server.url, &config.webauthn.rp_name)?;
    let webauthn_service =
        WebAuthnService::new(&webauthn_config, credential_repo, voter_service.clone())?;
    let admin_service = AdminAuthService::new(config.admin.clone());

    // Periodic cleanup
    {
        let webauthn_service = webauthn_service.clone();
        let admin_service = admin_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                webauthn_service.cleanup_expired_challenges().await;
                admin_service.cleanup_expired_sessions().await;
            }
        });
    }

    let state = AppState {
        election_service,
        voter_service,
        voting_service,
        webauthn_service,
        admin_service,
        action_log,
    };

    let app = evote_api::app(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
