use actix_cors::Cors;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{web, App, HttpServer};

use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use x402::rpc::MeridianLedgerClient;
use x402::{
    HttpKvBackend, NetworkConfig, PaymentVerifier, ReplayStore, SettlementCoordinator,
    SponsorConfig, SponsorKey,
};
use x402_facilitator::routes;
use x402_facilitator::state::AppState;

fn parse_cors_origins() -> Vec<String> {
    match std::env::var("ALLOWED_ORIGINS") {
        Ok(origins) => origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => vec![],
    }
}

fn build_cors(origins: &[String]) -> Cors {
    if origins.is_empty() {
        // Default: allow localhost on any port
        Cors::default()
            .allowed_origin_fn(|origin, _| {
                origin
                    .to_str()
                    .map(|o| o == "http://localhost" || o.starts_with("http://localhost:"))
                    .unwrap_or(false)
            })
            .allow_any_method()
            .allowed_headers(vec!["content-type", "authorization", "x-facilitator-auth"])
            .max_age(3600)
    } else {
        let mut cors = Cors::default();
        for origin in origins {
            cors = cors.allowed_origin(origin);
        }
        cors.allow_any_method()
            .allowed_headers(vec!["content-type", "authorization", "x-facilitator-auth"])
            .max_age(3600)
    }
}

fn network_config() -> NetworkConfig {
    let mut config = match std::env::var("MERIDIAN_NETWORK").as_deref() {
        Ok("mainnet") | Ok("meridian-mainnet") => NetworkConfig::mainnet(),
        _ => NetworkConfig::default(),
    };
    if let Ok(rpc_url) = std::env::var("MERIDIAN_RPC_URL") {
        if !rpc_url.is_empty() {
            config.rpc_url = rpc_url;
        }
    }
    if let Some(secs) = std::env::var("LEDGER_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
    {
        config.ledger_timeout = Duration::from_secs(secs);
    }
    config
}

/// Replay store: shared KV service when configured, otherwise process-local
/// memory with a loud warning. The KV path still degrades to memory at call
/// time if the service is unreachable.
fn build_replay_store() -> Arc<ReplayStore> {
    match std::env::var("REPLAY_KV_URL").ok().filter(|s| !s.is_empty()) {
        Some(kv_url) => {
            let token = std::env::var("REPLAY_KV_TOKEN").ok().filter(|s| !s.is_empty());
            let ttl = std::env::var("REPLAY_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(x402::REPLAY_TTL_SECS);
            tracing::info!(url = %kv_url, ttl_secs = ttl, "replay store: shared KV service");
            Arc::new(ReplayStore::with_backend(
                Arc::new(HttpKvBackend::new(kv_url, token)),
                Duration::from_secs(ttl),
            ))
        }
        None => {
            tracing::warn!(
                "REPLAY_KV_URL not set, replay protection will not survive a restart"
            );
            Arc::new(ReplayStore::in_memory())
        }
    }
}

fn sponsor_config() -> Option<SponsorConfig> {
    let address = std::env::var("SPONSOR_ADDRESS").ok().filter(|s| !s.is_empty())?;
    let seed = std::env::var("SPONSOR_SECRET_KEY").ok().filter(|s| !s.is_empty())?;
    let max_fee = std::env::var("SPONSOR_MAX_FEE").unwrap_or_else(|_| "500".to_string());
    match SponsorKey::from_hex(address, &seed) {
        Ok(key) => {
            tracing::info!(sponsor = %key.address, "fee sponsorship enabled");
            Some(SponsorConfig { key, max_fee })
        }
        Err(e) => {
            tracing::error!("invalid SPONSOR_SECRET_KEY: {e}");
            std::process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = network_config();

    let hmac_secret: Vec<u8> = match std::env::var("FACILITATOR_SHARED_SECRET")
        .ok()
        .filter(|s| !s.is_empty())
    {
        Some(s) => {
            let bytes = s.into_bytes();
            if bytes.len() < 32 {
                tracing::warn!(
                    "FACILITATOR_SHARED_SECRET is only {} bytes (minimum 32 recommended), \
                     use `openssl rand -hex 32` to generate a secure secret",
                    bytes.len()
                );
            }
            bytes
        }
        None => {
            tracing::error!(
                "FACILITATOR_SHARED_SECRET is required. \
                 Set it to a secure random value (e.g. `openssl rand -hex 32`). \
                 For local development, any non-empty value will work."
            );
            std::process::exit(1);
        }
    };

    let ledger = Arc::new(MeridianLedgerClient::new(&config.rpc_url));
    let store = build_replay_store();

    let verifier = PaymentVerifier::new(Arc::clone(&ledger), config.clone());
    let mut coordinator =
        SettlementCoordinator::new(Arc::clone(&ledger), Arc::clone(&store), config.clone());
    if let Some(sponsor) = sponsor_config() {
        coordinator = coordinator.with_sponsor(sponsor);
    }

    let webhook_urls: Vec<String> = std::env::var("WEBHOOK_URLS")
        .ok()
        .map(|urls| {
            urls.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if !webhook_urls.is_empty() {
        tracing::info!("Webhook URLs configured: {}", webhook_urls.len());
        if let Err(e) = x402_facilitator::webhook::validate_webhook_urls(&webhook_urls) {
            tracing::error!("Invalid webhook configuration: {e}");
            std::process::exit(1);
        }
    }

    let metrics_token = std::env::var("METRICS_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| s.into_bytes());

    if metrics_token.is_none() {
        tracing::warn!("METRICS_TOKEN not set, /metrics requires X402_PUBLIC_METRICS=true");
    }

    // Derive a domain-separated webhook HMAC key from the shared secret
    let webhook_hmac_key =
        Some(x402::hmac::compute_hmac(&hmac_secret, b"x402-webhook-hmac").into_bytes());

    let state = web::Data::new(AppState {
        verifier,
        coordinator: Arc::new(coordinator),
        store,
        ledger,
        config: config.clone(),
        hmac_secret,
        webhook_urls,
        http_client: x402_facilitator::webhook::webhook_client(),
        metrics_token,
        webhook_hmac_key,
    });

    let port: u16 = std::env::var("FACILITATOR_PORT")
        .or_else(|_| std::env::var("PORT"))
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(4021);

    let rate_limit_rpm: u64 = std::env::var("RATE_LIMIT_RPM")
        .ok()
        .and_then(|r| r.parse().ok())
        .unwrap_or(120);

    let cors_origins = parse_cors_origins();

    tracing::info!("Meridian x402 Facilitator listening on port {port}");
    tracing::info!("Network: {} via {}", config.network, config.rpc_url);
    tracing::info!("Rate limit: {rate_limit_rpm} req/min per IP");
    tracing::info!("  GET  http://localhost:{port}/supported");
    tracing::info!("  POST http://localhost:{port}/verify");
    tracing::info!("  POST http://localhost:{port}/settle");

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm)
        .finish()
        .expect("failed to build rate limiter config");

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&cors_origins))
            .wrap(Governor::new(&governor_conf))
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(65_536))
            .service(routes::health)
            .service(routes::metrics_endpoint)
            .service(routes::supported)
            .service(routes::verify)
            .service(routes::settle)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
