use std::sync::Arc;

use actix_web::{get, post, web, HttpRequest, HttpResponse};
use serde::Deserialize;
use x402::{validator, ErrorReason, PaymentRequirements, SettleResponse, VerifyResponse};

use crate::metrics;
use crate::state::AppState;
use crate::webhook;

/// Request body for `/verify` and `/settle`. The payment payload arrives
/// either base64-encoded (`paymentHeader`) or as the decoded object
/// (`paymentPayload`).
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    #[serde(default = "default_version")]
    pub x402_version: u32,
    #[serde(default)]
    pub payment_header: Option<String>,
    #[serde(default)]
    pub payment_payload: Option<serde_json::Value>,
    pub payment_requirements: PaymentRequirements,
}

fn default_version() -> u32 {
    validator::X402_VERSION
}

/// Validate the HMAC header on an incoming request.
/// HMAC authentication is always required; the secret must be set at startup.
/// Returns an error response if the signature is missing or invalid.
fn validate_hmac(
    req: &HttpRequest,
    body_bytes: &[u8],
    state: &AppState,
) -> Result<(), HttpResponse> {
    let secret = &state.hmac_secret;

    let header_value = req
        .headers()
        .get("X-Facilitator-Auth")
        .and_then(|v| v.to_str().ok());

    match header_value {
        Some(sig) => {
            if x402::hmac::verify_hmac(secret, body_bytes, sig) {
                Ok(())
            } else {
                tracing::warn!("HMAC verification failed, signature mismatch");
                metrics::HMAC_FAILURES.with_label_values(&["invalid"]).inc();
                Err(HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "authentication failed"
                })))
            }
        }
        None => {
            tracing::warn!("HMAC header missing on authenticated endpoint");
            metrics::HMAC_FAILURES.with_label_values(&["missing"]).inc();
            Err(HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "authentication required"
            })))
        }
    }
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let fallback_events = state.store.fallback_events();
    metrics::STORE_FALLBACK_EVENTS.set(fallback_events as i64);
    match state.ledger.latest_ledger().await {
        Ok(height) => HttpResponse::Ok().json(serde_json::json!({
            "status": "ok",
            "service": "x402-facilitator",
            "network": &state.config.network,
            "latestLedger": height.to_string(),
            "replayFallbackEvents": fallback_events,
        })),
        Err(_) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "degraded",
            "service": "x402-facilitator",
            "network": &state.config.network,
            "error": "node unreachable",
            "replayFallbackEvents": fallback_events,
        })),
    }
}

#[get("/supported")]
pub async fn supported(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "kinds": [{
            "x402Version": validator::X402_VERSION,
            "scheme": &state.config.scheme_name,
            "network": &state.config.network,
        }],
    }))
}

#[post("/verify")]
pub async fn verify(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    if let Err(resp) = validate_hmac(&req, &body, &state) {
        return resp;
    }

    let parsed: PaymentRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => {
            metrics::VERIFY_REQUESTS.with_label_values(&["invalid"]).inc();
            return HttpResponse::BadRequest()
                .json(VerifyResponse::invalid(ErrorReason::InvalidPayload));
        }
    };

    let payload = match validator::decode_request(
        parsed.x402_version,
        parsed.payment_header.as_deref(),
        parsed.payment_payload.as_ref(),
        &state.config,
    ) {
        Ok(payload) => payload,
        Err(reason) => {
            metrics::VERIFY_REQUESTS.with_label_values(&["invalid"]).inc();
            return HttpResponse::Ok().json(VerifyResponse::invalid(reason));
        }
    };

    let verdict = state
        .verifier
        .verify(&payload, &parsed.payment_requirements)
        .await;

    if verdict.is_valid {
        metrics::VERIFY_REQUESTS.with_label_values(&["valid"]).inc();
    } else {
        metrics::VERIFY_REQUESTS.with_label_values(&["invalid"]).inc();
        tracing::info!(
            payer = ?verdict.payer,
            reason = ?verdict.invalid_reason,
            "verification rejected"
        );
    }
    HttpResponse::Ok().json(verdict)
}

#[post("/settle")]
pub async fn settle(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> HttpResponse {
    if let Err(resp) = validate_hmac(&req, &body, &state) {
        return resp;
    }

    let parsed: PaymentRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(_) => {
            metrics::SETTLE_REQUESTS.with_label_values(&["invalid"]).inc();
            return HttpResponse::BadRequest().json(SettleResponse::failure(
                ErrorReason::InvalidPayload,
                state.config.network.clone(),
            ));
        }
    };

    let payload = match validator::decode_request(
        parsed.x402_version,
        parsed.payment_header.as_deref(),
        parsed.payment_payload.as_ref(),
        &state.config,
    ) {
        Ok(payload) => payload,
        Err(reason) => {
            metrics::SETTLE_REQUESTS.with_label_values(&["invalid"]).inc();
            return HttpResponse::Ok().json(SettleResponse::failure(
                reason,
                state.config.network.clone(),
            ));
        }
    };

    let amount = payload.payload.amount.clone();
    let start = std::time::Instant::now();

    // Spawn the settlement so a client disconnect cannot abort it: a
    // submitted transaction must always reach the replay store.
    let coordinator = Arc::clone(&state.coordinator);
    let requirements = parsed.payment_requirements;
    let handle =
        tokio::spawn(async move { coordinator.settle(&payload, &requirements).await });

    let result = match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "settlement task failed");
            metrics::SETTLE_REQUESTS.with_label_values(&["error"]).inc();
            return HttpResponse::InternalServerError().json(SettleResponse::failure(
                ErrorReason::UnexpectedSettleError,
                state.config.network.clone(),
            ));
        }
    };

    let elapsed = start.elapsed().as_secs_f64();
    metrics::STORE_FALLBACK_EVENTS.set(state.store.fallback_events() as i64);
    if result.success {
        metrics::SETTLE_REQUESTS.with_label_values(&["success"]).inc();
        metrics::SETTLE_LATENCY
            .with_label_values(&["success"])
            .observe(elapsed);
        tracing::info!(
            payer = ?result.payer,
            tx = ?result.transaction,
            "settlement completed"
        );

        if !state.webhook_urls.is_empty() {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            webhook::fire_webhooks(
                &state.http_client,
                &state.webhook_urls,
                webhook::SettlementWebhook {
                    event: "settlement.success".to_string(),
                    payer: result.payer.clone().unwrap_or_default(),
                    amount,
                    transaction: result.transaction.clone(),
                    network: result.network.clone(),
                    timestamp: now,
                },
                state.webhook_hmac_key.as_deref(),
            );
        }
    } else {
        metrics::SETTLE_REQUESTS.with_label_values(&["rejected"]).inc();
        metrics::SETTLE_LATENCY
            .with_label_values(&["rejected"])
            .observe(elapsed);
        tracing::warn!(
            payer = ?result.payer,
            reason = ?result.error_reason,
            "settlement rejected"
        );
    }
    HttpResponse::Ok().json(result)
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    // Separate METRICS_TOKEN gates metrics (not the HMAC shared secret).
    match &state.metrics_token {
        Some(token) => {
            let authorized = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(|t| x402::security::constant_time_eq(t.as_bytes(), token))
                .unwrap_or(false);

            if !authorized {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            // No token configured: metrics stay protected by default.
            // Set X402_PUBLIC_METRICS=true to opt in to unauthenticated access.
            let public_metrics = std::env::var("X402_PUBLIC_METRICS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false);
            if !public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or X402_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::metrics_output())
}
