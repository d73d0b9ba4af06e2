use std::sync::Arc;

use x402::rpc::MeridianLedgerClient;
use x402::{NetworkConfig, PaymentVerifier, ReplayStore, SettlementCoordinator};

/// Shared application state for the facilitator server.
pub struct AppState {
    pub verifier: PaymentVerifier<MeridianLedgerClient>,
    /// Arc so settlement can be spawned onto the runtime and survive a
    /// client disconnect.
    pub coordinator: Arc<SettlementCoordinator<MeridianLedgerClient>>,
    pub store: Arc<ReplayStore>,
    pub ledger: Arc<MeridianLedgerClient>,
    pub config: NetworkConfig,
    /// HMAC shared secret for authenticating /verify and /settle requests.
    /// Mandatory; the facilitator will not start without it.
    pub hmac_secret: Vec<u8>,
    pub webhook_urls: Vec<String>,
    pub http_client: reqwest::Client,
    /// Separate bearer token for the /metrics endpoint (not the HMAC secret).
    pub metrics_token: Option<Vec<u8>>,
    /// Derived key for webhook HMAC signing (domain-separated from the auth
    /// secret).
    pub webhook_hmac_key: Option<Vec<u8>>,
}
