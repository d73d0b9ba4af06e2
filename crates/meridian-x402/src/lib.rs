// Core types and wire contract
pub mod constants;
pub mod error;
pub mod hmac;
pub mod payment;
pub mod response;
pub mod security;

// Meridian ledger seam
pub mod envelope;
pub mod ledger;
pub mod rpc;

// Verify / settle / replay-protection subsystem
pub mod replay;
pub mod settlement;
pub mod validator;
pub mod verifier;

// Re-exports
pub use constants::NetworkConfig;
pub use constants::*;
pub use error::X402Error;
pub use payment::*;
pub use response::*;

pub use envelope::SponsorKey;
pub use ledger::{Balance, LedgerAccount, LedgerClient, LedgerError, ParsedEnvelope, SubmitReceipt};
pub use replay::{HttpKvBackend, KvBackend, KvError, ReplayStore, SettlementRecord};
pub use rpc::MeridianLedgerClient;
pub use settlement::{SettlementCoordinator, SponsorConfig};
pub use verifier::PaymentVerifier;
