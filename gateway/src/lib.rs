//! HTTP/JSON gateway for the compliance ledger
//!
//! Thin transport layer: request DTO validation, the response envelope,
//! error-to-status mapping, and the outbound fleet-directory client.
//! All accounting rules live in `compliance_ledger`.

pub mod config;
pub mod errors;
pub mod fleet;
pub mod handlers;
pub mod models;

use compliance_ledger::ComplianceLedger;
use fleet::FleetClient;

/// Ledger instance served by this gateway
pub type Ledger = ComplianceLedger<FleetClient>;
