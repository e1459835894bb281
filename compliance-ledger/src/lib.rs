//! Maritime Regulatory-Compliance Ledger
//!
//! Per-company, per-period accounting under two overlapping carbon
//! regimes: EU ETS allowances (EUAs) and the FuelEU Maritime
//! deficit/surplus balance.
//!
//! # Architecture
//!
//! - **Single Writer**: one logical writer task serializes every
//!   read-modify-write on shared per-key rows
//! - **Atomic multi-row commits**: cross-period moves write both rows in
//!   one batch
//! - **Structural invariants**: a FuelEU position always satisfies
//!   `balance == banked - borrowed`
//! - **Append-only facts**: emission and EUA operation history is never
//!   rewritten; verification permanently locks an emission record

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod actor;
pub mod config;
pub mod directory;
pub mod emissions;
pub mod error;
pub mod eua;
pub mod fueleu;
pub mod ledger;
pub mod metrics;
pub mod pools;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use directory::{FleetDirectory, StaticFleetDirectory};
pub use emissions::{EmissionLedger, NewEmission, NewVerification};
pub use error::{Error, Result};
pub use eua::EuaLedger;
pub use fueleu::FuelEuLedger;
pub use ledger::ComplianceLedger;
pub use pools::{NewAllocation, PoolRegistry};
pub use types::{
    AllocationDirection, BalanceOperation, CompanyId, EmissionPatch, EmissionRecord,
    EmissionSource, EuaOperation, EuaOperationType, FuelEuBalance, PeriodYear, PoolAllocation,
    PoolId, PoolPerformance, VerificationRecord, VerificationStatus, VesselId, VoyageId,
};
