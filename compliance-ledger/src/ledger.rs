//! Main ledger orchestration layer
//!
//! Ties together storage, the single-writer actor, and the four service
//! facades into one high-level API.
//!
//! # Example
//!
//! ```no_run
//! use compliance_ledger::{ComplianceLedger, Config, StaticFleetDirectory};
//!
//! #[tokio::main]
//! async fn main() -> compliance_ledger::Result<()> {
//!     let config = Config::default();
//!     let ledger = ComplianceLedger::open(config, StaticFleetDirectory::new()).await?;
//!
//!     // let balance = ledger.fueleu().balance(company_id, period)?;
//!
//!     ledger.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_writer, LedgerHandle},
    directory::FleetDirectory,
    emissions::EmissionLedger,
    eua::EuaLedger,
    fueleu::FuelEuLedger,
    metrics::Metrics,
    pools::PoolRegistry,
    storage::Storage,
    Config, Error, Result,
};
use std::sync::Arc;

/// Main compliance ledger interface
pub struct ComplianceLedger<D> {
    emissions: EmissionLedger<D>,
    fueleu: FuelEuLedger,
    pools: PoolRegistry,
    eua: EuaLedger,
    handle: LedgerHandle,
    metrics: Metrics,
}

impl<D: FleetDirectory> ComplianceLedger<D> {
    /// Open the ledger with configuration and a fleet directory
    pub async fn open(config: Config, directory: D) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let directory = Arc::new(directory);

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("failed to create metrics: {}", e)))?;

        let handle = spawn_ledger_writer(
            storage.clone(),
            metrics.clone(),
            config.writer.mailbox_capacity,
        );

        Ok(Self {
            emissions: EmissionLedger::new(handle.clone(), storage.clone(), directory),
            fueleu: FuelEuLedger::new(handle.clone(), storage.clone()),
            pools: PoolRegistry::new(handle.clone(), storage.clone()),
            eua: EuaLedger::new(handle.clone(), storage),
            handle,
            metrics,
        })
    }

    /// Emission facts
    pub fn emissions(&self) -> &EmissionLedger<D> {
        &self.emissions
    }

    /// FuelEU compliance positions
    pub fn fueleu(&self) -> &FuelEuLedger {
        &self.fueleu
    }

    /// Pool allocations
    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    /// EUA operations
    pub fn eua(&self) -> &EuaLedger {
        &self.eua
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Shut the ledger down
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
