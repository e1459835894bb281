//! Single-writer concurrency for the ledger
//!
//! Every mutating operation is executed by one Tokio task owning the
//! sole right to write. Requests arrive through a bounded mpsc channel
//! and are answered over oneshot channels, so each read-modify-write
//! (balance adjustment, cross-period move, pool enrollment, gated
//! append) runs to completion before the next one starts. Reads go
//! straight to storage.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 HTTP gateway                          │
//! │            Multiple request tasks                     │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ LedgerHandle (Clone)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              mpsc::channel (bounded)                  │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │            LedgerWriter (single task)                 │
//! │   check invariants → WriteBatch → acknowledge         │
//! └──────────────────────────────────────────────────────┘
//! ```

use crate::{
    emissions, eua, fueleu,
    metrics::Metrics,
    pools::{self, NewAllocation},
    storage::Storage,
    types::{
        BalanceOperation, CompanyId, EmissionPatch, EmissionRecord, EuaOperation, FuelEuBalance,
        PeriodYear, PoolAllocation, VerificationRecord, VesselId, VoyageId,
    },
    Error, Result,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Message sent to the ledger writer
pub enum LedgerCommand {
    /// Persist a new emission record
    RecordEmission {
        /// Prepared record
        record: EmissionRecord,
        /// Response channel
        respond: oneshot::Sender<Result<EmissionRecord>>,
    },

    /// Patch an unverified emission record
    UpdateEmission {
        /// Target record
        emission_id: Uuid,
        /// Fields to change
        patch: EmissionPatch,
        /// Response channel
        respond: oneshot::Sender<Result<EmissionRecord>>,
    },

    /// Append a verification record
    AddVerification {
        /// Prepared record
        record: VerificationRecord,
        /// Response channel
        respond: oneshot::Sender<Result<VerificationRecord>>,
    },

    /// Apply a BANK/BORROW adjustment
    AdjustBalance {
        /// Owning company
        company_id: CompanyId,
        /// Compliance period
        period_year: PeriodYear,
        /// Vessel the adjustment derives from (pool gate)
        vessel_id: VesselId,
        /// Signed adjustment, gCO2e
        adjustment_gco2e: i64,
        /// Bank or borrow
        operation: BalanceOperation,
        /// Response channel
        respond: oneshot::Sender<Result<FuelEuBalance>>,
    },

    /// Carry a positive balance into the next period
    BankToNextPeriod {
        /// Owning company
        company_id: CompanyId,
        /// Source period
        period_year: PeriodYear,
        /// Response channel (banked amount)
        respond: oneshot::Sender<Result<i64>>,
    },

    /// Pull surplus forward from the next period
    BorrowFromNextPeriod {
        /// Owning company
        company_id: CompanyId,
        /// Beneficiary period
        period_year: PeriodYear,
        /// Amount to borrow, gCO2e
        amount_gco2e: i64,
        /// Requested source period (must be the next one)
        from_year: Option<PeriodYear>,
        /// Response channel (borrowed amount)
        respond: oneshot::Sender<Result<i64>>,
    },

    /// Enroll a vessel into a pool
    Allocate {
        /// Allocation input
        new: NewAllocation,
        /// Response channel
        respond: oneshot::Sender<Result<PoolAllocation>>,
    },

    /// Append a forecast or hedge operation (no cross-checks)
    AppendEuaOperation {
        /// Prepared operation
        operation: EuaOperation,
        /// Response channel
        respond: oneshot::Sender<Result<EuaOperation>>,
    },

    /// Validate and append a surrender operation
    Surrender {
        /// Owning company
        company_id: CompanyId,
        /// Voyages the surrender accounts for
        voyage_ids: Vec<VoyageId>,
        /// Allowances surrendered
        euas_count: Decimal,
        /// Response channel
        respond: oneshot::Sender<Result<EuaOperation>>,
    },

    /// Validate and append a reconcile operation
    Reconcile {
        /// Owning company
        company_id: CompanyId,
        /// Compliance period
        period_year: PeriodYear,
        /// Claimed amount
        euas_count: Decimal,
        /// Response channel
        respond: oneshot::Sender<Result<EuaOperation>>,
    },

    /// Shut the writer down
    Shutdown,
}

/// Task that serializes all ledger mutations
pub struct LedgerWriter {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerCommand>,
    metrics: Metrics,
}

impl LedgerWriter {
    /// Create new writer
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerCommand>,
        metrics: Metrics,
    ) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
        }
    }

    /// Run the writer event loop
    pub async fn run(mut self) {
        while let Some(command) = self.mailbox.recv().await {
            if matches!(command, LedgerCommand::Shutdown) {
                break;
            }
            self.handle_command(command);
        }
        tracing::info!("ledger writer stopped");
    }

    fn handle_command(&mut self, command: LedgerCommand) {
        let timer = self.metrics.mutation_duration.start_timer();

        match command {
            LedgerCommand::RecordEmission { record, respond } => {
                let result = self.storage.put_emission(&record).map(|_| record);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.emissions_recorded_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::UpdateEmission {
                emission_id,
                patch,
                respond,
            } => {
                let result = emissions::exec_update_emission(&self.storage, emission_id, patch);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.emission_updates_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::AddVerification { record, respond } => {
                let result = self.storage.put_verification(&record).map(|_| record);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.verifications_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::AdjustBalance {
                company_id,
                period_year,
                vessel_id,
                adjustment_gco2e,
                operation,
                respond,
            } => {
                let result = fueleu::exec_adjust_balance(
                    &self.storage,
                    company_id,
                    period_year,
                    vessel_id,
                    adjustment_gco2e,
                    operation,
                );
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.balance_adjustments_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::BankToNextPeriod {
                company_id,
                period_year,
                respond,
            } => {
                let result =
                    fueleu::exec_bank_to_next_period(&self.storage, company_id, period_year);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.banking_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::BorrowFromNextPeriod {
                company_id,
                period_year,
                amount_gco2e,
                from_year,
                respond,
            } => {
                let result = fueleu::exec_borrow_from_next_period(
                    &self.storage,
                    company_id,
                    period_year,
                    amount_gco2e,
                    from_year,
                );
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.borrowing_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::Allocate { new, respond } => {
                let result = pools::exec_allocate(&self.storage, new);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.allocations_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::AppendEuaOperation { operation, respond } => {
                let result = self
                    .storage
                    .append_eua_operation(&operation)
                    .map(|_| operation);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.eua_operations_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::Surrender {
                company_id,
                voyage_ids,
                euas_count,
                respond,
            } => {
                let result = eua::exec_surrender(&self.storage, company_id, voyage_ids, euas_count);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.eua_operations_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::Reconcile {
                company_id,
                period_year,
                euas_count,
                respond,
            } => {
                let result = eua::exec_reconcile(&self.storage, company_id, period_year, euas_count);
                self.observe(&result);
                if result.is_ok() {
                    self.metrics.eua_operations_total.inc();
                }
                let _ = respond.send(result);
            }

            LedgerCommand::Shutdown => {
                // Handled in the main loop
            }
        }

        timer.observe_duration();
    }

    fn observe<T>(&self, result: &Result<T>) {
        if let Err(Error::Conflict(message)) = result {
            self.metrics.conflicts_total.inc();
            tracing::warn!(%message, "operation rejected");
        }
    }
}

/// Handle for sending commands to the writer
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerCommand>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        command: LedgerCommand,
        receiver: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        self.sender
            .send(command)
            .await
            .map_err(|_| Error::Concurrency("writer mailbox closed".to_string()))?;
        receiver
            .await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))?
    }

    /// Persist a new emission record
    pub async fn record_emission(&self, record: EmissionRecord) -> Result<EmissionRecord> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::RecordEmission {
                record,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Patch an unverified emission record
    pub async fn update_emission(
        &self,
        emission_id: Uuid,
        patch: EmissionPatch,
    ) -> Result<EmissionRecord> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::UpdateEmission {
                emission_id,
                patch,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Append a verification record
    pub async fn add_verification(
        &self,
        record: VerificationRecord,
    ) -> Result<VerificationRecord> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::AddVerification {
                record,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Apply a BANK/BORROW adjustment
    pub async fn adjust_balance(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        vessel_id: VesselId,
        adjustment_gco2e: i64,
        operation: BalanceOperation,
    ) -> Result<FuelEuBalance> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::AdjustBalance {
                company_id,
                period_year,
                vessel_id,
                adjustment_gco2e,
                operation,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Carry a positive balance into the next period
    pub async fn bank_to_next_period(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
    ) -> Result<i64> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::BankToNextPeriod {
                company_id,
                period_year,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Pull surplus forward from the next period
    pub async fn borrow_from_next_period(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        amount_gco2e: i64,
        from_year: Option<PeriodYear>,
    ) -> Result<i64> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::BorrowFromNextPeriod {
                company_id,
                period_year,
                amount_gco2e,
                from_year,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Enroll a vessel into a pool
    pub async fn allocate(&self, new: NewAllocation) -> Result<PoolAllocation> {
        let (tx, rx) = oneshot::channel();
        self.request(LedgerCommand::Allocate { new, respond: tx }, rx)
            .await
    }

    /// Append a forecast or hedge operation
    pub async fn append_eua_operation(&self, operation: EuaOperation) -> Result<EuaOperation> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::AppendEuaOperation {
                operation,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Validate and append a surrender operation
    pub async fn surrender(
        &self,
        company_id: CompanyId,
        voyage_ids: Vec<VoyageId>,
        euas_count: Decimal,
    ) -> Result<EuaOperation> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::Surrender {
                company_id,
                voyage_ids,
                euas_count,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Validate and append a reconcile operation
    pub async fn reconcile(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        euas_count: Decimal,
    ) -> Result<EuaOperation> {
        let (tx, rx) = oneshot::channel();
        self.request(
            LedgerCommand::Reconcile {
                company_id,
                period_year,
                euas_count,
                respond: tx,
            },
            rx,
        )
        .await
    }

    /// Shut the writer down
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerCommand::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("writer mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger writer
pub fn spawn_ledger_writer(
    storage: Arc<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let writer = LedgerWriter::new(storage, rx, metrics);

    tokio::spawn(async move {
        writer.run().await;
    });

    LedgerHandle::new(tx)
}
