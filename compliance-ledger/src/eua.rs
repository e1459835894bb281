//! EU ETS allowance operation ledger
//!
//! Append-only record of forecast/hedge/surrender/reconcile operations.
//! Surrender is validated against recorded emissions with a 1% tolerance
//! band (1 EUA ~ 1 tonne CO2e); reconciliation may never exceed the
//! total actually surrendered. Corrections are made via new offsetting
//! operations, never by editing history.
//!
//! An operation's compliance period is the UTC calendar year of its
//! execution timestamp.

use crate::{
    actor::LedgerHandle,
    error::{Error, Result},
    storage::Storage,
    types::{CompanyId, EuaOperation, EuaOperationType, PeriodYear, VoyageId},
};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Service facade for EUA operations
pub struct EuaLedger {
    handle: LedgerHandle,
    storage: Arc<Storage>,
}

impl EuaLedger {
    pub(crate) fn new(handle: LedgerHandle, storage: Arc<Storage>) -> Self {
        Self { handle, storage }
    }

    /// Record a forecast of allowance requirements for a period
    ///
    /// The operation is dated at execution time; the period argument is
    /// accepted for interface symmetry and informs nothing beyond the
    /// caller's intent (period attribution follows `executed_at`).
    pub async fn forecast(
        &self,
        company_id: CompanyId,
        _period_year: PeriodYear,
        euas_count: Decimal,
    ) -> Result<EuaOperation> {
        let operation = build_operation(company_id, EuaOperationType::Forecast, euas_count);
        self.handle.append_eua_operation(operation).await
    }

    /// Record an allowance purchase at a price
    pub async fn hedge(
        &self,
        company_id: CompanyId,
        euas_count: Decimal,
        price_per_eua: Decimal,
    ) -> Result<EuaOperation> {
        let mut operation = build_operation(company_id, EuaOperationType::Hedge, euas_count);
        operation.price_per_eua = Some(price_per_eua);
        self.handle.append_eua_operation(operation).await
    }

    /// Surrender allowances against the emissions of a set of voyages
    pub async fn surrender(
        &self,
        company_id: CompanyId,
        voyage_ids: Vec<VoyageId>,
        euas_count: Decimal,
    ) -> Result<EuaOperation> {
        self.handle
            .surrender(company_id, voyage_ids, euas_count)
            .await
    }

    /// Confirm that surrendered allowances cover a claimed amount
    pub async fn reconcile(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        euas_count: Decimal,
    ) -> Result<EuaOperation> {
        self.handle.reconcile(company_id, period_year, euas_count).await
    }

    /// Forecast accuracy for a company and period
    ///
    /// `None` when the period has no forecast or no surrenders;
    /// otherwise `1 - |surrendered - forecast| / forecast`, clamped to
    /// [0, 1].
    pub fn forecast_accuracy(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
    ) -> Result<Option<f64>> {
        let operations = operations_in_period(&self.storage, company_id, period_year)?;

        let forecast = operations
            .iter()
            .find(|op| op.operation_type == EuaOperationType::Forecast);
        let surrendered: Vec<&EuaOperation> = operations
            .iter()
            .filter(|op| op.operation_type == EuaOperationType::Surrender)
            .collect();

        let (forecast, surrendered) = match (forecast, surrendered) {
            (Some(forecast), surrendered) if !surrendered.is_empty() => (forecast, surrendered),
            _ => return Ok(None),
        };

        let total_surrendered: Decimal = surrendered.iter().map(|op| op.euas_count).sum();
        let error = (total_surrendered - forecast.euas_count).abs();

        let accuracy = match error.checked_div(forecast.euas_count) {
            Some(relative) => (Decimal::ONE - relative)
                .clamp(Decimal::ZERO, Decimal::ONE)
                .to_f64()
                .unwrap_or(0.0),
            // Zero forecast: any surrender is infinitely off
            None => 0.0,
        };

        Ok(Some(accuracy))
    }

    /// All EUA operations recorded for a company
    pub fn operations_for_company(&self, company_id: CompanyId) -> Result<Vec<EuaOperation>> {
        self.storage.operations_for_company(company_id)
    }
}

fn build_operation(
    company_id: CompanyId,
    operation_type: EuaOperationType,
    euas_count: Decimal,
) -> EuaOperation {
    let now = Utc::now();
    EuaOperation {
        id: Uuid::now_v7(),
        company_id,
        operation_type,
        euas_count,
        price_per_eua: None,
        reference_voyage_ids: vec![],
        executed_at: now,
        created_at: now,
    }
}

fn operations_in_period(
    storage: &Storage,
    company_id: CompanyId,
    period_year: PeriodYear,
) -> Result<Vec<EuaOperation>> {
    Ok(storage
        .operations_for_company(company_id)?
        .into_iter()
        .filter(|op| op.period_year() == period_year.get())
        .collect())
}

/// Validate and append a surrender operation
///
/// Runs inside the writer turn so the emission sum cannot change between
/// the tolerance check and the append.
pub(crate) fn exec_surrender(
    storage: &Storage,
    company_id: CompanyId,
    voyage_ids: Vec<VoyageId>,
    euas_count: Decimal,
) -> Result<EuaOperation> {
    let mut emissions = Vec::new();
    for voyage_id in &voyage_ids {
        emissions.extend(storage.emissions_for_voyage(*voyage_id)?);
    }

    if emissions.is_empty() {
        return Err(Error::conflict("no emissions found for surrender"));
    }

    let total_co2: Decimal = emissions.iter().map(|record| record.co2_tonnes).sum();

    // 1% tolerance band for rounding between tonnes and allowance units
    let tolerance = total_co2 * Decimal::new(1, 2);
    if (euas_count - total_co2).abs() > tolerance {
        return Err(Error::conflict("surrendered EUAs do not match emissions"));
    }

    let mut operation = build_operation(company_id, EuaOperationType::Surrender, euas_count);
    operation.reference_voyage_ids = voyage_ids;

    storage.append_eua_operation(&operation)?;
    Ok(operation)
}

/// Validate and append a reconcile operation
pub(crate) fn exec_reconcile(
    storage: &Storage,
    company_id: CompanyId,
    period_year: PeriodYear,
    euas_count: Decimal,
) -> Result<EuaOperation> {
    let total_surrendered: Decimal = storage
        .operations_for_company(company_id)?
        .iter()
        .filter(|op| {
            op.operation_type == EuaOperationType::Surrender
                && op.period_year() == period_year.get()
        })
        .map(|op| op.euas_count.abs())
        .sum();

    if euas_count > total_surrendered {
        return Err(Error::conflict("reconciled amount exceeds surrendered EUAs"));
    }

    let operation = build_operation(company_id, EuaOperationType::Reconcile, euas_count);
    storage.append_eua_operation(&operation)?;
    Ok(operation)
}
