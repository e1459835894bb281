//! FuelEU Maritime balance ledger
//!
//! Owns the signed per-company-per-period GHG compliance position.
//! Surpluses may be banked into the following period; deficits may be
//! covered by borrowing from it, limited to exactly one period ahead.
//! Pooling and borrowing are mutually exclusive risk-transfer
//! mechanisms: a vessel enrolled in a pool for a period blocks BORROW
//! adjustments for that period.
//!
//! All read-modify-write logic in this module runs inside the writer
//! turn; cross-period operations commit both rows in one batch.

use crate::{
    actor::LedgerHandle,
    error::{Error, Result},
    storage::Storage,
    types::{BalanceOperation, CompanyId, FuelEuBalance, PeriodYear, VesselId},
};
use std::sync::Arc;

/// Service facade for FuelEU compliance positions
pub struct FuelEuLedger {
    handle: LedgerHandle,
    storage: Arc<Storage>,
}

impl FuelEuLedger {
    pub(crate) fn new(handle: LedgerHandle, storage: Arc<Storage>) -> Self {
        Self { handle, storage }
    }

    /// Apply a signed BANK/BORROW adjustment to a company's position
    ///
    /// BORROW is gated on the vessel's pool state for the period.
    pub async fn adjust_balance(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        vessel_id: VesselId,
        adjustment_gco2e: i64,
        operation: BalanceOperation,
    ) -> Result<FuelEuBalance> {
        self.handle
            .adjust_balance(company_id, period_year, vessel_id, adjustment_gco2e, operation)
            .await
    }

    /// Carry the period's entire positive balance into the next period
    ///
    /// Returns the banked amount in gCO2e.
    pub async fn bank_to_next_period(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
    ) -> Result<i64> {
        self.handle.bank_to_next_period(company_id, period_year).await
    }

    /// Pull surplus forward from the next period to cover this one
    ///
    /// `from_year` defaults to `period_year + 1` and may not be anything
    /// else. Returns the borrowed amount in gCO2e.
    pub async fn borrow_from_next_period(
        &self,
        company_id: CompanyId,
        period_year: PeriodYear,
        amount_gco2e: i64,
        from_year: Option<PeriodYear>,
    ) -> Result<i64> {
        self.handle
            .borrow_from_next_period(company_id, period_year, amount_gco2e, from_year)
            .await
    }

    /// Current position for a company and period
    ///
    /// Absence means "untouched, zero position" and is never an error.
    pub fn balance(&self, company_id: CompanyId, period_year: PeriodYear) -> Result<FuelEuBalance> {
        Ok(self
            .storage
            .get_balance(company_id, period_year)?
            .unwrap_or_else(|| FuelEuBalance::zero(company_id, period_year)))
    }
}

pub(crate) fn exec_adjust_balance(
    storage: &Storage,
    company_id: CompanyId,
    period_year: PeriodYear,
    vessel_id: VesselId,
    adjustment_gco2e: i64,
    operation: BalanceOperation,
) -> Result<FuelEuBalance> {
    if operation == BalanceOperation::Borrow
        && storage.get_allocation(vessel_id, period_year)?.is_some()
    {
        return Err(Error::conflict("cannot borrow when vessel is pooled"));
    }

    let mut balance = storage
        .get_balance(company_id, period_year)?
        .unwrap_or_else(|| FuelEuBalance::zero(company_id, period_year));

    balance.apply_adjustment(operation, adjustment_gco2e)?;
    storage.put_balance(&balance)?;

    tracing::debug!(
        company_id = %company_id,
        period_year = %period_year,
        adjustment_gco2e,
        ?operation,
        balance_gco2e = balance.balance_gco2e(),
        "balance adjusted"
    );

    Ok(balance)
}

pub(crate) fn exec_bank_to_next_period(
    storage: &Storage,
    company_id: CompanyId,
    period_year: PeriodYear,
) -> Result<i64> {
    let mut current = storage
        .get_balance(company_id, period_year)?
        .ok_or_else(|| Error::not_found("balance not found"))?;

    if current.balance_gco2e() <= 0 {
        return Err(Error::conflict("cannot bank negative balance"));
    }

    let moved = current.debit_all()?;

    let next_year = period_year.next();
    let mut next = storage
        .get_balance(company_id, next_year)?
        .unwrap_or_else(|| FuelEuBalance::zero(company_id, next_year));
    next.credit(moved)?;

    storage.put_balances(&current, &next)?;

    tracing::info!(
        company_id = %company_id,
        from_period = %period_year,
        to_period = %next_year,
        banked_gco2e = moved,
        "surplus banked to next period"
    );

    Ok(moved)
}

pub(crate) fn exec_borrow_from_next_period(
    storage: &Storage,
    company_id: CompanyId,
    period_year: PeriodYear,
    amount_gco2e: i64,
    from_year: Option<PeriodYear>,
) -> Result<i64> {
    let borrow_year = from_year.unwrap_or_else(|| period_year.next());
    if borrow_year != period_year.next() {
        return Err(Error::validation("can only borrow from next period"));
    }
    if amount_gco2e <= 0 {
        return Err(Error::validation("borrow amount must be positive"));
    }

    let mut next = storage
        .get_balance(company_id, borrow_year)?
        .ok_or_else(|| Error::not_found("next period balance not found"))?;

    if next.balance_gco2e() < amount_gco2e {
        return Err(Error::conflict("insufficient balance in next period"));
    }

    next.encumber(amount_gco2e)?;

    let mut current = storage
        .get_balance(company_id, period_year)?
        .unwrap_or_else(|| FuelEuBalance::zero(company_id, period_year));
    current.credit(amount_gco2e)?;

    storage.put_balances(&current, &next)?;

    tracing::info!(
        company_id = %company_id,
        period_year = %period_year,
        borrowed_gco2e = amount_gco2e,
        "surplus borrowed from next period"
    );

    Ok(amount_gco2e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AllocationDirection, PoolAllocation, PoolId};
    use crate::Config;
    use chrono::Utc;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn company() -> CompanyId {
        CompanyId::new(Uuid::new_v4())
    }

    fn vessel() -> VesselId {
        VesselId::new(Uuid::new_v4())
    }

    fn period(year: i32) -> PeriodYear {
        PeriodYear::new(year).unwrap()
    }

    fn pool_allocation(vessel_id: VesselId, period_year: PeriodYear) -> PoolAllocation {
        PoolAllocation {
            id: Uuid::now_v7(),
            company_id: company(),
            vessel_id,
            period_year,
            pool_id: PoolId::new(Uuid::new_v4()),
            direction: AllocationDirection::Outflow,
            amount_gco2e: -500_000,
            effective_from: Utc::now(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_adjust_creates_row_lazily() {
        let (storage, _temp) = test_storage();
        let c = company();

        let balance = exec_adjust_balance(
            &storage,
            c,
            period(2024),
            vessel(),
            1_000_000,
            BalanceOperation::Bank,
        )
        .unwrap();

        assert_eq!(balance.balance_gco2e(), 1_000_000);
        assert_eq!(
            storage
                .get_balance(c, period(2024))
                .unwrap()
                .unwrap()
                .balance_gco2e(),
            1_000_000
        );
    }

    #[test]
    fn test_borrow_adjustment_blocked_when_pooled() {
        let (storage, _temp) = test_storage();
        let c = company();
        let v = vessel();

        storage.put_allocation(&pool_allocation(v, period(2024))).unwrap();

        let result = exec_adjust_balance(
            &storage,
            c,
            period(2024),
            v,
            -500_000,
            BalanceOperation::Borrow,
        );
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Pooling in a different period does not block
        let ok = exec_adjust_balance(
            &storage,
            c,
            period(2025),
            v,
            -500_000,
            BalanceOperation::Borrow,
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_bank_adjustment_allowed_when_pooled() {
        let (storage, _temp) = test_storage();
        let v = vessel();

        storage.put_allocation(&pool_allocation(v, period(2024))).unwrap();

        let balance = exec_adjust_balance(
            &storage,
            company(),
            period(2024),
            v,
            300_000,
            BalanceOperation::Bank,
        )
        .unwrap();
        assert_eq!(balance.balance_gco2e(), 300_000);
    }

    #[test]
    fn test_bank_moves_full_balance() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2024), vessel(), 1_000_000, BalanceOperation::Bank)
            .unwrap();

        let moved = exec_bank_to_next_period(&storage, c, period(2024)).unwrap();
        assert_eq!(moved, 1_000_000);

        let current = storage.get_balance(c, period(2024)).unwrap().unwrap();
        let next = storage.get_balance(c, period(2025)).unwrap().unwrap();
        assert_eq!(current.balance_gco2e(), 0);
        assert_eq!(next.balance_gco2e(), 1_000_000);

        // Identity holds on both rows
        assert_eq!(current.balance_gco2e(), current.banked_gco2e() - current.borrowed_gco2e());
        assert_eq!(next.balance_gco2e(), next.banked_gco2e() - next.borrowed_gco2e());
    }

    #[test]
    fn test_bank_adds_to_existing_next_period() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2024), vessel(), 400_000, BalanceOperation::Bank)
            .unwrap();
        exec_adjust_balance(&storage, c, period(2025), vessel(), 100_000, BalanceOperation::Bank)
            .unwrap();

        exec_bank_to_next_period(&storage, c, period(2024)).unwrap();

        let next = storage.get_balance(c, period(2025)).unwrap().unwrap();
        assert_eq!(next.balance_gco2e(), 500_000);
    }

    #[test]
    fn test_bank_requires_existing_row() {
        let (storage, _temp) = test_storage();
        let result = exec_bank_to_next_period(&storage, company(), period(2024));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_bank_rejects_non_positive_balance() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2024), vessel(), -200_000, BalanceOperation::Borrow)
            .unwrap();

        let result = exec_bank_to_next_period(&storage, c, period(2024));
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Zero balance is also unbankable
        let c2 = company();
        exec_adjust_balance(&storage, c2, period(2024), vessel(), 0, BalanceOperation::Bank)
            .unwrap();
        let result = exec_bank_to_next_period(&storage, c2, period(2024));
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_borrow_moves_value_without_creating_it() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2025), vessel(), 800_000, BalanceOperation::Bank)
            .unwrap();

        let borrowed =
            exec_borrow_from_next_period(&storage, c, period(2024), 300_000, None).unwrap();
        assert_eq!(borrowed, 300_000);

        let current = storage.get_balance(c, period(2024)).unwrap().unwrap();
        let next = storage.get_balance(c, period(2025)).unwrap().unwrap();

        assert_eq!(current.balance_gco2e(), 300_000);
        assert_eq!(next.balance_gco2e(), 500_000);
        assert_eq!(next.borrowed_gco2e(), 300_000);
        assert_eq!(current.balance_gco2e() + next.balance_gco2e(), 800_000);

        // Identity holds on both rows
        assert_eq!(current.balance_gco2e(), current.banked_gco2e() - current.borrowed_gco2e());
        assert_eq!(next.balance_gco2e(), next.banked_gco2e() - next.borrowed_gco2e());
    }

    #[test]
    fn test_borrow_horizon_is_one_period() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2026), vessel(), 800_000, BalanceOperation::Bank)
            .unwrap();

        let result = exec_borrow_from_next_period(
            &storage,
            c,
            period(2024),
            100_000,
            Some(period(2026)),
        );
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_borrow_rejects_insufficient_next_balance() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2025), vessel(), 200_000, BalanceOperation::Bank)
            .unwrap();

        let result = exec_borrow_from_next_period(&storage, c, period(2024), 300_000, None);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_borrow_requires_next_period_row() {
        let (storage, _temp) = test_storage();
        let result = exec_borrow_from_next_period(&storage, company(), period(2024), 100_000, None);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_borrow_rejects_non_positive_amount() {
        let (storage, _temp) = test_storage();
        let c = company();

        exec_adjust_balance(&storage, c, period(2025), vessel(), 200_000, BalanceOperation::Bank)
            .unwrap();

        for amount in [0, -50_000] {
            let result = exec_borrow_from_next_period(&storage, c, period(2024), amount, None);
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }
}
