//! Pool allocation registry
//!
//! Assigns a vessel for a period to at most one compliance pool, as an
//! inflow or outflow. Outflow commits surplus to the pool and is only
//! accepted when the company's current balance covers it. Allocation
//! never mutates the balance itself; any balance movement is a separate
//! adjustment performed by the caller.

use crate::{
    actor::LedgerHandle,
    error::{Error, Result},
    storage::Storage,
    types::{
        AllocationDirection, CompanyId, PeriodYear, PoolAllocation, PoolId, PoolPerformance,
        VesselId,
    },
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Input for enrolling a vessel into a pool
#[derive(Debug, Clone)]
pub struct NewAllocation {
    /// Owning company
    pub company_id: CompanyId,
    /// Vessel to enroll
    pub vessel_id: VesselId,
    /// Compliance period
    pub period_year: PeriodYear,
    /// Target pool
    pub pool_id: PoolId,
    /// Allocated amount, gCO2e (outflow negative)
    pub amount_gco2e: i64,
    /// Inflow or outflow
    pub direction: AllocationDirection,
}

/// Service facade for pool allocations
pub struct PoolRegistry {
    handle: LedgerHandle,
    storage: Arc<Storage>,
}

impl PoolRegistry {
    pub(crate) fn new(handle: LedgerHandle, storage: Arc<Storage>) -> Self {
        Self { handle, storage }
    }

    /// Enroll a vessel into a pool for a period
    pub async fn allocate(&self, new: NewAllocation) -> Result<PoolAllocation> {
        self.handle.allocate(new).await
    }

    /// The allocation for a (vessel, period), if any
    pub fn allocation(
        &self,
        vessel_id: VesselId,
        period_year: PeriodYear,
    ) -> Result<Option<PoolAllocation>> {
        self.storage.get_allocation(vessel_id, period_year)
    }

    /// All allocations for a pool and period
    pub fn pool_allocations(
        &self,
        pool_id: PoolId,
        period_year: PeriodYear,
    ) -> Result<Vec<PoolAllocation>> {
        self.storage.allocations_for_pool(pool_id, period_year)
    }

    /// Aggregate pool position for a period
    ///
    /// Outflow amounts are stored negative, so net benefit is a plain
    /// sum of both directions.
    pub fn pool_performance(
        &self,
        pool_id: PoolId,
        period_year: PeriodYear,
    ) -> Result<PoolPerformance> {
        let allocations = self.storage.allocations_for_pool(pool_id, period_year)?;

        let mut total_inflow = 0i64;
        let mut total_outflow = 0i64;
        let mut vessels = HashSet::new();

        for allocation in &allocations {
            match allocation.direction {
                AllocationDirection::Inflow => total_inflow += allocation.amount_gco2e,
                AllocationDirection::Outflow => total_outflow += allocation.amount_gco2e,
            }
            vessels.insert(allocation.vessel_id);
        }

        Ok(PoolPerformance {
            total_inflow_gco2e: total_inflow,
            total_outflow_gco2e: total_outflow,
            net_benefit_gco2e: total_inflow + total_outflow,
            vessels_participating: vessels.len(),
        })
    }
}

/// Insert a pool allocation, enforcing exclusivity and outflow cover
///
/// Runs inside the writer turn; combined with the (vessel, period) row
/// key this closes the check-then-insert race between concurrent
/// allocation attempts.
pub(crate) fn exec_allocate(storage: &Storage, new: NewAllocation) -> Result<PoolAllocation> {
    if storage.get_allocation(new.vessel_id, new.period_year)?.is_some() {
        return Err(Error::conflict(
            "vessel already has pool allocation for this period",
        ));
    }

    if new.direction == AllocationDirection::Outflow {
        let covered = storage
            .get_balance(new.company_id, new.period_year)?
            .map(|balance| balance.balance_gco2e() >= -new.amount_gco2e)
            .unwrap_or(false);
        if !covered {
            return Err(Error::conflict("insufficient balance for OUTFLOW"));
        }
    }

    let now = Utc::now();
    let allocation = PoolAllocation {
        id: Uuid::now_v7(),
        company_id: new.company_id,
        vessel_id: new.vessel_id,
        period_year: new.period_year,
        pool_id: new.pool_id,
        direction: new.direction,
        amount_gco2e: new.amount_gco2e,
        effective_from: now,
        created_at: now,
    };

    storage.put_allocation(&allocation)?;
    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fueleu::exec_adjust_balance;
    use crate::types::BalanceOperation;
    use crate::Config;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (Storage::open(&config).unwrap(), temp_dir)
    }

    fn period(year: i32) -> PeriodYear {
        PeriodYear::new(year).unwrap()
    }

    fn new_allocation(
        company_id: CompanyId,
        vessel_id: VesselId,
        pool_id: PoolId,
        amount: i64,
        direction: AllocationDirection,
    ) -> NewAllocation {
        NewAllocation {
            company_id,
            vessel_id,
            period_year: period(2024),
            pool_id,
            amount_gco2e: amount,
            direction,
        }
    }

    #[test]
    fn test_inflow_allocation_persists() {
        let (storage, _temp) = test_storage();

        let allocation = exec_allocate(
            &storage,
            new_allocation(
                CompanyId::new(Uuid::new_v4()),
                VesselId::new(Uuid::new_v4()),
                PoolId::new(Uuid::new_v4()),
                400_000,
                AllocationDirection::Inflow,
            ),
        )
        .unwrap();

        let stored = storage
            .get_allocation(allocation.vessel_id, period(2024))
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, allocation.id);
        assert_eq!(stored.amount_gco2e, 400_000);
    }

    #[test]
    fn test_duplicate_allocation_rejected() {
        let (storage, _temp) = test_storage();
        let vessel = VesselId::new(Uuid::new_v4());

        let first = new_allocation(
            CompanyId::new(Uuid::new_v4()),
            vessel,
            PoolId::new(Uuid::new_v4()),
            400_000,
            AllocationDirection::Inflow,
        );
        exec_allocate(&storage, first.clone()).unwrap();

        // Same vessel, same period, different pool
        let mut second = first;
        second.pool_id = PoolId::new(Uuid::new_v4());
        let result = exec_allocate(&storage, second);
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_outflow_requires_covering_balance() {
        let (storage, _temp) = test_storage();
        let company = CompanyId::new(Uuid::new_v4());

        // No balance row at all
        let result = exec_allocate(
            &storage,
            new_allocation(
                company,
                VesselId::new(Uuid::new_v4()),
                PoolId::new(Uuid::new_v4()),
                -500_000,
                AllocationDirection::Outflow,
            ),
        );
        assert!(matches!(result, Err(Error::Conflict(_))));

        // Balance smaller than the committed amount
        exec_adjust_balance(
            &storage,
            company,
            period(2024),
            VesselId::new(Uuid::new_v4()),
            300_000,
            BalanceOperation::Bank,
        )
        .unwrap();
        let result = exec_allocate(
            &storage,
            new_allocation(
                company,
                VesselId::new(Uuid::new_v4()),
                PoolId::new(Uuid::new_v4()),
                -500_000,
                AllocationDirection::Outflow,
            ),
        );
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_outflow_leaves_balance_unchanged() {
        let (storage, _temp) = test_storage();
        let company = CompanyId::new(Uuid::new_v4());

        exec_adjust_balance(
            &storage,
            company,
            period(2024),
            VesselId::new(Uuid::new_v4()),
            800_000,
            BalanceOperation::Bank,
        )
        .unwrap();

        exec_allocate(
            &storage,
            new_allocation(
                company,
                VesselId::new(Uuid::new_v4()),
                PoolId::new(Uuid::new_v4()),
                -500_000,
                AllocationDirection::Outflow,
            ),
        )
        .unwrap();

        let balance = storage.get_balance(company, period(2024)).unwrap().unwrap();
        assert_eq!(balance.balance_gco2e(), 800_000);
    }
}
