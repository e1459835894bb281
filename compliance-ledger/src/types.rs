//! Core types for the compliance ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for tonne-scale quantities, i64 for gCO2e)
//! - Structural invariants (`FuelEuBalance` cannot exist in an
//!   inconsistent state)

use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing identifier
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id! {
    /// Shipping company identifier
    CompanyId
}

entity_id! {
    /// Vessel identifier
    VesselId
}

entity_id! {
    /// Voyage identifier
    VoyageId
}

entity_id! {
    /// Compliance pool identifier
    PoolId
}

/// Compliance period (calendar year)
///
/// Constructed values are bounded to [2000, 2100]; derived periods
/// (`next`) may exceed the upper bound by one when banking out of the
/// final year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeriodYear(i32);

impl PeriodYear {
    /// Validate and wrap a period year
    pub fn new(year: i32) -> Result<Self> {
        if !(2000..=2100).contains(&year) {
            return Err(Error::validation("invalid period year"));
        }
        Ok(Self(year))
    }

    /// Raw year value
    pub fn get(self) -> i32 {
        self.0
    }

    /// The following compliance period
    pub fn next(self) -> PeriodYear {
        PeriodYear(self.0 + 1)
    }
}

impl fmt::Display for PeriodYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Origin of an emission record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmissionSource {
    /// Automated MRV import
    MrvSystem,
    /// Manual entry
    Manual,
}

/// Status of a verification record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    /// Awaiting verifier decision
    Pending,
    /// Verified; locks the parent emission record
    Verified,
    /// Rejected; does not prevent later attempts
    Rejected,
    /// Verified with findings attached
    Conditional,
}

/// Balance adjustment operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BalanceOperation {
    /// Record a surplus against the banked counter
    Bank,
    /// Record a deficit against the borrowed counter
    Borrow,
}

/// Direction of a pool allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationDirection {
    /// Vessel draws surplus from the pool (amount positive)
    Inflow,
    /// Vessel commits surplus to the pool (amount negative)
    Outflow,
}

/// Type of an EUA ledger operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EuaOperationType {
    /// Projected allowance requirement for a period
    Forecast,
    /// Allowance purchase at a recorded price
    Hedge,
    /// Allowances surrendered against recorded emissions
    Surrender,
    /// Confirmation that surrendered allowances cover a claimed amount
    Reconcile,
}

/// Verified emission facts for one voyage-period combination
///
/// Mutable only while unverified; permanently immutable once any attached
/// verification reaches [`VerificationStatus::Verified`]. Never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionRecord {
    /// Unique record ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Voyage the emissions are attributed to
    pub voyage_id: VoyageId,

    /// Compliance period
    pub period_year: PeriodYear,

    /// CO2 emitted, tonnes (> 0)
    pub co2_tonnes: Decimal,

    /// CH4 emitted, tonnes
    pub ch4_tonnes: Option<Decimal>,

    /// N2O emitted, tonnes
    pub n2o_tonnes: Option<Decimal>,

    /// Energy consumed, GJ (> 0)
    pub energy_gj: Decimal,

    /// Import source
    pub source: EmissionSource,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Partial update for an unverified emission record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmissionPatch {
    /// Replacement CO2 tonnes
    pub co2_tonnes: Option<Decimal>,
    /// Replacement energy GJ
    pub energy_gj: Option<Decimal>,
}

impl EmissionPatch {
    /// True when the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.co2_tonnes.is_none() && self.energy_gj.is_none()
    }
}

/// Verifier decision attached to an emission record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    /// Unique record ID
    pub id: Uuid,

    /// Parent emission record
    pub emission_record_id: Uuid,

    /// Accredited verifier
    pub verifier_id: Uuid,

    /// Decision status
    pub status: VerificationStatus,

    /// Certificate reference, if issued
    pub certificate_number: Option<String>,

    /// Free-text findings
    pub findings: Option<String>,

    /// When the decision was recorded
    pub verified_at: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Serialized shape of [`FuelEuBalance`]
///
/// Deserialization goes through `TryFrom` so a stored row that violates
/// the balance identity is rejected instead of silently accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceParts {
    /// Owning company
    pub company_id: CompanyId,
    /// Compliance period
    pub period_year: PeriodYear,
    /// Signed compliance position, gCO2e
    pub balance_gco2e: i64,
    /// Net surplus carried into the period, gCO2e
    pub banked_gco2e: i64,
    /// Outstanding debt against the period, gCO2e
    pub borrowed_gco2e: i64,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Signed FuelEU compliance position for one (company, period)
///
/// The identity `balance == banked - borrowed` holds after every
/// committed operation; the numeric fields are private and every mutator
/// re-derives the balance, so an inconsistent value cannot be
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BalanceParts", into = "BalanceParts")]
pub struct FuelEuBalance {
    company_id: CompanyId,
    period_year: PeriodYear,
    balance_gco2e: i64,
    banked_gco2e: i64,
    borrowed_gco2e: i64,
    updated_at: DateTime<Utc>,
}

impl FuelEuBalance {
    /// Zero-valued position (lazily created on first adjustment)
    pub fn zero(company_id: CompanyId, period_year: PeriodYear) -> Self {
        Self {
            company_id,
            period_year,
            balance_gco2e: 0,
            banked_gco2e: 0,
            borrowed_gco2e: 0,
            updated_at: Utc::now(),
        }
    }

    /// Owning company
    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Compliance period
    pub fn period_year(&self) -> PeriodYear {
        self.period_year
    }

    /// Signed compliance position, gCO2e
    pub fn balance_gco2e(&self) -> i64 {
        self.balance_gco2e
    }

    /// Net surplus carried into the period, gCO2e
    pub fn banked_gco2e(&self) -> i64 {
        self.banked_gco2e
    }

    /// Outstanding debt against the period, gCO2e
    pub fn borrowed_gco2e(&self) -> i64 {
        self.borrowed_gco2e
    }

    /// Last mutation timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Apply a signed BANK/BORROW adjustment
    ///
    /// BANK moves the banked counter by the adjustment; BORROW moves the
    /// borrowed counter by its negation, so a negative adjustment records
    /// a deficit as outstanding debt. Either way the balance moves by the
    /// adjustment.
    pub fn apply_adjustment(&mut self, operation: BalanceOperation, adjustment_gco2e: i64) -> Result<()> {
        match operation {
            BalanceOperation::Bank => {
                self.banked_gco2e = checked_add(self.banked_gco2e, adjustment_gco2e)?;
            }
            BalanceOperation::Borrow => {
                self.borrowed_gco2e = checked_sub(self.borrowed_gco2e, adjustment_gco2e)?;
            }
        }
        self.rederive()
    }

    /// Remove the entire positive balance for carry-over
    ///
    /// Caller has already established `balance > 0`. Returns the amount
    /// moved out.
    pub(crate) fn debit_all(&mut self) -> Result<i64> {
        let moved = self.balance_gco2e;
        self.banked_gco2e = checked_sub(self.banked_gco2e, moved)?;
        self.rederive()?;
        Ok(moved)
    }

    /// Credit surplus carried in from an adjacent period
    pub(crate) fn credit(&mut self, amount_gco2e: i64) -> Result<()> {
        self.banked_gco2e = checked_add(self.banked_gco2e, amount_gco2e)?;
        self.rederive()
    }

    /// Encumber this period's surplus with debt pulled by the prior period
    ///
    /// Caller has already established `balance >= amount`.
    pub(crate) fn encumber(&mut self, amount_gco2e: i64) -> Result<()> {
        self.borrowed_gco2e = checked_add(self.borrowed_gco2e, amount_gco2e)?;
        self.rederive()
    }

    fn rederive(&mut self) -> Result<()> {
        self.balance_gco2e = checked_sub(self.banked_gco2e, self.borrowed_gco2e)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl TryFrom<BalanceParts> for FuelEuBalance {
    type Error = Error;

    fn try_from(parts: BalanceParts) -> Result<Self> {
        if parts.balance_gco2e != parts.banked_gco2e - parts.borrowed_gco2e {
            return Err(Error::validation(
                "balance does not equal banked minus borrowed",
            ));
        }
        Ok(Self {
            company_id: parts.company_id,
            period_year: parts.period_year,
            balance_gco2e: parts.balance_gco2e,
            banked_gco2e: parts.banked_gco2e,
            borrowed_gco2e: parts.borrowed_gco2e,
            updated_at: parts.updated_at,
        })
    }
}

impl From<FuelEuBalance> for BalanceParts {
    fn from(balance: FuelEuBalance) -> Self {
        Self {
            company_id: balance.company_id,
            period_year: balance.period_year,
            balance_gco2e: balance.balance_gco2e,
            banked_gco2e: balance.banked_gco2e,
            borrowed_gco2e: balance.borrowed_gco2e,
            updated_at: balance.updated_at,
        }
    }
}

fn checked_add(a: i64, b: i64) -> Result<i64> {
    a.checked_add(b)
        .ok_or_else(|| Error::validation("gCO2e amount out of range"))
}

fn checked_sub(a: i64, b: i64) -> Result<i64> {
    a.checked_sub(b)
        .ok_or_else(|| Error::validation("gCO2e amount out of range"))
}

/// Assignment of a vessel to a compliance pool for one period
///
/// At most one allocation may exist per (vessel, period); the storage key
/// is the pair itself, so duplicates are unrepresentable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolAllocation {
    /// Unique allocation ID
    pub id: Uuid,

    /// Owning company
    pub company_id: CompanyId,

    /// Pooled vessel
    pub vessel_id: VesselId,

    /// Compliance period
    pub period_year: PeriodYear,

    /// Target pool
    pub pool_id: PoolId,

    /// Inflow or outflow
    pub direction: AllocationDirection,

    /// Allocated amount, gCO2e (outflow stored negative)
    pub amount_gco2e: i64,

    /// Effective date
    pub effective_from: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Aggregate pool position for one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPerformance {
    /// Sum of inflow amounts, gCO2e
    pub total_inflow_gco2e: i64,

    /// Sum of outflow amounts, gCO2e (negative)
    pub total_outflow_gco2e: i64,

    /// Net benefit: inflow + outflow
    pub net_benefit_gco2e: i64,

    /// Distinct vessels with an allocation
    pub vessels_participating: usize,
}

/// Append-only EU ETS allowance operation
///
/// Never updated or deleted; corrections are made via new offsetting
/// operations. The operation's compliance period is the UTC calendar year
/// of `executed_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EuaOperation {
    /// Unique operation ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning company
    pub company_id: CompanyId,

    /// Operation type
    pub operation_type: EuaOperationType,

    /// Allowance count (1 EUA ~ 1 tonne CO2e)
    pub euas_count: Decimal,

    /// Execution price, for hedges
    pub price_per_eua: Option<Decimal>,

    /// Voyages a surrender accounts for
    pub reference_voyage_ids: Vec<VoyageId>,

    /// Execution timestamp
    pub executed_at: DateTime<Utc>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl EuaOperation {
    /// Compliance period the operation falls into
    pub fn period_year(&self) -> i32 {
        self.executed_at.year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyId {
        CompanyId::new(Uuid::new_v4())
    }

    fn period(year: i32) -> PeriodYear {
        PeriodYear::new(year).unwrap()
    }

    #[test]
    fn test_period_year_bounds() {
        assert!(PeriodYear::new(1999).is_err());
        assert!(PeriodYear::new(2101).is_err());
        assert!(PeriodYear::new(2000).is_ok());
        assert!(PeriodYear::new(2100).is_ok());
        assert_eq!(period(2024).next().get(), 2025);
    }

    #[test]
    fn test_bank_positive_adjustment() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        balance
            .apply_adjustment(BalanceOperation::Bank, 1_000_000)
            .unwrap();

        assert_eq!(balance.balance_gco2e(), 1_000_000);
        assert_eq!(balance.banked_gco2e(), 1_000_000);
        assert_eq!(balance.borrowed_gco2e(), 0);
    }

    #[test]
    fn test_bank_negative_adjustment() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        balance
            .apply_adjustment(BalanceOperation::Bank, -250_000)
            .unwrap();

        assert_eq!(balance.balance_gco2e(), -250_000);
        assert_eq!(balance.banked_gco2e(), -250_000);
        assert_eq!(balance.borrowed_gco2e(), 0);
    }

    #[test]
    fn test_borrow_negative_adjustment_records_debt() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        balance
            .apply_adjustment(BalanceOperation::Borrow, -500_000)
            .unwrap();

        // Deficit of 500k shows as outstanding debt
        assert_eq!(balance.balance_gco2e(), -500_000);
        assert_eq!(balance.banked_gco2e(), 0);
        assert_eq!(balance.borrowed_gco2e(), 500_000);
    }

    #[test]
    fn test_borrow_positive_adjustment_reduces_debt() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        balance
            .apply_adjustment(BalanceOperation::Borrow, -500_000)
            .unwrap();
        balance
            .apply_adjustment(BalanceOperation::Borrow, 200_000)
            .unwrap();

        assert_eq!(balance.balance_gco2e(), -300_000);
        assert_eq!(balance.borrowed_gco2e(), 300_000);
    }

    #[test]
    fn test_identity_holds_across_mixed_adjustments() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        for (op, adj) in [
            (BalanceOperation::Bank, 300_000),
            (BalanceOperation::Borrow, -120_000),
            (BalanceOperation::Bank, -50_000),
            (BalanceOperation::Borrow, 70_000),
        ] {
            balance.apply_adjustment(op, adj).unwrap();
            assert_eq!(
                balance.balance_gco2e(),
                balance.banked_gco2e() - balance.borrowed_gco2e()
            );
        }
    }

    #[test]
    fn test_parts_roundtrip_rejects_inconsistent_row() {
        let parts = BalanceParts {
            company_id: company(),
            period_year: period(2024),
            balance_gco2e: 10,
            banked_gco2e: 5,
            borrowed_gco2e: 0,
            updated_at: Utc::now(),
        };
        assert!(FuelEuBalance::try_from(parts).is_err());
    }

    #[test]
    fn test_adjustment_overflow_rejected() {
        let mut balance = FuelEuBalance::zero(company(), period(2024));
        balance
            .apply_adjustment(BalanceOperation::Bank, i64::MAX)
            .unwrap();
        assert!(balance
            .apply_adjustment(BalanceOperation::Bank, 1)
            .is_err());
    }

    #[test]
    fn test_eua_operation_period_from_execution_time() {
        let op = EuaOperation {
            id: Uuid::now_v7(),
            company_id: company(),
            operation_type: EuaOperationType::Forecast,
            euas_count: Decimal::from(100),
            price_per_eua: None,
            reference_voyage_ids: vec![],
            executed_at: "2024-06-15T12:00:00Z".parse().unwrap(),
            created_at: Utc::now(),
        };
        assert_eq!(op.period_year(), 2024);
    }
}
