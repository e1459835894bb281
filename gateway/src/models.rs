use compliance_ledger::{AllocationDirection, BalanceOperation, EmissionSource, VerificationStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Success envelope: `{code, message, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: &'static str,
    pub message: String,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            code: "SUCCESS",
            message: message.into(),
            data,
        }
    }
}

/// POST /emissions
#[derive(Debug, Deserialize, Validate)]
pub struct RecordEmissionRequest {
    pub voyage_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub co2_tonnes: Decimal,
    pub ch4_tonnes: Option<Decimal>,
    pub n2o_tonnes: Option<Decimal>,
    pub energy_gj: Decimal,
    pub source: EmissionSource,
}

/// PUT /emissions/{id}
#[derive(Debug, Deserialize)]
pub struct UpdateEmissionRequest {
    pub co2_tonnes: Option<Decimal>,
    pub energy_gj: Option<Decimal>,
}

/// POST /emissions/{id}/verifications
#[derive(Debug, Deserialize)]
pub struct AddVerificationRequest {
    pub verifier_id: Uuid,
    pub status: VerificationStatus,
    pub certificate_number: Option<String>,
    pub findings: Option<String>,
}

/// POST /fueleu/balance
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustBalanceRequest {
    pub company_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub vessel_id: Uuid,
    pub adjustment_gco2e: i64,
    pub operation: BalanceOperation,
}

/// GET /fueleu/balance
#[derive(Debug, Deserialize, Validate)]
pub struct BalanceQuery {
    pub company_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
}

/// POST /fueleu/borrow/{company_id}/{period_year}
#[derive(Debug, Deserialize)]
pub struct BorrowRequest {
    pub amount_gco2e: i64,
    pub from_year: Option<i32>,
}

/// POST /eua/forecast
#[derive(Debug, Deserialize, Validate)]
pub struct ForecastRequest {
    pub company_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub euas_count: Decimal,
}

/// POST /eua/surrender
#[derive(Debug, Deserialize, Validate)]
pub struct SurrenderRequest {
    pub company_id: Uuid,
    #[validate(length(min = 1))]
    pub voyage_ids: Vec<Uuid>,
    pub euas_count: Decimal,
}

/// POST /eua/reconcile
#[derive(Debug, Deserialize, Validate)]
pub struct ReconcileRequest {
    pub company_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub euas_count: Decimal,
}

/// POST /eua/hedge
#[derive(Debug, Deserialize)]
pub struct HedgeRequest {
    pub company_id: Uuid,
    pub euas_count: Decimal,
    pub price_per_eua: Decimal,
}

/// POST /pools/allocate
#[derive(Debug, Deserialize, Validate)]
pub struct AllocateRequest {
    pub company_id: Uuid,
    pub vessel_id: Uuid,
    #[validate(range(min = 2000, max = 2100))]
    pub period_year: i32,
    pub pool_id: Uuid,
    pub amount_gco2e: i64,
    pub allocation_type: AllocationDirection,
}

/// Banking outcome
#[derive(Debug, Serialize)]
pub struct BankResponse {
    pub success: bool,
    pub banked_gco2e: i64,
}

/// Borrowing outcome
#[derive(Debug, Serialize)]
pub struct BorrowResponse {
    pub success: bool,
    pub borrowed_gco2e: i64,
}

/// Forecast accuracy, absent when there is nothing to compare
#[derive(Debug, Serialize)]
pub struct AccuracyResponse {
    pub accuracy: Option<f64>,
}
