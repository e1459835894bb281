use crate::errors::ApiError;
use crate::models::{
    AccuracyResponse, AddVerificationRequest, AdjustBalanceRequest, AllocateRequest,
    ApiResponse, BalanceQuery, BankResponse, BorrowRequest, BorrowResponse, ForecastRequest,
    HedgeRequest, ReconcileRequest, RecordEmissionRequest, SurrenderRequest,
    UpdateEmissionRequest,
};
use crate::Ledger;
use actix_web::{web, HttpResponse};
use compliance_ledger::{
    CompanyId, EmissionPatch, NewAllocation, NewEmission, NewVerification, PeriodYear, PoolId,
    VesselId, VoyageId,
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// Health check endpoint
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "compliance-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
pub async fn metrics(ledger: web::Data<Ledger>) -> Result<HttpResponse, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&ledger.metrics().registry().gather(), &mut buffer)
        .map_err(|e| ApiError::Internal(format!("failed to encode metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer))
}

/// Record verified emission facts for a voyage
pub async fn record_emission(
    ledger: web::Data<Ledger>,
    request: web::Json<RecordEmissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let record = ledger
        .emissions()
        .record_emission(NewEmission {
            voyage_id: VoyageId::new(request.voyage_id),
            period_year: PeriodYear::new(request.period_year)?,
            co2_tonnes: request.co2_tonnes,
            ch4_tonnes: request.ch4_tonnes,
            n2o_tonnes: request.n2o_tonnes,
            energy_gj: request.energy_gj,
            source: request.source,
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("emission recorded", record)))
}

/// Update an unverified emission record
pub async fn update_emission(
    ledger: web::Data<Ledger>,
    emission_id: web::Path<Uuid>,
    request: web::Json<UpdateEmissionRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();

    let record = ledger
        .emissions()
        .update_emission(
            *emission_id,
            EmissionPatch {
                co2_tonnes: request.co2_tonnes,
                energy_gj: request.energy_gj,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("emission updated", record)))
}

/// Attach a verification record to an emission record
pub async fn add_verification(
    ledger: web::Data<Ledger>,
    emission_id: web::Path<Uuid>,
    request: web::Json<AddVerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();

    let record = ledger
        .emissions()
        .add_verification(NewVerification {
            emission_record_id: *emission_id,
            verifier_id: request.verifier_id,
            status: request.status,
            certificate_number: request.certificate_number,
            findings: request.findings,
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("verification added", record)))
}

/// Apply a BANK/BORROW adjustment to a company's position
pub async fn adjust_balance(
    ledger: web::Data<Ledger>,
    request: web::Json<AdjustBalanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let balance = ledger
        .fueleu()
        .adjust_balance(
            CompanyId::new(request.company_id),
            PeriodYear::new(request.period_year)?,
            VesselId::new(request.vessel_id),
            request.adjustment_gco2e,
            request.operation,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("balance adjusted", balance)))
}

/// Current position for a company and period
pub async fn get_balance(
    ledger: web::Data<Ledger>,
    query: web::Query<BalanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    query.validate()?;

    let balance = ledger.fueleu().balance(
        CompanyId::new(query.company_id),
        PeriodYear::new(query.period_year)?,
    )?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("balance retrieved", balance)))
}

/// Carry the period's positive balance into the next period
pub async fn bank_to_next_period(
    ledger: web::Data<Ledger>,
    path: web::Path<(Uuid, i32)>,
) -> Result<HttpResponse, ApiError> {
    let (company_id, period_year) = path.into_inner();

    let banked_gco2e = ledger
        .fueleu()
        .bank_to_next_period(CompanyId::new(company_id), PeriodYear::new(period_year)?)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        "balance banked",
        BankResponse {
            success: true,
            banked_gco2e,
        },
    )))
}

/// Pull surplus forward from the next period
pub async fn borrow_from_next_period(
    ledger: web::Data<Ledger>,
    path: web::Path<(Uuid, i32)>,
    request: web::Json<BorrowRequest>,
) -> Result<HttpResponse, ApiError> {
    let (company_id, period_year) = path.into_inner();
    let request = request.into_inner();

    let from_year = match request.from_year {
        Some(year) => Some(PeriodYear::new(year)?),
        None => None,
    };

    let borrowed_gco2e = ledger
        .fueleu()
        .borrow_from_next_period(
            CompanyId::new(company_id),
            PeriodYear::new(period_year)?,
            request.amount_gco2e,
            from_year,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        "balance borrowed",
        BorrowResponse {
            success: true,
            borrowed_gco2e,
        },
    )))
}

/// Record a forecast of allowance requirements
pub async fn forecast(
    ledger: web::Data<Ledger>,
    request: web::Json<ForecastRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let operation = ledger
        .eua()
        .forecast(
            CompanyId::new(request.company_id),
            PeriodYear::new(request.period_year)?,
            request.euas_count,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("forecast recorded", operation)))
}

/// Surrender allowances against recorded emissions
pub async fn surrender(
    ledger: web::Data<Ledger>,
    request: web::Json<SurrenderRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let operation = ledger
        .eua()
        .surrender(
            CompanyId::new(request.company_id),
            request.voyage_ids.into_iter().map(VoyageId::new).collect(),
            request.euas_count,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("allowances surrendered", operation)))
}

/// Confirm surrendered allowances cover a claimed amount
pub async fn reconcile(
    ledger: web::Data<Ledger>,
    request: web::Json<ReconcileRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let operation = ledger
        .eua()
        .reconcile(
            CompanyId::new(request.company_id),
            PeriodYear::new(request.period_year)?,
            request.euas_count,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("allowances reconciled", operation)))
}

/// Record an allowance purchase at a price
pub async fn hedge(
    ledger: web::Data<Ledger>,
    request: web::Json<HedgeRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();

    let operation = ledger
        .eua()
        .hedge(
            CompanyId::new(request.company_id),
            request.euas_count,
            request.price_per_eua,
        )
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("hedge recorded", operation)))
}

/// Forecast accuracy for a company and period
pub async fn forecast_accuracy(
    ledger: web::Data<Ledger>,
    path: web::Path<(Uuid, i32)>,
) -> Result<HttpResponse, ApiError> {
    let (company_id, period_year) = path.into_inner();

    let accuracy = ledger
        .eua()
        .forecast_accuracy(CompanyId::new(company_id), PeriodYear::new(period_year)?)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        "forecast accuracy calculated",
        AccuracyResponse { accuracy },
    )))
}

/// Enroll a vessel into a compliance pool
pub async fn allocate(
    ledger: web::Data<Ledger>,
    request: web::Json<AllocateRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = request.into_inner();
    request.validate()?;

    let allocation = ledger
        .pools()
        .allocate(NewAllocation {
            company_id: CompanyId::new(request.company_id),
            vessel_id: VesselId::new(request.vessel_id),
            period_year: PeriodYear::new(request.period_year)?,
            pool_id: PoolId::new(request.pool_id),
            amount_gco2e: request.amount_gco2e,
            direction: request.allocation_type,
        })
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::new("vessel allocated to pool", allocation)))
}

/// Aggregate pool position for a period
pub async fn pool_performance(
    ledger: web::Data<Ledger>,
    path: web::Path<(Uuid, i32)>,
) -> Result<HttpResponse, ApiError> {
    let (pool_id, period_year) = path.into_inner();

    let performance = ledger
        .pools()
        .pool_performance(PoolId::new(pool_id), PeriodYear::new(period_year)?)?;

    Ok(HttpResponse::Ok().json(ApiResponse::new(
        "pool performance calculated",
        performance,
    )))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/metrics", web::get().to(metrics))
        .route("/emissions", web::post().to(record_emission))
        .route("/emissions/{id}", web::put().to(update_emission))
        .route(
            "/emissions/{id}/verifications",
            web::post().to(add_verification),
        )
        .service(
            web::resource("/fueleu/balance")
                .route(web::post().to(adjust_balance))
                .route(web::get().to(get_balance)),
        )
        .route(
            "/fueleu/bank/{company_id}/{period_year}",
            web::post().to(bank_to_next_period),
        )
        .route(
            "/fueleu/borrow/{company_id}/{period_year}",
            web::post().to(borrow_from_next_period),
        )
        .route("/eua/forecast", web::post().to(forecast))
        .route("/eua/surrender", web::post().to(surrender))
        .route("/eua/reconcile", web::post().to(reconcile))
        .route("/eua/hedge", web::post().to(hedge))
        .route(
            "/eua/accuracy/{company_id}/{period_year}",
            web::get().to(forecast_accuracy),
        )
        .route("/pools/allocate", web::post().to(allocate))
        .route(
            "/pools/performance/{pool_id}/{period_year}",
            web::get().to(pool_performance),
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetClient;
    use actix_web::{http::StatusCode, test, App};
    use compliance_ledger::{ComplianceLedger, Config, StaticFleetDirectory};

    async fn test_ledger(
        directory: StaticFleetDirectory,
    ) -> (web::Data<Ledger>, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let ledger = ComplianceLedger::open(config, FleetClient::Static(directory))
            .await
            .unwrap();
        (web::Data::new(ledger), temp_dir)
    }

    #[actix_web::test]
    async fn test_record_emission_roundtrip() {
        let directory = StaticFleetDirectory::new();
        let voyage = Uuid::new_v4();
        directory.register_voyage(VoyageId::new(voyage));

        let (ledger, _temp) = test_ledger(directory).await;
        let app = test::init_service(
            App::new().app_data(ledger).configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/emissions")
            .set_json(json!({
                "voyage_id": voyage,
                "period_year": 2024,
                "co2_tonnes": "1500.5",
                "energy_gj": "52000",
                "source": "MRV_SYSTEM",
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["code"], "SUCCESS");
        assert_eq!(body["data"]["voyage_id"], voyage.to_string());
    }

    #[actix_web::test]
    async fn test_record_emission_rejects_bad_period() {
        let (ledger, _temp) = test_ledger(StaticFleetDirectory::new()).await;
        let app = test::init_service(
            App::new().app_data(ledger).configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::post()
            .uri("/emissions")
            .set_json(json!({
                "voyage_id": Uuid::new_v4(),
                "period_year": 1999,
                "co2_tonnes": "1000",
                "energy_gj": "40000",
                "source": "MANUAL",
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[actix_web::test]
    async fn test_bank_flow_over_http() {
        let (ledger, _temp) = test_ledger(StaticFleetDirectory::new()).await;
        let app = test::init_service(
            App::new().app_data(ledger).configure(configure_routes),
        )
        .await;

        let company = Uuid::new_v4();

        let request = test::TestRequest::post()
            .uri("/fueleu/balance")
            .set_json(json!({
                "company_id": company,
                "period_year": 2024,
                "vessel_id": Uuid::new_v4(),
                "adjustment_gco2e": 1_000_000i64,
                "operation": "BANK",
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let request = test::TestRequest::post()
            .uri(&format!("/fueleu/bank/{}/2024", company))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["banked_gco2e"], 1_000_000);
        assert_eq!(body["data"]["success"], true);

        let request = test::TestRequest::get()
            .uri(&format!(
                "/fueleu/balance?company_id={}&period_year=2025",
                company
            ))
            .to_request();
        let response = test::call_service(&app, request).await;
        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["balance_gco2e"], 1_000_000);
    }

    #[actix_web::test]
    async fn test_duplicate_allocation_is_conflict() {
        let (ledger, _temp) = test_ledger(StaticFleetDirectory::new()).await;
        let app = test::init_service(
            App::new().app_data(ledger).configure(configure_routes),
        )
        .await;

        let vessel = Uuid::new_v4();
        let body = json!({
            "company_id": Uuid::new_v4(),
            "vessel_id": vessel,
            "period_year": 2024,
            "pool_id": Uuid::new_v4(),
            "amount_gco2e": 100_000i64,
            "allocation_type": "INFLOW",
        });

        let request = test::TestRequest::post()
            .uri("/pools/allocate")
            .set_json(&body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let request = test::TestRequest::post()
            .uri("/pools/allocate")
            .set_json(&body)
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let envelope: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(envelope["code"], "CONFLICT");
        assert_eq!(
            envelope["message"],
            "vessel already has pool allocation for this period"
        );
    }

    #[actix_web::test]
    async fn test_absent_balance_reads_as_zero_over_http() {
        let (ledger, _temp) = test_ledger(StaticFleetDirectory::new()).await;
        let app = test::init_service(
            App::new().app_data(ledger).configure(configure_routes),
        )
        .await;

        let request = test::TestRequest::get()
            .uri(&format!(
                "/fueleu/balance?company_id={}&period_year=2024",
                Uuid::new_v4()
            ))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["data"]["balance_gco2e"], 0);
        assert_eq!(body["data"]["banked_gco2e"], 0);
        assert_eq!(body["data"]["borrowed_gco2e"], 0);
    }
}
