use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use compliance_gateway::{
    config::Config,
    fleet::{FleetClient, HttpFleetDirectory},
    handlers,
};
use compliance_ledger::ComplianceLedger;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .json()
        .init();

    info!("starting compliance gateway");

    let config = Config::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let fleet = FleetClient::Http(HttpFleetDirectory::new(
        config.fleet.base_url.clone(),
        config.fleet.timeout_secs,
    )?);

    let ledger = ComplianceLedger::open(config.ledger_config(), fleet)
        .await
        .context("failed to open compliance ledger")?;
    let ledger_data = web::Data::new(ledger);

    info!(
        host = %config.server.host,
        port = config.server.port,
        "compliance ledger opened, starting HTTP server"
    );

    HttpServer::new(move || {
        App::new()
            .app_data(ledger_data.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))
    .context("failed to bind HTTP listener")?
    .run()
    .await?;

    Ok(())
}
