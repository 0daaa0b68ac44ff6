mod cli;

use crate::cli::{StorageBackendArg, CLI};
use anyhow::Context;
use clap::Parser;
use phnix_core::{AllocationPolicy, Alphabet, PhnScheme};
use phnix_fhir::{
    BundlePoster, HapiClient, KeycloakConfig, KeycloakTokenProvider, ResourceDirectory,
    StaticTokenProvider, TokenProvider,
};
use phnix_gateway::{scheduler, App, AppState};
use phnix_generator::RandomPhnGenerator;
use phnix_issuer::{
    provision_authorities, AssemblerConfig, IssuanceStore, IssuerContext, IssuerSettings,
};
use phnix_storage::{InMemoryRepository, MySqlRepository};
use phnix_telemetry::{Telemetry, TelemetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const SERVICE_NAME: &str = "phnix-gateway";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = CLI::parse();
    let telemetry = init_telemetry(&config)?;

    info!(
        listen_addr = %config.listen_addr,
        storage_backend = %config.storage,
        fhir_base_url = %config.fhir_base_url,
        "starting phn gateway"
    );

    let result = match config.storage {
        StorageBackendArg::InMemory => serve(&config, InMemoryRepository::new()).await,
        StorageBackendArg::Mysql => {
            let mysql_dsn = config
                .mysql_dsn
                .as_deref()
                .context("mysql dsn is required when storage backend is mysql")?;
            let repository = MySqlRepository::connect(mysql_dsn).await?;
            if config.apply_schema {
                repository.apply_schema().await?;
                info!("schema applied");
            }
            serve(&config, repository).await
        }
    };

    telemetry.shutdown()?;
    result
}

fn init_telemetry(config: &CLI) -> anyhow::Result<Telemetry> {
    let builder = TelemetryConfig::builder()
        .service_name(SERVICE_NAME)
        .format(config.log_format);
    let telemetry_config = match &config.otlp_endpoint {
        Some(endpoint) => builder.otlp_endpoint(endpoint.clone()).build(),
        None => builder.build(),
    };
    Ok(phnix_telemetry::init(&telemetry_config)?)
}

async fn serve<S: IssuanceStore>(config: &CLI, store: S) -> anyhow::Result<()> {
    let scheme = PhnScheme::new(
        Alphabet::new(&config.checksum_alphabet)?,
        Alphabet::new(&config.payload_alphabet)?,
        config.payload_length,
    )?;
    provision_authorities(&store, &scheme, &config.poi_codes).await?;

    let timeout = Duration::from_secs(config.http_timeout_secs);
    let hapi = Arc::new(HapiClient::new(&config.fhir_base_url, timeout)?);

    let context = IssuerContext::builder()
        .store(Arc::new(store))
        .generator(Arc::new(RandomPhnGenerator::new(scheme)))
        .tokens(token_provider(config, timeout)?)
        .directory(Arc::clone(&hapi) as Arc<dyn ResourceDirectory>)
        .poster(hapi as Arc<dyn BundlePoster>)
        .settings(issuer_settings(config))
        .build();
    let state = AppState::new(Arc::new(context));

    let timer = scheduler::spawn(
        state.clone(),
        Duration::from_secs(config.cycle_interval_secs),
        config.run_on_startup,
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!(listen_addr = %listener.local_addr()?, "serving http");
    axum::serve(listener, App::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(timer) = timer {
        timer.abort();
    }
    info!("gateway stopped");
    Ok(())
}

fn issuer_settings(config: &CLI) -> IssuerSettings {
    let policy = AllocationPolicy::builder()
        .per_subject_limit(config.phn_group_limit)
        .resource_process_limit(config.resource_process_limit)
        .build();
    let assembler = AssemblerConfig::builder()
        .batch_size(config.phn_per_group_limit)
        .max_attempts_per_slot(config.max_attempts_per_slot)
        .max_phn_per_poi(config.max_phn_per_poi)
        .build();

    let mut settings = IssuerSettings::builder()
        .policy(policy)
        .assembler(assembler)
        .practitioner_fetch_limit(config.practitioner_fetch_limit)
        .subject_concurrency(config.subject_concurrency)
        .bundle_base_url(
            config
                .bundle_base_url
                .clone()
                .unwrap_or_else(|| config.fhir_base_url.clone()),
        )
        .build();
    settings.app_version = config.app_version.clone();
    settings
}

fn token_provider(config: &CLI, timeout: Duration) -> anyhow::Result<Arc<dyn TokenProvider>> {
    if let Some(token) = &config.fhir_token {
        info!("using a static access token");
        return Ok(Arc::new(StaticTokenProvider::new(token.as_str())));
    }

    let builder = KeycloakConfig::builder()
        .base_url(required(&config.keycloak_url, "keycloak url")?)
        .realm(required(&config.keycloak_realm, "keycloak realm")?)
        .client_id(required(&config.keycloak_client_id, "keycloak client id")?)
        .username(required(&config.keycloak_username, "keycloak username")?)
        .password(required(&config.keycloak_password, "keycloak password")?)
        .legacy_paths(config.keycloak_legacy_paths)
        .timeout(timeout);
    let keycloak = match &config.keycloak_client_secret {
        Some(secret) => builder.client_secret(secret.as_str()).build(),
        None => builder.build(),
    };

    info!(endpoint = %keycloak.token_endpoint(), "using keycloak password grant");
    Ok(Arc::new(KeycloakTokenProvider::new(keycloak)?))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .with_context(|| format!("{name} is required without a static token"))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
