use clap::{Parser, ValueEnum};
use phnix_core::alphabet::{DEFAULT_CHECKSUM_ALPHABET, DEFAULT_PAYLOAD_ALPHABET};
use phnix_core::allocation::{DEFAULT_PER_SUBJECT_LIMIT, DEFAULT_RESOURCE_PROCESS_LIMIT};
use phnix_core::batch::DEFAULT_BATCH_SIZE;
use phnix_core::phn::DEFAULT_PAYLOAD_LENGTH;
use phnix_issuer::{
    DEFAULT_MAX_ATTEMPTS_PER_SLOT, DEFAULT_MAX_PHN_PER_POI, DEFAULT_PRACTITIONER_FETCH_LIMIT,
    DEFAULT_SUBJECT_CONCURRENCY,
};
use phnix_telemetry::LogFormat;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub const LISTEN_ADDR_ENV: &str = "PHNIX_LISTEN_ADDR";
pub const STORAGE_BACKEND_ENV: &str = "PHNIX_STORAGE_BACKEND";
pub const MYSQL_DSN_ENV: &str = "PHNIX_MYSQL_DSN";
pub const APPLY_SCHEMA_ENV: &str = "PHNIX_APPLY_SCHEMA";
pub const POI_CODES_ENV: &str = "PHNIX_POI_CODES";

pub const KEYCLOAK_URL_ENV: &str = "PHNIX_KEYCLOAK_URL";
pub const KEYCLOAK_REALM_ENV: &str = "PHNIX_KEYCLOAK_REALM";
pub const KEYCLOAK_CLIENT_ID_ENV: &str = "PHNIX_KEYCLOAK_CLIENT_ID";
pub const KEYCLOAK_CLIENT_SECRET_ENV: &str = "PHNIX_KEYCLOAK_CLIENT_SECRET";
pub const KEYCLOAK_USERNAME_ENV: &str = "PHNIX_KEYCLOAK_USERNAME";
pub const KEYCLOAK_PASSWORD_ENV: &str = "PHNIX_KEYCLOAK_PASSWORD";
pub const KEYCLOAK_LEGACY_PATHS_ENV: &str = "PHNIX_KEYCLOAK_LEGACY_PATHS";
pub const FHIR_TOKEN_ENV: &str = "PHNIX_FHIR_TOKEN";

pub const FHIR_BASE_URL_ENV: &str = "PHNIX_FHIR_BASE_URL";
pub const BUNDLE_BASE_URL_ENV: &str = "PHNIX_BUNDLE_BASE_URL";
pub const HTTP_TIMEOUT_SECS_ENV: &str = "PHNIX_HTTP_TIMEOUT_SECS";

pub const CYCLE_INTERVAL_SECS_ENV: &str = "PHNIX_CYCLE_INTERVAL_SECS";
pub const RUN_ON_STARTUP_ENV: &str = "PHNIX_RUN_ON_STARTUP";

pub const PHN_GROUP_LIMIT_ENV: &str = "PHNIX_PHN_GROUP_LIMIT";
pub const RESOURCE_PROCESS_LIMIT_ENV: &str = "PHNIX_RESOURCE_PROCESS_LIMIT";
pub const MAX_PHN_PER_POI_ENV: &str = "PHNIX_MAX_PHN_PER_POI";
pub const PHN_PER_GROUP_LIMIT_ENV: &str = "PHNIX_PHN_PER_GROUP_LIMIT";
pub const MAX_ATTEMPTS_PER_SLOT_ENV: &str = "PHNIX_MAX_ATTEMPTS_PER_SLOT";
pub const SUBJECT_CONCURRENCY_ENV: &str = "PHNIX_SUBJECT_CONCURRENCY";
pub const PRACTITIONER_FETCH_LIMIT_ENV: &str = "PHNIX_PRACTITIONER_FETCH_LIMIT";
pub const PAYLOAD_LENGTH_ENV: &str = "PHNIX_PAYLOAD_LENGTH";
pub const CHECKSUM_ALPHABET_ENV: &str = "PHNIX_CHECKSUM_ALPHABET";
pub const PAYLOAD_ALPHABET_ENV: &str = "PHNIX_PAYLOAD_ALPHABET";
pub const APP_VERSION_ENV: &str = "PHNIX_APP_VERSION";

pub const LOG_FORMAT_ENV: &str = "PHNIX_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "PHNIX_OTLP_ENDPOINT";

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackendArg {
    #[value(name = "in-memory")]
    InMemory,
    #[value(name = "mysql")]
    Mysql,
}

impl Display for StorageBackendArg {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackendArg::InMemory => write!(f, "in-memory"),
            StorageBackendArg::Mysql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "phnix-gateway")]
pub struct CLI {
    #[arg(long, env = LISTEN_ADDR_ENV, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,

    #[arg(
        long,
        env = STORAGE_BACKEND_ENV,
        value_enum,
        default_value_t = StorageBackendArg::InMemory
    )]
    pub storage: StorageBackendArg,

    #[arg(long, env = MYSQL_DSN_ENV, required_if_eq("storage", "mysql"))]
    pub mysql_dsn: Option<String>,

    /// Create the ledger and authority tables if they are missing.
    #[arg(long, env = APPLY_SCHEMA_ENV)]
    pub apply_schema: bool,

    /// Four-character point-of-issuance codes to provision at startup.
    #[arg(long, env = POI_CODES_ENV, value_delimiter = ',')]
    pub poi_codes: Vec<String>,

    #[arg(long, env = KEYCLOAK_URL_ENV, required_unless_present = "fhir_token")]
    pub keycloak_url: Option<String>,

    #[arg(long, env = KEYCLOAK_REALM_ENV, required_unless_present = "fhir_token")]
    pub keycloak_realm: Option<String>,

    #[arg(long, env = KEYCLOAK_CLIENT_ID_ENV, required_unless_present = "fhir_token")]
    pub keycloak_client_id: Option<String>,

    #[arg(long, env = KEYCLOAK_CLIENT_SECRET_ENV, hide_env_values = true)]
    pub keycloak_client_secret: Option<String>,

    #[arg(long, env = KEYCLOAK_USERNAME_ENV, required_unless_present = "fhir_token")]
    pub keycloak_username: Option<String>,

    #[arg(
        long,
        env = KEYCLOAK_PASSWORD_ENV,
        required_unless_present = "fhir_token",
        hide_env_values = true
    )]
    pub keycloak_password: Option<String>,

    /// Serve the token endpoint under `/auth` (Keycloak before 17).
    #[arg(long, env = KEYCLOAK_LEGACY_PATHS_ENV)]
    pub keycloak_legacy_paths: bool,

    /// Fixed bearer token; skips Keycloak entirely.
    #[arg(long, env = FHIR_TOKEN_ENV, hide_env_values = true)]
    pub fhir_token: Option<String>,

    #[arg(long, env = FHIR_BASE_URL_ENV)]
    pub fhir_base_url: String,

    /// Prefix of each group's `fullUrl`; defaults to the FHIR base URL.
    #[arg(long, env = BUNDLE_BASE_URL_ENV)]
    pub bundle_base_url: Option<String>,

    #[arg(long, env = HTTP_TIMEOUT_SECS_ENV, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,

    /// Seconds between scheduled cycles; 0 disables the timer.
    #[arg(long, env = CYCLE_INTERVAL_SECS_ENV, default_value_t = DEFAULT_CYCLE_INTERVAL_SECS)]
    pub cycle_interval_secs: u64,

    #[arg(long, env = RUN_ON_STARTUP_ENV)]
    pub run_on_startup: bool,

    /// Active PHN groups each practitioner should hold.
    #[arg(long, env = PHN_GROUP_LIMIT_ENV, default_value_t = DEFAULT_PER_SUBJECT_LIMIT)]
    pub phn_group_limit: u32,

    /// Practitioners served per cycle.
    #[arg(long, env = RESOURCE_PROCESS_LIMIT_ENV, default_value_t = DEFAULT_RESOURCE_PROCESS_LIMIT)]
    pub resource_process_limit: usize,

    #[arg(long, env = MAX_PHN_PER_POI_ENV, default_value_t = DEFAULT_MAX_PHN_PER_POI)]
    pub max_phn_per_poi: u64,

    /// PHNs per group.
    #[arg(long, env = PHN_PER_GROUP_LIMIT_ENV, default_value_t = DEFAULT_BATCH_SIZE)]
    pub phn_per_group_limit: usize,

    #[arg(long, env = MAX_ATTEMPTS_PER_SLOT_ENV, default_value_t = DEFAULT_MAX_ATTEMPTS_PER_SLOT)]
    pub max_attempts_per_slot: u32,

    #[arg(long, env = SUBJECT_CONCURRENCY_ENV, default_value_t = DEFAULT_SUBJECT_CONCURRENCY)]
    pub subject_concurrency: usize,

    #[arg(
        long,
        env = PRACTITIONER_FETCH_LIMIT_ENV,
        default_value_t = DEFAULT_PRACTITIONER_FETCH_LIMIT
    )]
    pub practitioner_fetch_limit: u32,

    #[arg(long, env = PAYLOAD_LENGTH_ENV, default_value_t = DEFAULT_PAYLOAD_LENGTH)]
    pub payload_length: usize,

    #[arg(long, env = CHECKSUM_ALPHABET_ENV, default_value = DEFAULT_CHECKSUM_ALPHABET)]
    pub checksum_alphabet: String,

    #[arg(long, env = PAYLOAD_ALPHABET_ENV, default_value = DEFAULT_PAYLOAD_ALPHABET)]
    pub payload_alphabet: String,

    /// Written to each group as the app-version tag.
    #[arg(long, env = APP_VERSION_ENV)]
    pub app_version: Option<String>,

    #[arg(long, env = LOG_FORMAT_ENV, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// OTLP gRPC endpoint for span export.
    #[arg(long, env = OTLP_ENDPOINT_ENV)]
    pub otlp_endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<CLI, clap::Error> {
        let base = [
            "gateway",
            "--fhir-base-url",
            "http://hapi:8080/fhir",
            "--fhir-token",
            "tok",
        ];
        CLI::try_parse_from(base.iter().chain(extra))
    }

    #[test]
    fn defaults_follow_the_domain_constants() {
        let cli = parse(&[]).unwrap();

        assert_eq!(cli.storage, StorageBackendArg::InMemory);
        assert_eq!(cli.cycle_interval_secs, 120);
        assert_eq!(cli.phn_group_limit, 2);
        assert_eq!(cli.resource_process_limit, 20);
        assert_eq!(cli.phn_per_group_limit, 100);
        assert_eq!(cli.max_phn_per_poi, 1_000_000);
        assert_eq!(cli.payload_length, 6);
        assert_eq!(cli.checksum_alphabet, DEFAULT_CHECKSUM_ALPHABET);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert!(cli.poi_codes.is_empty());
    }

    #[test]
    fn poi_codes_are_comma_separated() {
        let cli = parse(&["--poi-codes", "3053,3054"]).unwrap();
        assert_eq!(cli.poi_codes, vec!["3053", "3054"]);
    }

    #[test]
    fn mysql_requires_a_dsn() {
        assert!(parse(&["--storage", "mysql"]).is_err());

        let cli = parse(&["--storage", "mysql", "--mysql-dsn", "mysql://db/phnix"]).unwrap();
        assert_eq!(cli.storage, StorageBackendArg::Mysql);
    }

    #[test]
    fn keycloak_settings_are_required_without_a_static_token() {
        let result = CLI::try_parse_from(["gateway", "--fhir-base-url", "http://hapi:8080/fhir"]);
        assert!(result.is_err());

        let cli = CLI::try_parse_from([
            "gateway",
            "--fhir-base-url",
            "http://hapi:8080/fhir",
            "--keycloak-url",
            "http://keycloak:8080",
            "--keycloak-realm",
            "fhir",
            "--keycloak-client-id",
            "fhir-core",
            "--keycloak-username",
            "issuer",
            "--keycloak-password",
            "secret",
        ])
        .unwrap();
        assert_eq!(cli.keycloak_realm.as_deref(), Some("fhir"));
        assert!(cli.fhir_token.is_none());
    }
}
