use clap::Parser;
use tracing::warn;

pub const DEV_JWT_SECRET: &str = "visiondesk-insecure-dev-secret";

#[derive(Clone, Debug, Parser)]
#[command(name = "visiondesk")]
pub struct Config {
    #[arg(long, env = "VISIONDESK_PORT", default_value_t = 7700)]
    pub port: u16,

    #[arg(
        long,
        env = "VISIONDESK_DB_URL",
        default_value = "sqlite://./visiondesk.db"
    )]
    pub db_url: String,

    #[arg(long, env = "VISIONDESK_JWT_SECRET", default_value = DEV_JWT_SECRET)]
    pub jwt_secret: String,

    #[arg(
        long,
        env = "VISIONDESK_ACCESS_TOKEN_TTL_SECS",
        default_value_t = 900
    )]
    pub access_token_ttl_secs: u64,

    #[arg(
        long,
        env = "VISIONDESK_REFRESH_TOKEN_TTL_SECS",
        default_value_t = 30 * 24 * 60 * 60
    )]
    pub refresh_token_ttl_secs: u64,

    #[arg(long, env = "VISIONDESK_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[arg(
        long = "max-request-body-bytes",
        env = "VISIONDESK_MAX_REQUEST_BODY_BYTES",
        default_value_t = 1024 * 1024
    )]
    pub max_request_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let config = <Self as Parser>::parse();
        config.validate();
        config
    }

    pub fn log_startup_warnings(&self) {
        if self.jwt_secret == DEV_JWT_SECRET {
            warn!("VISIONDESK_JWT_SECRET is unset, tokens are signed with the built-in development secret");
        }
    }

    fn validate(&self) {
        assert_non_zero_u64(
            "VISIONDESK_ACCESS_TOKEN_TTL_SECS",
            self.access_token_ttl_secs,
        );
        assert_non_zero_u64(
            "VISIONDESK_REFRESH_TOKEN_TTL_SECS",
            self.refresh_token_ttl_secs,
        );
        assert!(
            self.max_request_body_bytes > 0,
            "VISIONDESK_MAX_REQUEST_BODY_BYTES must be greater than 0"
        );
    }
}

fn assert_non_zero_u64(key: &'static str, value: u64) {
    assert!(value > 0, "{key} must be greater than 0");
}
