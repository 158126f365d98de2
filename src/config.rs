use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

#[derive(Debug, Clone)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Security limits applied to every charge and payout request.
///
/// These are a secondary defense layered on top of the gateway's own fraud
/// controls, so they live in-process and reset on restart.
#[derive(Debug, Clone)]
pub struct SecurityLimits {
    pub min_amount: Decimal,
    pub max_amount: Decimal,
    pub max_daily_amount: Decimal,
    pub rate_limit_enabled: bool,
    pub max_requests_per_minute: u32,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            min_amount: dec!(0.50),
            max_amount: dec!(10000.00),
            max_daily_amount: dec!(50000.00),
            rate_limit_enabled: true,
            max_requests_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Payment gateway
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    pub gateway_timeout_ms: u64,

    // Webhook verification
    pub webhook_secret: Option<String>,
    pub webhook_tolerance_secs: i64,

    // Security limits
    pub security: SecurityLimits,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment()?;

        let config = Self {
            environment: environment.clone(),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            gateway_secret_key: std::env::var("STRIPE_SECRET_KEY")
                .context("STRIPE_SECRET_KEY required")?,
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .unwrap_or_else(|_| "15000".to_string())
                .parse()
                .context("Invalid GATEWAY_TIMEOUT_MS")?,

            webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            webhook_tolerance_secs: std::env::var("WEBHOOK_TOLERANCE_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid WEBHOOK_TOLERANCE_SECS")?,

            security: SecurityLimits {
                min_amount: Self::parse_decimal("SECURITY_MIN_AMOUNT", dec!(0.50))?,
                max_amount: Self::parse_decimal("SECURITY_MAX_AMOUNT", dec!(10000.00))?,
                max_daily_amount: Self::parse_decimal("SECURITY_MAX_DAILY_AMOUNT", dec!(50000.00))?,
                rate_limit_enabled: std::env::var("RATE_LIMIT_ENABLED")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .context("Invalid RATE_LIMIT_ENABLED")?,
                max_requests_per_minute: std::env::var("RATE_LIMIT_MAX_PER_MINUTE")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .context("Invalid RATE_LIMIT_MAX_PER_MINUTE")?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn parse_decimal(var: &str, default: Decimal) -> Result<Decimal> {
        match std::env::var(var) {
            Ok(value) => value
                .parse::<Decimal>()
                .with_context(|| format!("Invalid decimal for {}", var)),
            Err(_) => Ok(default),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.gateway_base_url.starts_with("http") {
            bail!("GATEWAY_BASE_URL must be HTTP(S) URL");
        }
        if self.gateway_secret_key.is_empty() {
            bail!("STRIPE_SECRET_KEY must not be empty");
        }
        if self.security.min_amount <= Decimal::ZERO
            || self.security.max_amount <= self.security.min_amount
        {
            bail!("Security amount limits must satisfy 0 < min < max");
        }
        if self.security.max_requests_per_minute == 0 {
            bail!("RATE_LIMIT_MAX_PER_MINUTE must be positive");
        }

        if self.webhook_secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not configured; webhook endpoint will fail closed");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}
