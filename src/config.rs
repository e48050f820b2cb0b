use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    Sandbox,
    Midtrans,
}

impl FromStr for GatewayKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sandbox" => Ok(GatewayKind::Sandbox),
            "midtrans" => Ok(GatewayKind::Midtrans),
            other => anyhow::bail!("PAYMENT_GATEWAY must be 'sandbox' or 'midtrans', got '{}'", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_expire_hours: i64,
    pub payment_gateway: GatewayKind,
    /// Also the key callback signatures are checked against.
    pub midtrans_server_key: Option<String>,
    pub midtrans_env: String,
    pub reconcile_interval_secs: u64,
    pub reconcile_min_age_secs: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: parse_or("SERVER_PORT", 3000)?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expire_hours: parse_or("JWT_EXPIRE_HOURS", 24)?,
            payment_gateway: parse_or("PAYMENT_GATEWAY", GatewayKind::Sandbox)?,
            midtrans_server_key: env::var("MIDTRANS_SERVER_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            midtrans_env: env::var("MIDTRANS_ENV").unwrap_or_else(|_| "sandbox".to_string()),
            reconcile_interval_secs: parse_or("RECONCILE_INTERVAL_SECS", 60)?,
            reconcile_min_age_secs: parse_or("RECONCILE_MIN_AGE_SECS", 300)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }
        if self.jwt_expire_hours <= 0 {
            anyhow::bail!("JWT_EXPIRE_HOURS must be positive");
        }
        if self.payment_gateway == GatewayKind::Midtrans && self.midtrans_server_key.is_none() {
            anyhow::bail!("MIDTRANS_SERVER_KEY is required when PAYMENT_GATEWAY=midtrans");
        }
        if !matches!(self.midtrans_env.as_str(), "sandbox" | "production") {
            anyhow::bail!("MIDTRANS_ENV must be 'sandbox' or 'production'");
        }
        if self.reconcile_interval_secs == 0 {
            anyhow::bail!("RECONCILE_INTERVAL_SECS must be positive");
        }
        Ok(())
    }
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {}: {}", key, e)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Config {
        Config {
            server_port: 3000,
            database_url: "postgres://localhost/wallet".to_string(),
            database_max_connections: 10,
            jwt_secret: "secret".to_string(),
            jwt_expire_hours: 24,
            payment_gateway: GatewayKind::Sandbox,
            midtrans_server_key: None,
            midtrans_env: "sandbox".to_string(),
            reconcile_interval_secs: 60,
            reconcile_min_age_secs: 300,
        }
    }

    #[test]
    fn test_sandbox_config_is_valid_without_server_key() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_midtrans_requires_server_key() {
        let mut config = base();
        config.payment_gateway = GatewayKind::Midtrans;
        assert!(config.validate().is_err());
        config.midtrans_server_key = Some("key".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_environment() {
        let mut config = base();
        config.midtrans_env = "staging".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gateway_kind_parsing() {
        assert_eq!("Midtrans".parse::<GatewayKind>().unwrap(), GatewayKind::Midtrans);
        assert!("stripe".parse::<GatewayKind>().is_err());
    }
}
