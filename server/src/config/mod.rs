use std::collections::HashSet;
use std::env;
use std::net::SocketAddr;

use thiserror::Error;

use crate::models::TicketTier;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";
const DEFAULT_TIERS: &str = "Solo=50000,Couple=90000,Group=180000";
const DEFAULT_CURRENCY: &str = "INR";
const DEFAULT_MAX_QUANTITY: u32 = 10;
const DEFAULT_RAZORPAY_BASE_URL: &str = "https://api.razorpay.com";
const DEV_SESSION_SECRET: &str = "gatepass-dev-session-secret";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} must be set in production")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayProvider {
    Razorpay,
    Mock,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: GatewayProvider,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub production: bool,
    pub tiers: Vec<TicketTier>,
    pub currency: String,
    pub max_quantity: u32,
    pub gateway: GatewayConfig,
    pub session_secret: String,
    pub credential_secret: Option<String>,
    pub admin_ids: HashSet<String>,
    pub allowed_origins: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let production = get("RUST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let bind_addr = get("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: format!("{e}"),
            })?;

        let tiers = parse_tiers(&get("TICKET_TIERS").unwrap_or_else(|| DEFAULT_TIERS.to_string()))?;

        let max_quantity = match get("MAX_TICKETS_PER_ORDER") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| ConfigError::Invalid {
                key: "MAX_TICKETS_PER_ORDER",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_QUANTITY,
        };
        if max_quantity == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_TICKETS_PER_ORDER",
                reason: "must be at least 1".to_string(),
            });
        }

        let provider = match get("PAYMENT_GATEWAY").as_deref().map(str::trim) {
            None => GatewayProvider::Razorpay,
            Some(v) if v.eq_ignore_ascii_case("razorpay") => GatewayProvider::Razorpay,
            Some(v) if v.eq_ignore_ascii_case("mock") => GatewayProvider::Mock,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "PAYMENT_GATEWAY",
                    reason: format!("unknown provider '{other}'"),
                })
            }
        };
        if production && provider == GatewayProvider::Mock {
            return Err(ConfigError::Invalid {
                key: "PAYMENT_GATEWAY",
                reason: "mock gateway is not allowed in production".to_string(),
            });
        }

        let session_secret = match get("SESSION_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("SESSION_SECRET")),
            None => DEV_SESSION_SECRET.to_string(),
        };

        let credential_secret = get("CREDENTIAL_SECRET");
        if production && credential_secret.is_none() {
            return Err(ConfigError::Missing("CREDENTIAL_SECRET"));
        }

        Ok(Self {
            database_url: get("DATABASE_URL"),
            bind_addr,
            production,
            tiers,
            currency: get("TICKET_CURRENCY")
                .map(|c| c.trim().to_uppercase())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            max_quantity,
            gateway: GatewayConfig {
                provider,
                key_id: get("RAZORPAY_KEY_ID"),
                key_secret: get("RAZORPAY_KEY_SECRET"),
                base_url: get("RAZORPAY_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_RAZORPAY_BASE_URL.to_string()),
            },
            session_secret,
            credential_secret,
            admin_ids: split_list(get("ADMIN_IDS").as_deref().unwrap_or(""))
                .into_iter()
                .collect(),
            allowed_origins: split_list(
                get("CORS_ALLOWED_ORIGINS")
                    .as_deref()
                    .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
            ),
        })
    }
}

/// Parses `Name=price,Name=price`.
pub fn parse_tiers(raw: &str) -> Result<Vec<TicketTier>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        key: "TICKET_TIERS",
        reason,
    };

    let mut seen = HashSet::new();
    let mut tiers = Vec::new();
    for entry in split_list(raw) {
        let (name, price) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("'{entry}' is not NAME=PRICE")))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid(format!("'{entry}' has an empty tier name")));
        }
        let unit_price: i64 = price
            .trim()
            .parse()
            .map_err(|e| invalid(format!("price for '{name}': {e}")))?;
        if unit_price <= 0 {
            return Err(invalid(format!("price for '{name}' must be positive")));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(invalid(format!("tier '{name}' is defined twice")));
        }
        tiers.push(TicketTier::new(name, unit_price));
    }

    if tiers.is_empty() {
        return Err(invalid("no tiers configured".to_string()));
    }
    Ok(tiers)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.max_quantity, 10);
        assert_eq!(config.currency, "INR");
        assert_eq!(config.tiers.len(), 3);
        assert_eq!(config.gateway.provider, GatewayProvider::Razorpay);
        assert!(config.gateway.key_secret.is_none());
        assert!(config.database_url.is_none());
        assert!(!config.production);
    }

    #[test]
    fn test_tiers_are_configuration_input() {
        let config = config_from(&[("TICKET_TIERS", "Boy=35000, Girl=15000")]).unwrap();
        assert_eq!(
            config.tiers,
            vec![TicketTier::new("Boy", 35000), TicketTier::new("Girl", 15000)]
        );
    }

    #[test]
    fn test_parse_tiers_rejects_bad_entries() {
        assert!(parse_tiers("Solo").is_err());
        assert!(parse_tiers("Solo=abc").is_err());
        assert!(parse_tiers("Solo=0").is_err());
        assert!(parse_tiers("Solo=-5").is_err());
        assert!(parse_tiers("Solo=1,solo=2").is_err());
        assert!(parse_tiers(" , ").is_err());
    }

    #[test]
    fn test_production_requires_session_secret() {
        let err = config_from(&[("RUST_ENV", "production")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("SESSION_SECRET"));

        let config = config_from(&[
            ("RUST_ENV", "Production"),
            ("SESSION_SECRET", "s3cret"),
            ("CREDENTIAL_SECRET", "c3cret"),
        ])
        .unwrap();
        assert!(config.production);
    }

    #[test]
    fn test_production_requires_credential_secret() {
        let err = config_from(&[("RUST_ENV", "production"), ("SESSION_SECRET", "s3cret")])
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("CREDENTIAL_SECRET"));

        let dev = config_from(&[]).unwrap();
        assert!(dev.credential_secret.is_none());
    }

    #[test]
    fn test_production_refuses_mock_gateway() {
        let result = config_from(&[
            ("RUST_ENV", "production"),
            ("SESSION_SECRET", "s"),
            ("CREDENTIAL_SECRET", "c"),
            ("PAYMENT_GATEWAY", "mock"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_quantity_cap_is_rejected() {
        assert!(config_from(&[("MAX_TICKETS_PER_ORDER", "0")]).is_err());
    }

    #[test]
    fn test_admin_ids_and_origins_are_split() {
        let config = config_from(&[
            ("ADMIN_IDS", "alice, bob,,"),
            ("CORS_ALLOWED_ORIGINS", "https://tickets.example.com"),
        ])
        .unwrap();
        assert!(config.admin_ids.contains("alice"));
        assert!(config.admin_ids.contains("bob"));
        assert_eq!(config.admin_ids.len(), 2);
        assert_eq!(config.allowed_origins, vec!["https://tickets.example.com"]);
    }
}
