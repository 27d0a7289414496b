use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    /// Externally reachable base URL of this API, used for gateway callbacks
    pub public_api_url: String,
    pub frontend_url: String,
    pub payment: PaymentConfig,
    pub booking: BookingConfig,
}

#[derive(Clone)]
pub struct PaymentConfig {
    pub api_url: String,
    pub secret_key: String,
    pub currency: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    /// Deadline for a whole purchase or reconciliation call
    pub request_timeout: Duration,
    /// Age after which a pending order is released by the sweeper
    pub pending_order_ttl: chrono::Duration,
    pub sweep_interval: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            pending_order_ttl: chrono::Duration::minutes(30),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let server_port: u16 = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .expect("SERVER_PORT must be a number");

        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port,
            public_api_url: env::var("PUBLIC_API_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", server_port)),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            payment: PaymentConfig {
                api_url: env::var("PAYMENT_API_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
                secret_key: env::var("PAYMENT_SECRET_KEY")
                    .expect("PAYMENT_SECRET_KEY must be set"),
                currency: env::var("PAYMENT_CURRENCY")
                    .unwrap_or_else(|_| "eur".to_string()),
                timeout: Duration::from_secs(positive_from_env("PAYMENT_TIMEOUT_SECS", 8)),
            },
            booking: BookingConfig {
                request_timeout: Duration::from_secs(positive_from_env("REQUEST_TIMEOUT_SECS", 15)),
                pending_order_ttl: chrono::Duration::minutes(
                    positive_from_env("PENDING_ORDER_TTL_MINUTES", 30) as i64,
                ),
                sweep_interval: Duration::from_secs(positive_from_env("SWEEP_INTERVAL_SECS", 60)),
            },
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn positive_from_env(key: &str, default: u64) -> u64 {
    parse_positive(key, env::var(key).ok().as_deref(), default)
}

/// Durations and intervals must be non-zero: a zero sweep interval would
/// panic the sweeper task and a zero timeout would reject every request.
fn parse_positive(key: &str, value: Option<&str>, default: u64) -> u64 {
    let value = match value {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a number", key)),
        None => default,
    };

    if value == 0 {
        panic!("{} must be greater than zero", key);
    }

    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_defaults_when_unset() {
        assert_eq!(parse_positive("SWEEP_INTERVAL_SECS", None, 60), 60);
        assert_eq!(parse_positive("SWEEP_INTERVAL_SECS", Some(" 5 "), 60), 5);
    }

    #[test]
    #[should_panic(expected = "SWEEP_INTERVAL_SECS must be greater than zero")]
    fn test_zero_sweep_interval_is_rejected() {
        parse_positive("SWEEP_INTERVAL_SECS", Some("0"), 60);
    }

    #[test]
    #[should_panic(expected = "PENDING_ORDER_TTL_MINUTES must be a number")]
    fn test_garbage_is_rejected() {
        parse_positive("PENDING_ORDER_TTL_MINUTES", Some("half an hour"), 30);
    }
}
