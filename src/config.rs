use std::env;

/// Credentials and mode for the PayPal adapter. Passed to `PayPalClient::new`
/// at construction time; nothing reads these from shared process state.
#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub webhook_id: String,
    /// Test mode targets the sandbox host, live mode the production host.
    pub test_mode: bool,
}

impl PayPalConfig {
    pub fn base_url(&self) -> &'static str {
        if self.test_mode {
            "https://api-m.sandbox.paypal.com"
        } else {
            "https://api-m.paypal.com"
        }
    }
}

/// Credentials and mode for the Mollie adapter.
#[derive(Debug, Clone)]
pub struct MollieConfig {
    pub api_key: String,
    /// Mollie encodes test/live in the API key itself (test_ vs live_
    /// prefix); the flag is carried for logging and parity with PayPal.
    pub test_mode: bool,
}

impl MollieConfig {
    pub fn base_url(&self) -> &'static str {
        "https://api.mollie.com/v2"
    }
}

/// Requests-per-minute limits for the public rate limit tiers.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Checkout creation - each request makes external gateway calls.
    pub strict_rpm: u32,
    /// Webhook endpoints - provider-to-server traffic.
    pub standard_rpm: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            strict_rpm: 10,
            standard_rpm: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    pub dev_mode: bool,
    pub rate_limit: RateLimitConfig,
    /// Days to keep webhook dedupe rows (providers retry for a few days at
    /// most). 0 = never purge.
    pub webhook_retention_days: i64,
    pub paypal: Option<PayPalConfig>,
    pub mollie: Option<MollieConfig>,
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("TALLY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env_parse("PORT", 3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        // PayPal is only usable when all three pieces are present; a partial
        // config is treated as absent and logged at startup.
        let paypal = match (
            env::var("PAYPAL_CLIENT_ID").ok(),
            env::var("PAYPAL_CLIENT_SECRET").ok(),
            env::var("PAYPAL_WEBHOOK_ID").ok(),
        ) {
            (Some(client_id), Some(client_secret), Some(webhook_id)) => Some(PayPalConfig {
                client_id,
                client_secret,
                webhook_id,
                test_mode: env_flag("PAYPAL_TEST_MODE", true),
            }),
            (None, None, None) => None,
            _ => {
                tracing::warn!("Partial PayPal configuration ignored (need PAYPAL_CLIENT_ID, PAYPAL_CLIENT_SECRET, PAYPAL_WEBHOOK_ID)");
                None
            }
        };

        let mollie = env::var("MOLLIE_API_KEY").ok().map(|api_key| MollieConfig {
            api_key,
            test_mode: env_flag("MOLLIE_TEST_MODE", true),
        });

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "tally.db".to_string()),
            base_url,
            dev_mode,
            rate_limit: RateLimitConfig {
                strict_rpm: env_parse("RATE_LIMIT_STRICT_RPM", 10),
                standard_rpm: env_parse("RATE_LIMIT_STANDARD_RPM", 30),
            },
            webhook_retention_days: env_parse("WEBHOOK_RETENTION_DAYS", 30),
            paypal,
            mollie,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
