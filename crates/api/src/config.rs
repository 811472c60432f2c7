use frontdesk_core::rental::DEFAULT_RENTAL_BLOCK_HOURS;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long background services get to drain on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Suppress every late fee and ban (default: `false`).
    pub demo_mode: bool,
    /// Length of a rental block and of each renewal (default: `6`).
    pub rental_block_hours: i64,
    /// Optional JSON file with rooms, lockers and customers to load when
    /// no database is configured.
    pub venue_seed_path: Option<String>,
    /// Optional PostgreSQL URL. Enables persistence when set.
    pub database_url: Option<String>,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `DEMO_MODE`            | `false`                    |
    /// | `RENTAL_BLOCK_HOURS`   | `6`                        |
    /// | `VENUE_SEED_PATH`      | unset (built-in demo venue)|
    /// | `DATABASE_URL`         | unset (in-memory only)     |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let demo_mode = std::env::var("DEMO_MODE")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let rental_block_hours: i64 = std::env::var("RENTAL_BLOCK_HOURS")
            .unwrap_or_else(|_| DEFAULT_RENTAL_BLOCK_HOURS.to_string())
            .parse()
            .expect("RENTAL_BLOCK_HOURS must be a valid i64");
        assert!(rental_block_hours > 0, "RENTAL_BLOCK_HOURS must be positive");

        let venue_seed_path = std::env::var("VENUE_SEED_PATH")
            .ok()
            .filter(|s| !s.is_empty());
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty());

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            demo_mode,
            rental_block_hours,
            venue_seed_path,
            database_url,
            jwt,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
