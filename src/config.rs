//! Configuration for the scan API.
//!
//! Every option is read from the environment and can be overridden with the
//! matching long flag (`SUPABASE_URL` / `--supabase-url`, and so on).
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use influscan_api::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `SUPABASE_URL` - Store base URL (required)
//! - `SUPABASE_KEY` - Store API key (required)
//! - `CLERK_SECRET_KEY` - Identity provider secret key
//! - `CLERK_API_URL` - Identity provider API base (default: https://api.clerk.com/v1)
//! - `HOST` - Server bind address (default: 0.0.0.0)
//! - `PORT` - Server port (default: 8080)
//! - `APP_ENV` - Environment name reported by the health check (default: development)
//! - `CORS_ORIGINS` - Comma-separated allowed origins (default: any)

use std::fmt;

use clap::Parser;
use url::Url;

use crate::identity::DEFAULT_CLERK_API_URL;
use crate::server::DEFAULT_ENVIRONMENT;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

// =============================================================================
// CLI Arguments
// =============================================================================

/// InfluScan API - per-user scan records behind session authentication.
#[derive(Parser, Clone)]
#[command(name = "influscan-api")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PORT")]
    pub port: u16,

    /// Environment name reported by the health check.
    #[arg(long, default_value = DEFAULT_ENVIRONMENT, env = "APP_ENV")]
    pub environment: String,

    // =========================================================================
    // Store Configuration
    // =========================================================================
    /// Base URL of the store (e.g., https://project.supabase.co).
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: String,

    /// API key for the store, sent as both apikey and bearer credential.
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: String,

    // =========================================================================
    // Identity Provider Configuration
    // =========================================================================
    /// Secret key for the identity provider's backend API.
    ///
    /// Without it every session is rejected.
    #[arg(long, env = "CLERK_SECRET_KEY", hide_env_values = true)]
    pub clerk_secret_key: Option<String>,

    /// Base URL of the identity provider's backend API.
    #[arg(long, default_value = DEFAULT_CLERK_API_URL, env = "CLERK_API_URL")]
    pub clerk_api_url: String,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &"<redacted>")
            .field(
                "clerk_secret_key",
                &self.clerk_secret_key.as_ref().map(|_| "<redacted>"),
            )
            .field("clerk_api_url", &self.clerk_api_url)
            .field("cors_origins", &self.cors_origins)
            .field("verbose", &self.verbose)
            .field("no_tracing", &self.no_tracing)
            .finish()
    }
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.supabase_url.trim().is_empty() {
            return Err("Store URL is required. Set --supabase-url or SUPABASE_URL".to_string());
        }
        validate_http_url("SUPABASE_URL", &self.supabase_url)?;

        if self.supabase_key.trim().is_empty() {
            return Err("Store API key is required. Set --supabase-key or SUPABASE_KEY".to_string());
        }

        validate_http_url("CLERK_API_URL", &self.clerk_api_url)?;

        if self.environment.trim().is_empty() {
            return Err("APP_ENV must not be empty".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether an identity provider secret key is configured.
    pub fn has_clerk_secret(&self) -> bool {
        self.clerk_secret_key
            .as_deref()
            .is_some_and(|key| !key.is_empty())
    }
}

fn validate_http_url(name: &str, value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("{name} must use http or https, got {other}")),
    }
}

// =============================================================================
// Tests
// =============================================================================
