//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8080`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`, or `"debug"`
///   when `DEBUG` is set)
/// - `DEBUG` — verbose logging toggle (`"1"` / `"true"`)
/// - `PROJECT_ID` — namespace for topic and subscription names
///   (default: `"saga-project"`)
/// - `PUBSUB_EMULATOR_HOST` — optional bus emulator override, logged at
///   startup for deployments that route through one
/// - `DATABASE_URL` — saga store connection string; alternatively composed
///   from `DB_HOST`, `DB_USER`, `DB_PASSWORD`, `DB_NAME`. When neither is
///   present the saga store runs in memory.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub debug: bool,
    pub project_id: String,
    pub pubsub_emulator_host: Option<String>,
    pub database_url: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let debug = std::env::var("DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| if debug { "debug" } else { "info" }.to_string()),
            debug,
            project_id: std::env::var("PROJECT_ID")
                .unwrap_or_else(|_| "saga-project".to_string()),
            pubsub_emulator_host: std::env::var("PUBSUB_EMULATOR_HOST").ok(),
            database_url: database_url_from_env(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn database_url_from_env() -> Option<String> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        return Some(url);
    }
    let host = std::env::var("DB_HOST").ok()?;
    let user = std::env::var("DB_USER").unwrap_or_else(|_| "user".to_string());
    let password = std::env::var("DB_PASSWORD").unwrap_or_else(|_| "password".to_string());
    let name = std::env::var("DB_NAME").unwrap_or_else(|_| "main_db".to_string());
    Some(format!("postgresql://{user}:{password}@{host}:5432/{name}"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            debug: false,
            project_id: "saga-project".to_string(),
            pubsub_emulator_host: None,
            database_url: None,
        }
    }
}
