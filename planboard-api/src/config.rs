/// Configuration for the API server
///
/// Loaded once at startup from environment variables (and a `.env` file in
/// development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `JWT_SECRET`: HS256 signing key, at least 32 characters (required)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: `*`)
/// - `PRODUCTION`: `true` enables HSTS (default: false)
/// - `AI_API_BASE_URL`: OpenAI-compatible endpoint (default: https://api.openai.com/v1)
/// - `AI_API_KEY`: enables the AI routes when set
/// - `AI_MODEL`: chat model name (default: gpt-4o-mini)
/// - `AI_REQUESTS_PER_MINUTE` / `AI_REQUESTS_PER_DAY`: per-user AI limits (default: 5 / 50)
/// - `RUST_LOG`: log filter
///
/// # Example
///
/// ```no_run
/// use planboard_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use planboard_shared::{ai_limit::AiLimits, db::pool};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `["*"]` means any
    pub cors_origins: Vec<String>,

    /// Adds Strict-Transport-Security
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub base_url: String,

    /// `None` disables the AI routes (503)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    pub model: String,
    pub requests_per_minute: u32,
    pub requests_per_day: u32,
}

impl DatabaseConfig {
    /// Pool settings; timeouts keep their defaults
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        pool::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            ..Default::default()
        }
    }
}

impl AiConfig {
    pub fn limits(&self) -> AiLimits {
        AiLimits {
            per_minute: self.requests_per_minute,
            per_day: self.requests_per_day,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Splits a comma-separated origin list, dropping blanks
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a number does not parse, or
    /// `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let requests_per_minute = var_or("AI_REQUESTS_PER_MINUTE", "5").parse::<u32>()?;
        let requests_per_day = var_or("AI_REQUESTS_PER_DAY", "50").parse::<u32>()?;
        if requests_per_minute == 0 || requests_per_day == 0 {
            anyhow::bail!("AI request limits must be positive");
        }

        let mut cors_origins = parse_origins(&var_or("CORS_ORIGINS", "*"));
        if cors_origins.is_empty() {
            cors_origins.push("*".to_string());
        }

        Ok(Self {
            api: ApiConfig {
                host: var_or("API_HOST", "0.0.0.0"),
                port: var_or("API_PORT", "8080").parse::<u16>()?,
                cors_origins,
                production: parse_bool(&var_or("PRODUCTION", "false")),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: var_or("DATABASE_MAX_CONNECTIONS", "10").parse::<u32>()?,
            },
            jwt: JwtConfig { secret: jwt_secret },
            ai: AiConfig {
                base_url: var_or("AI_API_BASE_URL", "https://api.openai.com/v1")
                    .trim_end_matches('/')
                    .to_string(),
                api_key: env::var("AI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
                model: var_or("AI_MODEL", "gpt-4o-mini"),
                requests_per_minute,
                requests_per_day,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/planboard".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: "s".repeat(32),
            },
            ai: AiConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: None,
                model: "gpt-4o-mini".to_string(),
                requests_per_minute: 5,
                requests_per_day: 50,
            },
        }
    }

    #[test]
    fn test_bind_address() {
        assert_eq!(config().bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://a.example, https://b.example ,,"),
            vec!["https://a.example", "https://b.example"]
        );
        assert!(parse_origins(" ").is_empty());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }

    #[test]
    fn test_secrets_not_serialized() {
        let mut config = config();
        config.ai.api_key = Some("sk-test".to_string());

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-test"));
        assert!(!json.contains(&"s".repeat(32)));
    }

    #[test]
    fn test_ai_limits() {
        let limits = config().ai.limits();
        assert_eq!(limits.per_minute, 5);
        assert_eq!(limits.per_day, 50);
        assert!(config().allows_any_origin());
    }
}
