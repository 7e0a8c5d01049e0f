//! Server settings loaded from the environment (and `.env` via dotenvy in the binary).

use crate::error::SettingsError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Default                                  |
/// |----------------------------|------------------------------------------|
/// | `DATABASE_URL`             | `postgres://localhost/streaming`         |
/// | `HOST`                     | `0.0.0.0`                                |
/// | `PORT`                     | `8080`                                   |
/// | `DATABASE_MAX_CONNECTIONS` | `5`                                      |
/// | `APP_NAME`                 | `streamingApp`                           |
/// | `DEFAULT_PAGE_SIZE`        | `20`                                     |
/// | `MAX_PAGE_SIZE`            | `2000`                                   |
/// | `BODY_LIMIT_BYTES`         | `10485760`                               |
/// | `CORS_ORIGINS`             | `http://localhost:9000`                  |
/// | `LOG_FORMAT`               | `compact` (`json` for structured output) |
#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    /// Prefix of alert headers and alert message keys.
    pub app_name: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub body_limit_bytes: usize,
    pub cors_origins: Vec<String>,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            database_url: "postgres://localhost/streaming".into(),
            host: "0.0.0.0".into(),
            port: 8080,
            max_connections: 5,
            app_name: "streamingApp".into(),
            default_page_size: 20,
            max_page_size: 2000,
            body_limit_bytes: 10 * 1024 * 1024,
            cors_origins: vec!["http://localhost:9000".into()],
            log_format: LogFormat::Compact,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup; missing keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Settings::default();
        let log_format = match lookup("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("compact") => LogFormat::Compact,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(SettingsError::Invalid {
                    var: "LOG_FORMAT",
                    expected: "'compact' or 'json'",
                    value: other.to_string(),
                })
            }
        };
        let cors_origins = match lookup("CORS_ORIGINS") {
            Some(v) => v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => d.cors_origins,
        };
        let settings = Settings {
            database_url: lookup("DATABASE_URL").unwrap_or(d.database_url),
            host: lookup("HOST").unwrap_or(d.host),
            port: parse(&lookup, "PORT", "a port number", d.port)?,
            max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", "a positive integer", d.max_connections)?,
            app_name: lookup("APP_NAME").unwrap_or(d.app_name),
            default_page_size: parse(&lookup, "DEFAULT_PAGE_SIZE", "a positive integer", d.default_page_size)?,
            max_page_size: parse(&lookup, "MAX_PAGE_SIZE", "a positive integer", d.max_page_size)?,
            body_limit_bytes: parse(&lookup, "BODY_LIMIT_BYTES", "a byte count", d.body_limit_bytes)?,
            cors_origins,
            log_format,
        };
        if settings.default_page_size == 0 || settings.max_page_size == 0 {
            return Err(SettingsError::Invalid {
                var: "DEFAULT_PAGE_SIZE",
                expected: "a positive integer",
                value: "0".into(),
            });
        }
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<F, T>(lookup: &F, var: &'static str, expected: &'static str, default: T) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(v) => v.trim().parse().map_err(|_| SettingsError::Invalid { var, expected, value: v }),
    }
}
