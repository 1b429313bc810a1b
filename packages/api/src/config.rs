use axum::http::HeaderValue;
use gen_core::env::{self, EnvError};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins; `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `360`).
    pub request_timeout_secs: u64,
    /// How long the synchronous endpoint waits for a result (default: `300`).
    pub wait_timeout_secs: u64,
    /// Base for image URLs; derived from the `Host` header when unset.
    pub public_base_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 5000,
            cors_origins: vec![ANY_ORIGIN.into()],
            request_timeout_secs: 360,
            wait_timeout_secs: 300,
            public_base_url: None,
        }
    }
}

const ANY_ORIGIN: &str = "*";

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default    |
    /// |------------------------|------------|
    /// | `HOST`                 | `0.0.0.0`  |
    /// | `PORT`                 | `5000`     |
    /// | `CORS_ORIGINS`         | `*`        |
    /// | `REQUEST_TIMEOUT_SECS` | `360`      |
    /// | `WAIT_TIMEOUT_SECS`    | `300`      |
    /// | `PUBLIC_BASE_URL`      | unset      |
    pub fn from_env() -> Result<Self, EnvError> {
        let defaults = Self::default();

        let cors_origins = match env::optional("CORS_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => defaults.cors_origins,
        };

        let request_timeout_secs = env::parse_or("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?;
        let wait_timeout_secs = env::parse_or("WAIT_TIMEOUT_SECS", defaults.wait_timeout_secs)?;
        if wait_timeout_secs >= request_timeout_secs {
            tracing::warn!(
                wait_timeout_secs,
                request_timeout_secs,
                "WAIT_TIMEOUT_SECS should be below REQUEST_TIMEOUT_SECS"
            );
        }

        Ok(Self {
            host: env::optional("HOST").unwrap_or(defaults.host),
            port: env::parse_or("PORT", defaults.port)?,
            cors_origins,
            request_timeout_secs,
            wait_timeout_secs,
            public_base_url: env::optional("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether any origin may call the API.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == ANY_ORIGIN)
    }
}

/// Split a comma-separated origin list, rejecting values that are not
/// valid header values.
pub fn parse_origins(raw: &str) -> Result<Vec<String>, EnvError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    for origin in &origins {
        if origin != ANY_ORIGIN
            && let Err(e) = HeaderValue::from_str(origin)
        {
            return Err(EnvError::invalid("CORS_ORIGINS", origin, e));
        }
    }

    if origins.is_empty() {
        return Err(EnvError::invalid("CORS_ORIGINS", raw, "no origins listed"));
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_are_trimmed_and_split() {
        let origins = parse_origins(" http://a.test , http://b.test,,").unwrap();
        assert_eq!(origins, ["http://a.test", "http://b.test"]);
    }

    #[test]
    fn wildcard_is_kept_verbatim() {
        let config = ServerConfig {
            cors_origins: parse_origins("*").unwrap(),
            ..Default::default()
        };
        assert!(config.allows_any_origin());
    }

    #[test]
    fn invalid_origins_are_rejected() {
        assert!(parse_origins("http://ok.test,bad\norigin").is_err());
        assert!(parse_origins(" , ").is_err());
    }

    #[test]
    fn bind_addr_joins_host_and_port() {
        assert_eq!(ServerConfig::default().bind_addr(), "0.0.0.0:5000");
    }
}
