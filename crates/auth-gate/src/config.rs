//! auth-gate configuration.
//!
//! Configuration is loaded from `AUTH_*` environment variables. Settings for
//! a verifier are only read (and only required) when that verifier appears
//! in `AUTH_HANDLERS`. Secrets are redacted in Debug output.

use crate::auth::jwks::{DEFAULT_MIN_REFRESH_INTERVAL, DEFAULT_REFRESH_WINDOW};
use crate::verifiers::CredentialHeader;
use jsonwebtoken::Algorithm;
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default demo server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default API key header.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Default header carrying JWTs.
pub const DEFAULT_TOKEN_HEADER: &str = "Authorization";

/// Default scheme prefix in front of JWTs.
pub const DEFAULT_TOKEN_TYPE: &str = "Bearer";

/// Default identity context key for verified payloads.
pub const DEFAULT_PAYLOAD_CONTEXT_KEY: &str = "USER";

/// Default static JWT algorithm.
pub const DEFAULT_JWT_ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid handler configuration: {0}")]
    InvalidHandler(String),

    #[error("Invalid header configuration: {0}")]
    InvalidHeader(String),

    #[error("Invalid duration configuration: {0}")]
    InvalidDuration(String),

    #[error("Invalid algorithm configuration: {0}")]
    InvalidAlgorithm(String),

    #[error("Invalid boolean configuration: {0}")]
    InvalidBool(String),
}

/// Verifier types that can appear in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    ApiKey,
    Jwt,
    Jwks,
}

impl HandlerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerKind::ApiKey => "api_key",
            HandlerKind::Jwt => "jwt",
            HandlerKind::Jwks => "jwks",
        }
    }
}

impl FromStr for HandlerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "api_key" => Ok(HandlerKind::ApiKey),
            "jwt" => Ok(HandlerKind::Jwt),
            "jwks" => Ok(HandlerKind::Jwks),
            other => Err(ConfigError::InvalidHandler(format!(
                "AUTH_HANDLERS contains unknown handler '{}' (expected api_key, jwt or jwks)",
                other
            ))),
        }
    }
}

/// API key verifier settings.
#[derive(Clone)]
pub struct ApiKeyConfig {
    pub header: CredentialHeader,
    pub keys: Vec<String>,
}

/// Custom Debug implementation that redacts the keys.
impl fmt::Debug for ApiKeyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyConfig")
            .field("header", &self.header.display())
            .field("keys", &format_args!("[REDACTED; {}]", self.keys.len()))
            .finish()
    }
}

/// Static-key JWT verifier settings.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub header: CredentialHeader,
    pub token_type: String,
    /// HMAC secret or PEM public key; `SecretString` redacts it in Debug.
    pub signature_key: SecretString,
    pub algorithm: Algorithm,
    pub payload_key: String,
}

/// JWKS verifier settings.
#[derive(Debug, Clone)]
pub struct JwksConfig {
    pub header: CredentialHeader,
    pub token_type: String,
    pub url: String,
    pub refresh_window: Duration,
    pub min_refresh_interval: Duration,
    pub algorithm: Option<Algorithm>,
    pub payload_key: String,
    pub background_refresh: bool,
}

/// auth-gate configuration.
///
/// Each verifier section is `Some` exactly when its handler is listed.
#[derive(Debug, Clone)]
pub struct Config {
    /// Verifier order for the chain.
    pub handlers: Vec<HandlerKind>,

    /// Demo server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    pub api_key: Option<ApiKeyConfig>,

    pub jwt: Option<JwtConfig>,

    pub jwks: Option<JwksConfig>,

    /// Emit logs as JSON lines.
    pub log_json: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let handlers = parse_handlers(vars.get("AUTH_HANDLERS").map(String::as_str))?;

        let bind_address = vars
            .get("AUTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let api_key = if handlers.contains(&HandlerKind::ApiKey) {
            Some(ApiKeyConfig::from_vars(vars)?)
        } else {
            None
        };

        let jwt = if handlers.contains(&HandlerKind::Jwt) {
            Some(JwtConfig::from_vars(vars)?)
        } else {
            None
        };

        let jwks = if handlers.contains(&HandlerKind::Jwks) {
            Some(JwksConfig::from_vars(vars)?)
        } else {
            None
        };

        let log_json = parse_bool(vars, "AUTH_LOG_JSON", false)?;

        Ok(Config {
            handlers,
            bind_address,
            api_key,
            jwt,
            jwks,
            log_json,
        })
    }
}

impl ApiKeyConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let header = parse_header(vars, "AUTH_API_KEY_HEADER", DEFAULT_API_KEY_HEADER)?;

        let keys: Vec<String> = vars
            .get("AUTH_API_KEY_LIST")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if keys.is_empty() {
            return Err(ConfigError::MissingEnvVar("AUTH_API_KEY_LIST".to_string()));
        }

        Ok(Self { header, keys })
    }
}

impl JwtConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let header = parse_header(vars, "AUTH_JWT_HEADER", DEFAULT_TOKEN_HEADER)?;

        let token_type = vars
            .get("AUTH_JWT_TOKEN_TYPE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        let signature_key = vars
            .get("AUTH_JWT_SIGNATURE_KEY")
            .filter(|key| !key.is_empty())
            .map(|key| SecretString::from(key.clone()))
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_JWT_SIGNATURE_KEY".to_string()))?;

        let algorithm = parse_algorithm(vars, "AUTH_JWT_SIGNATURE_ALGORITHM")?
            .unwrap_or(DEFAULT_JWT_ALGORITHM);

        let payload_key = vars
            .get("AUTH_JWT_PAYLOAD_CONTEXT_KEY")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PAYLOAD_CONTEXT_KEY.to_string());

        Ok(Self {
            header,
            token_type,
            signature_key,
            algorithm,
            payload_key,
        })
    }
}

impl JwksConfig {
    fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let header = parse_header(vars, "AUTH_JWKS_HEADER", DEFAULT_TOKEN_HEADER)?;

        let token_type = vars
            .get("AUTH_JWKS_TOKEN_TYPE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TOKEN_TYPE.to_string());

        let url = vars
            .get("AUTH_JWKS_URL")
            .filter(|url| !url.is_empty())
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnvVar("AUTH_JWKS_URL".to_string()))?;

        let refresh_window = parse_seconds(
            vars,
            "AUTH_JWKS_REFRESH_WINDOW_SECONDS",
            DEFAULT_REFRESH_WINDOW,
        )?;

        let min_refresh_interval = parse_seconds(
            vars,
            "AUTH_JWKS_MIN_REFRESH_INTERVAL_SECONDS",
            DEFAULT_MIN_REFRESH_INTERVAL,
        )?;

        let algorithm = parse_algorithm(vars, "AUTH_JWKS_SIGNATURE_ALGORITHM")?;

        let payload_key = vars
            .get("AUTH_JWKS_PAYLOAD_CONTEXT_KEY")
            .cloned()
            .unwrap_or_else(|| DEFAULT_PAYLOAD_CONTEXT_KEY.to_string());

        let background_refresh = parse_bool(vars, "AUTH_JWKS_BACKGROUND_REFRESH", false)?;

        Ok(Self {
            header,
            token_type,
            url,
            refresh_window,
            min_refresh_interval,
            algorithm,
            payload_key,
            background_refresh,
        })
    }
}

/// Parse the comma-separated handler list. Blank entries are skipped; a
/// handler may appear at most once.
fn parse_handlers(value: Option<&str>) -> Result<Vec<HandlerKind>, ConfigError> {
    let mut handlers = Vec::new();

    for name in value.unwrap_or_default().split(',').map(str::trim) {
        if name.is_empty() {
            continue;
        }
        let kind: HandlerKind = name.parse()?;
        if handlers.contains(&kind) {
            return Err(ConfigError::InvalidHandler(format!(
                "AUTH_HANDLERS lists '{}' more than once",
                name
            )));
        }
        handlers.push(kind);
    }

    Ok(handlers)
}

fn parse_header(
    vars: &HashMap<String, String>,
    var: &str,
    default: &str,
) -> Result<CredentialHeader, ConfigError> {
    let value = vars.get(var).map_or(default, String::as_str);
    CredentialHeader::parse(value).map_err(|e| {
        ConfigError::InvalidHeader(format!(
            "{} must be a valid header name, got '{}': {}",
            var, value, e
        ))
    })
}

fn parse_seconds(
    vars: &HashMap<String, String>,
    var: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(default);
    };

    let value: u64 = value_str.parse().map_err(|e| {
        ConfigError::InvalidDuration(format!(
            "{} must be a non-negative integer number of seconds, got '{}': {}",
            var, value_str, e
        ))
    })?;

    Ok(Duration::from_secs(value))
}

fn parse_algorithm(
    vars: &HashMap<String, String>,
    var: &str,
) -> Result<Option<Algorithm>, ConfigError> {
    match vars.get(var).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Algorithm::from_str(value).map(Some).map_err(|_| {
            ConfigError::InvalidAlgorithm(format!(
                "{} must be a JWS signature algorithm (e.g. RS256, ES256, EdDSA), got '{}'",
                var, value
            ))
        }),
    }
}

fn parse_bool(vars: &HashMap<String, String>, var: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value_str) = vars.get(var) else {
        return Ok(default);
    };

    match value_str.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        _ => Err(ConfigError::InvalidBool(format!(
            "{} must be true or false, got '{}'",
            var, value_str
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_with_no_handlers() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert!(config.handlers.is_empty());
        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert!(config.api_key.is_none());
        assert!(config.jwt.is_none());
        assert!(config.jwks.is_none());
        assert!(!config.log_json);
    }

    #[test]
    fn test_handler_order_is_preserved() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwks, api_key,"),
            ("AUTH_API_KEY_LIST", "k1"),
            ("AUTH_JWKS_URL", "http://localhost/jwks"),
        ]))
        .unwrap();

        assert_eq!(config.handlers, vec![HandlerKind::Jwks, HandlerKind::ApiKey]);
    }

    #[test]
    fn test_unknown_handler_is_rejected() {
        let result = Config::from_vars(&vars(&[("AUTH_HANDLERS", "api_key,oauth")]));
        assert!(
            matches!(result, Err(ConfigError::InvalidHandler(msg)) if msg.contains("oauth"))
        );
    }

    #[test]
    fn test_handler_names_ignore_case() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "JWKS,Api_Key"),
            ("AUTH_API_KEY_LIST", "k1"),
            ("AUTH_JWKS_URL", "http://localhost/jwks"),
        ]))
        .unwrap();

        assert_eq!(config.handlers, vec![HandlerKind::Jwks, HandlerKind::ApiKey]);

        let result = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwt,JWT"),
            ("AUTH_JWT_SIGNATURE_KEY", "hmac-secret"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidHandler(_))));
    }

    #[test]
    fn test_duplicate_handler_is_rejected() {
        let result = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "api_key,api_key"),
            ("AUTH_API_KEY_LIST", "k1"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidHandler(_))));
    }

    #[test]
    fn test_api_key_list_is_required_and_trimmed() {
        let result = Config::from_vars(&vars(&[("AUTH_HANDLERS", "api_key")]));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "AUTH_API_KEY_LIST")
        );

        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "api_key"),
            ("AUTH_API_KEY_LIST", " k1 , k2,,"),
        ]))
        .unwrap();
        let api_key = config.api_key.unwrap();
        assert_eq!(api_key.keys, vec!["k1".to_string(), "k2".to_string()]);
        assert_eq!(api_key.header.display(), DEFAULT_API_KEY_HEADER);
    }

    #[test]
    fn test_api_keys_are_redacted_in_debug() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "api_key"),
            ("AUTH_API_KEY_LIST", "super-secret-key"),
        ]))
        .unwrap();

        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-key"));
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_jwt_settings() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwt"),
            ("AUTH_JWT_SIGNATURE_KEY", "hmac-secret"),
            ("AUTH_JWT_SIGNATURE_ALGORITHM", "HS256"),
            ("AUTH_JWT_TOKEN_TYPE", ""),
        ]))
        .unwrap();

        let jwt = config.jwt.unwrap();
        assert_eq!(jwt.algorithm, Algorithm::HS256);
        assert_eq!(jwt.token_type, "");
        assert_eq!(jwt.payload_key, DEFAULT_PAYLOAD_CONTEXT_KEY);
        assert_eq!(jwt.signature_key.expose_secret(), "hmac-secret");
        assert!(!format!("{:?}", jwt).contains("hmac-secret"));
    }

    #[test]
    fn test_jwt_defaults_to_rs256_and_requires_key() {
        let result = Config::from_vars(&vars(&[("AUTH_HANDLERS", "jwt")]));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "AUTH_JWT_SIGNATURE_KEY")
        );

        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwt"),
            ("AUTH_JWT_SIGNATURE_KEY", "pem"),
        ]))
        .unwrap();
        assert_eq!(config.jwt.unwrap().algorithm, Algorithm::RS256);
    }

    #[test]
    fn test_unknown_algorithm_is_rejected() {
        let result = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwt"),
            ("AUTH_JWT_SIGNATURE_KEY", "k"),
            ("AUTH_JWT_SIGNATURE_ALGORITHM", "none"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidAlgorithm(_))));
    }

    #[test]
    fn test_jwks_settings_and_defaults() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwks"),
            ("AUTH_JWKS_URL", "http://localhost/jwks"),
        ]))
        .unwrap();

        let jwks = config.jwks.unwrap();
        assert_eq!(jwks.url, "http://localhost/jwks");
        assert_eq!(jwks.refresh_window, DEFAULT_REFRESH_WINDOW);
        assert_eq!(jwks.min_refresh_interval, DEFAULT_MIN_REFRESH_INTERVAL);
        assert_eq!(jwks.algorithm, None);
        assert_eq!(jwks.token_type, DEFAULT_TOKEN_TYPE);
        assert!(!jwks.background_refresh);
    }

    #[test]
    fn test_jwks_custom_values() {
        let config = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwks"),
            ("AUTH_JWKS_URL", "http://localhost/jwks"),
            ("AUTH_JWKS_REFRESH_WINDOW_SECONDS", "0"),
            ("AUTH_JWKS_MIN_REFRESH_INTERVAL_SECONDS", "30"),
            ("AUTH_JWKS_SIGNATURE_ALGORITHM", "EdDSA"),
            ("AUTH_JWKS_PAYLOAD_CONTEXT_KEY", "SERVICE"),
            ("AUTH_JWKS_BACKGROUND_REFRESH", "TRUE"),
        ]))
        .unwrap();

        let jwks = config.jwks.unwrap();
        assert_eq!(jwks.refresh_window, Duration::ZERO);
        assert_eq!(jwks.min_refresh_interval, Duration::from_secs(30));
        assert_eq!(jwks.algorithm, Some(Algorithm::EdDSA));
        assert_eq!(jwks.payload_key, "SERVICE");
        assert!(jwks.background_refresh);
    }

    #[test]
    fn test_jwks_url_required() {
        let result = Config::from_vars(&vars(&[("AUTH_HANDLERS", "jwks")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(var)) if var == "AUTH_JWKS_URL"));
    }

    #[test]
    fn test_invalid_duration() {
        let result = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "jwks"),
            ("AUTH_JWKS_URL", "http://localhost/jwks"),
            ("AUTH_JWKS_MIN_REFRESH_INTERVAL_SECONDS", "-5"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidDuration(msg)) if msg.contains("-5")));
    }

    #[test]
    fn test_invalid_header_name() {
        let result = Config::from_vars(&vars(&[
            ("AUTH_HANDLERS", "api_key"),
            ("AUTH_API_KEY_LIST", "k1"),
            ("AUTH_API_KEY_HEADER", "bad header"),
        ]));
        assert!(matches!(result, Err(ConfigError::InvalidHeader(_))));
    }

    #[test]
    fn test_invalid_bool() {
        let result = Config::from_vars(&vars(&[("AUTH_LOG_JSON", "maybe")]));
        assert!(matches!(result, Err(ConfigError::InvalidBool(_))));

        let config = Config::from_vars(&vars(&[("AUTH_LOG_JSON", "true")])).unwrap();
        assert!(config.log_json);
    }
}
