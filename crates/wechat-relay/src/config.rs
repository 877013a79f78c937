use std::env::VarError;
use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

use crate::env::ReadEnv;
use crate::ollama::OllamaSettings;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 80;
const DEFAULT_PATH: &str = "/wx";
// WeChat gives passive replies 5 seconds; leave headroom for the rest of the request.
const DEFAULT_OLLAMA_TIMEOUT: Duration = Duration::from_millis(4500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing {0}; set it in the config file, the environment, or via CLI args")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Settings for the auxiliary tunnel process that exposes the local port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    pub command: String,
}

/// Configuration for the relay, resolved once at start-up.
///
/// Read from environment variables:
/// - `WECHAT_TOKEN`: shared token configured in the WeChat admin console (required)
/// - `OLLAMA_URL`: Ollama chat endpoint, e.g. `http://127.0.0.1:11434/api/chat` (required)
/// - `OLLAMA_MODEL`: model name, e.g. `deepseek-r1` (required)
/// - `RELAY_HOST` / `RELAY_PORT`: bind host (IP or name) and port (default `127.0.0.1:80`)
/// - `RELAY_PATH`: callback path (default `/wx`)
/// - `OLLAMA_TIMEOUT_MS`: inference timeout (default 4500)
/// - `OLLAMA_STYLE`: style directive appended to the system prompt
/// - `OLLAMA_KEEP_ALIVE`: forwarded as `keep_alive`
/// - `OLLAMA_OPTIONS`: JSON object forwarded as `options`
/// - `TUNNEL_COMMAND`: tunnel executable to launch at start-up
/// - `TUNNEL_DISABLED`: `true` to skip launching the tunnel
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub token: String,
    /// IP address or host name, resolved when the listener binds.
    pub host: String,
    pub port: u16,
    pub path: String,
    pub ollama: OllamaSettings,
    pub style_directive: Option<String>,
    pub tunnel: Option<TunnelConfig>,
}

impl RelayConfig {
    /// Builds a config with defaults for everything but the required values.
    pub fn new(
        token: impl Into<String>,
        ollama_url: impl Into<String>,
        ollama_model: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            ollama: OllamaSettings {
                url: ollama_url.into(),
                model: ollama_model.into(),
                timeout: DEFAULT_OLLAMA_TIMEOUT,
                options: None,
                keep_alive: None,
            },
            style_directive: None,
            tunnel: None,
        }
    }

    pub fn with_ollama_timeout(mut self, timeout: Duration) -> Self {
        self.ollama.timeout = timeout;
        self
    }

    pub fn with_style_directive(mut self, style: impl Into<String>) -> Self {
        self.style_directive = Some(style.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self, ConfigError> {
        let token = required(env, "WECHAT_TOKEN")?;
        let url = required(env, "OLLAMA_URL")?;
        let model = required(env, "OLLAMA_MODEL")?;

        let mut config = Self::new(token, url, model);

        if let Some(host) = optional(env, "RELAY_HOST") {
            // A colon is only legal as part of an IPv6 literal.
            if host.contains(char::is_whitespace)
                || (host.contains(':') && host.parse::<IpAddr>().is_err())
            {
                return Err(ConfigError::Invalid {
                    key: "RELAY_HOST",
                    reason: "expected an IP address or host name without a port".to_string(),
                });
            }
            config.host = host;
        }
        if let Some(port) = optional(env, "RELAY_PORT") {
            config.port = parse(&port, "RELAY_PORT")?;
        }
        if let Some(path) = optional(env, "RELAY_PATH") {
            if !path.starts_with('/') || path == "/health" {
                return Err(ConfigError::Invalid {
                    key: "RELAY_PATH",
                    reason: "must start with '/' and must not be /health".to_string(),
                });
            }
            config.path = path;
        }
        if let Some(ms) = optional(env, "OLLAMA_TIMEOUT_MS") {
            let ms: u64 = parse(&ms, "OLLAMA_TIMEOUT_MS")?;
            if ms == 0 {
                return Err(ConfigError::Invalid {
                    key: "OLLAMA_TIMEOUT_MS",
                    reason: "must be greater than zero".to_string(),
                });
            }
            config.ollama.timeout = Duration::from_millis(ms);
        }
        if let Some(options) = optional(env, "OLLAMA_OPTIONS") {
            let value: serde_json::Value =
                serde_json::from_str(&options).map_err(|e| ConfigError::Invalid {
                    key: "OLLAMA_OPTIONS",
                    reason: e.to_string(),
                })?;
            if !value.is_object() {
                return Err(ConfigError::Invalid {
                    key: "OLLAMA_OPTIONS",
                    reason: "must be a JSON object".to_string(),
                });
            }
            config.ollama.options = Some(value);
        }
        config.ollama.keep_alive = optional(env, "OLLAMA_KEEP_ALIVE");
        config.style_directive = optional(env, "OLLAMA_STYLE");

        let tunnel_disabled = match optional(env, "TUNNEL_DISABLED") {
            Some(v) => parse_bool(&v, "TUNNEL_DISABLED")?,
            None => false,
        };
        if !tunnel_disabled {
            config.tunnel = optional(env, "TUNNEL_COMMAND").map(|command| TunnelConfig { command });
        }

        Ok(config)
    }
}

fn required<E: ReadEnv>(env: &E, key: &'static str) -> Result<String, ConfigError> {
    optional(env, key).ok_or(ConfigError::Missing(key))
}

/// Blank values count as unset.
fn optional<E: ReadEnv>(env: &E, key: &str) -> Option<String> {
    match env.var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        Ok(_) | Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(_)) => {
            tracing::warn!(key, "ignoring non-unicode environment value");
            None
        }
    }
}

fn parse<T>(value: &str, key: &'static str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_bool(value: &str, key: &'static str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {other:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::InMemoryEnv;

    fn required_env() -> InMemoryEnv {
        let env = InMemoryEnv::new();
        env.set("WECHAT_TOKEN", "tok");
        env.set("OLLAMA_URL", "http://127.0.0.1:11434/api/chat");
        env.set("OLLAMA_MODEL", "deepseek-r1");
        env
    }

    #[test]
    fn defaults_when_only_required_vars() {
        let config = RelayConfig::from_env(&required_env()).unwrap();

        assert_eq!(config.token, "tok");
        assert_eq!(config.ollama.url, "http://127.0.0.1:11434/api/chat");
        assert_eq!(config.ollama.model, "deepseek-r1");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 80);
        assert_eq!(config.path, "/wx");
        assert_eq!(config.ollama.timeout, Duration::from_millis(4500));
        assert!(config.ollama.options.is_none());
        assert!(config.ollama.keep_alive.is_none());
        assert!(config.style_directive.is_none());
        assert!(config.tunnel.is_none());
    }

    #[test]
    fn reads_all_env_vars() {
        let env = required_env();
        env.set("RELAY_HOST", "0.0.0.0");
        env.set("RELAY_PORT", "8080");
        env.set("RELAY_PATH", "/wechat");
        env.set("OLLAMA_TIMEOUT_MS", "3000");
        env.set("OLLAMA_STYLE", "像朋友一样说话");
        env.set("OLLAMA_KEEP_ALIVE", "30m");
        env.set("OLLAMA_OPTIONS", r#"{"temperature":0.3,"num_predict":512}"#);
        env.set("TUNNEL_COMMAND", "./natapp/natapp");

        let config = RelayConfig::from_env(&env).unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.path, "/wechat");
        assert_eq!(config.ollama.timeout, Duration::from_millis(3000));
        assert_eq!(config.style_directive.as_deref(), Some("像朋友一样说话"));
        assert_eq!(config.ollama.keep_alive.as_deref(), Some("30m"));
        assert_eq!(
            config.ollama.options,
            Some(serde_json::json!({"temperature": 0.3, "num_predict": 512}))
        );
        assert_eq!(
            config.tunnel,
            Some(TunnelConfig {
                command: "./natapp/natapp".to_string()
            })
        );
    }

    #[test]
    fn each_required_var_is_checked() {
        for key in ["WECHAT_TOKEN", "OLLAMA_URL", "OLLAMA_MODEL"] {
            let env = required_env();
            env.set(key, "   ");
            let err = RelayConfig::from_env(&env).unwrap_err();
            assert_eq!(err, ConfigError::Missing(key));
        }
    }

    #[test]
    fn missing_token_message_names_the_key() {
        let err = RelayConfig::from_env(&InMemoryEnv::new()).unwrap_err();
        assert!(err.to_string().contains("WECHAT_TOKEN"));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let env = required_env();
        env.set("RELAY_PORT", "not-a-number");

        let err = RelayConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RELAY_PORT", .. }));
    }

    #[test]
    fn invalid_host_is_an_error() {
        let env = required_env();
        env.set("RELAY_HOST", "localhost:80");

        let err = RelayConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "RELAY_HOST", .. }));
    }

    #[test]
    fn host_names_and_ipv6_literals_are_accepted() {
        for host in ["localhost", "relay.internal", "::1"] {
            let env = required_env();
            env.set("RELAY_HOST", host);

            let config = RelayConfig::from_env(&env).unwrap();
            assert_eq!(config.host, host);
        }
    }

    #[test]
    fn zero_timeout_is_an_error() {
        let env = required_env();
        env.set("OLLAMA_TIMEOUT_MS", "0");

        let err = RelayConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "OLLAMA_TIMEOUT_MS", .. }));
    }

    #[test]
    fn options_must_be_a_json_object() {
        let env = required_env();
        env.set("OLLAMA_OPTIONS", "[1,2]");
        assert!(matches!(
            RelayConfig::from_env(&env).unwrap_err(),
            ConfigError::Invalid { key: "OLLAMA_OPTIONS", .. }
        ));

        env.set("OLLAMA_OPTIONS", "{not json");
        assert!(matches!(
            RelayConfig::from_env(&env).unwrap_err(),
            ConfigError::Invalid { key: "OLLAMA_OPTIONS", .. }
        ));
    }

    #[test]
    fn relative_or_reserved_path_is_an_error() {
        for path in ["wx", "/health"] {
            let env = required_env();
            env.set("RELAY_PATH", path);

            let err = RelayConfig::from_env(&env).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { key: "RELAY_PATH", .. }));
        }
    }

    #[test]
    fn tunnel_can_be_disabled() {
        let env = required_env();
        env.set("TUNNEL_COMMAND", "natapp");
        env.set("TUNNEL_DISABLED", "true");

        let config = RelayConfig::from_env(&env).unwrap();
        assert!(config.tunnel.is_none());
    }

    #[test]
    fn tunnel_disabled_must_be_boolean() {
        let env = required_env();
        env.set("TUNNEL_DISABLED", "maybe");

        let err = RelayConfig::from_env(&env).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TUNNEL_DISABLED", .. }));
    }
}
