use crate::session::Credentials;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// Default server host
const DEFAULT_HOST: &str = "localhost";

/// Default Nessus web UI / API port
const DEFAULT_PORT: u16 = 8834;

const ENV_HOST: &str = "NESSUS_HOST";
const ENV_PORT: &str = "NESSUS_PORT";
const ENV_VERIFY: &str = "NESSUS_VERIFY_TLS";
const ENV_USERNAME: &str = "NESSUS_USERNAME";
const ENV_PASSWORD: &str = "NESSUS_PASSWORD";

/// Configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    server: Option<ServerSection>,
    auth: Option<AuthSection>,
}

#[derive(Debug, Deserialize, Default)]
struct ServerSection {
    /// Host name or address, optionally with a scheme
    host: Option<String>,
    port: Option<u16>,
    /// Verify the server certificate (default: true)
    verify: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AuthSection {
    username: Option<String>,
    password: Option<String>,
}

/// Resolved connection settings
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub verify: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Highest-priority layer that contributed a value (for logging)
    pub source: ConfigSource,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("verify", &self.verify)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            verify: true,
            username: None,
            password: None,
            source: ConfigSource::Default,
        }
    }
}

impl ServerConfig {
    /// Scheme, host and port. Hosts without a scheme use HTTPS; a host that
    /// already names a port keeps it.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        match host.split_once("://") {
            Some((_, rest)) if rest.contains(':') => host.to_string(),
            Some(_) => format!("{}:{}", host, self.port),
            None => format!("https://{}:{}", host, self.port),
        }
    }

    /// Credentials, when both username and password are configured.
    pub fn credentials(&self) -> Option<Credentials> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(Credentials::new(user.clone(), pass.clone())),
            _ => None,
        }
    }
}

/// Where the configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// Using default hardcoded values
    Default,
    /// At least one value came from an environment variable
    Environment,
    /// Loaded from config file
    ConfigFile,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Get the path to the configuration file
fn get_config_file_path() -> Option<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("nessus").join("config.toml"))
}

pub fn parse_config(content: &str) -> Result<ConfigFile, toml::de::Error> {
    toml::from_str(content)
}

/// Load configuration from the config file
fn load_config_file() -> Option<ConfigFile> {
    let path = get_config_file_path()?;

    if !path.exists() {
        return None;
    }

    match fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config file {:?}: {}", path, e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("Failed to read config file {:?}: {}", path, e);
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Layers defaults, then the config file, then the environment.
pub fn resolve_config(
    file: Option<ConfigFile>,
    env: impl Fn(&str) -> Option<String>,
) -> ServerConfig {
    let mut config = ServerConfig::default();

    if let Some(file) = file {
        let server = file.server.unwrap_or_default();
        let auth = file.auth.unwrap_or_default();
        let mut touched = false;

        if let Some(host) = non_empty(server.host) {
            config.host = host;
            touched = true;
        }
        if let Some(port) = server.port {
            config.port = port;
            touched = true;
        }
        if let Some(verify) = server.verify {
            config.verify = verify;
            touched = true;
        }
        if let Some(username) = non_empty(auth.username) {
            config.username = Some(username);
            touched = true;
        }
        if let Some(password) = auth.password.filter(|p| !p.is_empty()) {
            config.password = Some(password);
            touched = true;
        }
        if touched {
            config.source = ConfigSource::ConfigFile;
        }
    }

    let mut from_env = false;
    if let Some(host) = non_empty(env(ENV_HOST)) {
        config.host = host;
        from_env = true;
    }
    if let Some(port) = non_empty(env(ENV_PORT)) {
        match port.parse() {
            Ok(p) => {
                config.port = p;
                from_env = true;
            }
            Err(_) => tracing::warn!("Ignoring invalid {}: {}", ENV_PORT, port),
        }
    }
    if let Some(verify) = non_empty(env(ENV_VERIFY)) {
        match parse_bool(&verify) {
            Some(v) => {
                config.verify = v;
                from_env = true;
            }
            None => tracing::warn!("Ignoring invalid {}: {}", ENV_VERIFY, verify),
        }
    }
    if let Some(username) = non_empty(env(ENV_USERNAME)) {
        config.username = Some(username);
        from_env = true;
    }
    if let Some(password) = env(ENV_PASSWORD).filter(|p| !p.is_empty()) {
        config.password = Some(password);
        from_env = true;
    }
    if from_env {
        config.source = ConfigSource::Environment;
    }

    config
}

/// Load server configuration with priority:
/// 1. Environment variables (NESSUS_HOST, NESSUS_PORT, ...)
/// 2. Config file (~/.config/nessus/config.toml)
/// 3. Default values
pub fn load_config() -> ServerConfig {
    let config = resolve_config(load_config_file(), |name| std::env::var(name).ok());
    tracing::debug!("Using Nessus server {} (from {})", config.base_url(), config.source);
    config
}

/// Get the path to the config file for documentation purposes
pub fn get_config_file_path_string() -> String {
    get_config_file_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.config/nessus/config.toml".to_string())
}

/// Generate example config file content
pub fn generate_example_config() -> String {
    r#"# Nessus client configuration
# Place this file at: ~/.config/nessus/config.toml

[server]
# Host name or address of the Nessus server
# host = "nessus.example.com"

# Port of the web UI / REST API
# port = 8834

# Verify the server's TLS certificate (disable for self-signed certificates)
# verify = true

[auth]
# username = "admin"
# Prefer the NESSUS_PASSWORD environment variable over storing it here
# password = ""
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = resolve_config(None, env_from(&[]));
        assert_eq!(config.base_url(), "https://localhost:8834");
        assert!(config.verify);
        assert_eq!(config.source, ConfigSource::Default);
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_config_file_values() {
        let file = parse_config(
            r#"
[server]
host = "scanner.internal"
port = 9443
verify = false

[auth]
username = "auditor"
"#,
        )
        .unwrap();
        let config = resolve_config(Some(file), env_from(&[]));

        assert_eq!(config.base_url(), "https://scanner.internal:9443");
        assert!(!config.verify);
        assert_eq!(config.username.as_deref(), Some("auditor"));
        assert_eq!(config.source, ConfigSource::ConfigFile);
    }

    #[test]
    fn test_environment_wins_over_file() {
        let file = parse_config("[server]\nhost = \"from-file\"\n").unwrap();
        let config = resolve_config(
            Some(file),
            env_from(&[
                ("NESSUS_HOST", "from-env"),
                ("NESSUS_VERIFY_TLS", "no"),
                ("NESSUS_USERNAME", "admin"),
                ("NESSUS_PASSWORD", "secret"),
            ]),
        );

        assert_eq!(config.host, "from-env");
        assert!(!config.verify);
        assert_eq!(config.source, ConfigSource::Environment);
        assert_eq!(config.credentials().unwrap().username, "admin");
    }

    #[test]
    fn test_invalid_env_port_is_ignored() {
        let config = resolve_config(None, env_from(&[("NESSUS_PORT", "not-a-port")]));
        assert_eq!(config.port, 8834);
        assert_eq!(config.source, ConfigSource::Default);
    }

    #[test]
    fn test_base_url_with_scheme() {
        let mut config = ServerConfig::default();
        config.host = "http://127.0.0.1".into();
        assert_eq!(config.base_url(), "http://127.0.0.1:8834");
        config.host = "http://127.0.0.1:4000/".into();
        assert_eq!(config.base_url(), "http://127.0.0.1:4000");
    }

    #[test]
    fn test_debug_hides_password() {
        let mut config = ServerConfig::default();
        config.password = Some("hunter2".into());
        assert!(!format!("{:?}", config).contains("hunter2"));
    }

    #[test]
    fn test_example_config_parses() {
        assert!(parse_config(&generate_example_config()).is_ok());
    }
}
