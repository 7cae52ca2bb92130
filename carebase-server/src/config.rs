use carebase_store::PgConnectOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Server configuration loaded from YAML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub enabled: bool,
    pub jwt: Option<JwtSettings>,
    /// Require `<resource>:<action>` in the token's permissions or scope.
    pub require_permissions: bool,
    pub profiles: ProfileSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwtSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub secret: Option<String>,
    pub public_key_file: Option<String>,
    /// JWKS endpoint of the identity provider.
    pub jwk_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileProvider {
    #[default]
    Static,
    Http,
}

/// Where caller role metadata comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub provider: ProfileProvider,
    /// Base URL of the identity provider's user API.
    pub api_url: Option<String>,
    pub secret_key: Option<String>,
    pub timeout_secs: u64,
    pub users: Vec<StaticProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticProfile {
    pub user_id: String,
    #[serde(default)]
    pub public_metadata: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub sqlite_path: PathBuf,
    pub postgres: PostgresSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            provider: ProfileProvider::Static,
            api_url: None,
            secret_key: None,
            timeout_secs: 5,
            users: Vec::new(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: PathBuf::from("data/carebase.sqlite"),
            postgres: PostgresSettings::default(),
        }
    }
}

impl Default for PostgresSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "carebase".to_string(),
            max_connections: 10,
        }
    }
}

impl PostgresSettings {
    /// Connection options built field by field, so credentials need no URL escaping.
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .database(&self.database);
        if self.password.is_empty() {
            return options;
        }
        options.password(&self.password)
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from `explicit_path`, else from `config.yaml` when present, else
    /// defaults. A named or present file that cannot be read or parsed is an
    /// error, never a silent fall back to defaults.
    pub fn discover(explicit_path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        if let Some(path) = explicit_path {
            return Self::load(Some(path));
        }
        if std::path::Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::load(Some(DEFAULT_CONFIG_FILE));
        }
        Self::load(None)
    }

    /// Apply overrides from `lookup` (the process environment in production).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("CAREBASE_HOST") {
            self.server.host = host;
        }

        if let Some(port) = lookup("CAREBASE_PORT")
            && let Ok(port_num) = port.parse()
        {
            self.server.port = port_num;
        }

        match lookup("CAREBASE_STORAGE_BACKEND").as_deref() {
            Some("sqlite") => self.storage.backend = StorageBackend::Sqlite,
            Some("postgres") => self.storage.backend = StorageBackend::Postgres,
            _ => {}
        }

        if let Some(path) = lookup("CAREBASE_SQLITE_PATH") {
            self.storage.sqlite_path = PathBuf::from(path);
        }

        let pg = &mut self.storage.postgres;
        if let Some(host) = lookup("POSTGRES_HOST") {
            pg.host = host;
        }
        if let Some(port) = lookup("POSTGRES_PORT")
            && let Ok(port_num) = port.parse()
        {
            pg.port = port_num;
        }
        if let Some(user) = lookup("POSTGRES_USER") {
            pg.user = user;
        }
        if let Some(password) = lookup("POSTGRES_PASSWORD") {
            pg.password = password;
        }
        if let Some(database) = lookup("POSTGRES_DB") {
            pg.database = database;
        }

        if let Some(secret) = lookup("CAREBASE_JWT_SECRET") {
            self.auth.jwt.get_or_insert_with(JwtSettings::default).secret = Some(secret);
        }

        if let Some(url) = lookup("CAREBASE_PROFILE_API_URL") {
            self.auth.profiles.api_url = Some(url);
        }
        if let Some(key) = lookup("CAREBASE_PROFILE_SECRET_KEY") {
            self.auth.profiles.secret_key = Some(key);
        }

        if let Some(level) = lookup("CAREBASE_LOG_LEVEL") {
            self.log.level = level;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(!config.auth.enabled);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.sqlite_path, PathBuf::from("data/carebase.sqlite"));
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn test_postgres_connect_options() {
        let pg = PostgresSettings {
            host: "db.internal".to_string(),
            port: 6543,
            user: "svc@clinic".to_string(),
            password: "p#ss/x?y".to_string(),
            database: "records".to_string(),
            max_connections: 4,
        };
        let options = pg.connect_options();
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
        assert_eq!(options.get_username(), "svc@clinic");
        assert_eq!(options.get_database(), Some("records"));
    }

    #[test]
    fn test_yaml_with_profiles() {
        let yaml = r#"
server:
  port: 9090
auth:
  enabled: true
  jwt:
    secret: "abc"
  profiles:
    provider: static
    users:
      - user_id: "doc-1"
        public_metadata:
          role: physician
storage:
  backend: postgres
  postgres:
    database: records
log:
  format: json
"#;
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.auth.enabled);
        assert_eq!(config.auth.jwt.unwrap().secret.as_deref(), Some("abc"));
        assert_eq!(config.auth.profiles.users[0].user_id, "doc-1");
        assert_eq!(config.auth.profiles.users[0].public_metadata["role"], "physician");
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.postgres.database, "records");
        assert_eq!(config.storage.postgres.port, 5432);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CAREBASE_PORT", "7000"),
            ("CAREBASE_STORAGE_BACKEND", "postgres"),
            ("POSTGRES_HOST", "db"),
            ("POSTGRES_PASSWORD", "pw"),
            ("CAREBASE_JWT_SECRET", "from-env"),
            ("CAREBASE_LOG_LEVEL", "debug"),
        ]);
        let mut config = ServerConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
        assert_eq!(config.storage.postgres.host, "db");
        assert_eq!(config.storage.postgres.password, "pw");
        assert_eq!(config.auth.jwt.unwrap().secret.as_deref(), Some("from-env"));
        assert_eq!(config.log.level, "debug");
    }

    #[test]
    fn test_unreadable_config_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("carebase.yaml");
        std::fs::write(&path, "auth:\n  enabled: true\nserver:\n  port: x\n").unwrap();

        assert!(ServerConfig::discover(path.to_str()).is_err());

        let missing = dir.path().join("missing.yaml");
        assert!(ServerConfig::discover(missing.to_str()).is_err());
    }

    #[test]
    fn test_explicit_config_file_is_loaded() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("carebase.yaml");
        std::fs::write(&path, "auth:\n  enabled: true\n").unwrap();

        let config = ServerConfig::discover(path.to_str()).unwrap();
        assert!(config.auth.enabled);
    }

    #[test]
    fn test_bad_port_override_is_ignored() {
        let mut config = ServerConfig::default();
        config.apply_overrides(|k| (k == "CAREBASE_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 8080);
    }
}
