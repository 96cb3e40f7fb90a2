//! Database connection configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML
//! file with a `[database]` table, and `DB_*` environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

use crate::error::{KeelError, KeelResult};

/// Connection settings for the MySQL backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    /// Database (schema) name
    pub schema: String,
    pub charset: String,
    pub username: String,
    pub password: String,
    /// Unix socket path; takes over from host/port when set
    pub socket: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            schema: "framework".to_string(),
            charset: "utf8".to_string(),
            username: "framework".to_string(),
            password: "secret".to_string(),
            socket: Some("/tmp/mysql.sock".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    database: DatabaseConfig,
}

impl DatabaseConfig {
    /// Create a new configuration builder
    pub fn builder() -> DatabaseConfigBuilder {
        DatabaseConfigBuilder::default()
    }

    /// Load defaults, then `path` (or the first config file found), then
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> KeelResult<Self> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let mut config = match file {
            Some(file) => Self::from_file(&file)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file with a `[database]` table.
    pub fn from_file(path: &Path) -> KeelResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| KeelError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(text: &str) -> KeelResult<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| KeelError::Config(e.to_string()))?;
        Ok(file.database)
    }

    /// `./keel.toml`, then `<config dir>/keel/config.toml`.
    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from("keel.toml");
        if local.is_file() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("keel").join("config.toml"))
            .filter(|path| path.is_file())
    }

    /// Apply `DB_*` overrides. An empty `DB_SOCKET` disables the socket.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> KeelResult<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(host) = get("DB_HOST") {
            self.host = host;
        }
        if let Some(port) = get("DB_PORT") {
            self.port = port
                .parse()
                .map_err(|_| KeelError::Config(format!("DB_PORT is not a port: {}", port)))?;
        }
        if let Some(schema) = get("DB_SCHEMA") {
            self.schema = schema;
        }
        if let Some(charset) = get("DB_CHARSET") {
            self.charset = charset;
        }
        if let Some(username) = get("DB_USER") {
            self.username = username;
        }
        if let Some(password) = get("DB_PASS") {
            self.password = password;
        }
        match lookup("DB_SOCKET") {
            Some(socket) if socket.is_empty() => self.socket = None,
            Some(socket) => self.socket = Some(socket),
            None => {}
        }
        Ok(())
    }

    /// sqlx connect options for these settings.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.schema)
            .charset(&self.charset);

        match &self.socket {
            Some(socket) => options.socket(socket),
            None => options,
        }
    }
}

/// Builder for DatabaseConfig
#[derive(Debug, Default)]
pub struct DatabaseConfigBuilder {
    config: DatabaseConfig,
}

impl DatabaseConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.config.schema = schema.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.config.charset = charset.into();
        self
    }

    /// Set the login credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.username = username.into();
        self.config.password = password.into();
        self
    }

    pub fn socket(mut self, socket: Option<String>) -> Self {
        self.config.socket = socket;
        self
    }

    /// Build the configuration
    pub fn build(self) -> DatabaseConfig {
        self.config
    }
}
