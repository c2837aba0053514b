use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uploads {
    pub dir: String,
    /// Maximum request body size for multipart uploads, in bytes
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub database: Database,
    pub auth: Auth,
    pub uploads: Uploads,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Optional settings.toml
        let config_file_name = "settings.toml";

        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in connectsphere-server directory (for development)
        let dev_path = PathBuf::from("connectsphere-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = Self::with_defaults(builder)?;

        // 2. Environment variables (highest priority)
        if let Ok(db_path) = std::env::var("DATABASE_PATH") {
            builder = builder.set_override("database.path", db_path)?;
        }
        if let Ok(port) = std::env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }
        if let Ok(host) = std::env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            builder = builder.set_override("auth.jwt_secret", secret)?;
        }
        if let Ok(dir) = std::env::var("UPLOAD_DIR") {
            builder = builder.set_override("uploads.dir", dir)?;
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Settings for tests and embedded use: in-memory database, cheap hashing
    pub fn for_testing(upload_dir: impl Into<String>) -> Result<Self, ConfigError> {
        let builder = Self::with_defaults(Config::builder())?
            .set_override("server.host", "127.0.0.1")?
            .set_override("server.port", 0)?
            .set_override("database.path", ":memory:")?
            .set_override("auth.jwt_secret", "test-secret")?
            .set_override("auth.bcrypt_cost", 4)?
            .set_override("uploads.dir", upload_dir.into())?;

        builder.build()?.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("database.path", "connectsphere.db")?
            .set_default("auth.jwt_secret", "change-me")?
            .set_default("auth.token_ttl_hours", 24 * 7)?
            .set_default("auth.bcrypt_cost", bcrypt::DEFAULT_COST)?
            .set_default("uploads.dir", "uploads")?
            .set_default("uploads.max_body_bytes", 10 * 1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testing_settings() {
        let settings = Settings::for_testing("/tmp/cs-uploads").unwrap();
        assert_eq!(settings.database.path, ":memory:");
        assert_eq!(settings.server.port, 0);
        assert_eq!(settings.auth.bcrypt_cost, 4);
        assert_eq!(settings.auth.token_ttl_hours, 168);
        assert_eq!(settings.uploads.dir, "/tmp/cs-uploads");
    }
}
