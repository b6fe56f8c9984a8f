use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::books_repository::PostgresBooksRepositoryConfig;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
/// Service settings read from environment variables (`USE_IN_MEMORY_DB`, `DB_HOST`, ...)
pub struct Settings {
    pub use_in_memory_db: bool,
    pub db_host: String,
    pub db_username: String,
    pub db_password: String,
    pub port: u16,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default())
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("use_in_memory_db", false)?
            .set_default("db_host", "127.0.0.1")?
            .set_default("db_username", "postgres")?
            .set_default("db_password", "postgres")?
            .set_default("port", 8080)?
            .add_source(environment.try_parsing(true))
            .build()?
            .try_deserialize()
    }

    pub fn postgres_config(&self) -> PostgresBooksRepositoryConfig {
        PostgresBooksRepositoryConfig {
            hostname: self.db_host.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }
}
