use dotenvy::dotenv;
use std::env;
use std::sync::{Arc, OnceLock};

/// ✅ Global Config stored in `OnceLock`
static CONFIG: OnceLock<Arc<Config>> = OnceLock::new();

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub auth_disabled: bool,
    pub bind_addr: String,
    pub log_to_file: bool,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> Self {
        dotenv().ok(); // Load .env only once

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            auth_disabled: env::var("AUTH_DISABLED").unwrap_or_else(|_| "false".to_string())
                == "true",
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            log_to_file: env::var("LOG_TO_FILE").unwrap_or_else(|_| "false".to_string())
                == "true",
        }
    }

    /// ✅ Initialize the global config
    pub fn init() {
        CONFIG
            .set(Arc::new(Self::from_env()))
            .expect("Config already initialized");
    }

    /// ✅ Safe access to Config
    pub fn get() -> Arc<Config> {
        CONFIG.get().expect("Config not initialized").clone()
    }

    /// ✅ Check if authentication is disabled
    pub fn auth_disabled() -> bool {
        Config::get().auth_disabled
    }
}
