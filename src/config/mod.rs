use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub environment: Environment,
    pub request: RequestConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

/// Limits applied while normalizing declarative requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    pub max_attributes: usize,
    pub max_relations: usize,
    pub max_orders: usize,
    pub max_filters: usize,
    /// Log dropped attributes, relations and filters at debug level
    pub debug_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub enable_query_logging: bool,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        Self::for_environment(environment).with_env_overrides()
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    fn with_env_overrides(mut self) -> Self {
        // Request overrides
        if let Ok(v) = env::var("REQUEST_MAX_ATTRIBUTES") {
            self.request.max_attributes = v.parse().unwrap_or(self.request.max_attributes);
        }
        if let Ok(v) = env::var("REQUEST_MAX_RELATIONS") {
            self.request.max_relations = v.parse().unwrap_or(self.request.max_relations);
        }
        if let Ok(v) = env::var("REQUEST_MAX_ORDERS") {
            self.request.max_orders = v.parse().unwrap_or(self.request.max_orders);
        }
        if let Ok(v) = env::var("REQUEST_MAX_FILTERS") {
            self.request.max_filters = v.parse().unwrap_or(self.request.max_filters);
        }
        if let Ok(v) = env::var("REQUEST_DEBUG_LOGGING") {
            self.request.debug_logging = v.parse().unwrap_or(self.request.debug_logging);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_SLOW_QUERY_WARNING") {
            self.database.enable_slow_query_warning = v.parse().unwrap_or(self.database.enable_slow_query_warning);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            request: RequestConfig {
                max_attributes: 200,
                max_relations: 50,
                max_orders: 10,
                max_filters: 50,
                debug_logging: true,
            },
            database: DatabaseConfig {
                enable_query_logging: true,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 100,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            request: RequestConfig {
                max_attributes: 100,
                max_relations: 20,
                max_orders: 5,
                max_filters: 25,
                debug_logging: false,
            },
            database: DatabaseConfig {
                enable_query_logging: true,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            request: RequestConfig {
                max_attributes: 100,
                max_relations: 10,
                max_orders: 5,
                max_filters: 20,
                debug_logging: false,
            },
            database: DatabaseConfig {
                enable_query_logging: false,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 1000,
            },
        }
    }
}

// Global singleton config - initialized once on first use
pub static CONFIG: Lazy<GatewayConfig> = Lazy::new(GatewayConfig::from_env);
