use std::sync::Arc;

use crate::{
    backend::{BackendConnector, MemoryService, RestConnector},
    context::ClientRegistry,
    error::{AppError, Result},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub connector: Arc<dyn BackendConnector>,
    pub clients: ClientRegistry,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let connector: Arc<dyn BackendConnector> = match &config.backend {
            BackendMode::Rest { url, anon_key } => Arc::new(RestConnector::new(url, anon_key)),
            BackendMode::Memory { jwt_secret } => Arc::new(MemoryService::new(jwt_secret.clone())),
        };

        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: Config, connector: Arc<dyn BackendConnector>) -> Self {
        Self {
            config: Arc::new(config),
            connector,
            clients: ClientRegistry::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendMode {
    Rest { url: String, anon_key: String },
    Memory { jwt_secret: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendMode,
    pub app_origin: String,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let backend = match lookup("BACKEND_MODE").as_deref().unwrap_or("rest") {
            "rest" => BackendMode::Rest {
                url: required("BACKEND_URL")?,
                anon_key: required("BACKEND_ANON_KEY")?,
            },
            "memory" => BackendMode::Memory {
                jwt_secret: lookup("MEMORY_JWT_SECRET")
                    .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string()),
            },
            other => {
                return Err(AppError::Config(format!(
                    "BACKEND_MODE must be `rest` or `memory`, got `{}`",
                    other
                )))
            }
        };

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| AppError::Config("PORT must be a number".to_string()))?;

        Ok(Self {
            backend,
            app_origin: lookup("APP_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string()),
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_rest_mode_requires_backend_coordinates() {
        let result = Config::from_lookup(lookup(&[("BACKEND_URL", "https://x.example.co")]));
        assert!(matches!(result, Err(AppError::Config(msg)) if msg.contains("BACKEND_ANON_KEY")));
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("BACKEND_URL", "https://x.example.co"),
            ("BACKEND_ANON_KEY", "anon"),
        ]))
        .unwrap();

        assert_eq!(config.addr(), "127.0.0.1:3000");
        assert_eq!(config.app_origin, "http://localhost:5173");
        assert_eq!(
            config.backend,
            BackendMode::Rest {
                url: "https://x.example.co".to_string(),
                anon_key: "anon".to_string(),
            }
        );
    }

    #[test]
    fn test_memory_mode_and_bad_port() {
        let config = Config::from_lookup(lookup(&[
            ("BACKEND_MODE", "memory"),
            ("MEMORY_JWT_SECRET", "s3cret"),
        ]))
        .unwrap();
        assert_eq!(
            config.backend,
            BackendMode::Memory {
                jwt_secret: "s3cret".to_string()
            }
        );

        let result = Config::from_lookup(lookup(&[("BACKEND_MODE", "memory"), ("PORT", "http")]));
        assert!(matches!(result, Err(AppError::Config(_))));

        let result = Config::from_lookup(lookup(&[("BACKEND_MODE", "sqlite")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
