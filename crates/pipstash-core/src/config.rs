use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};

/// Immutable view of the process environment, capturable once per command.
#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub tools: ToolConfig,
}

impl Config {
    /// Builds a configuration snapshot from the current process environment.
    ///
    /// # Errors
    /// Returns an error when a numeric setting fails to parse.
    pub fn from_env() -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Result<Self> {
        let port = match snapshot.var("PIPSTASH_REDIS_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid PIPSTASH_REDIS_PORT '{raw}'"))?,
            None => 6379,
        };
        let db = match snapshot.var("PIPSTASH_REDIS_DB") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("invalid PIPSTASH_REDIS_DB '{raw}'"))?,
            None => 0,
        };
        Ok(Self {
            store: StoreConfig {
                url: snapshot.var("PIPSTASH_REDIS_URL").map(ToOwned::to_owned),
                host: snapshot
                    .var("PIPSTASH_REDIS_HOST")
                    .unwrap_or("127.0.0.1")
                    .to_string(),
                port,
                password: snapshot
                    .var("PIPSTASH_REDIS_PASSWORD")
                    .map(ToOwned::to_owned),
                db,
            },
            tools: ToolConfig {
                pip: snapshot.var("PIPSTASH_PIP").unwrap_or("pip3").to_string(),
                python: snapshot
                    .var("PIPSTASH_PYTHON")
                    .unwrap_or("python3")
                    .to_string(),
            },
        })
    }
}

/// Connection parameters for the shared key-value store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
}

impl StoreConfig {
    /// The connection URL, assembled from parts unless one was given whole.
    #[must_use]
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let auth = self
            .password
            .as_ref()
            .map(|password| format!(":{password}@"))
            .unwrap_or_default();
        format!("redis://{auth}{}:{}/{}", self.host, self.port, self.db)
    }
}

/// External executables the workflow shells out to.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub pip: String,
    pub python: String,
}
