//! Process configuration, read from the environment and an optional `.env` file.

use crate::service::identity::TokenPolicy;
use plaza_common::util::{NonPositiveDurationError, PositiveDuration};
use plaza_db::store::DbError;
use serde::Deserialize;
use std::{net::IpAddr, path::PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("MEDIA_URL_PREFIX must start with '/' and name a path below the root, got {0:?}")]
    MediaUrlPrefix(String),
    #[error("TOKEN_LIFETIME_SECONDS is invalid: {0}")]
    TokenLifetime(#[from] NonPositiveDurationError),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct Env {
    pub server_address: IpAddr,
    pub server_port: u16,
    /// Without a database everything is kept in memory.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
    #[serde(default = "default_media_url_prefix")]
    pub media_url_prefix: String,
    #[serde(default)]
    pub token_lifetime_seconds: Option<i64>,
}

fn default_database_max_connections() -> u32 {
    10
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_media_url_prefix() -> String {
    "/storage".to_owned()
}

impl Env {
    #[must_use]
    pub fn database_url(&self) -> Option<&str> {
        self.database_url.as_deref().filter(|url| !url.is_empty())
    }

    /// The prefix uploaded media is served under, without a trailing slash.
    pub fn media_url_prefix(&self) -> Result<&str, InitError> {
        let prefix = self.media_url_prefix.trim_end_matches('/');

        if prefix.starts_with('/') && prefix.len() > 1 {
            Ok(prefix)
        } else {
            Err(InitError::MediaUrlPrefix(self.media_url_prefix.clone()))
        }
    }

    pub fn token_policy(&self) -> Result<TokenPolicy, InitError> {
        let lifetime = self
            .token_lifetime_seconds
            .map(PositiveDuration::from_seconds)
            .transpose()?;

        Ok(TokenPolicy { lifetime })
    }
}

pub fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

#[cfg(test)]
mod tests {
    use crate::config::{Env, InitError};

    fn env(vars: &[(&str, &str)]) -> Env {
        let vars = vars
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()));
        envy::from_iter(vars).unwrap()
    }

    #[test]
    fn defaults() {
        let env = env(&[("SERVER_ADDRESS", "127.0.0.1"), ("SERVER_PORT", "8080")]);

        assert_eq!(env.server_port, 8080);
        assert_eq!(env.database_url(), None);
        assert_eq!(env.database_max_connections, 10);
        assert_eq!(env.media_dir.to_str(), Some("media"));
        assert_eq!(env.media_url_prefix().unwrap(), "/storage");
        assert_eq!(env.token_policy().unwrap().lifetime, None);
    }

    #[test]
    fn overrides_and_validation() {
        let env = env(&[
            ("SERVER_ADDRESS", "::1"),
            ("SERVER_PORT", "3000"),
            ("DATABASE_URL", "postgres://localhost/plaza"),
            ("MEDIA_URL_PREFIX", "/files/"),
            ("TOKEN_LIFETIME_SECONDS", "3600"),
        ]);

        assert_eq!(env.database_url(), Some("postgres://localhost/plaza"));
        assert_eq!(env.media_url_prefix().unwrap(), "/files");
        assert_eq!(
            env.token_policy()
                .unwrap()
                .lifetime
                .map(|lifetime| lifetime.whole_seconds()),
            Some(3600)
        );

        let mut invalid = env.clone();
        invalid.media_url_prefix = "/".to_owned();
        assert!(matches!(
            invalid.media_url_prefix(),
            Err(InitError::MediaUrlPrefix(_))
        ));
        invalid.token_lifetime_seconds = Some(0);
        assert!(matches!(
            invalid.token_policy(),
            Err(InitError::TokenLifetime(_))
        ));
    }
}
