use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub issuer: String,
    pub jwks_url: String,
    pub audience: Option<String>,
    pub jwks_cache_ttl: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoStorageConfig {
    pub bucket: String,
    pub public_base_url: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub auth: AuthConfig,
    pub assistant: AssistantConfig,
    pub photos: PhotoStorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).with_context(|| format!("{key} must be set"));

        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = var("APP_PORT").unwrap_or_else(|| "8080".into());
        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("APP_HOST/APP_PORT do not form an address: {host}:{port}"))?;

        let database_url = required("DATABASE_URL")?;

        let issuer = match var("AUTH_ISSUER") {
            Some(issuer) => issuer,
            None => {
                let region = required("COGNITO_REGION")
                    .context("set AUTH_ISSUER or COGNITO_REGION/COGNITO_USER_POOL_ID")?;
                let pool = required("COGNITO_USER_POOL_ID")
                    .context("set AUTH_ISSUER or COGNITO_REGION/COGNITO_USER_POOL_ID")?;
                format!("https://cognito-idp.{region}.amazonaws.com/{pool}")
            }
        };
        let issuer = issuer.trim_end_matches('/').to_string();
        let auth = AuthConfig {
            jwks_url: var("AUTH_JWKS_URL")
                .unwrap_or_else(|| format!("{issuer}/.well-known/jwks.json")),
            audience: var("AUTH_AUDIENCE"),
            jwks_cache_ttl: Duration::from_secs(
                var("AUTH_JWKS_CACHE_SECONDS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(600),
            ),
            issuer,
        };

        let assistant = AssistantConfig {
            api_key: required("OPENAI_API_KEY")?,
            base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into())
                .trim_end_matches('/')
                .to_string(),
            model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-4".into()),
            timeout: Duration::from_secs(
                var("OPENAI_TIMEOUT_SECONDS")
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60),
            ),
        };

        let photos = PhotoStorageConfig {
            bucket: required("PHOTOS_BUCKET")?,
            public_base_url: required("PHOTOS_PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            region: var("PHOTOS_REGION").unwrap_or_else(|| "eu-central-1".into()),
            endpoint: var("PHOTOS_ENDPOINT"),
            access_key: var("PHOTOS_ACCESS_KEY"),
            secret_key: var("PHOTOS_SECRET_KEY"),
        };

        Ok(Self {
            listen_addr,
            database_url,
            auth,
            assistant,
            photos,
        })
    }
}
