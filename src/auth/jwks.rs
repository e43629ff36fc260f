use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{claims::Claims, AuthError, IdentityVerifier};
use crate::config::AuthConfig;

/// An unknown `kid` never triggers more than one refetch per this window.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Verifies RS256 tokens against the issuer's published key set.
pub struct JwksVerifier {
    http: reqwest::Client,
    jwks_url: String,
    cache_ttl: Duration,
    validation: Validation,
    cache: RwLock<Option<CachedKeys>>,
}

impl JwksVerifier {
    pub fn new(cfg: &AuthConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build jwks http client")?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(std::slice::from_ref(&cfg.issuer));
        match &cfg.audience {
            Some(aud) => validation.set_audience(std::slice::from_ref(aud)),
            None => validation.validate_aud = false,
        }

        Ok(Self {
            http,
            jwks_url: cfg.jwks_url.clone(),
            cache_ttl: cfg.jwks_cache_ttl,
            validation,
            cache: RwLock::new(None),
        })
    }

    #[cfg(test)]
    fn with_keys(cfg: &AuthConfig, keys: JwkSet, fetched_at: Instant) -> anyhow::Result<Self> {
        let verifier = Self::new(cfg)?;
        *verifier.cache.try_write()? = Some(CachedKeys { keys, fetched_at });
        Ok(verifier)
    }

    async fn fetch(&self) -> anyhow::Result<JwkSet> {
        let keys = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .context("request jwks")?
            .error_for_status()
            .context("jwks status")?
            .json::<JwkSet>()
            .await
            .context("decode jwks")?;
        info!(url = %self.jwks_url, keys = keys.keys.len(), "jwks refreshed");
        Ok(keys)
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < self.cache_ttl {
                if let Some(jwk) = cached.keys.find(kid) {
                    return Ok(DecodingKey::from_jwk(jwk)?);
                }
                if age < MIN_REFETCH_INTERVAL {
                    return Err(AuthError::UnknownKey(kid.to_string()));
                }
            }
        }

        let keys = self.fetch().await.map_err(AuthError::KeySet)?;
        let key = keys.find(kid).map(DecodingKey::from_jwk).transpose()?;
        *self.cache.write().await = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key.ok_or_else(|| AuthError::UnknownKey(kid.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<String, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Malformed("token header has no kid".into()))?;

        let key = self.decoding_key(&kid).await?;
        let data = decode::<Claims>(token, &key, &self.validation).map_err(|e| {
            warn!(error = %e, %kid, "token verification failed");
            AuthError::from(e)
        })?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::MissingSubject);
        }
        debug!(user_id = %data.claims.sub, token_use = ?data.claims.token_use, "token verified");
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, routing::get, Router};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };
    use time::OffsetDateTime;

    const ISSUER: &str = "https://cognito-idp.eu-central-1.amazonaws.com/eu-central-1_test";
    const KID: &str = "test-key-1";

    fn config(audience: Option<&str>) -> AuthConfig {
        AuthConfig {
            issuer: ISSUER.into(),
            // Never contacted: the cache is pre-seeded and fresh.
            jwks_url: "http://127.0.0.1:9/jwks.json".into(),
            audience: audience.map(str::to_string),
            jwks_cache_ttl: Duration::from_secs(600),
        }
    }

    fn published_keys() -> JwkSet {
        serde_json::from_str(include_str!("testdata/jwks.json")).unwrap()
    }

    fn verifier(audience: Option<&str>) -> JwksVerifier {
        JwksVerifier::with_keys(&config(audience), published_keys(), Instant::now()).unwrap()
    }

    /// Serves `testdata/jwks.json` on a random local port and counts requests.
    async fn serve_jwks() -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/.well-known/jwks.json",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (
                        [(header::CONTENT_TYPE, "application/json")],
                        include_str!("testdata/jwks.json"),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/.well-known/jwks.json"), hits)
    }

    fn seeded_verifier(jwks_url: String, ttl: Duration, keys: JwkSet, age: Duration) -> JwksVerifier {
        let cfg = AuthConfig {
            jwks_url,
            jwks_cache_ttl: ttl,
            ..config(None)
        };
        let fetched_at = Instant::now().checked_sub(age).unwrap();
        JwksVerifier::with_keys(&cfg, keys, fetched_at).unwrap()
    }

    fn no_keys() -> JwkSet {
        JwkSet { keys: Vec::new() }
    }

    fn sign(kid: Option<&str>, claims: serde_json::Value) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(include_bytes!("testdata/rsa_private.pem")).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    fn in_one_hour() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 3600
    }

    #[tokio::test]
    async fn accepts_token_signed_by_published_key() {
        let token = sign(
            Some(KID),
            json!({ "sub": "user-123", "iss": ISSUER, "exp": in_one_hour(), "token_use": "access" }),
        );
        let user = verifier(None).verify(&token).await.unwrap();
        assert_eq!(user, "user-123");
    }

    #[tokio::test]
    async fn rejects_foreign_issuer() {
        let token = sign(
            Some(KID),
            json!({ "sub": "user-123", "iss": "https://evil.example", "exp": in_one_hour() }),
        );
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn rejects_expired_token() {
        let expired = OffsetDateTime::now_utc().unix_timestamp() - 3600;
        let token = sign(Some(KID), json!({ "sub": "user-123", "iss": ISSUER, "exp": expired }));
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn unknown_kid_on_fresh_cache_is_rejected_without_refetch() {
        let token = sign(
            Some("rotated-key"),
            json!({ "sub": "user-123", "iss": ISSUER, "exp": in_one_hour() }),
        );
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey(kid) if kid == "rotated-key"));
    }

    #[tokio::test]
    async fn token_without_kid_is_malformed() {
        let token = sign(None, json!({ "sub": "user-123", "iss": ISSUER, "exp": in_one_hour() }));
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let err = verifier(None).verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(err, AuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn token_without_subject_is_rejected() {
        let token = sign(Some(KID), json!({ "iss": ISSUER, "exp": in_one_hour() }));
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingSubject));
    }

    #[tokio::test]
    async fn audience_is_checked_when_configured() {
        let claims = |aud: &str| {
            json!({ "sub": "user-123", "iss": ISSUER, "exp": in_one_hour(), "aud": aud })
        };
        let v = verifier(Some("kochess-web"));

        let ok = sign(Some(KID), claims("kochess-web"));
        assert_eq!(v.verify(&ok).await.unwrap(), "user-123");

        let wrong = sign(Some(KID), claims("someone-else"));
        assert!(matches!(v.verify(&wrong).await.unwrap_err(), AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn hmac_token_is_rejected() {
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID.into());
        let token = encode(
            &header,
            &json!({ "sub": "user-123", "iss": ISSUER, "exp": in_one_hour() }),
            &EncodingKey::from_secret(b"guessable"),
        )
        .unwrap();
        let err = verifier(None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn empty_cache_fetches_key_set_once() {
        let (url, hits) = serve_jwks().await;
        let cfg = AuthConfig {
            jwks_url: url,
            ..config(None)
        };
        let v = JwksVerifier::new(&cfg).unwrap();
        let token = sign(Some(KID), json!({ "sub": "user-1", "iss": ISSUER, "exp": in_one_hour() }));

        assert_eq!(v.verify(&token).await.unwrap(), "user-1");
        assert_eq!(v.verify(&token).await.unwrap(), "user-1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_is_refetched() {
        let (url, hits) = serve_jwks().await;
        // The stale copy lacks the signing key; only a refetch can succeed.
        let v = seeded_verifier(url, Duration::from_secs(60), no_keys(), Duration::from_secs(61));
        let token = sign(Some(KID), json!({ "sub": "user-2", "iss": ISSUER, "exp": in_one_hour() }));

        assert_eq!(v.verify(&token).await.unwrap(), "user-2");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert_eq!(v.verify(&token).await.unwrap(), "user-2");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kid_refetches_once_cache_is_older_than_window() {
        let (url, hits) = serve_jwks().await;
        let v = seeded_verifier(
            url,
            Duration::from_secs(600),
            no_keys(),
            MIN_REFETCH_INTERVAL + Duration::from_secs(1),
        );
        let token = sign(Some(KID), json!({ "sub": "user-3", "iss": ISSUER, "exp": in_one_hour() }));

        assert_eq!(v.verify(&token).await.unwrap(), "user-3");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // a kid the fresh set still lacks is rejected without hitting the server again
        let rotated = sign(
            Some("rotated-key"),
            json!({ "sub": "user-3", "iss": ISSUER, "exp": in_one_hour() }),
        );
        let err = v.verify(&rotated).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_kid_within_window_does_not_refetch() {
        let (url, hits) = serve_jwks().await;
        let v = seeded_verifier(url, Duration::from_secs(600), no_keys(), Duration::from_secs(5));
        let token = sign(Some(KID), json!({ "sub": "user-4", "iss": ISSUER, "exp": in_one_hour() }));

        let err = v.verify(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::UnknownKey(kid) if kid == KID));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
