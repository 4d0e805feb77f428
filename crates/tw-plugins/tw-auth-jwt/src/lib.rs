//! # tw-auth-jwt
//!
//! HS256 JSON Web Token implementation of `TokenIssuer`.
//! Whatever JSON object the client posts becomes the claim set; only `iat`
//! and `exp` are controlled by the server.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tw_core::models::Document;
use tw_core::traits::TokenIssuer;

/// Default token lifetime: two hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(2 * 60 * 60);

pub struct JwtTokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtTokenIssuer {
    pub fn new(secret: &SecretString, ttl: Duration) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        }
    }
}

impl TokenIssuer for JwtTokenIssuer {
    fn issue(&self, mut claims: Document) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs())?;
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(now + ttl));

        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    fn verify(&self, token: &str) -> anyhow::Result<Document> {
        Ok(decode::<Document>(token, &self.decoding, &self.validation)?.claims)
    }
}
