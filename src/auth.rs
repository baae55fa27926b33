//! Bearer-token authentication.
//!
//! Handlers that need a caller take an [`AuthenticatedUser`]. Extraction runs
//! two narrow capabilities registered as app data: a [`TokenVerifier`] that
//! turns the bearer token into the identity provider's subject id, and an
//! [`IdentityResolver`] that maps that subject to the internal user id.

use std::future::Future;
use std::pin::Pin;

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::actions;
use crate::db::DbPool;
use crate::error::AppError;

pub trait TokenVerifier: Send + Sync {
    /// Returns the subject id carried by a valid token.
    fn verify(&self, token: &str) -> Result<String, AppError>;
}

pub trait IdentityResolver: Send + Sync {
    /// Blocking; called from `web::block`.
    fn resolve_identity(&self, external_id: &str) -> Result<Option<i32>, AppError>;
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies identity-provider session JWTs.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(key: DecodingKey, validation: Validation) -> Self {
        Self { key, validation }
    }

    /// RS256 verifier for a PEM public key. Escaped `\n` sequences are
    /// accepted so the key can live in a single-line env var.
    pub fn from_rsa_pem(pem: &str, issuer: Option<&str>) -> Result<Self, jsonwebtoken::errors::Error> {
        let pem = pem.replace("\\n", "\n");
        let key = DecodingKey::from_rsa_pem(pem.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Ok(Self::new(key, validation))
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<String, AppError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| {
                log::warn!("rejected bearer token: {}", e);
                AppError::unauthorized("invalid or expired token")
            })
    }
}

/// Resolves subjects against `users.clerk_id`.
pub struct DbIdentityResolver {
    pool: DbPool,
}

impl DbIdentityResolver {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl IdentityResolver for DbIdentityResolver {
    fn resolve_identity(&self, external_id: &str) -> Result<Option<i32>, AppError> {
        let mut conn = self.pool.get()?;
        actions::find_user_id_by_clerk_id(&mut conn, external_id)
    }
}

fn bearer_token(req: &HttpRequest) -> Result<String, AppError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim().to_owned())
        }
        _ => Err(AppError::unauthorized("invalid authorization header")),
    }
}

/// The caller of an authenticated endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i32,
    pub external_id: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let verifier = req.app_data::<web::Data<dyn TokenVerifier>>().cloned();
        let resolver = req.app_data::<web::Data<dyn IdentityResolver>>().cloned();

        Box::pin(async move {
            let token = token?;
            let (verifier, resolver) = match (verifier, resolver) {
                (Some(v), Some(r)) => (v, r),
                _ => return Err(AppError::Internal("authentication is not configured".to_owned())),
            };

            let external_id = verifier.verify(&token)?;
            let lookup_id = external_id.clone();
            let user_id = web::block(move || resolver.resolve_identity(&lookup_id))
                .await??
                .ok_or_else(|| AppError::unauthorized("user not found"))?;

            Ok(AuthenticatedUser { user_id, external_id })
        })
    }
}
