use std::sync::Arc;

use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header,
    Validation,
};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{AuthError, AuthResult};
use crate::clock::{Clock, SystemClock};

/// Single trust domain: every token we mint or accept carries this issuer.
pub const ISSUER: &str = "chirpy";

/// JWT payload of an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String, // user ID
    pub iat: i64,
    pub exp: i64,
}

/// HS256 access-token codec keyed by the shared signing secret.
#[derive(Clone)]
pub struct AccessTokens {
    encoding: EncodingKey,
    decoding: DecodingKey,
    clock: Arc<dyn Clock>,
}

impl AccessTokens {
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            clock,
        }
    }

    pub fn issue(&self, subject: Uuid, ttl: Duration) -> AuthResult<String> {
        let now = self.clock.now();
        let expires_at = now.checked_add(ttl).ok_or_else(|| {
            warn!(user_id = %subject, ttl = %ttl, "access token lifetime out of range");
            AuthError::TokenSigning(format!("lifetime {ttl} out of range"))
        })?;
        let claims = Claims {
            iss: ISSUER.to_string(),
            sub: subject.to_string(),
            iat: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::TokenSigning(e.to_string()))?;
        debug!(user_id = %subject, exp = claims.exp, "access token signed");
        Ok(token)
    }

    /// Returns the subject of a token that is correctly signed, HS256, ours,
    /// and not yet expired.
    pub fn verify(&self, token: &str) -> AuthResult<Uuid> {
        // A header that does not even parse (including `"alg":"none"`) never
        // reaches signature verification.
        decode_header(token).map_err(|e| {
            warn!(error = %e, "access token header rejected");
            AuthError::InvalidSignature
        })?;

        let data = decode::<Claims>(token, &self.decoding, &validation()).map_err(|e| {
            let err = classify(e.kind());
            warn!(error = %e, kind = ?err, "access token rejected");
            err
        })?;

        if data.claims.exp <= self.clock.now().unix_timestamp() {
            warn!(exp = data.claims.exp, "access token expired");
            return Err(AuthError::Expired);
        }

        let subject = Uuid::parse_str(&data.claims.sub).map_err(|e| {
            warn!(error = %e, "access token subject is not a user id");
            AuthError::MalformedClaims
        })?;
        debug!(user_id = %subject, "access token verified");
        Ok(subject)
    }
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is judged against the injected clock, with no leeway.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp", "sub", "iss"]);
    validation.set_issuer(&[ISSUER]);
    validation
}

/// Only meaningful after `decode_header` has accepted the token: from then on
/// a base64 or JSON failure can only come from the claims segment.
fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_)
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidSubject
        | ErrorKind::InvalidAudience
        | ErrorKind::ImmatureSignature => AuthError::MalformedClaims,
        _ => AuthError::InvalidSignature,
    }
}

/// Signs an access token for `subject` using the system clock.
pub fn make_access_token(subject: Uuid, secret: &str, ttl: Duration) -> AuthResult<String> {
    AccessTokens::new(secret, Arc::new(SystemClock)).issue(subject, ttl)
}

/// Verifies an access token using the system clock.
pub fn validate_access_token(token: &str, secret: &str) -> AuthResult<Uuid> {
    AccessTokens::new(secret, Arc::new(SystemClock)).verify(token)
}
