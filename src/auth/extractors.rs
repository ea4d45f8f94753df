use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use uuid::Uuid;

use super::{
    error::{AuthError, AuthResult},
    jwt::AccessTokens,
};
use crate::error::ApiError;

const BEARER_PREFIX: &str = "Bearer ";

/// Token from a single `Authorization: Bearer <token>` header.
///
/// No header, repeated headers, non-ASCII values and any other scheme all
/// count as no token at all.
pub fn get_bearer_token(headers: &HeaderMap) -> AuthResult<&str> {
    let mut values = headers.get_all(AUTHORIZATION).iter();
    let (Some(value), None) = (values.next(), values.next()) else {
        return Err(AuthError::MissingToken);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .ok_or(AuthError::MissingToken)
}

/// Resolves the request's bearer access token to its subject.
pub fn authenticate(headers: &HeaderMap, tokens: &AccessTokens) -> AuthResult<Uuid> {
    let token = get_bearer_token(headers)?;
    tokens.verify(token)
}

/// Authenticated caller, from a verified access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AccessTokens: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let tokens = AccessTokens::from_ref(state);
        let user_id = authenticate(&parts.headers, &tokens)?;
        Ok(AuthUser(user_id))
    }
}

/// Raw bearer value, unverified. Refresh and revoke carry refresh tokens here.
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = get_bearer_token(&parts.headers)?;
        Ok(BearerToken(token.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use time::Duration;

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(AUTHORIZATION, HeaderValue::from_str(v).expect("header value"));
        }
        map
    }

    #[test]
    fn extracts_bearer_token() {
        let map = headers(&["Bearer tokenString"]);
        assert_eq!(get_bearer_token(&map).expect("token"), "tokenString");
    }

    #[test]
    fn missing_header_is_missing_token() {
        assert!(matches!(get_bearer_token(&HeaderMap::new()), Err(AuthError::MissingToken)));
    }

    #[test]
    fn other_schemes_are_missing_token() {
        for v in ["Basic xyz", "bearer abc", "Bearer", "BearerXabc", "Token abc"] {
            assert!(
                matches!(get_bearer_token(&headers(&[v])), Err(AuthError::MissingToken)),
                "{v}"
            );
        }
    }

    #[test]
    fn repeated_header_is_missing_token() {
        let map = headers(&["Bearer a", "Bearer b"]);
        assert!(matches!(get_bearer_token(&map), Err(AuthError::MissingToken)));
    }

    #[test]
    fn opaque_header_bytes_are_missing_token() {
        let mut map = HeaderMap::new();
        map.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xfftoken").expect("opaque value"),
        );
        assert!(matches!(get_bearer_token(&map), Err(AuthError::MissingToken)));
    }

    #[test]
    fn authenticate_resolves_subject() {
        let tokens = AccessTokens::new("secret", Arc::new(SystemClock));
        let user = Uuid::new_v4();
        let token = tokens.issue(user, Duration::minutes(5)).expect("issue");
        let map = headers(&[&format!("Bearer {token}")]);
        assert_eq!(authenticate(&map, &tokens).expect("authenticated"), user);
    }

    #[test]
    fn authenticate_propagates_codec_failures() {
        let tokens = AccessTokens::new("secret", Arc::new(SystemClock));
        let other = AccessTokens::new("other", Arc::new(SystemClock));
        let token = other.issue(Uuid::new_v4(), Duration::minutes(5)).expect("issue");
        let map = headers(&[&format!("Bearer {token}")]);
        assert!(matches!(authenticate(&map, &tokens), Err(AuthError::InvalidSignature)));
        assert!(matches!(
            authenticate(&HeaderMap::new(), &tokens),
            Err(AuthError::MissingToken)
        ));
    }
}
