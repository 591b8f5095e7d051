use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 60 * 60 * 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJwtClaims {
    pub sub: String,
    pub exp: usize,
}

fn jwt_secret() -> String {
    std::env::var("TB_JWT_SECRET").unwrap_or_else(|_| "dev-jwt-secret-change-me".to_string())
}

fn token_ttl_seconds() -> i64 {
    std::env::var("TB_AUTH_TOKEN_TTL_SECONDS")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .filter(|ttl| *ttl > 0)
        .unwrap_or(DEFAULT_TOKEN_TTL_SECONDS)
}

pub fn issue_user_jwt(user_id: u64) -> Result<(String, usize), String> {
    let exp = (Utc::now() + Duration::seconds(token_ttl_seconds())).timestamp() as usize;
    let claims = UserJwtClaims {
        sub: user_id.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret().as_bytes()),
    )
    .map(|token| (token, exp))
    .map_err(|err| format!("Failed to sign user JWT: {}", err))
}

pub fn verify_user_jwt(token: &str) -> Result<UserJwtClaims, String> {
    decode::<UserJwtClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|decoded| decoded.claims)
    .map_err(|err| format!("Invalid user JWT: {}", err))
}

/// Extract the verified caller id from the Authorization header.
///
/// A missing, malformed or expired token yields `None`; the policy evaluator
/// turns that into an unauthenticated denial rather than a fault.
pub fn caller_id_from_headers(headers: &HeaderMap) -> Option<u64> {
    let header = headers.get("Authorization")?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let claims = verify_user_jwt(token).ok()?;
    claims.sub.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_and_verify_roundtrip() {
        let (token, exp) = issue_user_jwt(42).unwrap();
        let claims = verify_user_jwt(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.exp, exp);
    }

    #[test]
    fn caller_id_requires_bearer_scheme() {
        let (token, _) = issue_user_jwt(42).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert("Authorization", token.parse().unwrap());
        assert_eq!(caller_id_from_headers(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {}", token).parse().unwrap(),
        );
        assert_eq!(caller_id_from_headers(&headers), Some(42));
    }

    #[test]
    fn garbage_token_yields_no_caller() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", "Bearer not-a-jwt".parse().unwrap());
        assert_eq!(caller_id_from_headers(&headers), None);
    }
}
