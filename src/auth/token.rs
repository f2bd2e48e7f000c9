//! Client-side inspection of session tokens.
//!
//! Tokens are opaque to this crate; when the backend happens to issue a JWT we
//! read its `exp` claim so a stale stored session is not resurrected. The
//! signature is never checked here: the backend stays the authority.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

/// Expiry timestamp (seconds since the epoch) carried by a JWT token.
///
/// Returns an error for tokens that are not JWTs.
pub fn token_expiry(token: &str) -> Result<Option<i64>> {
    let header = jsonwebtoken::decode_header(token)?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<ExpiryClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims.exp)
}

/// Whether the token is a JWT whose expiry has passed.
///
/// Opaque tokens never expire client-side.
pub fn is_token_expired(token: &str) -> bool {
    match token_expiry(token) {
        Ok(Some(exp)) => {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or(Duration::from_secs(0))
                .as_secs() as i64;
            now >= exp
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn jwt(exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({"sub": "1", "exp": exp}),
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_opaque_token_never_expires() {
        assert!(!is_token_expired("T1"));
        assert!(token_expiry("T1").is_err());
    }

    #[test]
    fn test_jwt_expiry_read_without_secret() {
        assert_eq!(token_expiry(&jwt(4_102_444_800)).unwrap(), Some(4_102_444_800));
        assert!(!is_token_expired(&jwt(4_102_444_800)));
        assert!(is_token_expired(&jwt(1_000)));
    }
}
