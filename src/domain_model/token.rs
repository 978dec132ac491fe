use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(pub String);

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefreshToken(pub String);

// Token values never reach the logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(***)")
    }
}

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(***)")
    }
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        AccessToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads the `exp` claim when the token is a JWT. The signature is not
    /// checked: the client only uses this to skip requests that would 401.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data =
            decode::<ExpiryClaims>(&self.0, &DecodingKey::from_secret(&[]), &validation).ok()?;
        Utc.timestamp_opt(data.claims.exp?, 0).single()
    }

    /// Opaque tokens and tokens without `exp` never count as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        match self.expires_at() {
            Some(exp) => exp <= now + leeway,
            None => false,
        }
    }
}

impl RefreshToken {
    pub fn new(value: impl Into<String>) -> Self {
        RefreshToken(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Access and refresh token, always stored and cleared together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        TokenPair {
            access_token: AccessToken::new(access_token),
            refresh_token: RefreshToken::new(refresh_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    fn jwt_with_exp(exp: i64) -> AccessToken {
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user-1", "exp": exp }),
            &EncodingKey::from_secret(b"server-side-secret"),
        )
        .unwrap();
        AccessToken(token)
    }

    #[test]
    fn reads_exp_claim_without_the_signing_key() {
        let exp = Utc::now().timestamp() + 3600;
        let token = jwt_with_exp(exp);
        assert_eq!(token.expires_at().map(|t| t.timestamp()), Some(exp));
        assert!(!token.is_expired_at(Utc::now(), Duration::seconds(30)));
    }

    #[test]
    fn past_exp_is_expired() {
        let token = jwt_with_exp(Utc::now().timestamp() - 10);
        assert!(token.is_expired_at(Utc::now(), Duration::zero()));
    }

    #[test]
    fn opaque_token_has_no_expiry() {
        let token = AccessToken::new("A1");
        assert_eq!(token.expires_at(), None);
        assert!(!token.is_expired_at(Utc::now(), Duration::zero()));
    }

    #[test]
    fn debug_output_hides_token_values() {
        let pair = TokenPair::new("secret-access", "secret-refresh");
        let printed = format!("{:?}", pair);
        assert!(!printed.contains("secret"));
    }
}
