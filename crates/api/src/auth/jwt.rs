//! Operator access tokens.
//!
//! Operators sign in with the external identity provider, which issues
//! HS256 tokens carrying [`Claims`]. This service only verifies them;
//! [`issue_token`] exists for local tooling and tests.

use hostbook_core::types::DbId;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::env_or;

/// What an operator may do. Tokens with any other role are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorRole {
    /// Edits and publishes their own booklets.
    Owner,
    /// Support staff acting on an owner's behalf; same rights, logged apart.
    Support,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Operator id in the identity provider.
    pub sub: DbId,
    pub role: OperatorRole,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret shared with the identity provider.
    pub secret: String,
    /// Required `iss` claim, when set.
    pub issuer: Option<String>,
    /// Clock skew tolerated on `exp`, in seconds.
    pub leeway_secs: u64,
    /// Lifetime of tokens minted by [`issue_token`].
    pub token_ttl_mins: i64,
}

impl JwtConfig {
    /// Load token settings from the environment.
    ///
    /// | Env Var           | Required | Default |
    /// |-------------------|----------|---------|
    /// | `JWT_SECRET`      | **yes**  | --      |
    /// | `JWT_ISSUER`      | no       | unset   |
    /// | `JWT_LEEWAY_SECS` | no       | `30`    |
    /// | `JWT_TTL_MINS`    | no       | `60`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or a number fails to parse.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(!secret.is_empty(), "JWT_SECRET must be set and non-empty");

        Self {
            secret,
            issuer: std::env::var("JWT_ISSUER").ok().filter(|s| !s.is_empty()),
            leeway_secs: env_or("JWT_LEEWAY_SECS", 30),
            token_ttl_mins: env_or("JWT_TTL_MINS", 60),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
            validation.set_required_spec_claims(&["exp", "iss"]);
        }
        validation
    }
}

/// Mint a token for `operator_id`.
pub fn issue_token(
    operator_id: DbId,
    role: OperatorRole,
    config: &JwtConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: operator_id,
        role,
        exp: now + config.token_ttl_mins * 60,
        iat: now,
        iss: config.issuer.clone(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
}

/// Check signature, expiry and issuer.
pub fn verify_token(token: &str, config: &JwtConfig) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &config.validation(),
    )
    .map(|data| data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            issuer: None,
            leeway_secs: 0,
            token_ttl_mins: 15,
        }
    }

    fn sign(claims: &serde_json::Value, config: &JwtConfig) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(config.secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn issued_tokens_verify() {
        let config = config();
        let token = issue_token(42, OperatorRole::Owner, &config).unwrap();

        let claims = verify_token(&token, &config).unwrap();
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, OperatorRole::Owner);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_tokens_fail() {
        let config = config();
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &serde_json::json!({ "sub": 1, "role": "owner", "exp": now - 300, "iat": now - 600 }),
            &config,
        );

        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn foreign_secret_fails() {
        let token = issue_token(1, OperatorRole::Owner, &config()).unwrap();
        let other = JwtConfig {
            secret: "another-secret".to_string(),
            ..config()
        };

        assert!(verify_token(&token, &other).is_err());
    }

    #[test]
    fn unknown_role_fails() {
        let config = config();
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &serde_json::json!({ "sub": 1, "role": "guest", "exp": now + 300, "iat": now }),
            &config,
        );

        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn issuer_is_enforced_when_configured() {
        let unscoped = issue_token(1, OperatorRole::Support, &config()).unwrap();
        let scoped = JwtConfig {
            issuer: Some("https://id.hostbook.test".to_string()),
            ..config()
        };

        assert!(verify_token(&unscoped, &scoped).is_err());
        let token = issue_token(1, OperatorRole::Support, &scoped).unwrap();
        assert_eq!(
            verify_token(&token, &scoped).unwrap().iss.as_deref(),
            Some("https://id.hostbook.test")
        );
    }

    #[test]
    fn tokens_from_another_issuer_fail() {
        let scoped = JwtConfig {
            issuer: Some("https://id.hostbook.test".to_string()),
            ..config()
        };
        let now = chrono::Utc::now().timestamp();
        let token = sign(
            &serde_json::json!({
                "sub": 1, "role": "owner", "exp": now + 300, "iat": now,
                "iss": "https://elsewhere.test",
            }),
            &scoped,
        );

        assert!(verify_token(&token, &scoped).is_err());
    }
}
