use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tunnel_protocol::TOKEN_TTL_SECS;

use crate::error::Result;

/// Claims embedded in a signed bearer token. `id` is empty for operator
/// tokens, which authorize the holder against any agent identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub exp: i64,
}

#[derive(Debug, Default, Clone)]
pub struct IssueOptions {
    pub id: Option<String>,
}

/// Issues and validates HS256-signed bearer tokens against a secret
/// supplied at broker startup.
#[derive(Clone)]
pub struct CredentialService {
    secret: Vec<u8>,
}

impl CredentialService {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn issue(&self, options: IssueOptions) -> Result<String> {
        let claims = Claims {
            id: options.id.unwrap_or_default(),
            exp: (Utc::now().timestamp() + TOKEN_TTL_SECS),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token)
    }

    pub fn validate(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }
}

/// Extracts the raw token from an `Authorization` header value. The source
/// protocol carries no `Bearer ` scheme prefix; the header value is the
/// token itself.
pub fn token_from_header(value: &str) -> &str {
    value.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_validate_round_trip() {
        let svc = CredentialService::new(b"test-secret".to_vec());
        let token = svc
            .issue(IssueOptions { id: Some("a1".into()) })
            .unwrap();
        let claims = svc.validate(&token).unwrap();
        assert_eq!(claims.id, "a1");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let svc = CredentialService::new(b"test-secret".to_vec());
        let mut token = svc.issue(IssueOptions::default()).unwrap();
        token.push('x');
        assert!(svc.validate(&token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let issuer = CredentialService::new(b"secret-a".to_vec());
        let verifier = CredentialService::new(b"secret-b".to_vec());
        let token = issuer.issue(IssueOptions::default()).unwrap();
        assert!(verifier.validate(&token).is_err());
    }

    #[test]
    fn no_bearer_prefix_is_passed_through_verbatim() {
        assert_eq!(token_from_header("abc.def.ghi"), "abc.def.ghi");
    }
}
