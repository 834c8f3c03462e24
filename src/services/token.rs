use crate::core::error::AuthError;
use crate::utils::time::{current_timestamp, is_expired};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `{"alg":"HS256","typ":"JWT"}`, base64url-encoded
const HEADER: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u32,
    /// Identity token of the account the token was issued to. Ties the
    /// bearer token to that account even if its id is ever seen again.
    pub uuid: String,
    /// Expiry as a unix timestamp
    pub exp: i64,
}

/// Issues and checks HS256 bearer tokens
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl_secs: i64,
}

impl TokenSigner {
    pub fn new(secret: &str, ttl_days: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl_secs: ttl_days * 24 * 60 * 60,
        }
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Token(format!("invalid token key: {}", e)))?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, user_id: u32, uuid: &str) -> Result<String, AuthError> {
        self.issue_claims(&Claims {
            user_id,
            uuid: uuid.to_string(),
            exp: current_timestamp() + self.ttl_secs,
        })
    }

    fn issue_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        let payload = serde_json::to_vec(claims)
            .map_err(|e| AuthError::Token(format!("failed to encode claims: {}", e)))?;

        let signing_input = format!("{}.{}", HEADER, URL_SAFE_NO_PAD.encode(payload));
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Check signature and expiry, returning the claims
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut parts = token.split('.');
        let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(AuthError::InvalidToken),
        };

        if header != HEADER {
            return Err(AuthError::InvalidToken);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::InvalidToken)?;

        // verify_slice compares in constant time
        self.mac(&format!("{}.{}", header, payload))?
            .verify_slice(&signature)
            .map_err(|_| AuthError::InvalidToken)?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::InvalidToken)?;
        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| AuthError::InvalidToken)?;

        if is_expired(claims.exp, current_timestamp()) {
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_constant() {
        assert_eq!(
            URL_SAFE_NO_PAD.decode(HEADER).unwrap(),
            br#"{"alg":"HS256","typ":"JWT"}"#
        );
    }

    #[test]
    fn test_issue_and_verify() {
        let signer = TokenSigner::new("secret", 30);
        let token = signer.issue(7, "uuid-7").unwrap();

        assert_eq!(token.split('.').count(), 3);
        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.uuid, "uuid-7");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = TokenSigner::new("secret", 30).issue(7, "uuid-7").unwrap();
        assert!(matches!(
            TokenSigner::new("other", 30).verify(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = TokenSigner::new("secret", 30);
        let token = signer.issue(7, "uuid-7").unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":1,"uuid":"uuid-1","exp":9999999999}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(signer.verify(&forged).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let signer = TokenSigner::new("secret", 30);
        let token = signer
            .issue_claims(&Claims {
                user_id: 7,
                uuid: "uuid-7".to_string(),
                exp: current_timestamp() - 1,
            })
            .unwrap();

        assert!(matches!(signer.verify(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_malformed_rejected() {
        let signer = TokenSigner::new("secret", 30);
        for token in ["", "abc", "a.b", "a.b.c.d", "not.a.token"] {
            assert!(signer.verify(token).is_err(), "accepted {:?}", token);
        }
    }
}
