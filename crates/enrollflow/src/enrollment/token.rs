use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::domain::ClientId;
use crate::config::EnrollmentConfig;

const TOKEN_SECRET_LEN_BYTES: usize = 32;
type HmacSha256 = Hmac<Sha256>;

/// Problem with a presented enrollment credential. Any variant halts the
/// phase before it mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no enrollment token presented")]
    Missing,
    #[error("enrollment token is malformed or its signature does not match")]
    Invalid,
    #[error("enrollment token has expired")]
    Expired,
}

/// Issues and verifies the short-lived bearer credential that binds a
/// submission to a client record.
///
/// Wire format: `<client_id>.<expiry_unix>.<hex hmac-sha256>` where the
/// mac covers `<client_id>.<expiry_unix>`.
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenIssuer {
    /// Builds an issuer from config, generating a process-local secret
    /// when none is configured. Tokens then stop verifying across
    /// restarts, which only forces re-entry through the contact phase.
    pub fn from_config(config: &EnrollmentConfig) -> Self {
        let secret = config
            .token_secret_hex
            .as_deref()
            .and_then(|encoded| match hex::decode(encoded.trim()) {
                Ok(bytes) if bytes.len() == TOKEN_SECRET_LEN_BYTES => Some(bytes),
                Ok(_) => {
                    tracing::warn!("configured token secret has wrong length, generating one");
                    None
                }
                Err(err) => {
                    tracing::warn!(%err, "configured token secret is not hex, generating one");
                    None
                }
            })
            .unwrap_or_else(generate_secret);

        let ttl_secs = i64::try_from(config.token_ttl_secs).unwrap_or(3600);
        Self {
            secret,
            ttl: Duration::seconds(ttl_secs),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_secret(secret: Vec<u8>, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    pub fn issue(&self, client: &ClientId) -> String {
        self.issue_at(client, Utc::now())
    }

    fn issue_at(&self, client: &ClientId, now: DateTime<Utc>) -> String {
        let expires = (now + self.ttl).timestamp();
        let payload = format!("{}.{expires}", client.0);
        let mac = compute_mac(&self.secret, payload.as_bytes());
        format!("{payload}.{}", hex::encode(mac))
    }

    pub fn verify(&self, token: Option<&str>) -> Result<ClientId, TokenError> {
        self.verify_at(token, Utc::now())
    }

    fn verify_at(&self, token: Option<&str>, now: DateTime<Utc>) -> Result<ClientId, TokenError> {
        let token = token.map(str::trim).filter(|t| !t.is_empty());
        let token = token.ok_or(TokenError::Missing)?;

        let (payload, signature) = token.rsplit_once('.').ok_or(TokenError::Invalid)?;
        let (client_id, expires_raw) = payload.rsplit_once('.').ok_or(TokenError::Invalid)?;
        if client_id.is_empty() {
            return Err(TokenError::Invalid);
        }
        let expires: i64 = expires_raw.parse().map_err(|_| TokenError::Invalid)?;

        let presented = hex::decode(signature).map_err(|_| TokenError::Invalid)?;
        let expected = compute_mac(&self.secret, payload.as_bytes());
        if presented.len() != expected.len()
            || !bool::from(presented.as_slice().ct_eq(expected.as_slice()))
        {
            return Err(TokenError::Invalid);
        }

        if now.timestamp() >= expires {
            return Err(TokenError::Expired);
        }

        Ok(ClientId(client_id.to_string()))
    }
}

fn compute_mac(secret: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

fn generate_secret() -> Vec<u8> {
    let mut secret = [0u8; TOKEN_SECRET_LEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut secret);
    secret.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer(ttl_secs: i64) -> TokenIssuer {
        TokenIssuer::with_secret(vec![7u8; TOKEN_SECRET_LEN_BYTES], Duration::seconds(ttl_secs))
    }

    #[test]
    fn issued_token_verifies_back_to_client() {
        let issuer = issuer(3600);
        let token = issuer.issue(&ClientId("client-1".to_string()));
        let verified = issuer.verify(Some(&token)).expect("token verifies");
        assert_eq!(verified, ClientId("client-1".to_string()));
    }

    #[test]
    fn missing_token_is_distinguished() {
        let issuer = issuer(3600);
        assert_eq!(issuer.verify(None), Err(TokenError::Missing));
        assert_eq!(issuer.verify(Some("  ")), Err(TokenError::Missing));
    }

    #[test]
    fn tampered_signature_is_invalid() {
        let issuer = issuer(3600);
        let mut token = issuer.issue(&ClientId("client-1".to_string()));
        let flipped = if token.ends_with('0') { "1" } else { "0" };
        token.replace_range(token.len() - 1.., flipped);
        assert_eq!(issuer.verify(Some(&token)), Err(TokenError::Invalid));
    }

    #[test]
    fn tampered_client_id_is_invalid() {
        let issuer = issuer(3600);
        let token = issuer.issue(&ClientId("client-1".to_string()));
        let forged = token.replacen("client-1", "client-2", 1);
        assert_eq!(issuer.verify(Some(&forged)), Err(TokenError::Invalid));
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let issuer = issuer(60);
        let now = Utc::now();
        let token = issuer.issue_at(&ClientId("client-1".to_string()), now);
        let later = now + Duration::seconds(120);
        assert_eq!(issuer.verify_at(Some(&token), later), Err(TokenError::Expired));
    }

    #[test]
    fn client_ids_containing_dots_round_trip() {
        let issuer = issuer(3600);
        let id = ClientId("clinic.client.9".to_string());
        let token = issuer.issue(&id);
        assert_eq!(issuer.verify(Some(&token)).expect("verifies"), id);
    }

    #[test]
    fn garbage_is_invalid_not_a_panic() {
        let issuer = issuer(3600);
        assert_eq!(issuer.verify(Some("not-a-token")), Err(TokenError::Invalid));
        assert_eq!(issuer.verify(Some("a.b.c")), Err(TokenError::Invalid));
    }
}
