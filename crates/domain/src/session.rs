use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Who is looking at the thread. Passed explicitly into every mutation so the
/// sign-in gate can be checked without a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(String),
}

impl Viewer {
    pub fn user(id: impl Into<String>) -> Self {
        Viewer::User(id.into())
    }

    pub fn current_user(&self) -> Option<&str> {
        match self {
            Viewer::Anonymous => None,
            Viewer::User(id) => Some(id),
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user().is_some()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("session token is malformed")]
    Malformed,
    #[error("session token signature does not match")]
    BadSignature,
    #[error("session secret cannot be used as an HMAC key")]
    InvalidSecret,
}

fn mac_for(secret: &str, payload: &str) -> Result<HmacSha256, TokenError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::InvalidSecret)?;
    mac.update(payload.as_bytes());
    Ok(mac)
}

/// Token layout: `base64url(user_id) "." hex(hmac_sha256(secret, first_part))`.
pub fn issue_token(secret: &str, user_id: &str) -> Result<String, TokenError> {
    let payload = URL_SAFE_NO_PAD.encode(user_id.as_bytes());
    let signature = hex::encode(mac_for(secret, &payload)?.finalize().into_bytes());
    Ok(format!("{}.{}", payload, signature))
}

/// Returns the user id carried by a valid token.
pub fn verify_token(secret: &str, token: &str) -> Result<String, TokenError> {
    let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    let signature = hex::decode(signature).map_err(|_| TokenError::Malformed)?;

    mac_for(secret, payload)?
        .verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let raw = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| TokenError::Malformed)?;
    let user_id = String::from_utf8(raw).map_err(|_| TokenError::Malformed)?;
    if user_id.is_empty() {
        return Err(TokenError::Malformed);
    }
    Ok(user_id)
}
