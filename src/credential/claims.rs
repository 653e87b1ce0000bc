use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;

use super::CredentialError;

/// The claims this client needs from a token payload.
pub(super) struct Claims {
    pub exp: i64,
    pub roles: Vec<String>,
    pub sub: String,
}

/// Wire shape of the payload. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawClaims {
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    sub: Option<String>,
}

/// Decode the middle (payload) part of a `header.payload.signature`
/// token without verifying the signature.
pub(super) fn decode_payload(raw: &str) -> Result<Claims, CredentialError> {
    let mut parts = raw.split('.');
    let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(_header), Some(payload), Some(_signature), None) => payload,
        _ => return Err(CredentialError::Format),
    };

    let bytes = URL_SAFE_NO_PAD.decode(payload.as_bytes())?;
    let decoded: RawClaims = serde_json::from_slice(&bytes)?;

    let exp = decoded.exp.ok_or(CredentialError::MissingClaim("exp"))?;
    let sub = match decoded.sub {
        Some(sub) if !sub.is_empty() => sub,
        _ => return Err(CredentialError::MissingClaim("sub")),
    };

    Ok(Claims {
        exp,
        roles: decoded.roles,
        sub,
    })
}
