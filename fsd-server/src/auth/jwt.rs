//! Minimal HS256 bearer token verification. Tokens are minted by the
//! account service that shares `jwt_secret` with this server; only
//! signature, time window and issuer are checked here.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// `token_type` required on network login tokens.
pub const FSD_TOKEN_TYPE: &str = "fsd";
/// `token_type` required on admin-channel tokens.
pub const SERVICE_TOKEN_TYPE: &str = "fsd_service";
pub const ISSUER: &str = "openskies";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("unsupported signing algorithm {0}")]
    Algorithm(String),
    #[error("signature mismatch")]
    Signature,
    #[error("token outside its validity window")]
    Expired,
    #[error("unexpected issuer")]
    Issuer,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub token_type: String,
    pub cid: u32,
    #[serde(default)]
    pub network_rating: i32,
    #[serde(default)]
    pub pilot_rating: i32,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub nbf: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
}

/// Cheap shape test used at login to pick the token path over the password
/// path: three dot-separated segments and a decodable header naming an
/// algorithm and type.
pub fn looks_like_jwt(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return false;
    }
    let Ok(raw) = URL_SAFE_NO_PAD.decode(parts[0]) else {
        return false;
    };
    match serde_json::from_slice::<Header>(&raw) {
        Ok(header) => !header.alg.is_empty() && header.typ.is_some(),
        Err(_) => false,
    }
}

pub fn verify(token: &str, secret: &[u8]) -> Result<Claims, TokenError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed);
    }

    let header_raw = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|_| TokenError::Malformed)?;
    let header: Header =
        serde_json::from_slice(&header_raw).map_err(|_| TokenError::Malformed)?;
    if header.alg != "HS256" {
        return Err(TokenError::Algorithm(header.alg));
    }

    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::Signature)?;
    mac.update(parts[0].as_bytes());
    mac.update(b".");
    mac.update(parts[1].as_bytes());
    let signature = URL_SAFE_NO_PAD
        .decode(parts[2])
        .map_err(|_| TokenError::Malformed)?;
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::Signature)?;

    let claims_raw = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| TokenError::Malformed)?;
    let claims: Claims =
        serde_json::from_slice(&claims_raw).map_err(|_| TokenError::Malformed)?;

    let now = chrono::Utc::now().timestamp();
    if claims.exp.is_some_and(|exp| now >= exp) {
        return Err(TokenError::Expired);
    }
    if claims.nbf.is_some_and(|nbf| now < nbf) {
        return Err(TokenError::Expired);
    }
    if claims.iss.as_deref().is_some_and(|iss| iss != ISSUER) {
        return Err(TokenError::Issuer);
    }
    Ok(claims)
}

/// Mints a token with the given claims. Used by operator tooling and tests;
/// the server itself only verifies.
pub fn sign(claims: &serde_json::Value, secret: &[u8]) -> Result<String, serde_json::Error> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{header}.{payload}.{signature}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"test-secret";

    fn token(claims: serde_json::Value) -> String {
        sign(&claims, SECRET).unwrap()
    }

    #[test]
    fn round_trip() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let t = token(json!({
            "token_type": "fsd_service",
            "cid": 1,
            "network_rating": 12,
            "iss": "openskies",
            "exp": exp,
        }));
        assert!(looks_like_jwt(&t));
        let claims = verify(&t, SECRET).unwrap();
        assert_eq!(claims.token_type, SERVICE_TOKEN_TYPE);
        assert_eq!(claims.cid, 1);
        assert_eq!(claims.network_rating, 12);
    }

    #[test]
    fn rejects_bad_signature() {
        let t = token(json!({"cid": 1}));
        assert!(matches!(
            verify(&t, b"other-secret"),
            Err(TokenError::Signature)
        ));
    }

    #[test]
    fn rejects_expired() {
        let t = token(json!({"cid": 1, "exp": 1000}));
        assert!(matches!(verify(&t, SECRET), Err(TokenError::Expired)));
    }

    #[test]
    fn rejects_wrong_issuer() {
        let t = token(json!({"cid": 1, "iss": "somebody-else"}));
        assert!(matches!(verify(&t, SECRET), Err(TokenError::Issuer)));
    }

    #[test]
    fn password_is_not_a_jwt() {
        assert!(!looks_like_jwt("hunter2"));
        assert!(!looks_like_jwt("a.b.c"));
        assert!(!looks_like_jwt("a.b.c.d"));
    }
}
