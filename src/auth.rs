// Inspection of session tokens handed out by the backend.
// The backend owns verification; the client only needs to know whether a
// stored token already ran out before restoring a session from it.

use jsonwebtoken::{DecodingKey, Validation, decode, decode_header, errors::ErrorKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    #[allow(dead_code)]
    exp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    /// Not a JWT, or a JWT without an expiry. Trusted as-is.
    Opaque,
    Valid,
    Expired,
}

pub fn inspect_token(token: &str) -> TokenStatus {
    let header = match decode_header(token) {
        Ok(header) => header,
        Err(_) => return TokenStatus::Opaque,
    };

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);
    // Signature checks are off, so the key is never consulted
    let key = DecodingKey::from_secret(&[]);

    match decode::<ExpiryClaims>(token, &key, &validation) {
        Ok(_) => TokenStatus::Valid,
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => TokenStatus::Expired,
            _ => TokenStatus::Opaque,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    #[derive(Serialize)]
    struct TestClaims {
        sub: String,
        exp: u64,
    }

    fn token_expiring_at(exp: i64) -> String {
        let claims = TestClaims {
            sub: "42".into(),
            exp: exp as u64,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"backend-secret")).unwrap()
    }

    #[test]
    fn expired_jwt_is_detected() {
        let past = chrono::Utc::now().timestamp() - 3600;
        assert_eq!(inspect_token(&token_expiring_at(past)), TokenStatus::Expired);
    }

    #[test]
    fn live_jwt_is_valid() {
        let future = chrono::Utc::now().timestamp() + 3600;
        assert_eq!(inspect_token(&token_expiring_at(future)), TokenStatus::Valid);
    }

    #[test]
    fn opaque_tokens_are_trusted() {
        assert_eq!(inspect_token("session-5f2c"), TokenStatus::Opaque);
    }
}
