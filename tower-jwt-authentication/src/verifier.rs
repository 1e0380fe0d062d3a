use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

use crate::{error::VerificationError, jwt_unverified::UnverifiedJwt, secret::KeyMaterial};

#[cfg_attr(test, mockall::automock)]
pub trait TokenVerifier: Send + Sync {
    fn verify(
        &self,
        token: &UnverifiedJwt,
        key: &KeyMaterial,
        algorithm: Algorithm,
    ) -> Result<Map<String, Value>, VerificationError>;
}

/// Verifies signatures and time based claims (`exp`, `nbf`) with the `jsonwebtoken` crate.
///
/// HMAC algorithms use the key as shared secret. All other algorithms expect a PEM encoded
/// public key.
#[derive(Debug, Default, Clone)]
pub struct JsonWebTokenVerifier {
    leeway: u64,
}

impl JsonWebTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds of clock skew tolerated when validating `exp` and `nbf`.
    pub fn leeway(mut self, leeway: u64) -> Self {
        self.leeway = leeway;
        self
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.set_required_spec_claims::<&str>(&[]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.leeway = self.leeway;
        validation
    }
}

impl TokenVerifier for JsonWebTokenVerifier {
    fn verify(
        &self,
        token: &UnverifiedJwt,
        key: &KeyMaterial,
        algorithm: Algorithm,
    ) -> Result<Map<String, Value>, VerificationError> {
        let header = decode_header(token.as_str()).or(Err(VerificationError::Malformed))?;
        if header.alg != algorithm {
            return Err(VerificationError::AlgorithmMismatch {
                expected: algorithm,
                found: header.alg,
            });
        }

        let key = match key {
            KeyMaterial::Single(key) => key.as_str(),
            KeyMaterial::Keyed(_) => {
                let kid = header.kid.ok_or(VerificationError::MissingKeyId)?;
                key.get(&kid)
                    .ok_or_else(|| VerificationError::UnknownKeyId(kid.clone()))?
            }
        };
        let decoding_key = decoding_key(algorithm, key)?;

        let validation = self.validation(algorithm);
        match decode::<Map<String, Value>>(token.as_str(), &decoding_key, &validation) {
            Ok(result) => Ok(result.claims),
            Err(e) => Err(VerificationError::Invalid(e.into_kind())),
        }
    }
}

fn decoding_key(algorithm: Algorithm, key: &str) -> Result<DecodingKey, VerificationError> {
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Ok(DecodingKey::from_secret(key.as_bytes()))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => {
            DecodingKey::from_rsa_pem(key.as_bytes()).map_err(|_| VerificationError::InvalidKey)
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            DecodingKey::from_ec_pem(key.as_bytes()).map_err(|_| VerificationError::InvalidKey)
        }
        Algorithm::EdDSA => {
            DecodingKey::from_ed_pem(key.as_bytes()).map_err(|_| VerificationError::InvalidKey)
        }
    }
}
