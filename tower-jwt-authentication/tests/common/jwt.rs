use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const SECRET: &str = "supersecret";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

#[derive(Clone, Debug)]
pub struct JwtBuilder {
    secret: String,
    algorithm: Algorithm,
    kid: Option<String>,
    sub: Option<String>,
    exp: Option<u64>,
    custom_claims: Vec<(String, Value)>,
}

impl JwtBuilder {
    pub fn new() -> Self {
        JwtBuilder::default()
    }

    pub fn secret<S: Into<String>>(mut self, secret: S) -> Self {
        self.secret = secret.into();
        self
    }

    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn kid<S: Into<String>>(mut self, kid: S) -> Self {
        self.kid = Some(kid.into());
        self
    }

    pub fn sub<S: Into<String>>(mut self, sub: S) -> Self {
        self.sub = Some(sub.into());
        self
    }

    pub fn exp(mut self, exp: u64) -> Self {
        self.exp = Some(exp);
        self
    }

    pub fn custom_claim<S: Into<String>>(mut self, key: S, value: Value) -> Self {
        self.custom_claims.push((key.into(), value));
        self
    }

    pub fn build(&self) -> String {
        let mut header = Header::new(self.algorithm);
        header.kid = self.kid.clone();

        let mut claims = json!({});

        if let Some(ref sub) = self.sub {
            claims["sub"] = json!(sub);
        }
        if let Some(exp) = self.exp {
            claims["exp"] = json!(exp);
        }

        for (key, value) in &self.custom_claims {
            claims[key] = value.clone();
        }

        encode(
            &header,
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .unwrap()
    }
}

impl Default for JwtBuilder {
    fn default() -> Self {
        JwtBuilder {
            secret: SECRET.to_owned(),
            algorithm: Algorithm::HS256,
            kid: None,
            sub: Some("someone".to_owned()),
            exp: Some(now() + 60),
            custom_claims: Vec::new(),
        }
    }
}
