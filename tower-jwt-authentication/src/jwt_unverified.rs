use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedJwt {
    token: String,
}

impl UnverifiedJwt {
    pub fn new(raw_token: impl Into<String>) -> Self {
        UnverifiedJwt {
            token: raw_token.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn into_inner(self) -> String {
        self.token
    }

    /// The JOSE header, decoded without checking the signature.
    pub fn header(&self) -> Option<serde_json::Value> {
        decode_segment(self.token.split('.').next()?)
    }

    pub fn key_id(&self) -> Option<String> {
        self.header()?.get("kid")?.as_str().map(str::to_owned)
    }
}

fn decode_segment(segment: &str) -> Option<serde_json::Value> {
    let bytes = URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}
