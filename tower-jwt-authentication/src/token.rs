use std::collections::HashMap;

use http::Extensions;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::TokenError;

/// Verified claims of a request together with the raw token they were read from.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedToken {
    payload: Map<String, Value>,
    token: String,
}

impl DecodedToken {
    pub fn new(payload: Map<String, Value>, token: impl Into<String>) -> Self {
        Self {
            payload,
            token: token.into(),
        }
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn get(&self, name: &str) -> Result<&Value, TokenError> {
        self.payload
            .get(name)
            .ok_or_else(|| TokenError::AttributeNotFound(name.to_owned()))
    }

    pub fn get_str(&self, name: &str) -> Result<&str, TokenError> {
        self.get(name)?
            .as_str()
            .ok_or_else(|| TokenError::InvalidAttributeType {
                name: name.to_owned(),
                expected: "string",
            })
    }

    pub fn get_list(&self, name: &str) -> Result<&[Value], TokenError> {
        self.get(name)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| TokenError::InvalidAttributeType {
                name: name.to_owned(),
                expected: "list",
            })
    }

    pub fn get_strings(&self, name: &str) -> Result<Vec<&str>, TokenError> {
        self.get_list(name)?
            .iter()
            .map(|value| {
                value.as_str().ok_or_else(|| TokenError::InvalidAttributeType {
                    name: name.to_owned(),
                    expected: "list of strings",
                })
            })
            .collect()
    }

    /// Deserializes the payload into a claims struct of your own.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, TokenError> {
        serde_json::from_value(Value::Object(self.payload.clone()))
            .map_err(|e| TokenError::Deserialize(e.to_string()))
    }

    pub fn from_extensions<'a>(extensions: &'a Extensions, attribute: &str) -> Option<&'a Self> {
        extensions.get::<TokenAttributes>()?.get(attribute)
    }
}

/// Decoded tokens attached to a request, by attribute name.
///
/// Inserted into the request extensions by the authentication stage.
#[derive(Clone, Debug, Default)]
pub struct TokenAttributes {
    tokens: HashMap<String, DecodedToken>,
}

impl TokenAttributes {
    pub fn get(&self, attribute: &str) -> Option<&DecodedToken> {
        self.tokens.get(attribute)
    }

    pub(crate) fn attach(extensions: &mut Extensions, attribute: &str, token: DecodedToken) {
        match extensions.get_mut::<TokenAttributes>() {
            Some(attributes) => {
                attributes.tokens.insert(attribute.to_owned(), token);
            }
            None => {
                let mut attributes = TokenAttributes::default();
                attributes.tokens.insert(attribute.to_owned(), token);
                extensions.insert(attributes);
            }
        }
    }
}
