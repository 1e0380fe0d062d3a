use std::{error::Error, fmt::Display};

use jsonwebtoken::Algorithm;

#[derive(Clone, Debug, PartialEq)]
pub enum ConfigurationError {
    InsecureTransport { scheme: String, host: String },
    InvalidRegexp(String),
    InvalidPath(String),
    InvalidSecret(String),
    InvalidHeader(String),
}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurationError::InsecureTransport { scheme, host } => write!(
                f,
                "Insecure use of middleware over {} denied by configuration (host: {})",
                scheme.to_uppercase(),
                host
            ),
            _ => write!(f, "{:?}", self),
        }
    }
}
impl Error for ConfigurationError {}

#[derive(Clone, Debug, PartialEq)]
pub enum AuthError {
    TokenNotFound,
}

impl Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for AuthError {}

#[derive(Clone, Debug, PartialEq)]
pub enum VerificationError {
    Malformed,
    MissingKeyId,
    UnknownKeyId(String),
    AlgorithmMismatch {
        expected: Algorithm,
        found: Algorithm,
    },
    InvalidKey,
    Invalid(jsonwebtoken::errors::ErrorKind),
}

impl Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for VerificationError {}

#[derive(Clone, Debug, PartialEq)]
pub enum TokenError {
    AttributeNotFound(String),
    InvalidAttributeType {
        name: String,
        expected: &'static str,
    },
    Deserialize(String),
}

impl Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
impl Error for TokenError {}
