use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::error::ConfigurationError;

/// Key material handed to a [TokenVerifier](crate::verifier::TokenVerifier).
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// One key, used for every token.
    Single(String),
    /// Keys by key identifier. The verifier selects one using the `kid` header of the token.
    Keyed(BTreeMap<String, String>),
}

impl KeyMaterial {
    pub fn get(&self, kid: &str) -> Option<&str> {
        match self {
            KeyMaterial::Single(_) => None,
            KeyMaterial::Keyed(keys) => keys.get(kid).map(String::as_str),
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Single(_) => f.write_str("Single(..)"),
            KeyMaterial::Keyed(keys) => f.debug_tuple("Keyed").field(&keys.keys()).finish(),
        }
    }
}

pub trait SecretResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, algorithm: Algorithm) -> KeyMaterial;
}

/// One shared key for every algorithm.
pub struct SingleSecret {
    key: String,
}

impl SingleSecret {
    pub fn new(key: impl Into<String>) -> Result<Self, ConfigurationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ConfigurationError::InvalidSecret(
                "secret must not be empty".to_owned(),
            ));
        }
        Ok(Self { key })
    }
}

impl SecretResolver for SingleSecret {
    fn resolve(&self, _algorithm: Algorithm) -> KeyMaterial {
        KeyMaterial::Single(self.key.clone())
    }
}

impl fmt::Debug for SingleSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleSecret").finish_non_exhaustive()
    }
}

/// A set of keys, selected by the `kid` header of a token.
pub struct KeyedSecret {
    keys: BTreeMap<String, String>,
}

impl KeyedSecret {
    pub fn new(keys: BTreeMap<String, String>) -> Result<Self, ConfigurationError> {
        if keys.is_empty() {
            return Err(ConfigurationError::InvalidSecret(
                "keyed secret must contain at least one key".to_owned(),
            ));
        }
        if let Some((kid, _)) = keys
            .iter()
            .find(|(kid, key)| kid.is_empty() || key.is_empty())
        {
            return Err(ConfigurationError::InvalidSecret(format!(
                "empty key id or key for '{}'",
                kid
            )));
        }
        Ok(Self { keys })
    }

    /// Reads any associative collection once and converts it into a keyed secret.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(kid, key)| (kid.into(), key.into()))
                .collect(),
        )
    }
}

impl SecretResolver for KeyedSecret {
    fn resolve(&self, _algorithm: Algorithm) -> KeyMaterial {
        KeyMaterial::Keyed(self.keys.clone())
    }
}

impl fmt::Debug for KeyedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedSecret")
            .field("key_ids", &self.keys.keys())
            .finish()
    }
}

/// Construction-time shape of a secret.
#[derive(Clone, Deserialize)]
#[serde(untagged)]
pub enum Secret {
    Single(String),
    Keyed(BTreeMap<String, String>),
}

impl Secret {
    pub fn into_resolver(self) -> Result<Arc<dyn SecretResolver>, ConfigurationError> {
        Ok(match self {
            Secret::Single(key) => Arc::new(SingleSecret::new(key)?),
            Secret::Keyed(keys) => Arc::new(KeyedSecret::new(keys)?),
        })
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Single(_) => f.write_str("Single(..)"),
            Secret::Keyed(keys) => f.debug_tuple("Keyed").field(&keys.keys()).finish(),
        }
    }
}

impl From<&str> for Secret {
    fn from(key: &str) -> Self {
        Secret::Single(key.to_owned())
    }
}

impl From<String> for Secret {
    fn from(key: String) -> Self {
        Secret::Single(key)
    }
}

impl<K, V> From<BTreeMap<K, V>> for Secret
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(keys: BTreeMap<K, V>) -> Self {
        keys.into_iter().collect()
    }
}

impl<K, V> From<HashMap<K, V>> for Secret
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(keys: HashMap<K, V>) -> Self {
        keys.into_iter().collect()
    }
}

impl<K, V> From<Vec<(K, V)>> for Secret
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(keys: Vec<(K, V)>) -> Self {
        keys.into_iter().collect()
    }
}

impl<K, V> FromIterator<(K, V)> for Secret
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Secret::Keyed(
            iter.into_iter()
                .map(|(kid, key)| (kid.into(), key.into()))
                .collect(),
        )
    }
}
