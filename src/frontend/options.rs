use crate::error::{FrontendError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Option keys carrying Dockerfile build arguments use this prefix.
pub const BUILD_ARG_PREFIX: &str = "build-arg:";

/// Frontend options supplied by the build engine at build start.
///
/// Keys are kept sorted so the serialized form is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOptions(BTreeMap<String, String>);

impl BuildOptions {
    pub fn new(options: BTreeMap<String, String>) -> Self {
        Self(options)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Parses a `KEY=VALUE` pair. The value may itself contain `=`.
    pub fn parse_pair(raw: &str) -> Result<(String, String)> {
        match raw.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(FrontendError::ConfigError(format!(
                "expected KEY=VALUE, got '{}'",
                raw
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `build-arg:NAME` entries with the prefix stripped.
    pub fn build_args(&self) -> BTreeMap<&str, &str> {
        self.iter()
            .filter_map(|(key, value)| key.strip_prefix(BUILD_ARG_PREFIX).map(|name| (name, value)))
            .collect()
    }

    /// Compact JSON object, passed verbatim to every transform invocation.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
