//! Configuration providers and provenance.
//!
//! Every layer is a figment provider tagged with its [`Layer`] and origin,
//! so the metadata figment attaches to each merged value tells us which
//! source won a key.

use crate::result::{HandsetError, HandsetResult};
use ortho_config::figment::providers::{Env, Serialized};
use ortho_config::figment::value::{Dict, Map};
use ortho_config::figment::{Error as FigmentError, Figment, Metadata, Profile, Provider};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Prefix for environment-variable overrides (`HANDSET__FRAMEWORK__PLATFORM`)
pub const ENV_PREFIX: &str = "HANDSET__";

/// Where a property value came from, lowest precedence first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// `default.yaml`
    BaseFile,
    /// `<environment>.yaml`
    EnvironmentFile,
    /// `HANDSET__*` process environment variables
    EnvironmentVariable,
    /// Explicit runtime override (`--set key=value`)
    Override,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BaseFile => "base file",
            Self::EnvironmentFile => "environment file",
            Self::EnvironmentVariable => "environment variable",
            Self::Override => "override",
        };
        f.write_str(name)
    }
}

/// A resolved value and the layer that supplied it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    /// Raw value
    pub value: String,
    /// Winning layer
    pub layer: Layer,
    /// Origin of the winning source
    pub origin: String,
}

/// Wraps a provider so its metadata names the origin it was loaded from
struct Tagged<P> {
    inner: P,
    origin: String,
}

impl<P: Provider> Provider for Tagged<P> {
    fn metadata(&self) -> Metadata {
        Metadata::named(self.origin.clone())
    }

    fn data(&self) -> Result<Map<Profile, Dict>, FigmentError> {
        self.inner.data()
    }
}

/// Figment under construction, remembering the layer behind each origin
pub(crate) struct Sources {
    figment: Figment,
    origins: BTreeMap<String, Layer>,
}

impl Sources {
    pub(crate) fn new() -> Self {
        Self {
            figment: Figment::new(),
            origins: BTreeMap::new(),
        }
    }

    fn merge<P: Provider>(&mut self, layer: Layer, origin: String, provider: P) {
        let _ = self.origins.insert(origin.clone(), layer);
        let figment = std::mem::replace(&mut self.figment, Figment::new());
        self.figment = figment.merge(Tagged {
            inner: provider,
            origin,
        });
    }

    /// Merge a YAML file. The document root must be a mapping; an empty
    /// document contributes nothing.
    pub(crate) fn yaml_file(&mut self, layer: Layer, path: &Path) -> HandsetResult<()> {
        let origin = path.display().to_string();
        let parse_error = |message: String| HandsetError::ConfigParse {
            path: origin.clone(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| parse_error(e.to_string()))?;
        let mut root: Value =
            serde_yaml_ng::from_str(&text).map_err(|e| parse_error(e.to_string()))?;
        match &root {
            Value::Null => return Ok(()),
            Value::Object(_) => {}
            other => {
                return Err(parse_error(format!(
                    "expected a mapping at the document root, found {}",
                    kind_of(other)
                )))
            }
        }
        prune_nulls(&mut root);
        self.merge(layer, origin, Serialized::defaults(root));
        Ok(())
    }

    /// Merge `HANDSET__GROUP__KEY=value` process variables
    ///
    /// `__` separates key segments and names are lower-cased, so
    /// `HANDSET__FRAMEWORK__VIDEO__ENABLED` maps to `framework.video.enabled`.
    pub(crate) fn environment_variables(&mut self) {
        let provider = Env::prefixed(ENV_PREFIX).split("__");
        self.merge(
            Layer::EnvironmentVariable,
            format!("{ENV_PREFIX}* environment variables"),
            provider,
        );
    }

    /// Merge dotted `key = value` overrides
    pub(crate) fn overrides<K, V, I>(&mut self, pairs: I)
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut root = serde_json::Map::new();
        for (key, value) in pairs {
            nest(&mut root, key.as_ref(), value.into());
        }
        if !root.is_empty() {
            self.merge(
                Layer::Override,
                "runtime override".to_string(),
                Serialized::defaults(Value::Object(root)),
            );
        }
    }

    /// Finish merging and resolve every leaf key to its winning source
    pub(crate) fn resolve(self) -> HandsetResult<(Figment, BTreeMap<String, ResolvedValue>)> {
        let root: Value = self
            .figment
            .extract()
            .map_err(|e| HandsetError::config(format!("invalid configuration: {e}")))?;

        let mut leaves = BTreeMap::new();
        flatten("", &root, &mut leaves);

        let mut resolved = BTreeMap::new();
        for (key, value) in leaves {
            let Some(origin) = self
                .figment
                .find_metadata(&key)
                .map(|metadata| metadata.name.to_string())
            else {
                continue;
            };
            let Some(layer) = self.origins.get(&origin).copied() else {
                continue;
            };
            let _ = resolved.insert(
                key,
                ResolvedValue {
                    value,
                    layer,
                    origin,
                },
            );
        }
        Ok((self.figment, resolved))
    }
}

/// Parse a `key=value` runtime assignment
pub fn parse_assignment(assignment: &str) -> HandsetResult<(String, String)> {
    let (key, value) = assignment.split_once('=').ok_or_else(|| {
        HandsetError::config(format!(
            "invalid override '{assignment}': expected key=value"
        ))
    })?;
    let key = key.trim();
    if key.is_empty() {
        return Err(HandsetError::config(format!(
            "invalid override '{assignment}': empty key"
        )));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn nest(root: &mut serde_json::Map<String, Value>, key: &str, value: String) {
    match key.split_once('.') {
        None => {
            let _ = root.insert(key.to_string(), Value::String(value));
        }
        Some((head, rest)) => {
            let child = root
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !child.is_object() {
                *child = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(map) = child {
                nest(map, rest, value);
            }
        }
    }
}

/// `key: ~` means unset, so it must not shadow a lower layer or a default
fn prune_nulls(value: &mut Value) {
    if let Value::Object(map) = value {
        map.retain(|_, child| !child.is_null());
        map.values_mut().for_each(prune_nulls);
    }
}

fn flatten(prefix: &str, value: &Value, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (segment, child) in map {
                let key = if prefix.is_empty() {
                    segment.clone()
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten(&key, child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            let _ = out.insert(prefix.to_string(), s.clone());
        }
        other => {
            let _ = out.insert(prefix.to_string(), other.to_string());
        }
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
