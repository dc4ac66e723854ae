use std::{fmt, path::Path, sync::Arc};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    effects::engine::EffectEngine,
    foundation::error::{BendError, BendResult},
};

/// Parameters of one effect, keyed by parameter name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectParams(Map<String, Value>);

impl EffectParams {
    /// Empty parameter set; every effect falls back to its defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Raw access to a parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether no parameters are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Required finite number.
    pub fn f64(&self, key: &str) -> BendResult<f64> {
        self.opt_f64(key)?
            .ok_or_else(|| BendError::parameter(format!("missing effect param '{key}'")))
    }

    /// Finite number, or `default` when absent.
    pub fn f64_or(&self, key: &str, default: f64) -> BendResult<f64> {
        Ok(self.opt_f64(key)?.unwrap_or(default))
    }

    /// Non-negative integer, or `default` when absent.
    pub fn u32_or(&self, key: &str, default: u32) -> BendResult<u32> {
        let Some(v) = self.0.get(key) else {
            return Ok(default);
        };
        let Some(n) = v.as_u64() else {
            return Err(BendError::parameter(format!(
                "effect param '{key}' must be a non-negative integer"
            )));
        };
        u32::try_from(n)
            .map_err(|_| BendError::parameter(format!("effect param '{key}' is out of range")))
    }

    /// Boolean, or `default` when absent.
    pub fn bool_or(&self, key: &str, default: bool) -> BendResult<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| {
                BendError::parameter(format!("effect param '{key}' must be a boolean"))
            }),
        }
    }

    /// String, or `default` when absent.
    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> BendResult<&'a str> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.as_str().ok_or_else(|| {
                BendError::parameter(format!("effect param '{key}' must be a string"))
            }),
        }
    }

    /// List of finite numbers, or `default` when absent. A bare number is a one-element list.
    pub fn f64_list_or(&self, key: &str, default: &[f64]) -> BendResult<Vec<f64>> {
        let Some(v) = self.0.get(key) else {
            return Ok(default.to_vec());
        };
        if let Some(n) = v.as_f64() {
            return Ok(vec![finite(key, n)?]);
        }
        let Some(arr) = v.as_array() else {
            return Err(BendError::parameter(format!(
                "effect param '{key}' must be a list of numbers"
            )));
        };
        arr.iter()
            .map(|item| {
                let n = item.as_f64().ok_or_else(|| {
                    BendError::parameter(format!("effect param '{key}' entries must be numbers"))
                })?;
                finite(key, n)
            })
            .collect()
    }

    fn opt_f64(&self, key: &str) -> BendResult<Option<f64>> {
        let Some(v) = self.0.get(key) else {
            return Ok(None);
        };
        let Some(n) = v.as_f64() else {
            return Err(BendError::parameter(format!(
                "effect param '{key}' must be a number"
            )));
        };
        finite(key, n).map(Some)
    }
}

fn finite(key: &str, n: f64) -> BendResult<f64> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(BendError::parameter(format!(
            "effect param '{key}' must be finite"
        )))
    }
}

impl fmt::Display for EffectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}

/// One named, parameterized effect.
///
/// Deserializes from `{"name": "echo", "params": {...}}`, from the pair form
/// `["echo", {...}]`, or from a bare name `"reverse"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SpecRepr")]
pub struct EffectSpec {
    /// Effect name as registered with the engine.
    pub name: String,
    /// Effect parameters.
    #[serde(default)]
    pub params: EffectParams,
}

impl EffectSpec {
    /// Effect with explicit parameters.
    pub fn new(name: impl Into<String>, params: EffectParams) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Effect that uses all of its defaults.
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, EffectParams::new())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpecRepr {
    Bare(String),
    Pair(String, EffectParams),
    Tagged {
        name: String,
        #[serde(default)]
        params: EffectParams,
    },
}

impl From<SpecRepr> for EffectSpec {
    fn from(repr: SpecRepr) -> Self {
        match repr {
            SpecRepr::Bare(name) => Self::bare(name),
            SpecRepr::Pair(name, params) | SpecRepr::Tagged { name, params } => {
                Self::new(name, params)
            }
        }
    }
}

impl fmt::Display for EffectSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.params)
    }
}

/// An ordered, immutable list of effects, checked against an engine when it is built.
///
/// Effects apply in order. The empty chain is valid and leaves the body untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectChain {
    specs: Arc<[EffectSpec]>,
}

impl EffectChain {
    /// Build a chain, failing with [`BendError::UnknownEffect`] on the first name `engine` does not
    /// support.
    pub fn new(
        specs: impl IntoIterator<Item = EffectSpec>,
        engine: &dyn EffectEngine,
    ) -> BendResult<Self> {
        let specs: Vec<EffectSpec> = specs.into_iter().collect();
        if let Some(bad) = specs.iter().find(|s| !engine.supports(&s.name)) {
            return Err(BendError::unknown_effect(bad.name.clone()));
        }
        Ok(Self {
            specs: specs.into(),
        })
    }

    /// The chain with no effects.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON array of effect specs and validate it against `engine`.
    pub fn from_json(json: &str, engine: &dyn EffectEngine) -> BendResult<Self> {
        let specs: Vec<EffectSpec> =
            serde_json::from_str(json).context("parse effect chain JSON")?;
        Self::new(specs, engine)
    }

    /// Effects in application order.
    pub fn specs(&self) -> &[EffectSpec] {
        &self.specs
    }

    /// Number of effects.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether the chain has no effects.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Human-readable dump used in parameter error reports.
    pub fn dump(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for EffectChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, spec) in self.specs.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{spec}")?;
        }
        f.write_str("]")
    }
}

/// Load one chain from a JSON file.
pub fn load_chain(path: &Path, engine: &dyn EffectEngine) -> BendResult<EffectChain> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))?;
    EffectChain::from_json(&json, engine)
}

/// Load a sequence of chains (a JSON array of chains), one per frame.
pub fn load_chain_sequence(path: &Path, engine: &dyn EffectEngine) -> BendResult<Vec<EffectChain>> {
    let json =
        std::fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))?;
    let seq: Vec<Vec<EffectSpec>> =
        serde_json::from_str(&json).context("parse effect chain sequence JSON")?;
    seq.into_iter()
        .map(|specs| EffectChain::new(specs, engine))
        .collect()
}

#[cfg(test)]
#[path = "../../tests/unit/effects/chain.rs"]
mod tests;
