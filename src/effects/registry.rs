use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::{
    effects::chain::{EffectChain, EffectParams, EffectSpec},
    foundation::error::{BendError, BendResult},
};

/// Typed constructor for one effect: validates the parameters and produces the engine's op.
pub type EffectBuilder<Op> = Arc<dyn Fn(&EffectParams) -> BendResult<Op> + Send + Sync>;

/// Name to builder table an engine resolves effect specs through.
///
/// Names are matched trimmed and case-insensitively.
pub struct EffectRegistry<Op> {
    builders: BTreeMap<String, EffectBuilder<Op>>,
}

impl<Op> Default for EffectRegistry<Op> {
    fn default() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }
}

impl<Op> fmt::Debug for EffectRegistry<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("effects", &self.builders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<Op> EffectRegistry<Op> {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the builder for `name`.
    pub fn register<F>(&mut self, name: &str, builder: F) -> &mut Self
    where
        F: Fn(&EffectParams) -> BendResult<Op> + Send + Sync + 'static,
    {
        self.builders.insert(normalize(name), Arc::new(builder));
        self
    }

    /// Whether `name` resolves.
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(&normalize(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }

    /// Resolve one spec.
    pub fn resolve(&self, spec: &EffectSpec) -> BendResult<Op> {
        let builder = self
            .builders
            .get(&normalize(&spec.name))
            .ok_or_else(|| BendError::unknown_effect(spec.name.clone()))?;
        builder(&spec.params).map_err(|e| match e {
            BendError::EffectParameter { message, chain } => BendError::EffectParameter {
                message: format!("{}: {message}", spec.name),
                chain,
            },
            other => other,
        })
    }

    /// Resolve a whole chain in order. Parameter errors carry the chain dump.
    pub fn resolve_chain(&self, chain: &EffectChain) -> BendResult<Vec<Op>> {
        chain
            .specs()
            .iter()
            .map(|spec| self.resolve(spec))
            .collect::<BendResult<Vec<_>>>()
            .map_err(|e| e.with_chain(chain.dump()))
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

#[cfg(test)]
#[path = "../../tests/unit/effects/registry.rs"]
mod tests;
