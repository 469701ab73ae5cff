//! Extension modules invoked by `Run` signatures.

use crate::config::SignatureToggles;
use crate::decision::{BlockDecision, DecisionDelta};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// What a module can see of the evaluation that invoked it.
#[derive(Debug)]
pub struct ModuleContext<'a> {
    /// Address being evaluated.
    pub address: &'a str,
    /// Factor ladder of the family being checked.
    pub factors: &'a [String],
    /// Signature factor whose `Run` line invoked the module.
    pub factor: &'a str,
    /// Toggles in effect, after any override blocks.
    pub toggles: &'a SignatureToggles,
    /// Evaluation time.
    pub now: DateTime<Utc>,
    /// Decision so far.
    pub decision: &'a BlockDecision,
}

/// Extra checks run when a `Run <name>` signature matches.
pub trait ExtensionModule: Send + Sync {
    /// Inspect the evaluation and return the changes to apply.
    fn evaluate(&self, ctx: &ModuleContext<'_>) -> DecisionDelta;
}

/// Modules addressable from `Run` signatures, keyed by the name the
/// signature uses.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn ExtensionModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, module: impl ExtensionModule + 'static) {
        self.modules.insert(name.into(), Arc::new(module));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, name: impl Into<String>, module: impl ExtensionModule + 'static) -> Self {
        self.register(name, module);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExtensionModule>> {
        self.modules.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.modules.keys().collect();
        names.sort();
        f.debug_struct("ModuleRegistry").field("modules", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysTrigger;

    struct TrustAddress;

    impl ExtensionModule for TrustAddress {
        fn evaluate(&self, ctx: &ModuleContext<'_>) -> DecisionDelta {
            DecisionDelta::new().bypass("Trusted", ctx.address)
        }
    }

    impl ExtensionModule for AlwaysTrigger {
        fn evaluate(&self, ctx: &ModuleContext<'_>) -> DecisionDelta {
            DecisionDelta::new().trigger("Always", None, ctx.factor)
        }
    }

    fn context<'a>(
        factors: &'a [String],
        toggles: &'a SignatureToggles,
        decision: &'a BlockDecision,
    ) -> ModuleContext<'a> {
        ModuleContext {
            address: "1.2.3.4",
            factors,
            factor: "1.2.3.0/24",
            toggles,
            now: Utc::now(),
            decision,
        }
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ModuleRegistry::new().with("always", AlwaysTrigger);
        assert!(registry.contains("always"));
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_module_evaluate() {
        let registry = ModuleRegistry::new().with("always", AlwaysTrigger);
        let toggles = SignatureToggles::default();
        let decision = BlockDecision::new();
        let factors = vec!["1.2.3.0/24".to_string()];

        let module = registry.get("always").unwrap();
        let delta = module.evaluate(&context(&factors, &toggles, &decision));
        assert_eq!(delta.actions().len(), 1);
    }

    #[test]
    fn test_bypass_module() {
        let registry = ModuleRegistry::new().with("bypass", TrustAddress);
        let toggles = SignatureToggles::default();
        let decision = BlockDecision::new();
        let factors = Vec::new();

        let delta = registry
            .get("bypass")
            .unwrap()
            .evaluate(&context(&factors, &toggles, &decision));
        let mut applied = BlockDecision::new();
        delta.apply(&mut applied);
        assert_eq!(applied.signature_count, -1);
        assert_eq!(applied.signatures, "1.2.3.4");
    }

    #[test]
    fn test_registry_debug_lists_names() {
        let registry = ModuleRegistry::new().with("b", AlwaysTrigger).with("a", AlwaysTrigger);
        assert_eq!(format!("{:?}", registry), r#"ModuleRegistry { modules: ["a", "b"] }"#);
    }
}
