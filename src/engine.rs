//! Signature engine.

use crate::config::{Config, FailAction};
use crate::decision::{BlockDecision, Verdict};
use crate::error::EvaluationError;
use crate::factors::{expand_ipv4, expand_ipv6, AddressFamily};
use crate::ignore::fetch_ignores;
use crate::matcher::{EvaluationContext, SignatureMatcher};
use crate::modules::ModuleRegistry;
use crate::store::SignatureStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one completed evaluation.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub address: String,
    /// Last address family whose signatures were checked. `None` when the
    /// address is neither IPv4 nor IPv6, or the engine is disabled.
    pub family: Option<AddressFamily>,
    pub whitelisted: bool,
    pub decision: BlockDecision,
    pub verdict: Verdict,
}

impl Evaluation {
    pub fn is_blocked(&self) -> bool {
        self.verdict == Verdict::Block
    }
}

/// Evaluates addresses against the configured signature files.
///
/// One engine is shared by every evaluation; each call builds its own
/// [`EvaluationContext`].
pub struct Engine {
    config: Arc<Config>,
    store: Arc<SignatureStore>,
    modules: ModuleRegistry,
}

impl Engine {
    /// Create an engine reading signatures from the configured vault.
    pub fn new(config: Config) -> Self {
        let store = Arc::new(SignatureStore::new(config.signatures.vault.clone()));
        Self::with_store(config, store)
    }

    /// Create an engine over an existing store.
    pub fn with_store(config: Config, store: Arc<SignatureStore>) -> Self {
        info!(
            vault = %store.root().display(),
            ipv4_files = config.signatures.ipv4.len(),
            ipv6_files = config.signatures.ipv6.len(),
            "Signature engine initialized"
        );
        Self {
            config: Arc::new(config),
            store,
            modules: ModuleRegistry::new(),
        }
    }

    /// Replace the extension modules available to `Run` signatures.
    pub fn with_modules(mut self, modules: ModuleRegistry) -> Self {
        debug!(modules = ?modules, "Extension modules registered");
        self.modules = modules;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &SignatureStore {
        &self.store
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Load every configured signature file into the store.
    ///
    /// Returns how many were found.
    pub fn preload(&self) -> usize {
        let signatures = &self.config.signatures;
        let mut loaded = 0;
        for name in signatures.ipv4.iter().chain(&signatures.ipv6) {
            if name.is_empty() {
                continue;
            }
            match self.store.get(name) {
                Some(content) => {
                    info!(file = %name, lines = content.lines().count(), "Signature file loaded");
                    loaded += 1;
                }
                None => warn!(file = %name, "Signature file missing or empty"),
            }
        }
        loaded
    }

    /// Evaluate an address at time `now`.
    ///
    /// An address that is neither IPv4 nor IPv6 is allowed without
    /// consulting any file. An error means the evaluation aborted and says
    /// nothing about whether the address should be blocked.
    pub fn evaluate(&self, address: &str, now: DateTime<Utc>) -> Result<Evaluation, EvaluationError> {
        if !self.config.settings.enabled {
            debug!(address = %address, "Signature engine disabled");
            return Ok(Evaluation {
                address: address.to_string(),
                family: None,
                whitelisted: false,
                decision: BlockDecision::new(),
                verdict: Verdict::Allow,
            });
        }

        let signatures = &self.config.signatures;
        let ignores = fetch_ignores(&self.store, &signatures.ignore_file);
        let mut ctx = EvaluationContext::new(address, now, signatures.toggles, ignores);
        let matcher = SignatureMatcher::new(&self.store, &self.modules);
        let mut family = None;

        if let Some(factors) = expand_ipv4(address) {
            matcher.check_factors(&mut ctx, &signatures.ipv4, &factors)?;
            family = Some(AddressFamily::Ipv4);
        }
        if !ctx.whitelisted {
            if let Some(factors) = expand_ipv6(address) {
                matcher.check_factors(&mut ctx, &signatures.ipv6, &factors)?;
                family = Some(AddressFamily::Ipv6);
            }
        }

        let verdict = ctx.decision.verdict();
        match verdict {
            Verdict::Block if self.config.settings.log_blocked => {
                info!(
                    address = %address,
                    count = ctx.decision.signature_count,
                    signatures = %ctx.decision.signatures,
                    reason = %ctx.decision.why_reason,
                    "Address blocked"
                );
            }
            Verdict::Allow if self.config.settings.log_allowed => {
                info!(address = %address, whitelisted = ctx.whitelisted, "Address allowed");
            }
            _ => {}
        }

        Ok(Evaluation {
            address: address.to_string(),
            family,
            whitelisted: ctx.whitelisted,
            decision: ctx.decision,
            verdict,
        })
    }

    /// Evaluate an address and reduce the outcome to a verdict, applying
    /// the configured fail action when the evaluation aborts.
    pub fn check(&self, address: &str, now: DateTime<Utc>) -> Verdict {
        let result = self.evaluate(address, now);
        self.verdict(&result)
    }

    /// Verdict for an evaluation result under the configured fail action.
    pub fn verdict(&self, result: &Result<Evaluation, EvaluationError>) -> Verdict {
        match result {
            Ok(evaluation) => evaluation.verdict,
            Err(e) => {
                let fail_action = self.config.settings.fail_action;
                warn!(error = %e, fail_action = ?fail_action, "Evaluation aborted");
                match fail_action {
                    FailAction::Allow => Verdict::Allow,
                    FailAction::Block => Verdict::Block,
                }
            }
        }
    }
}
