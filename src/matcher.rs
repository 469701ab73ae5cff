//! Signature matching.
//!
//! Each signature file is scanned for lines that start with one of the
//! address's factors. Matching lines are filtered by their `Expires:` and
//! `Tag:` metadata and then dispatched on their category.

use crate::config::SignatureToggles;
use crate::decision::{BlockDecision, DenyReason};
use crate::document;
use crate::error::EvaluationError;
use crate::expires::is_expired;
use crate::factors::{bare_address, AddressFamily};
use crate::ignore::{normalize_line_endings, IgnoreSet};
use crate::modules::{ModuleContext, ModuleRegistry};
use crate::store::SignatureStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

const EXPIRES_MARKER: &str = "\nExpires: ";
const TAG_MARKER: &str = "\nTag: ";
const FENCE: &str = "\n---\n";
const PARAGRAPH_BREAK: &str = "\n\n";

/// State for one evaluation pass, passed explicitly to every step.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Address being evaluated.
    pub address: String,
    /// Reference time for `Expires:` checks.
    pub now: DateTime<Utc>,
    /// Category toggles, possibly changed by override blocks.
    pub toggles: SignatureToggles,
    /// Tags to skip.
    pub ignores: IgnoreSet,
    pub decision: BlockDecision,
    /// Set by a `Whitelist` match; no further signatures are consulted.
    pub whitelisted: bool,
    modules_run: HashSet<String>,
}

impl EvaluationContext {
    pub fn new(
        address: impl Into<String>,
        now: DateTime<Utc>,
        toggles: SignatureToggles,
        ignores: IgnoreSet,
    ) -> Self {
        Self {
            address: address.into(),
            now,
            toggles,
            ignores,
            decision: BlockDecision::new(),
            whitelisted: false,
            modules_run: HashSet::new(),
        }
    }
}

/// Layout of a signature file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureFormat {
    /// One line of comma-separated CIDRs, all treated as `Deny Generic`.
    Csv,
    /// One signature per line with optional metadata.
    Dat,
}

impl SignatureFormat {
    /// CSV needs a `.csv` name and a single comma-separated line.
    pub fn detect(name: &str, content: &str) -> Self {
        let is_csv_name = name.to_ascii_lowercase().ends_with(".csv");
        if is_csv_name && !content.contains(|c: char| c == '\n' || c == '\r') && content.contains(',') {
            SignatureFormat::Csv
        } else {
            SignatureFormat::Dat
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Stop,
}

/// Checks factor ladders against signature files.
pub struct SignatureMatcher<'a> {
    store: &'a SignatureStore,
    modules: &'a ModuleRegistry,
}

impl<'a> SignatureMatcher<'a> {
    pub fn new(store: &'a SignatureStore, modules: &'a ModuleRegistry) -> Self {
        Self { store, modules }
    }

    /// Check every factor against every file, in order, updating
    /// `ctx.decision`.
    ///
    /// Stops early on a `Whitelist` match. Fails only when a `Run`
    /// signature names an unregistered module.
    pub fn check_factors(
        &self,
        ctx: &mut EvaluationContext,
        files: &[String],
        factors: &[String],
    ) -> Result<(), EvaluationError> {
        let suffix = AddressFamily::tag_suffix(factors.len());

        for (index, name) in files.iter().enumerate() {
            if name.is_empty() {
                continue;
            }
            let Some(content) = self.store.get(name) else {
                trace!(file = %name, "Signature file missing or empty");
                continue;
            };
            let file = SignatureFile {
                index,
                default_tag: format!("{}-{}", name, suffix),
            };

            let flow = match SignatureFormat::detect(name, &content) {
                SignatureFormat::Csv => {
                    file.check_csv(ctx, &content, factors);
                    Flow::Next
                }
                SignatureFormat::Dat => self.check_dat(ctx, &file, &content, factors)?,
            };
            if flow == Flow::Stop {
                break;
            }
        }

        Ok(())
    }

    /// Scan a line-oriented file.
    ///
    /// Every line starting with a factor counts once, including a line
    /// directly after another match for the same factor.
    fn check_dat(
        &self,
        ctx: &mut EvaluationContext,
        file: &SignatureFile,
        content: &str,
        factors: &[String],
    ) -> Result<Flow, EvaluationError> {
        let mut text = format!("\n{}\n", normalize_line_endings(content));
        if let Some(narrowest) = factors.last() {
            text = expand_bare_entries(&text, narrowest, "\n", " ");
        }

        for factor in factors {
            let needle = format!("\n{} ", factor);
            let mut from = 0;

            while let Some(found) = text[from..].find(&needle) {
                let start = from + found + needle.len();
                let Some(end) = text[start..].find('\n').map(|p| start + p) else {
                    break;
                };
                // The terminating newline may begin the next match.
                from = end;

                if let Some(expires) = metadata(&text, start, EXPIRES_MARKER) {
                    if is_expired(expires, ctx.now) {
                        trace!(factor = %factor, expires = %expires, "Signature expired");
                        continue;
                    }
                }

                let tag = metadata(&text, start, TAG_MARKER).unwrap_or(file.default_tag.as_str());
                if ctx.ignores.contains(tag) {
                    trace!(factor = %factor, tag = %tag, "Signature ignored");
                    continue;
                }

                if let Some(block) = override_block(&text, start) {
                    match document::parse(block) {
                        Ok(overrides) => {
                            let applied = ctx.toggles.apply_overrides(&overrides);
                            debug!(factor = %factor, applied, "Override block applied");
                        }
                        Err(e) => {
                            warn!(factor = %factor, tag = %tag, error = %e, "Ignoring malformed override block");
                        }
                    }
                }

                let location = file.location(tag, text[..start].matches('\n').count());
                let (category, signature) = split_category(&text[start..end]);

                match category {
                    "Run" => self.run_module(ctx, signature, factors, factor)?,
                    "Whitelist" => {
                        debug!(factor = %factor, location = %location, "Whitelisted");
                        ctx.decision.clear();
                        ctx.whitelisted = true;
                        return Ok(Flow::Stop);
                    }
                    "Greylist" => {
                        debug!(factor = %factor, location = %location, "Greylisted");
                        ctx.decision.clear();
                        return Ok(Flow::Next);
                    }
                    "Deny" => {
                        let reason = DenyReason::parse(signature);
                        if !deny_enabled(&ctx.toggles, &reason) {
                            trace!(factor = %factor, reason = %reason.short(), "Category disabled");
                            continue;
                        }
                        ctx.decision.deny(
                            reason.message(),
                            &format!("{}{}", reason.short(), location),
                            factor,
                            1,
                        );
                        debug!(factor = %factor, reason = %reason.short(), location = %location, "Signature matched");
                    }
                    other => {
                        trace!(factor = %factor, category = %other, "Unknown signature category");
                    }
                }
            }
        }

        Ok(Flow::Next)
    }

    fn run_module(
        &self,
        ctx: &mut EvaluationContext,
        name: &str,
        factors: &[String],
        factor: &str,
    ) -> Result<(), EvaluationError> {
        let module = self
            .modules
            .get(name)
            .ok_or_else(|| EvaluationError::MissingModule {
                name: name.to_string(),
            })?;

        if !ctx.modules_run.insert(name.to_string()) {
            trace!(module = %name, "Module already run for this evaluation");
            return Ok(());
        }

        let delta = module.evaluate(&ModuleContext {
            address: &ctx.address,
            factors,
            factor,
            toggles: &ctx.toggles,
            now: ctx.now,
            decision: &ctx.decision,
        });
        if delta.is_empty() {
            trace!(module = %name, factor = %factor, "Module made no changes");
            return Ok(());
        }
        debug!(module = %name, factor = %factor, actions = delta.actions().len(), "Module evaluated");
        delta.apply(&mut ctx.decision);
        Ok(())
    }
}

/// Per-file details used in the why-blocked location text.
struct SignatureFile {
    index: usize,
    default_tag: String,
}

impl SignatureFile {
    fn location(&self, tag: &str, line: usize) -> String {
        format!(" (\"{}\", L{}:F{})", tag, line, self.index)
    }

    fn check_csv(&self, ctx: &mut EvaluationContext, content: &str, factors: &[String]) {
        let mut text = format!(",{},", content);
        if let Some(narrowest) = factors.last() {
            text = expand_bare_entries(&text, narrowest, ",", ",");
        }
        let reason = DenyReason::Generic;
        let location = self.location(&self.default_tag, 0);

        for factor in factors {
            let hits = text.matches(&format!(",{},", factor)).count();
            if hits == 0 {
                continue;
            }
            if !ctx.toggles.block_generic {
                trace!(factor = %factor, "Generic blocking disabled");
                continue;
            }
            ctx.decision.deny(
                reason.message(),
                &format!("{}{}", reason.short(), location),
                factor,
                hits as i64,
            );
            debug!(factor = %factor, hits, location = %location, "CSV signature matched");
        }
    }
}

/// Rewrite entries spelled as a bare address to the narrowest factor.
fn expand_bare_entries(text: &str, narrowest: &str, lead: &str, trail: &str) -> String {
    let bare = bare_address(narrowest);
    if bare == narrowest {
        return text.to_string();
    }
    let from = format!("{}{}{}", lead, bare, trail);
    if !text.contains(&from) {
        return text.to_string();
    }
    text.replace(&from, &format!("{}{}{}", lead, narrowest, trail))
}

/// Value of a metadata line in the same paragraph as the signature at
/// `start`.
fn metadata<'t>(text: &'t str, start: usize, marker: &str) -> Option<&'t str> {
    let at = start + text[start..].find(marker)?;
    if text[start..=at].contains(PARAGRAPH_BREAK) {
        return None;
    }
    let value_start = at + marker.len();
    let value_end = value_start + text[value_start..].find('\n')?;
    Some(&text[value_start..value_end])
}

/// Body of a `---` fenced block in the same paragraph as the signature at
/// `start`, running to the next blank line.
fn override_block(text: &str, start: usize) -> Option<&str> {
    let at = start + text[start..].find(FENCE)?;
    if text[start..=at].contains(PARAGRAPH_BREAK) {
        return None;
    }
    let end = at + 1 + text[at + 1..].find(PARAGRAPH_BREAK)?;
    Some(text.get(at + FENCE.len()..end).unwrap_or(""))
}

/// Split a signature into its category and the rest. A line without a
/// leading category word is its own category.
fn split_category(line: &str) -> (&str, &str) {
    match line.split_once(' ') {
        Some((category, signature)) if !category.is_empty() => (category, signature),
        _ => (line, line),
    }
}

fn deny_enabled(toggles: &SignatureToggles, reason: &DenyReason) -> bool {
    match reason {
        DenyReason::Bogon => toggles.block_bogons,
        DenyReason::Cloud => toggles.block_cloud,
        DenyReason::Generic => toggles.block_generic,
        DenyReason::Proxy => toggles.block_proxies,
        DenyReason::Spam => toggles.block_spam,
        DenyReason::Custom(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionDelta;
    use crate::factors::{expand_ipv4, expand_ipv6};
    use crate::modules::ExtensionModule;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    const ADDR: &str = "192.168.1.5";

    fn vault(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    fn context(address: &str) -> EvaluationContext {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        EvaluationContext::new(address, now, SignatureToggles::default(), IgnoreSet::new())
    }

    fn names(files: &[&str]) -> Vec<String> {
        files.iter().map(|f| f.to_string()).collect()
    }

    fn check(
        dir: &TempDir,
        modules: &ModuleRegistry,
        ctx: &mut EvaluationContext,
        files: &[&str],
    ) -> Result<(), EvaluationError> {
        let store = SignatureStore::new(dir.path());
        let factors = expand_ipv4(&ctx.address).unwrap();
        SignatureMatcher::new(&store, modules).check_factors(ctx, &names(files), &factors)
    }

    fn check_v4(files: &[(&str, &str)], ctx: &mut EvaluationContext) {
        let dir = vault(files);
        let order: Vec<&str> = files.iter().map(|(name, _)| *name).collect();
        check(&dir, &ModuleRegistry::new(), ctx, &order).unwrap();
    }

    struct Counter {
        calls: Arc<AtomicUsize>,
    }

    impl ExtensionModule for Counter {
        fn evaluate(&self, ctx: &ModuleContext<'_>) -> DecisionDelta {
            self.calls.fetch_add(1, Ordering::SeqCst);
            DecisionDelta::new().trigger("Counted", None, ctx.factor)
        }
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(SignatureFormat::detect("list.csv", "1.0.0.0/8,2.0.0.0/8"), SignatureFormat::Csv);
        assert_eq!(SignatureFormat::detect("LIST.CSV", "1.0.0.0/8,2.0.0.0/8"), SignatureFormat::Csv);
        assert_eq!(SignatureFormat::detect("list.dat", "1.0.0.0/8,2.0.0.0/8"), SignatureFormat::Dat);
        assert_eq!(SignatureFormat::detect("list.csv", "1.0.0.0/8,\n2.0.0.0/8"), SignatureFormat::Dat);
        assert_eq!(SignatureFormat::detect("list.csv", "1.0.0.0/8"), SignatureFormat::Dat);
    }

    #[test]
    fn test_deny_generic() {
        let mut ctx = context(ADDR);
        check_v4(&[("ipv4.dat", "192.168.1.0/24 Deny Generic\n")], &mut ctx);

        assert_eq!(ctx.decision.signature_count, 1);
        assert!(ctx.decision.is_blocked());
        assert_eq!(ctx.decision.reason_message, DenyReason::Generic.message());
        assert_eq!(ctx.decision.signatures, "192.168.1.0/24");
        assert_eq!(ctx.decision.why_reason, r#"Generic ("ipv4.dat-IPv4", L1:F0)"#);
    }

    #[test]
    fn test_whitelist_stops_everything() {
        let dir = vault(&[
            ("deny.dat", "192.168.1.0/24 Deny Generic\n"),
            ("allow.dat", "192.168.0.0/16 Whitelist\n192.168.1.0/24 Deny Spam\n"),
            ("later.dat", "192.168.1.0/24 Deny Spam\n"),
        ]);
        let store = SignatureStore::new(dir.path());
        let modules = ModuleRegistry::new();
        let factors = expand_ipv4(ADDR).unwrap();
        let mut ctx = context(ADDR);

        SignatureMatcher::new(&store, &modules)
            .check_factors(&mut ctx, &names(&["deny.dat", "allow.dat", "later.dat"]), &factors)
            .unwrap();

        assert!(ctx.whitelisted);
        assert_eq!(ctx.decision, BlockDecision::default());
        assert!(store.is_cached("allow.dat"));
        assert!(!store.is_cached("later.dat"));
    }

    #[test]
    fn test_greylist_stops_current_file_only() {
        let mut ctx = context(ADDR);
        check_v4(
            &[
                ("first.dat", "192.168.1.0/24 Deny Spam\n"),
                ("grey.dat", "192.168.0.0/16 Greylist\n192.168.1.0/24 Deny Generic\n"),
                ("last.dat", "192.168.1.5/32 Deny Cloud\n"),
            ],
            &mut ctx,
        );

        assert!(!ctx.whitelisted);
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.signatures, "192.168.1.5/32");
        assert_eq!(ctx.decision.reason_message, DenyReason::Cloud.message());
    }

    #[test]
    fn test_ignored_tag() {
        let mut ctx = context(ADDR);
        ctx.ignores.insert("internal-test".to_string());
        check_v4(
            &[("ipv4.dat", "192.168.1.0/24 Deny Generic\nTag: internal-test\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision, BlockDecision::default());
    }

    #[test]
    fn test_ignored_default_tag() {
        let mut ctx = context(ADDR);
        ctx.ignores.insert("ipv4.dat-IPv4".to_string());
        check_v4(&[("ipv4.dat", "192.168.1.0/24 Deny Generic\n")], &mut ctx);
        assert_eq!(ctx.decision.signature_count, 0);
    }

    #[test]
    fn test_tag_in_why_reason() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "# header\n192.168.1.0/24 Deny Spam\nTag: spammers\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.why_reason, r#"Spam risk ("spammers", L2:F0)"#);
    }

    #[test]
    fn test_expired_signature_skipped() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "192.168.1.0/24 Deny Generic\nExpires: 2000-01-01\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 0);

        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "192.168.1.0/24 Deny Generic\nExpires: 2030-01-01\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 1);
    }

    #[test]
    fn test_metadata_limited_to_paragraph() {
        let mut ctx = context(ADDR);
        ctx.ignores.insert("other".to_string());
        check_v4(
            &[(
                "ipv4.dat",
                "192.168.1.0/24 Deny Generic\n\n10.0.0.0/8 Deny Spam\nExpires: 2000-01-01\nTag: other\n",
            )],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 1);
    }

    #[test]
    fn test_csv_counts_every_occurrence() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("list.csv", "192.168.1.0/24,10.0.0.0/8,192.168.1.0/24")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 2);
        assert_eq!(ctx.decision.signatures, "192.168.1.0/24");
        assert_eq!(ctx.decision.why_reason, r#"Generic ("list.csv-IPv4", L0:F0)"#);
    }

    #[test]
    fn test_csv_respects_generic_toggle() {
        let mut ctx = context(ADDR);
        ctx.toggles.block_generic = false;
        check_v4(&[("list.csv", "192.168.1.0/24,10.0.0.0/8")], &mut ctx);
        assert_eq!(ctx.decision.signature_count, 0);
    }

    #[test]
    fn test_csv_content_in_dat_file_does_not_match() {
        let mut ctx = context(ADDR);
        check_v4(&[("list.dat", "10.0.0.0/8,192.168.1.0/24")], &mut ctx);
        assert_eq!(ctx.decision.signature_count, 0);
    }

    #[test]
    fn test_bare_address_matches_narrowest() {
        let mut ctx = context(ADDR);
        check_v4(&[("ipv4.dat", "192.168.1.5 Deny Spam\n")], &mut ctx);
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.signatures, "192.168.1.5/32");

        let mut ctx = context(ADDR);
        check_v4(&[("list.csv", "10.0.0.0/8,192.168.1.5")], &mut ctx);
        assert_eq!(ctx.decision.signatures, "192.168.1.5/32");
    }

    #[test]
    fn test_consecutive_lines_for_same_factor() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "192.168.1.0/24 Deny Generic\n192.168.1.0/24 Deny Spam\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 2);
        assert_eq!(ctx.decision.reason_message, DenyReason::Spam.message());
        assert_eq!(ctx.decision.signatures, "192.168.1.0/24, 192.168.1.0/24");
    }

    #[test]
    fn test_custom_deny_message() {
        let mut ctx = context(ADDR);
        check_v4(&[("ipv4.dat", "192.168.1.0/24 Deny Known botnet\n")], &mut ctx);
        assert_eq!(ctx.decision.reason_message, "Known botnet");
        assert_eq!(ctx.decision.why_reason, r#"Known botnet ("ipv4.dat-IPv4", L1:F0)"#);
    }

    #[test]
    fn test_disabled_categories_skip() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "192.168.0.0/16 Deny Bogon\n192.168.1.0/24 Deny Proxy\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 0);

        let mut ctx = context(ADDR);
        ctx.toggles = SignatureToggles::all();
        check_v4(
            &[("ipv4.dat", "192.168.0.0/16 Deny Bogon\n192.168.1.0/24 Deny Proxy\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 2);
        assert_eq!(ctx.decision.why_reason.matches("F0)").count(), 2);
    }

    #[test]
    fn test_unknown_category_ignored() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "192.168.1.0/24 Block Generic\n192.168.1.5/32 Whatever\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision, BlockDecision::default());
        assert!(!ctx.whitelisted);
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("ipv4.dat", "10.0.0.0/8 Deny Spam\r\n192.168.1.0/24 Deny Spam\r\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.why_reason, r#"Spam risk ("ipv4.dat-IPv4", L2:F0)"#);
    }

    #[test]
    fn test_file_index_in_location() {
        let mut ctx = context(ADDR);
        check_v4(
            &[("a.dat", "10.0.0.0/8 Deny Spam\n"), ("b.dat", "192.168.1.0/24 Deny Spam\n")],
            &mut ctx,
        );
        assert_eq!(ctx.decision.why_reason, r#"Spam risk ("b.dat-IPv4", L1:F1)"#);
    }

    #[test]
    fn test_missing_and_blank_files_skipped() {
        let dir = vault(&[("ipv4.dat", "192.168.1.0/24 Deny Generic\n")]);
        let mut ctx = context(ADDR);
        check(&dir, &ModuleRegistry::new(), &mut ctx, &["", "missing.dat", "ipv4.dat"]).unwrap();
        assert_eq!(ctx.decision.why_reason, r#"Generic ("ipv4.dat-IPv4", L1:F2)"#);
    }

    #[test]
    fn test_override_block_enables_category() {
        let mut ctx = context(ADDR);
        check_v4(
            &[(
                "ipv4.dat",
                "192.168.0.0/16 Deny Bogon\n---\nsignatures:\n  block_bogons: true\n\n",
            )],
            &mut ctx,
        );
        assert!(ctx.toggles.block_bogons);
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.reason_message, DenyReason::Bogon.message());
    }

    #[test]
    fn test_missing_run_module_aborts() {
        let dir = vault(&[("ipv4.dat", "192.168.1.0/24 Run asn-lookup\n")]);
        let mut ctx = context(ADDR);
        let result = check(&dir, &ModuleRegistry::new(), &mut ctx, &["ipv4.dat"]);
        assert_eq!(
            result,
            Err(EvaluationError::MissingModule {
                name: "asn-lookup".to_string()
            })
        );
    }

    #[test]
    fn test_run_module_once_per_evaluation() {
        let dir = vault(&[(
            "ipv4.dat",
            "192.168.0.0/16 Run counter\n192.168.1.0/24 Run counter\n",
        )]);
        let calls = Arc::new(AtomicUsize::new(0));
        let modules = ModuleRegistry::new().with(
            "counter",
            Counter {
                calls: calls.clone(),
            },
        );
        let mut ctx = context(ADDR);
        check(&dir, &modules, &mut ctx, &["ipv4.dat"]).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.signatures, "192.168.0.0/16");
        assert_eq!(ctx.decision.why_reason, "Counted");
    }

    #[test]
    fn test_ipv6_default_tag() {
        let dir = vault(&[("ipv6.dat", "2001:db8::/32 Deny Generic\n")]);
        let store = SignatureStore::new(dir.path());
        let modules = ModuleRegistry::new();
        let factors = expand_ipv6("2001:db8::1").unwrap();
        let mut ctx = context("2001:db8::1");

        SignatureMatcher::new(&store, &modules)
            .check_factors(&mut ctx, &names(&["ipv6.dat"]), &factors)
            .unwrap();
        assert_eq!(ctx.decision.signature_count, 1);
        assert_eq!(ctx.decision.why_reason, r#"Generic ("ipv6.dat-IPv6", L1:F0)"#);
    }

    #[test]
    fn test_split_category() {
        assert_eq!(split_category("Deny Known botnet"), ("Deny", "Known botnet"));
        assert_eq!(split_category("Whitelist"), ("Whitelist", "Whitelist"));
        assert_eq!(split_category(" Deny"), (" Deny", " Deny"));
    }

    #[test]
    fn test_metadata_lookup() {
        let text = "\n1.0.0.0/8 Deny Spam\nTag: a\nExpires: 2030\n\nTag: b\n";
        let start = "\n1.0.0.0/8 ".len();
        assert_eq!(metadata(text, start, TAG_MARKER), Some("a"));
        assert_eq!(metadata(text, start, EXPIRES_MARKER), Some("2030"));
        assert_eq!(metadata(text, start, FENCE), None);
    }
}
