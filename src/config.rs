//! Configuration types for the signature engine.

use crate::document::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings.
    #[serde(default)]
    pub settings: Settings,

    /// Signature files and category toggles.
    #[serde(default)]
    pub signatures: SignaturesConfig,
}

/// Global settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Master enable/disable switch.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Verdict when an evaluation aborts.
    #[serde(default)]
    pub fail_action: FailAction,

    /// Log blocked addresses.
    #[serde(default = "default_true")]
    pub log_blocked: bool,

    /// Log allowed addresses.
    #[serde(default)]
    pub log_allowed: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_action: FailAction::default(),
            log_blocked: true,
            log_allowed: false,
        }
    }
}

/// Action to take when an evaluation aborts.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailAction {
    /// Allow the address (fail-open).
    #[default]
    Allow,
    /// Block the address (fail-closed).
    Block,
}

/// Signature file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignaturesConfig {
    /// Directory holding signature files and the ignore file.
    #[serde(default = "default_vault")]
    pub vault: PathBuf,

    /// Ignore directives file, relative to the vault.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,

    /// IPv4 signature files, checked in order.
    #[serde(default = "default_ipv4_files")]
    pub ipv4: Vec<String>,

    /// IPv6 signature files, checked in order.
    #[serde(default = "default_ipv6_files")]
    pub ipv6: Vec<String>,

    /// Category toggles.
    #[serde(flatten)]
    pub toggles: SignatureToggles,
}

impl Default for SignaturesConfig {
    fn default() -> Self {
        Self {
            vault: default_vault(),
            ignore_file: default_ignore_file(),
            ipv4: default_ipv4_files(),
            ipv6: default_ipv6_files(),
            toggles: SignatureToggles::default(),
        }
    }
}

fn default_vault() -> PathBuf {
    PathBuf::from("vault")
}

fn default_ignore_file() -> String {
    "ignore.dat".to_string()
}

fn default_ipv4_files() -> Vec<String> {
    vec!["ipv4.dat".to_string(), "ipv4_custom.dat".to_string()]
}

fn default_ipv6_files() -> Vec<String> {
    vec!["ipv6.dat".to_string(), "ipv6_custom.dat".to_string()]
}

/// Per-category blocking switches for `Deny` signatures.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct SignatureToggles {
    #[serde(default)]
    pub block_bogons: bool,

    #[serde(default = "default_true")]
    pub block_cloud: bool,

    #[serde(default = "default_true")]
    pub block_generic: bool,

    #[serde(default)]
    pub block_proxies: bool,

    #[serde(default = "default_true")]
    pub block_spam: bool,
}

impl Default for SignatureToggles {
    fn default() -> Self {
        Self {
            block_bogons: false,
            block_cloud: true,
            block_generic: true,
            block_proxies: false,
            block_spam: true,
        }
    }
}

impl SignatureToggles {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            block_bogons: true,
            block_cloud: true,
            block_generic: true,
            block_proxies: true,
            block_spam: true,
        }
    }

    /// Apply `signatures:` entries from an override document.
    ///
    /// Unknown keys are ignored. Returns how many toggles were set.
    pub fn apply_overrides(&mut self, overrides: &Value) -> usize {
        let Some(Value::Map(section)) = overrides.get("signatures") else {
            return 0;
        };
        let mut applied = 0;
        for (key, value) in section.iter() {
            let slot = match key.as_str() {
                Some("block_bogons") => &mut self.block_bogons,
                Some("block_cloud") => &mut self.block_cloud,
                Some("block_generic") => &mut self.block_generic,
                Some("block_proxies") => &mut self.block_proxies,
                Some("block_spam") => &mut self.block_spam,
                _ => continue,
            };
            *slot = value.is_truthy();
            applied += 1;
        }
        applied
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let expanded = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let vault = &self.signatures.vault;
        if !vault.is_dir() {
            anyhow::bail!("Vault directory does not exist: {}", vault.display());
        }

        let files = self
            .signatures
            .ipv4
            .iter()
            .chain(&self.signatures.ipv6)
            .chain(std::iter::once(&self.signatures.ignore_file));
        for name in files {
            if !is_vault_relative(name) {
                anyhow::bail!("Signature file must be a plain name inside the vault: {}", name);
            }
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example() -> String {
        r#"# IP signature filter configuration

settings:
  enabled: true
  fail_action: allow           # allow or block when an evaluation aborts
  log_blocked: true
  log_allowed: false

signatures:
  vault: "/etc/ipsig/vault"    # supports ${ENV_VAR} syntax
  ignore_file: ignore.dat
  ipv4:
    - ipv4.dat
    - ipv4_bogons.dat
    - ipv4_custom.dat
  ipv6:
    - ipv6.dat
    - ipv6_custom.dat
  block_bogons: false
  block_cloud: true
  block_generic: true
  block_proxies: false
  block_spam: true
"#
        .to_string()
    }
}

fn is_vault_relative(name: &str) -> bool {
    !name.is_empty()
        && Path::new(name)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid"));

/// Expand environment variables in the format ${VAR_NAME}.
fn expand_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_VAR_PATTERN.captures_iter(content) {
        let var_name = &cap[1];
        let var_value = std::env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
