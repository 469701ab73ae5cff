//! IP signature filtering engine.
//!
//! Matches client addresses against CIDR signature files and decides
//! whether a request should be blocked.
//!
//! # Features
//!
//! - **Factor Expansion** - Every address becomes a ladder of enclosing CIDRs (32 for IPv4, 128 for IPv6)
//! - **Signature Files** - Line-oriented files with `Deny`, `Whitelist`, `Greylist` and `Run` entries, or single-line CSV lists
//! - **Metadata** - Per-signature `Tag:` and `Expires:` lines, plus `---` blocks that override category toggles
//! - **Ignore Directives** - Skip every signature carrying a tag listed in the ignore file
//! - **Extension Modules** - `Run` entries dispatch to registered [`ExtensionModule`]s
//! - **Fail-Open/Closed** - Configurable verdict when an evaluation aborts
//!
//! # Example Configuration
//!
//! ```yaml
//! settings:
//!   enabled: true
//!   fail_action: allow
//!
//! signatures:
//!   vault: "${IPSIG_VAULT}"
//!   ipv4:
//!     - ipv4.dat
//!     - ipv4_custom.dat
//!   ipv6:
//!     - ipv6.dat
//!   block_bogons: false
//!   block_proxies: true
//! ```

pub mod config;
pub mod decision;
pub mod document;
pub mod engine;
pub mod error;
pub mod expires;
pub mod factors;
pub mod ignore;
pub mod matcher;
pub mod modules;
pub mod store;

pub use config::Config;
pub use decision::{BlockDecision, DecisionDelta, Verdict};
pub use engine::{Engine, Evaluation};
pub use error::{EvaluationError, ParseError};
pub use modules::{ExtensionModule, ModuleContext, ModuleRegistry};
pub use store::SignatureStore;
