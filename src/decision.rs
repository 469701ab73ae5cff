//! Block decision accumulator.

use serde::Serialize;

/// Message used when a trigger carries no message of its own.
pub const DEFAULT_DENIED: &str = "Access Denied!";

/// Final allow/deny outcome of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// No net signature matched.
    Allow,
    /// At least one net signature matched.
    Block,
}

/// Named `Deny` reasons, each gated by a configuration toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenyReason {
    Bogon,
    Cloud,
    Generic,
    Proxy,
    Spam,
    /// Any other text, used verbatim as the message.
    Custom(String),
}

impl DenyReason {
    pub fn parse(signature: &str) -> Self {
        match signature {
            "Bogon" => DenyReason::Bogon,
            "Cloud" => DenyReason::Cloud,
            "Generic" => DenyReason::Generic,
            "Proxy" => DenyReason::Proxy,
            "Spam" => DenyReason::Spam,
            other => DenyReason::Custom(other.to_string()),
        }
    }

    /// Message shown to the blocked client.
    pub fn message(&self) -> &str {
        match self {
            DenyReason::Bogon => "Access to this page was denied because your IP address is recognised as a bogon address, and connecting from bogons to this website is not permitted by the website owner.",
            DenyReason::Cloud => "Access to this page was denied because your IP address is recognised as belonging to a cloud service, and connecting to this website from cloud services is not permitted by the website owner.",
            DenyReason::Generic => "Access to this page was denied because your IP address belongs to a network listed in a blacklist used by this website.",
            DenyReason::Proxy => "Access to this page was denied because your IP address is recognised as belonging to a proxy service, and connecting to this website from proxy services is not permitted by the website owner.",
            DenyReason::Spam => "Access to this page was denied because your IP address belongs to a network considered high-risk for spam.",
            DenyReason::Custom(text) => text,
        }
    }

    /// Short form used in the why-blocked log field.
    pub fn short(&self) -> &str {
        match self {
            DenyReason::Bogon => "Bogon IP",
            DenyReason::Cloud => "Cloud service",
            DenyReason::Generic => "Generic",
            DenyReason::Proxy => "Proxy service",
            DenyReason::Spam => "Spam risk",
            DenyReason::Custom(text) => text,
        }
    }
}

/// Decision state for one evaluation.
///
/// `why_reason` and `signatures` are `", "`-joined lists that only grow
/// until a whitelist or greylist clears everything at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlockDecision {
    pub reason_message: String,
    pub why_reason: String,
    pub signatures: String,
    pub signature_count: i64,
}

impl BlockDecision {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reason(&mut self, reason: &str) {
        append(&mut self.why_reason, reason);
    }

    pub fn add_signature(&mut self, signature: &str) {
        append(&mut self.signatures, signature);
    }

    /// Record `count` matches of one signature.
    pub fn deny(&mut self, message: &str, reason: &str, signature: &str, count: i64) {
        self.reason_message = message.to_string();
        self.add_reason(reason);
        self.add_signature(signature);
        self.signature_count += count;
    }

    /// Reverse one match without touching the message.
    pub fn bypass(&mut self, reason: &str, signature: &str) {
        self.add_reason(reason);
        self.add_signature(signature);
        self.signature_count -= 1;
    }

    /// Reset every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_blocked(&self) -> bool {
        self.signature_count > 0
    }

    pub fn verdict(&self) -> Verdict {
        if self.is_blocked() {
            Verdict::Block
        } else {
            Verdict::Allow
        }
    }
}

fn append(list: &mut String, item: &str) {
    if !list.is_empty() {
        list.push_str(", ");
    }
    list.push_str(item);
}

/// One change requested by an extension module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaAction {
    /// Count a match. Without a message, [`DEFAULT_DENIED`] is shown.
    Trigger {
        reason: String,
        message: Option<String>,
        signature: String,
    },
    /// Reverse a match.
    Bypass { reason: String, signature: String },
}

/// Changes an extension module wants applied to the decision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionDelta {
    actions: Vec<DeltaAction>,
}

impl DecisionDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trigger.
    pub fn trigger(mut self, reason: &str, message: Option<&str>, signature: &str) -> Self {
        self.actions.push(DeltaAction::Trigger {
            reason: reason.to_string(),
            message: message.map(str::to_string),
            signature: signature.to_string(),
        });
        self
    }

    /// Add a bypass.
    pub fn bypass(mut self, reason: &str, signature: &str) -> Self {
        self.actions.push(DeltaAction::Bypass {
            reason: reason.to_string(),
            signature: signature.to_string(),
        });
        self
    }

    pub fn actions(&self) -> &[DeltaAction] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Apply every action in order.
    pub fn apply(&self, decision: &mut BlockDecision) {
        for action in &self.actions {
            match action {
                DeltaAction::Trigger {
                    reason,
                    message,
                    signature,
                } => decision.deny(
                    message.as_deref().unwrap_or(DEFAULT_DENIED),
                    reason,
                    signature,
                    1,
                ),
                DeltaAction::Bypass { reason, signature } => decision.bypass(reason, signature),
            }
        }
    }
}
