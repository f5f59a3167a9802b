//! Style and theme combination checks.
//!
//! Validation answers two questions about a requested `(style, theme)` pair:
//!
//! 1. Do both names exist? If not, the answer is a [`LookupError`] of the
//!    matching kind, carrying every registered name of that kind.
//! 2. Is the pairing advisable? The [`CompatibilityPolicy`] is a deny-list
//!    of [`PairingRule`]s; a match yields [`Verdict::Discouraged`] with the
//!    rule's reason, anything else is [`Verdict::Valid`].
//!
//! A discouraged pairing is guidance, not a block. Callers that want it to
//! be fatal use [`Validator::validate_strict`].
//!
//! The style is checked before the theme, so a request where both are
//! unknown reports the style.

use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::{Error, LookupError};
use crate::metadata::normalize_name;
use crate::registry::Registry;

/// Outcome of checking a known pair against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Discouraged(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

/// A resolved pair plus its verdict.
#[derive(Debug, Clone)]
pub struct Validation<'r> {
    pub style: &'r Descriptor,
    pub theme: &'r Descriptor,
    pub verdict: Verdict,
}

/// One deny-list entry. `*` matches any name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRule {
    pub style: String,
    pub theme: String,
    pub reason: String,
}

impl PairingRule {
    pub fn new(
        style: impl Into<String>,
        theme: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            style: style.into(),
            theme: theme.into(),
            reason: reason.into(),
        }
    }

    /// Whether the rule applies to the (already normalized) pair.
    pub fn matches(&self, style: &str, theme: &str) -> bool {
        pattern_matches(&self.style, style) && pattern_matches(&self.theme, theme)
    }
}

fn pattern_matches(pattern: &str, name: &str) -> bool {
    pattern == "*" || normalize_name(pattern) == name
}

/// Declarative list of discouraged pairings.
///
/// Anything not listed is allowed. The first matching rule supplies the
/// reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityPolicy {
    rules: Vec<PairingRule>,
}

impl Default for CompatibilityPolicy {
    /// The built-in rules.
    fn default() -> Self {
        Self {
            rules: vec![PairingRule::new(
                "story",
                "dark",
                "long-form serif text on a high-contrast dark page is tiring to read",
            )],
        }
    }
}

impl CompatibilityPolicy {
    /// A policy with no rules: every known pair is valid.
    pub fn permissive() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule after the existing ones.
    pub fn with_rule(mut self, rule: PairingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several rules after the existing ones.
    pub fn extend(&mut self, rules: impl IntoIterator<Item = PairingRule>) {
        self.rules.extend(rules);
    }

    pub fn rules(&self) -> &[PairingRule] {
        &self.rules
    }

    /// Classifies a pair of registry names.
    pub fn classify(&self, style: &str, theme: &str) -> Verdict {
        let style = normalize_name(style);
        let theme = normalize_name(theme);
        match self.rules.iter().find(|rule| rule.matches(&style, &theme)) {
            Some(rule) => Verdict::Discouraged(rule.reason.clone()),
            None => Verdict::Valid,
        }
    }
}

/// Checks combinations against a registry and a policy.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    policy: CompatibilityPolicy,
}

impl Validator {
    pub fn new(policy: CompatibilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CompatibilityPolicy {
        &self.policy
    }

    /// Resolves both names and classifies the pair.
    ///
    /// # Errors
    ///
    /// [`LookupError::StyleNotFound`] or [`LookupError::ThemeNotFound`], each
    /// with the sorted names of its kind.
    pub fn validate<'r>(
        &self,
        registry: &'r Registry,
        style: &str,
        theme: &str,
    ) -> Result<Validation<'r>, LookupError> {
        let style = registry.require_style(style)?;
        let theme = registry.require_theme(theme)?;
        let verdict = self.policy.classify(&style.name, &theme.name);

        if let Verdict::Discouraged(reason) = &verdict {
            log::warn!(
                "combination '{}' + '{}' is discouraged: {}",
                style.name,
                theme.name,
                reason
            );
        }

        Ok(Validation {
            style,
            theme,
            verdict,
        })
    }

    /// Like [`validate`](Self::validate), but a discouraged pair is an error.
    pub fn validate_strict<'r>(
        &self,
        registry: &'r Registry,
        style: &str,
        theme: &str,
    ) -> Result<Validation<'r>, Error> {
        let validation = self.validate(registry, style, theme)?;
        match &validation.verdict {
            Verdict::Valid => Ok(validation),
            Verdict::Discouraged(reason) => Err(Error::Discouraged {
                style: validation.style.name.clone(),
                theme: validation.theme.name.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Validates with the built-in policy.
pub fn validate<'r>(
    registry: &'r Registry,
    style: &str,
    theme: &str,
) -> Result<Validation<'r>, LookupError> {
    Validator::default().validate(registry, style, theme)
}
