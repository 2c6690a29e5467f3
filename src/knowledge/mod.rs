//! Knowledge bases: named, versioned rule sets.
//!
//! A [`KnowledgeBase`] is validated and indexed once and then shared
//! immutably. Sessions run against a [`KnowledgeBaseInstance`], which adds
//! the per-session retraction flags. The [`KnowledgeLibrary`] keeps
//! knowledge bases by name and version.

/// Registry of knowledge bases keyed by name and version.
pub mod library;

pub use library::KnowledgeLibrary;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::rule::Rule;

/// The serializable form of a knowledge base.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBaseDefinition {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

struct Inner {
    name: String,
    version: String,
    rules: Vec<Rule>,
    /// Rule indices by descending salience, ties in declaration order.
    order: Vec<usize>,
    index: HashMap<String, usize>,
    regexes: HashMap<String, Regex>,
    fingerprint: String,
}

/// A validated, immutable, cheaply cloneable rule set.
///
/// # Example
/// ```
/// use kyrorules::{Expr, KnowledgeBase, Rule};
///
/// let rule = Rule::builder("IsPayoutAmountTooHigh")
///     .salience(10)
///     .when(Expr::field("Payout.Amount").greater_than(1_000_000))
///     .assign("Result.IsPayoutAmountTooHighFlagged", true)
///     .retract_self()
///     .build()
///     .unwrap();
///
/// let kb = KnowledgeBase::new("PayoutRules", "0.1.1", vec![rule]).unwrap();
/// assert_eq!(kb.len(), 1);
/// let instance = kb.new_instance();
/// assert!(!instance.is_retracted("IsPayoutAmountTooHigh"));
/// ```
#[derive(Clone)]
pub struct KnowledgeBase {
    inner: Arc<Inner>,
}

impl KnowledgeBase {
    /// Validates and indexes `rules`.
    ///
    /// Fails with `ValidationError::DuplicateRuleName` on a name collision,
    /// `ValidationError::UnknownRetractTarget` if an action retracts a rule
    /// that is not part of this knowledge base, and with any error from
    /// [`Rule::validate`].
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        rules: Vec<Rule>,
    ) -> Result<Self, ValidationError> {
        let name = name.into().trim().to_string();
        let version = version.into().trim().to_string();
        if name.is_empty() {
            return Err(ValidationError::MissingField {
                field: "knowledge base name".to_string(),
            });
        }
        if version.is_empty() {
            return Err(ValidationError::MissingField {
                field: "knowledge base version".to_string(),
            });
        }

        let mut index = HashMap::with_capacity(rules.len());
        for (i, rule) in rules.iter().enumerate() {
            rule.validate()?;
            if index.insert(rule.name.clone(), i).is_some() {
                return Err(ValidationError::DuplicateRuleName {
                    knowledge_base: name,
                    name: rule.name.clone(),
                });
            }
        }

        let mut regexes = HashMap::new();
        for rule in &rules {
            for target in rule.retract_targets() {
                if !index.contains_key(target) {
                    return Err(ValidationError::UnknownRetractTarget {
                        rule: rule.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
            for expr in rule.expressions() {
                for pattern in expr.regex_literals() {
                    if regexes.contains_key(pattern) {
                        continue;
                    }
                    let re = Regex::new(pattern).map_err(|e| ValidationError::InvalidRegex {
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    })?;
                    regexes.insert(pattern.to_string(), re);
                }
            }
        }

        let mut order: Vec<usize> = (0..rules.len()).collect();
        order.sort_by_key(|&i| Reverse(rules[i].salience));

        let fingerprint = fingerprint(&name, &version, &rules)?;

        Ok(Self {
            inner: Arc::new(Inner {
                name,
                version,
                rules,
                order,
                index,
                regexes,
                fingerprint,
            }),
        })
    }

    /// Builds a knowledge base from its serializable definition.
    pub fn from_definition(definition: KnowledgeBaseDefinition) -> Result<Self, ValidationError> {
        Self::new(definition.name, definition.version, definition.rules)
    }

    /// Builds a knowledge base from the JSON form of
    /// [`KnowledgeBaseDefinition`].
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let definition: KnowledgeBaseDefinition =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidDefinition {
                reason: e.to_string(),
            })?;
        Self::from_definition(definition)
    }

    /// Returns the serializable definition.
    #[must_use]
    pub fn to_definition(&self) -> KnowledgeBaseDefinition {
        KnowledgeBaseDefinition {
            name: self.inner.name.clone(),
            version: self.inner.version.clone(),
            rules: self.inner.rules.clone(),
        }
    }

    /// Creates an independent session state with no rules retracted.
    #[must_use]
    pub fn new_instance(&self) -> KnowledgeBaseInstance {
        KnowledgeBaseInstance {
            kb: self.clone(),
            retracted: vec![false; self.inner.rules.len()],
        }
    }

    /// Knowledge base name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Knowledge base version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.inner.version
    }

    /// blake3 hex digest of the definition; equal rule sets hash equally.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.inner.fingerprint
    }

    /// Rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.inner.rules
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Rule> {
        self.inner.index.get(name).map(|&i| &self.inner.rules[i])
    }

    /// Rules in firing priority order.
    pub fn by_salience(&self) -> impl Iterator<Item = &Rule> {
        self.inner.order.iter().map(|&i| &self.inner.rules[i])
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.rules.len()
    }

    /// Returns true if the knowledge base has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.rules.is_empty()
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.inner.order
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.inner.index.get(name).copied()
    }

    pub(crate) fn regexes(&self) -> &HashMap<String, Regex> {
        &self.inner.regexes
    }

    /// Returns true if both handles share the same definitions.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

fn fingerprint(name: &str, version: &str, rules: &[Rule]) -> Result<String, ValidationError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(version.as_bytes());
    hasher.update(&[0]);
    let body = serde_json::to_vec(rules).map_err(|e| ValidationError::InvalidDefinition {
        reason: e.to_string(),
    })?;
    hasher.update(&body);
    Ok(hasher.finalize().to_hex().to_string())
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("name", &self.inner.name)
            .field("version", &self.inner.version)
            .field("rules", &self.inner.rules.len())
            .field("fingerprint", &self.inner.fingerprint)
            .finish()
    }
}

/// Per-session view of a knowledge base: the shared rules plus retraction
/// flags.
///
/// Instances are independent of each other, so sessions built from the same
/// knowledge base can run on separate threads.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseInstance {
    kb: KnowledgeBase,
    retracted: Vec<bool>,
}

impl KnowledgeBaseInstance {
    /// The shared definitions.
    #[must_use]
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Returns true if the named rule is retracted. Unknown names are not.
    #[must_use]
    pub fn is_retracted(&self, name: &str) -> bool {
        self.kb
            .index_of(name)
            .is_some_and(|i| self.retracted[i])
    }

    /// Retracts the named rule. Returns false if no such rule exists.
    pub fn retract(&mut self, name: &str) -> bool {
        match self.kb.index_of(name) {
            Some(i) => {
                self.retracted[i] = true;
                true
            }
            None => false,
        }
    }

    /// Clears every retraction.
    pub fn reset(&mut self) {
        self.retracted.fill(false);
    }

    /// Names of retracted rules in declaration order.
    #[must_use]
    pub fn retracted(&self) -> Vec<&str> {
        self.kb
            .rules()
            .iter()
            .zip(&self.retracted)
            .filter(|(_, retracted)| **retracted)
            .map(|(rule, _)| rule.name.as_str())
            .collect()
    }

    /// Non-retracted rule indices in firing priority order.
    pub(crate) fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.kb
            .order()
            .iter()
            .copied()
            .filter(move |&i| !self.retracted[i])
    }

    pub(crate) fn retract_index(&mut self, i: usize) {
        self.retracted[i] = true;
    }
}
