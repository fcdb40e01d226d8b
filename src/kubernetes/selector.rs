// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Equality label selectors evaluated against cached resources
//!
//! Mirrors the subset of Kubernetes label selector semantics the cache needs:
//! a conjunction of `key=value` requirements. Keys and values are validated with
//! the same rules the API server applies, so a selector that would be rejected
//! remotely is rejected here too.
//!
//! ## Validation rules
//!
//! - Key: optional DNS subdomain prefix (max 253 chars) followed by `/`, then a
//!   name of at most 63 chars: alphanumerics, `-`, `_`, `.`, starting and ending
//!   with an alphanumeric
//! - Value: empty, or at most 63 chars following the same name rule

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9][-A-Za-z0-9_.]*)?[A-Za-z0-9]$").expect("valid label name regex")
});

static DNS_SUBDOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
        .expect("valid dns subdomain regex")
});

/// Reasons a selector requirement cannot be built
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid label key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
    #[error("invalid label value '{value}': {reason}")]
    InvalidValue { value: String, reason: &'static str },
}

/// A single `key=value` requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    key: String,
    value: String,
}

impl Requirement {
    /// Build an equality requirement, validating key and value
    pub fn equals(key: &str, value: &str) -> Result<Self, SelectorError> {
        validate_key(key)?;
        validate_value(value)?;
        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// A missing label never satisfies an equality requirement
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        labels.get(&self.key) == Some(&self.value)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Conjunction of requirements; the empty selector matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Selector that matches every resource
    pub fn everything() -> Self {
        Self::default()
    }

    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    /// Kubernetes wire format, e.g. `app=nginx,owner=alice`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(|r| r.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

fn validate_key(key: &str) -> Result<(), SelectorError> {
    let invalid = |reason| SelectorError::InvalidKey {
        key: key.to_string(),
        reason,
    };

    let name = match key.split_once('/') {
        Some((prefix, name)) => {
            if prefix.is_empty() {
                return Err(invalid("prefix must not be empty"));
            }
            if prefix.len() > MAX_PREFIX_LEN {
                return Err(invalid("prefix must be no more than 253 characters"));
            }
            if !DNS_SUBDOMAIN_RE.is_match(prefix) {
                return Err(invalid("prefix must be a lowercase DNS subdomain"));
            }
            name
        }
        None => key,
    };

    if name.is_empty() {
        return Err(invalid("name part must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name part must be no more than 63 characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(invalid(
            "name part must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
        ));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), SelectorError> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN {
        return Err(SelectorError::InvalidValue {
            value: value.to_string(),
            reason: "must be no more than 63 characters",
        });
    }
    if !NAME_RE.is_match(value) {
        return Err(SelectorError::InvalidValue {
            value: value.to_string(),
            reason: "must consist of alphanumerics, '-', '_' or '.', and start and end with an alphanumeric",
        });
    }
    Ok(())
}
