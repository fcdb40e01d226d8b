// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Cached custom resource representation
//!
//! Only the metadata the cache needs (name, namespace, labels, resourceVersion)
//! is decoded. `spec` and `status` are kept as raw JSON and re-emitted verbatim,
//! so the cache works for any custom resource schema.

use std::collections::BTreeMap;
use std::fmt;

use kube::api::DynamicObject;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Identity of a resource inside one cache instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A custom resource as held by the cache
#[derive(Debug, Clone)]
pub struct Resource {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub resource_version: Option<String>,
    /// Raw `spec` payload, never parsed
    pub spec: Option<Box<RawValue>>,
    /// Raw `status` payload, never parsed
    pub status: Option<Box<RawValue>>,
}

/// Wire shape used for the metadata-only decode
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    api_version: String,
    #[serde(default)]
    kind: String,
    metadata: MetadataView,
    #[serde(default)]
    spec: Option<Box<RawValue>>,
    #[serde(default)]
    status: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataView {
    #[serde(default)]
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
    #[serde(default)]
    resource_version: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeRef<'a> {
    #[serde(skip_serializing_if = "str::is_empty")]
    api_version: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    kind: &'a str,
    metadata: MetadataRef<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    spec: Option<&'a RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<&'a RawValue>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MetadataRef<'a> {
    name: &'a str,
    namespace: &'a str,
    #[serde(skip_serializing_if = "no_labels")]
    labels: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resource_version: Option<&'a str>,
}

fn no_labels(labels: &&BTreeMap<String, String>) -> bool {
    labels.is_empty()
}

impl Resource {
    /// Decode a resource from its JSON document, reading only the metadata
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        Ok(Self {
            api_version: envelope.api_version,
            kind: envelope.kind,
            name: envelope.metadata.name,
            namespace: envelope.metadata.namespace,
            labels: envelope.metadata.labels,
            resource_version: envelope.metadata.resource_version,
            spec: envelope.spec,
            status: envelope.status,
        })
    }

    /// Re-encode the resource, with spec and status passed through unchanged
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }

    /// Value of a label, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Owner recorded under `owner_label`; a missing label reads as ""
    pub fn owner(&self, owner_label: &str) -> &str {
        self.label(owner_label).unwrap_or("")
    }
}

impl Serialize for Resource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EnvelopeRef {
            api_version: &self.api_version,
            kind: &self.kind,
            metadata: MetadataRef {
                name: &self.name,
                namespace: &self.namespace,
                labels: &self.labels,
                resource_version: self.resource_version.as_deref(),
            },
            spec: self.spec.as_deref(),
            status: self.status.as_deref(),
        }
        .serialize(serializer)
    }
}

impl TryFrom<DynamicObject> for Resource {
    type Error = serde_json::Error;

    fn try_from(obj: DynamicObject) -> Result<Self, Self::Error> {
        // RawValue can only borrow from text, so go through the encoded form
        let bytes = serde_json::to_vec(&obj)?;
        Self::from_json(&bytes)
    }
}

#[cfg(test)]
pub(crate) fn test_resource(namespace: &str, name: &str, labels: &[(&str, &str)]) -> Resource {
    Resource {
        api_version: "amalthea.dev/v1alpha1".to_string(),
        kind: "JupyterServer".to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
        labels: labels
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        resource_version: None,
        spec: None,
        status: None,
    }
}
