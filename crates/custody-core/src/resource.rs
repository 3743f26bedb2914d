//! Resources, the physical items that holders take custody of.
//!
//! A resource is either an IT asset or a pool vehicle. Its lifecycle `state`
//! is owned by the claim engine; descriptive fields are edited
//! administratively.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{Error, Result, audit::Changes, store::PageRequest};

// ─── Kind & state ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
  Asset,
  Vehicle,
}

impl ResourceKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Asset => "asset",
      Self::Vehicle => "vehicle",
    }
  }

  /// Capitalised noun used in human-facing messages.
  pub fn title(self) -> &'static str {
    match self {
      Self::Asset => "Asset",
      Self::Vehicle => "Vehicle",
    }
  }
}

/// Lifecycle state of a resource.
///
/// Vehicles present `Free` as "available"; assets present `Maintenance` as
/// "under repair". See [`ResourceState::label_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
  Free,
  Claimed,
  Maintenance,
  Retired,
}

impl ResourceState {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Free => "free",
      Self::Claimed => "claimed",
      Self::Maintenance => "maintenance",
      Self::Retired => "retired",
    }
  }

  /// The kind-specific display label for this state.
  pub fn label_for(self, kind: ResourceKind) -> &'static str {
    match (kind, self) {
      (ResourceKind::Vehicle, Self::Free) => "available",
      (ResourceKind::Asset, Self::Maintenance) => "under_repair",
      (_, state) => state.as_str(),
    }
  }
}

impl fmt::Display for ResourceState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ─── Documents ───────────────────────────────────────────────────────────────

/// A dated validity window attached to a resource (insurance, registration,
/// pollution certificate, warranty, ...). One per `kind` per resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub kind:         String,
  pub valid_from:   Option<NaiveDate>,
  pub valid_to:     Option<NaiveDate>,
  /// Opaque reference to the uploaded scan, managed outside the core.
  pub evidence_ref: Option<String>,
}

impl Document {
  fn validate(&self) -> Result<()> {
    if self.kind.trim().is_empty() {
      return Err(Error::Validation("document kind must not be empty".into()));
    }
    if let (Some(from), Some(to)) = (self.valid_from, self.valid_to)
      && from > to
    {
      return Err(Error::Validation(format!(
        "document {:?} is valid from {from} but expires {to}",
        self.kind
      )));
    }
    Ok(())
  }
}

fn validate_documents(docs: &[Document]) -> Result<()> {
  for (i, doc) in docs.iter().enumerate() {
    doc.validate()?;
    if docs[..i].iter().any(|d| d.kind == doc.kind) {
      return Err(Error::Validation(format!("duplicate document kind {:?}", doc.kind)));
    }
  }
  Ok(())
}

// ─── Resource ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
  pub resource_id: Uuid,
  pub kind:        ResourceKind,
  /// Human-facing identifier: asset tag or licence plate. Unique.
  pub code:        String,
  /// Hardware type or vehicle type, e.g. `laptop`, `car`, `scooter`.
  pub category:    String,
  pub state:       ResourceState,
  /// Free-form descriptive fields (brand, model, serial number, ...).
  pub attributes:  Map<String, Value>,
  pub documents:   Vec<Document>,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Resource {
  pub fn document(&self, kind: &str) -> Option<&Document> {
    self.documents.iter().find(|d| d.kind == kind)
  }
}

/// Input for registering a new resource. The state always starts as
/// [`ResourceState::Free`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResource {
  pub kind:       ResourceKind,
  pub code:       String,
  pub category:   String,
  #[serde(default)]
  pub attributes: Map<String, Value>,
  #[serde(default)]
  pub documents:  Vec<Document>,
}

impl NewResource {
  pub fn new(kind: ResourceKind, code: impl Into<String>, category: impl Into<String>) -> Self {
    Self {
      kind,
      code: code.into(),
      category: category.into(),
      attributes: Map::new(),
      documents: Vec::new(),
    }
  }

  pub fn with_document(mut self, doc: Document) -> Self {
    self.documents.push(doc);
    self
  }

  pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.attributes.insert(key.into(), value.into());
    self
  }

  /// Validate and build the resource record.
  pub fn into_resource(self, now: DateTime<Utc>) -> Result<Resource> {
    let code = self.code.trim().to_owned();
    if code.is_empty() {
      return Err(Error::Validation("resource code must not be empty".into()));
    }
    if self.category.trim().is_empty() {
      return Err(Error::Validation("resource category must not be empty".into()));
    }
    validate_documents(&self.documents)?;

    Ok(Resource {
      resource_id: Uuid::new_v4(),
      kind:        self.kind,
      code,
      category:    self.category.trim().to_owned(),
      state:       ResourceState::Free,
      attributes:  self.attributes,
      documents:   self.documents,
      created_at:  now,
      updated_at:  now,
    })
  }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// A partial update of a resource's descriptive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourcePatch {
  pub code:             Option<String>,
  pub category:         Option<String>,
  /// Merged key-wise into the existing attributes; a `null` value removes
  /// the key.
  pub attributes:       Option<Map<String, Value>>,
  /// Upserted by document kind.
  #[serde(default)]
  pub documents:        Vec<Document>,
  /// Document kinds to drop.
  #[serde(default)]
  pub remove_documents: Vec<String>,
}

impl ResourcePatch {
  /// Apply the patch to `current`, returning the updated record and the set
  /// of fields that actually changed. The state is never touched.
  pub fn apply(&self, current: &Resource, now: DateTime<Utc>) -> Result<(Resource, Changes)> {
    let mut next = current.clone();
    let mut changes = Changes::new();

    if let Some(code) = &self.code {
      let code = code.trim();
      if code.is_empty() {
        return Err(Error::Validation("resource code must not be empty".into()));
      }
      next.code = code.to_owned();
      changes.track("code", &current.code, &next.code)?;
    }

    if let Some(category) = &self.category {
      let category = category.trim();
      if category.is_empty() {
        return Err(Error::Validation("resource category must not be empty".into()));
      }
      next.category = category.to_owned();
      changes.track("category", &current.category, &next.category)?;
    }

    if let Some(attrs) = &self.attributes {
      for (key, value) in attrs {
        if value.is_null() {
          next.attributes.remove(key);
        } else {
          next.attributes.insert(key.clone(), value.clone());
        }
        changes.track(
          &format!("attributes.{key}"),
          &current.attributes.get(key),
          &next.attributes.get(key),
        )?;
      }
    }

    validate_documents(&self.documents)?;
    for doc in &self.documents {
      match next.documents.iter_mut().find(|d| d.kind == doc.kind) {
        Some(existing) => *existing = doc.clone(),
        None => next.documents.push(doc.clone()),
      }
    }
    next.documents.retain(|d| !self.remove_documents.contains(&d.kind));
    changes.track("documents", &current.documents, &next.documents)?;

    if !changes.is_empty() {
      next.updated_at = now;
    }
    Ok((next, changes))
  }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for listing resources.
#[derive(Debug, Clone, Default)]
pub struct ResourceQuery {
  pub kind:     Option<ResourceKind>,
  pub state:    Option<ResourceState>,
  pub category: Option<String>,
  /// Substring match over code and serialised attributes.
  pub text:     Option<String>,
  pub page:     PageRequest,
}
