//! The claim state machine.
//!
//! Resource states move `Free → Claimed → {Free, Retired}`. Each function
//! here takes a snapshot of the rows a backend has read under its write lock
//! and returns either the rows to write back or the domain error that rejects
//! the transition. Nothing in this module performs I/O; backends are
//! responsible for running a whole transition inside one transaction.

use chrono::{DateTime, SubsecRound as _, Utc};
use uuid::Uuid;

use crate::{
  Error, Result,
  actor::Actor,
  audit::Changes,
  claim::{Claim, ClaimAmendment, ClaimStatus, CloseAttrs, OpenAttrs},
  reading::{CustodyReading, ReadingCapture, ReadingInput, ReadingPhase},
  resource::{Resource, ResourceKind, ResourceState},
};

// ─── Open ────────────────────────────────────────────────────────────────────

/// Rows produced by a successful open.
#[derive(Debug, Clone)]
pub struct OpenPlan {
  pub claim:         Claim,
  pub start_reading: Option<CustodyReading>,
}

/// Preconditions for opening a claim on `resource`.
///
/// `active` is the ledger's current active claim for the resource. Finding
/// one while the resource is `Free` means the registry and ledger disagree,
/// which correct locking never allows.
pub fn check_open(resource: &Resource, active: Option<&Claim>) -> Result<()> {
  if resource.state != ResourceState::Free {
    return Err(Error::ResourceNotAvailable {
      id:    resource.resource_id,
      state: resource.state,
    });
  }
  if active.is_some() {
    return Err(Error::AlreadyClaimed(resource.resource_id));
  }
  Ok(())
}

pub fn open(
  resource: &Resource,
  active: Option<&Claim>,
  holder_id: &str,
  actor: &Actor,
  attrs: &OpenAttrs,
  now: DateTime<Utc>,
) -> Result<OpenPlan> {
  check_open(resource, active)?;

  let holder_id = holder_id.trim();
  if holder_id.is_empty() {
    return Err(Error::Validation("holder id must not be empty".into()));
  }
  if let Some(at) = attrs.opened_at
    && at.trunc_subsecs(6) > now
  {
    return Err(Error::Validation(format!("opened_at {at} is in the future")));
  }

  let claim = Claim {
    claim_id:           Uuid::new_v4(),
    resource_id:        resource.resource_id,
    holder_id:          holder_id.to_owned(),
    opened_at:          attrs.opened_at.map_or(now, |at| at.trunc_subsecs(6)),
    opened_by:          actor.id.clone(),
    closed_at:          None,
    closed_by:          None,
    status:             ClaimStatus::Active,
    notes:              attrs.notes.clone(),
    condition_on_open:  attrs.condition_on_open.clone(),
    condition_on_close: None,
    retire_reason:      None,
    retired_by:         None,
    updated_at:         now,
  };

  let start_reading = match &attrs.start_reading {
    Some(input) => Some(record_reading(
      &claim,
      resource,
      None,
      ReadingPhase::Start,
      input.clone(),
      actor,
      now,
    )?),
    None => None,
  };

  Ok(OpenPlan { claim, start_reading })
}

// ─── Close ───────────────────────────────────────────────────────────────────

/// Rows produced by a successful close.
#[derive(Debug, Clone)]
pub struct ClosePlan {
  pub claim:          Claim,
  pub resource_state: ResourceState,
}

/// The resource state after its claim closes. A resource that was retired
/// independently stays retired.
pub fn state_after_close(current: ResourceState, retire: bool) -> ResourceState {
  if retire || current == ResourceState::Retired {
    ResourceState::Retired
  } else {
    ResourceState::Free
  }
}

/// Vehicles may only be returned once an end reading with evidence exists
/// and is not below the start reading.
pub fn check_return_proof(reading: Option<&CustodyReading>) -> Result<()> {
  let reading = reading
    .ok_or_else(|| Error::ProofIncomplete("no start reading recorded".into()))?;
  let end = reading
    .end
    .as_ref()
    .ok_or_else(|| Error::ProofIncomplete("end reading and evidence required".into()))?;
  if end.evidence_ref.trim().is_empty() {
    return Err(Error::ProofIncomplete("end reading has no evidence".into()));
  }
  if end.value < reading.start.value {
    return Err(Error::ProofIncomplete(format!(
      "end reading {} is below start reading {}",
      end.value, reading.start.value
    )));
  }
  Ok(())
}

pub fn close(
  claim: &Claim,
  resource: &Resource,
  reading: Option<&CustodyReading>,
  actor: &Actor,
  attrs: &CloseAttrs,
  retire: bool,
  now: DateTime<Utc>,
) -> Result<ClosePlan> {
  if !claim.is_active() {
    return Err(Error::NotActive(claim.claim_id));
  }
  if resource.kind == ResourceKind::Vehicle {
    check_return_proof(reading)?;
  }

  let closed_at = attrs.closed_at.map_or(now, |at| at.trunc_subsecs(6));
  if closed_at < claim.opened_at {
    return Err(Error::Validation(format!(
      "closed_at {closed_at} precedes opened_at {}",
      claim.opened_at
    )));
  }

  let mut next = claim.clone();
  next.status = if retire { ClaimStatus::Retired } else { ClaimStatus::Closed };
  next.closed_at = Some(closed_at);
  next.closed_by = Some(actor.id.clone());
  next.condition_on_close = attrs.condition_on_close.clone();
  if attrs.notes.is_some() {
    next.notes = attrs.notes.clone();
  }
  if retire {
    next.retire_reason = attrs.retire_reason.clone();
    next.retired_by = Some(actor.id.clone());
  }
  next.updated_at = now;

  Ok(ClosePlan {
    claim:          next,
    resource_state: state_after_close(resource.state, retire),
  })
}

// ─── Amend ───────────────────────────────────────────────────────────────────

/// Rows produced by amending a closed claim. `resource_state` is `Some` only
/// when the resource must move.
#[derive(Debug, Clone)]
pub struct Amendment {
  pub claim:          Claim,
  pub resource_state: Option<ResourceState>,
  pub changes:        Changes,
}

/// Correct a closed or retired claim.
///
/// `other_active` is the resource's current active claim, if any; a
/// resource in someone else's custody cannot be retired retroactively.
/// `retired_elsewhere` reports that the resource's retirement is also held
/// by another retired claim or a later administrative retirement, in which
/// case un-retiring this claim leaves the resource retired.
pub fn amend(
  claim: &Claim,
  resource: &Resource,
  other_active: Option<&Claim>,
  retired_elsewhere: bool,
  actor: &Actor,
  patch: &ClaimAmendment,
  now: DateTime<Utc>,
) -> Result<Amendment> {
  if claim.is_active() {
    return Err(Error::NotClosed(claim.claim_id));
  }

  let mut next = claim.clone();
  if patch.notes.is_some() {
    next.notes = patch.notes.clone();
  }
  if patch.condition_on_close.is_some() {
    next.condition_on_close = patch.condition_on_close.clone();
  }

  match patch.retired {
    Some(true) => {
      next.status = ClaimStatus::Retired;
      if patch.retire_reason.is_some() {
        next.retire_reason = patch.retire_reason.clone();
      }
      if claim.status != ClaimStatus::Retired {
        next.retired_by = Some(actor.id.clone());
      }
    }
    Some(false) => {
      next.status = ClaimStatus::Closed;
      next.retire_reason = None;
      next.retired_by = None;
    }
    None => {
      if claim.status == ClaimStatus::Retired && patch.retire_reason.is_some() {
        next.retire_reason = patch.retire_reason.clone();
      }
    }
  }
  if next.closed_at.is_none() {
    next.closed_at = Some(now);
  }

  let resource_state = match (claim.status, next.status) {
    (ClaimStatus::Closed, ClaimStatus::Retired) if resource.state != ResourceState::Retired => {
      if other_active.is_some_and(|other| other.claim_id != claim.claim_id) {
        return Err(Error::ResourceNotAvailable {
          id:    resource.resource_id,
          state: resource.state,
        });
      }
      Some(ResourceState::Retired)
    }
    (ClaimStatus::Retired, ClaimStatus::Closed)
      if resource.state == ResourceState::Retired && !retired_elsewhere =>
    {
      Some(ResourceState::Free)
    }
    _ => None,
  };

  let mut changes = Changes::new();
  changes.track("notes", &claim.notes, &next.notes)?;
  changes.track("condition_on_close", &claim.condition_on_close, &next.condition_on_close)?;
  changes.track("status", &claim.status, &next.status)?;
  changes.track("retire_reason", &claim.retire_reason, &next.retire_reason)?;
  if let Some(state) = resource_state {
    changes.track("resource_state", &resource.state, &state)?;
  }

  if !changes.is_empty() {
    next.updated_at = now;
  }
  Ok(Amendment { claim: next, resource_state, changes })
}

// ─── Custody readings ────────────────────────────────────────────────────────

/// Record a start or end reading against an active vehicle claim, returning
/// the updated reading pair.
///
/// The start reading may be captured once. The end reading may be
/// re-recorded to correct it, but never below the start.
pub fn record_reading(
  claim: &Claim,
  resource: &Resource,
  existing: Option<&CustodyReading>,
  phase: ReadingPhase,
  input: ReadingInput,
  actor: &Actor,
  now: DateTime<Utc>,
) -> Result<CustodyReading> {
  if !claim.is_active() {
    return Err(Error::NotActive(claim.claim_id));
  }
  if resource.kind != ResourceKind::Vehicle {
    return Err(Error::Validation("custody readings apply only to vehicles".into()));
  }
  input.validate()?;

  match phase {
    ReadingPhase::Start => {
      if existing.is_some() {
        return Err(Error::ReadingAlreadyRecorded(claim.claim_id));
      }
      Ok(CustodyReading {
        claim_id:    claim.claim_id,
        resource_id: claim.resource_id,
        start:       ReadingCapture::from_input(input, &actor.id, now),
        end:         None,
      })
    }
    ReadingPhase::End => {
      let existing = existing.ok_or_else(|| {
        Error::ProofIncomplete("start reading must be recorded before the end reading".into())
      })?;
      if input.value < existing.start.value {
        return Err(Error::ReadingNotMonotonic {
          start: existing.start.value,
          end:   input.value,
        });
      }
      let mut next = existing.clone();
      next.end = Some(ReadingCapture::from_input(input, &actor.id, now));
      Ok(next)
    }
  }
}

// ─── Administrative state changes ────────────────────────────────────────────

/// Administrative moves between `Free`, `Maintenance` and `Retired`. Only
/// the claim engine moves a resource into or out of `Claimed`.
pub fn check_admin_state_change(resource: &Resource, to: ResourceState) -> Result<()> {
  if to == ResourceState::Claimed || resource.state == ResourceState::Claimed {
    return Err(Error::InvalidStateChange { from: resource.state, to });
  }
  Ok(())
}
