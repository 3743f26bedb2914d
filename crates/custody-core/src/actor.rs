//! The identity context attached to every mutating call.
//!
//! Actors are authenticated by an external gateway; the core trusts the value
//! it is handed and only records it.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Employee,
  Admin,
  ItAdmin,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Employee => "employee",
      Self::Admin => "admin",
      Self::ItAdmin => "it_admin",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "employee" => Ok(Self::Employee),
      "admin" => Ok(Self::Admin),
      "it_admin" => Ok(Self::ItAdmin),
      other => Err(Error::Validation(format!("unknown role: {other:?}"))),
    }
  }
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub id:   String,
  pub role: Role,
}

impl Actor {
  pub fn new(id: impl Into<String>, role: Role) -> Self {
    Self { id: id.into(), role }
  }
}
