//! Read-only view of the holder/employee directory.
//!
//! Used to enrich audit metadata with display names and to find the parties
//! interested in expiry alerts. Never required for correctness.

pub trait HolderDirectory: Send + Sync {
  fn display_name(&self, holder_id: &str) -> Option<String>;

  /// Recipients of resource document alerts (administrators).
  fn alert_recipients(&self) -> Vec<String>;
}

/// A directory that knows nobody.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDirectory;

impl HolderDirectory for NoDirectory {
  fn display_name(&self, _holder_id: &str) -> Option<String> { None }

  fn alert_recipients(&self) -> Vec<String> { Vec::new() }
}
