//! Holder directory backed by configuration.

use std::collections::HashMap;

use custody_core::directory::HolderDirectory;

/// Display names and alert recipients read from the `[directory]` table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
  names:      HashMap<String, String>,
  recipients: Vec<String>,
}

impl StaticDirectory {
  pub fn new(names: HashMap<String, String>, recipients: Vec<String>) -> Self {
    let mut recipients: Vec<String> = recipients
      .into_iter()
      .map(|r| r.trim().to_owned())
      .filter(|r| !r.is_empty())
      .collect();
    recipients.sort();
    recipients.dedup();
    Self { names, recipients }
  }
}

impl HolderDirectory for StaticDirectory {
  fn display_name(&self, holder_id: &str) -> Option<String> { self.names.get(holder_id).cloned() }

  fn alert_recipients(&self) -> Vec<String> { self.recipients.clone() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recipients_are_trimmed_and_deduplicated() {
    let dir = StaticDirectory::new(
      HashMap::from([("emp-7".to_owned(), "Asha Rao".to_owned())]),
      vec!["admin-2".into(), " admin-1 ".into(), "admin-2".into(), "".into()],
    );
    assert_eq!(dir.alert_recipients(), vec!["admin-1", "admin-2"]);
    assert_eq!(dir.display_name("emp-7").as_deref(), Some("Asha Rao"));
    assert_eq!(dir.display_name("emp-8"), None);
  }
}
