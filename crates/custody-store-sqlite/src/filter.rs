//! Dynamic `WHERE` clause builder for the list queries.

use rusqlite::types::Value;

use custody_core::store::{Page, PageRequest};

/// Conjunction of SQL conditions with positional `?` arguments.
#[derive(Default)]
pub struct Conditions {
  clauses: Vec<String>,
  args:    Vec<Value>,
}

impl Conditions {
  pub fn new() -> Self { Self::default() }

  /// Add `clause`, whose `?` placeholders bind `args` in order.
  pub fn push(&mut self, clause: impl Into<String>, args: impl IntoIterator<Item = Value>) {
    self.clauses.push(clause.into());
    self.args.extend(args);
  }

  /// `column IN (?, ?, ...)`; an empty set adds nothing.
  pub fn push_in(&mut self, column: &str, values: impl IntoIterator<Item = Value>) {
    let values: Vec<Value> = values.into_iter().collect();
    if values.is_empty() {
      return;
    }
    let marks = vec!["?"; values.len()].join(", ");
    self.push(format!("{column} IN ({marks})"), values);
  }

  /// Case-insensitive substring match of `needle` against any of `columns`.
  pub fn push_text(&mut self, columns: &[&str], needle: &str) {
    let pattern = like_pattern(needle);
    let clause = columns
      .iter()
      .map(|c| format!("{c} LIKE ? ESCAPE '\\'"))
      .collect::<Vec<_>>()
      .join(" OR ");
    self.push(format!("({clause})"), columns.iter().map(|_| text(&pattern)));
  }

  pub fn where_clause(&self) -> String {
    if self.clauses.is_empty() {
      String::new()
    } else {
      format!("WHERE {}", self.clauses.join(" AND "))
    }
  }

  pub fn args(&self) -> &[Value] { &self.args }

  /// Arguments followed by `LIMIT ? OFFSET ?` values for `page`.
  pub fn paged_args(&self, page: &PageRequest) -> Vec<Value> {
    let mut args = self.args.clone();
    args.push(Value::Integer(i64::from(page.limit())));
    args.push(Value::Integer(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    args
  }
}

pub fn text(s: &str) -> Value { Value::Text(s.to_owned()) }

fn like_pattern(needle: &str) -> String {
  let mut escaped = String::with_capacity(needle.len() + 2);
  escaped.push('%');
  for ch in needle.trim().chars() {
    if matches!(ch, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(ch);
  }
  escaped.push('%');
  escaped
}

pub fn page_of<T>(data: Vec<T>, page: &PageRequest, total: i64) -> Page<T> {
  Page {
    data,
    page: page.page.max(1),
    page_size: page.limit(),
    total: u64::try_from(total).unwrap_or(0),
  }
}
