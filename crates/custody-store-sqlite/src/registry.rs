//! Resource registry rows: `resources` and `resource_documents`.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params, params_from_iter};
use uuid::Uuid;

use custody_core::{
  Error as CoreError,
  resource::{Document, Resource, ResourceQuery, ResourceState},
  store::Page,
};

use crate::{
  Result,
  encode::{
    RESOURCE_COLUMNS, RawDocument, RawResource, decode_uuid, encode_date, encode_dt, encode_uuid,
  },
  error::is_unique_violation,
  filter::{Conditions, page_of, text},
};

fn duplicate_code(code: &str) -> impl FnOnce(rusqlite::Error) -> crate::Error + '_ {
  move |err| {
    if is_unique_violation(&err) {
      CoreError::DuplicateCode(code.to_owned()).into()
    } else {
      err.into()
    }
  }
}

pub fn insert(conn: &Connection, resource: &Resource) -> Result<()> {
  conn
    .execute(
      "INSERT INTO resources (
         resource_id, kind, code, category, state, attributes, created_at, updated_at
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        encode_uuid(resource.resource_id),
        resource.kind.as_str(),
        resource.code,
        resource.category,
        resource.state.as_str(),
        serde_json::to_string(&resource.attributes)?,
        encode_dt(resource.created_at),
        encode_dt(resource.updated_at),
      ],
    )
    .map_err(duplicate_code(&resource.code))?;
  replace_documents(conn, resource.resource_id, &resource.documents)
}

/// Persist the descriptive fields and documents of an existing resource.
pub fn save(conn: &Connection, resource: &Resource) -> Result<()> {
  conn
    .execute(
      "UPDATE resources
          SET code = ?2, category = ?3, attributes = ?4, updated_at = ?5
        WHERE resource_id = ?1",
      params![
        encode_uuid(resource.resource_id),
        resource.code,
        resource.category,
        serde_json::to_string(&resource.attributes)?,
        encode_dt(resource.updated_at),
      ],
    )
    .map_err(duplicate_code(&resource.code))?;
  replace_documents(conn, resource.resource_id, &resource.documents)
}

fn replace_documents(conn: &Connection, resource_id: Uuid, documents: &[Document]) -> Result<()> {
  let id = encode_uuid(resource_id);
  conn.execute("DELETE FROM resource_documents WHERE resource_id = ?1", params![id])?;

  let mut stmt = conn.prepare_cached(
    "INSERT INTO resource_documents (resource_id, kind, valid_from, valid_to, evidence_ref)
     VALUES (?1, ?2, ?3, ?4, ?5)",
  )?;
  for doc in documents {
    stmt.execute(params![
      id,
      doc.kind,
      doc.valid_from.map(encode_date),
      doc.valid_to.map(encode_date),
      doc.evidence_ref,
    ])?;
  }
  Ok(())
}

pub fn set_state(
  conn: &Connection,
  resource_id: Uuid,
  state: ResourceState,
  now: DateTime<Utc>,
) -> Result<()> {
  conn.execute(
    "UPDATE resources SET state = ?2, updated_at = ?3 WHERE resource_id = ?1",
    params![encode_uuid(resource_id), state.as_str(), encode_dt(now)],
  )?;
  Ok(())
}

fn documents(conn: &Connection, resource_id: &str) -> Result<Vec<Document>> {
  let mut stmt = conn.prepare_cached(
    "SELECT kind, valid_from, valid_to, evidence_ref
       FROM resource_documents
      WHERE resource_id = ?1
      ORDER BY kind",
  )?;
  let raws = stmt
    .query_map(params![resource_id], RawDocument::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawDocument::into_document).collect()
}

fn hydrate(conn: &Connection, raw: RawResource) -> Result<Resource> {
  let docs = documents(conn, &raw.resource_id)?;
  raw.into_resource(docs)
}

pub fn load(conn: &Connection, resource_id: Uuid) -> Result<Option<Resource>> {
  let raw = conn
    .query_row(
      &format!("SELECT {RESOURCE_COLUMNS} FROM resources r WHERE r.resource_id = ?1"),
      params![encode_uuid(resource_id)],
      RawResource::from_row,
    )
    .optional()?;
  raw.map(|raw| hydrate(conn, raw)).transpose()
}

pub fn require(conn: &Connection, resource_id: Uuid) -> Result<Resource> {
  load(conn, resource_id)?.ok_or_else(|| CoreError::ResourceNotFound(resource_id).into())
}

pub fn list(conn: &Connection, query: &ResourceQuery) -> Result<Page<Resource>> {
  let mut conds = Conditions::new();
  if let Some(kind) = query.kind {
    conds.push("r.kind = ?", [text(kind.as_str())]);
  }
  if let Some(state) = query.state {
    conds.push("r.state = ?", [text(state.as_str())]);
  }
  if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
    conds.push("r.category = ?", [text(category.trim())]);
  }
  if let Some(needle) = query.text.as_deref().filter(|t| !t.trim().is_empty()) {
    conds.push_text(&["r.code", "r.attributes"], needle);
  }
  let where_clause = conds.where_clause();

  let total: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM resources r {where_clause}"),
    params_from_iter(conds.args()),
    |row| row.get(0),
  )?;

  let mut stmt = conn.prepare(&format!(
    "SELECT {RESOURCE_COLUMNS} FROM resources r {where_clause}
      ORDER BY r.created_at DESC, r.resource_id
      LIMIT ? OFFSET ?"
  ))?;
  let raws = stmt
    .query_map(params_from_iter(conds.paged_args(&query.page)), RawResource::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  let data = raws.into_iter().map(|raw| hydrate(conn, raw)).collect::<Result<_>>()?;

  Ok(page_of(data, &query.page, total))
}

/// Resources with at least one document carrying an expiry date.
pub fn documented_ids(conn: &Connection) -> Result<Vec<Uuid>> {
  let mut stmt = conn.prepare(
    "SELECT DISTINCT d.resource_id
       FROM resource_documents d
      WHERE d.valid_to IS NOT NULL
      ORDER BY d.resource_id",
  )?;
  let ids = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  ids.iter().map(|id| decode_uuid(id)).collect()
}
