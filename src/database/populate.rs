//! Relation expansion for list and detail reads.
//!
//! A reference field (`course.bootcamp`) is replaced by the referenced record
//! with selected fields. A reverse relation (`bootcamp.courses`) attaches the
//! list of child records that point at each parent.

use std::collections::HashMap;

use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::database::collections::{self, CollectionSpec, FieldSpec};
use crate::database::manager::DatabaseError;
use crate::filter::types::Projection;
use crate::filter::{Filter, FilterError};

#[derive(Debug, Clone, PartialEq)]
pub enum Populate {
    /// Replace the id in `field` with the referenced record
    Reference {
        field: &'static str,
        collection: &'static str,
        select: &'static [&'static str],
    },
    /// Attach `as_field` listing records of `collection` whose `foreign_key` is this record
    Children {
        as_field: &'static str,
        collection: &'static str,
        foreign_key: &'static str,
    },
}

impl Populate {
    pub const fn reference(field: &'static str, collection: &'static str, select: &'static [&'static str]) -> Self {
        Populate::Reference { field, collection, select }
    }

    pub const fn children(as_field: &'static str, collection: &'static str, foreign_key: &'static str) -> Self {
        Populate::Children { as_field, collection, foreign_key }
    }

    /// Split a requested projection into the stored fields to read and whether
    /// this expansion should run. With an explicit select list, children are
    /// attached only when the list names them.
    pub fn narrow(&self, projection: &Projection) -> (Projection, bool) {
        match (self, projection) {
            (Populate::Children { as_field, .. }, Projection::Fields(names)) => {
                let wanted = names.iter().any(|n| n.as_str() == *as_field);
                let stored = names.iter().filter(|n| n.as_str() != *as_field).cloned().collect();
                (Projection::Fields(stored), wanted)
            }
            _ => (projection.clone(), true),
        }
    }

    /// Expand the relation across a page of already-loaded records
    pub async fn apply(&self, pool: &PgPool, items: &mut [Value]) -> Result<(), DatabaseError> {
        if items.is_empty() {
            return Ok(());
        }
        match self {
            Populate::Reference { field, collection, select } => {
                let ids = collect_ids(items, field);
                let target = resolve(collection)?;
                let projection = if select.is_empty() {
                    Projection::All
                } else {
                    Projection::Fields(select.iter().map(|s| s.to_string()).collect())
                };
                let fields = Filter::resolve_projection(target, &projection)?;
                let related = fetch_by_column(pool, target, &fields, "id", &ids).await?;
                let by_id = index_by(related, "id");
                splice_references(items, field, &by_id);
            }
            Populate::Children { as_field, collection, foreign_key } => {
                let ids = collect_ids(items, "id");
                let target = resolve(collection)?;
                let key_field = target.field(foreign_key).ok_or_else(|| FilterError::UnknownField {
                    collection: target.name.to_string(),
                    field: foreign_key.to_string(),
                })?;
                let fields: Vec<&'static FieldSpec> = target.visible_fields().collect();
                let children = fetch_by_column(pool, target, &fields, key_field.column, &ids).await?;
                splice_children(items, as_field, foreign_key, children);
            }
        }
        Ok(())
    }
}

fn resolve(name: &str) -> Result<&'static CollectionSpec, DatabaseError> {
    collections::lookup(name).ok_or_else(|| DatabaseError::NotFound(format!("collection {}", name)))
}

async fn fetch_by_column(
    pool: &PgPool,
    collection: &CollectionSpec,
    fields: &[&FieldSpec],
    column: &str,
    ids: &[Uuid],
) -> Result<Vec<Value>, DatabaseError> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let query = format!(
        "SELECT {} AS \"row\" FROM \"{}\" WHERE \"{}\" = ANY($1) ORDER BY \"created_at\" ASC, \"id\" ASC",
        Filter::projection_sql(fields),
        collection.table,
        column
    );
    let rows = sqlx::query(&query).bind(ids).fetch_all(pool).await?;
    rows.iter()
        .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
        .collect()
}

fn id_of(record: &Value, field: &str) -> Option<Uuid> {
    record.get(field)?.as_str().and_then(|s| Uuid::parse_str(s).ok())
}

/// Distinct ids held in `field` across all records
pub fn collect_ids(items: &[Value], field: &str) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = Vec::new();
    for id in items.iter().filter_map(|item| id_of(item, field)) {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

fn index_by(records: Vec<Value>, field: &str) -> HashMap<Uuid, Value> {
    records
        .into_iter()
        .filter_map(|r| id_of(&r, field).map(|id| (id, r)))
        .collect()
}

/// Dangling references become null rather than failing the read
pub fn splice_references(items: &mut [Value], field: &str, by_id: &HashMap<Uuid, Value>) {
    for item in items.iter_mut() {
        let Some(id) = id_of(item, field) else { continue };
        if let Value::Object(obj) = item {
            obj.insert(field.to_string(), by_id.get(&id).cloned().unwrap_or(Value::Null));
        }
    }
}

pub fn splice_children(items: &mut [Value], as_field: &str, foreign_key: &str, children: Vec<Value>) {
    let mut grouped: HashMap<Uuid, Vec<Value>> = HashMap::new();
    for child in children {
        if let Some(parent) = id_of(&child, foreign_key) {
            grouped.entry(parent).or_default().push(child);
        }
    }
    for item in items.iter_mut() {
        let list = id_of(item, "id").and_then(|id| grouped.remove(&id)).unwrap_or_default();
        if let Value::Object(obj) = item {
            obj.insert(as_field.to_string(), Value::Array(list));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const B1: &str = "5d713995-b721-c3bb-38c1-f2bb00000001";
    const B2: &str = "5d713995-b721-c3bb-38c1-f2bb00000002";

    #[test]
    fn collect_ids_dedupes_and_skips_missing() {
        let items = vec![
            json!({ "bootcamp": B1 }),
            json!({ "bootcamp": B1 }),
            json!({ "bootcamp": null }),
            json!({ "title": "x" }),
            json!({ "bootcamp": B2 }),
        ];
        let ids = collect_ids(&items, "bootcamp");
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn references_are_replaced_with_records() {
        let mut items = vec![json!({ "title": "Front End", "bootcamp": B1 })];
        let mut by_id = HashMap::new();
        by_id.insert(
            Uuid::parse_str(B1).unwrap(),
            json!({ "id": B1, "name": "Devworks", "description": "d" }),
        );
        splice_references(&mut items, "bootcamp", &by_id);
        assert_eq!(items[0]["bootcamp"]["name"], "Devworks");
    }

    #[test]
    fn dangling_reference_becomes_null() {
        let mut items = vec![json!({ "bootcamp": B2 })];
        splice_references(&mut items, "bootcamp", &HashMap::new());
        assert_eq!(items[0]["bootcamp"], Value::Null);
    }

    const WITH_COURSES: Populate = Populate::children("courses", "courses", "bootcamp");

    #[test]
    fn children_skipped_unless_selected() {
        let (projection, expand) = WITH_COURSES.narrow(&Projection::Fields(vec!["name".into(), "description".into()]));
        assert_eq!(projection, Projection::Fields(vec!["name".into(), "description".into()]));
        assert!(!expand);

        let (projection, expand) = WITH_COURSES.narrow(&Projection::Fields(vec!["courses".into(), "name".into()]));
        assert_eq!(projection, Projection::Fields(vec!["name".into()]));
        assert!(expand);

        let (projection, expand) = WITH_COURSES.narrow(&Projection::All);
        assert_eq!(projection, Projection::All);
        assert!(expand);
    }

    #[test]
    fn references_keep_the_projection() {
        let populate = Populate::reference("bootcamp", "bootcamps", &["name", "description"]);
        let requested = Projection::Fields(vec!["title".into()]);
        assert_eq!(populate.narrow(&requested), (requested.clone(), true));
    }

    #[test]
    fn children_grouped_under_each_parent() {
        let mut items = vec![json!({ "id": B1 }), json!({ "id": B2 })];
        let children = vec![
            json!({ "title": "a", "bootcamp": B1 }),
            json!({ "title": "b", "bootcamp": B1 }),
        ];
        splice_children(&mut items, "courses", "bootcamp", children);
        assert_eq!(items[0]["courses"].as_array().unwrap().len(), 2);
        assert_eq!(items[1]["courses"], json!([]));
    }
}
