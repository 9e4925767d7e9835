use super::error::FilterError;
use super::types::{SortDirection, SortKey};
use crate::database::collections::CollectionSpec;

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate(collection: &CollectionSpec, keys: &[SortKey]) -> Result<(), FilterError> {
        Self::generate(collection, keys).map(|_| ())
    }

    /// `ORDER BY` clause for the given keys. Identity is appended as a final
    /// tie-breaker so page boundaries are stable.
    pub fn generate(collection: &CollectionSpec, keys: &[SortKey]) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(keys.len() + 1);
        let mut has_id = false;
        for key in keys {
            let field = collection
                .field(&key.field)
                .filter(|f| !f.hidden)
                .ok_or_else(|| FilterError::UnknownField {
                    collection: collection.name.to_string(),
                    field: key.field.clone(),
                })?;
            has_id |= field.name == "id";
            let nulls = match key.direction {
                SortDirection::Asc => "NULLS FIRST",
                SortDirection::Desc => "NULLS LAST",
            };
            parts.push(format!("\"{}\" {} {}", field.column, key.direction.to_sql(), nulls));
        }
        if !has_id {
            parts.push("\"id\" ASC".to_string());
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
