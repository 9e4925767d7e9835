use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{Projection, QueryPlan, SortKey, SqlResult};
use crate::database::collections::{CollectionSpec, FieldSpec};

/// SQL generator for a single collection read.
///
/// Rows come back as one `jsonb` object per record keyed by API field name,
/// so callers never deal with column names.
pub struct Filter {
    collection: &'static CollectionSpec,
    select_fields: Vec<&'static FieldSpec>,
    where_data: Map<String, Value>,
    order_data: Vec<SortKey>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Filter {
    pub fn new(collection: &'static CollectionSpec) -> Self {
        Self {
            collection,
            select_fields: collection.visible_fields().collect(),
            where_data: Map::new(),
            order_data: vec![],
            limit: None,
            offset: None,
        }
    }

    /// Apply every part of a plan, validating field names against the collection
    pub fn from_plan(collection: &'static CollectionSpec, plan: &QueryPlan) -> Result<Self, FilterError> {
        let mut filter = Self::new(collection);
        filter
            .select(&plan.projection)?
            .where_clause(plan.filter.clone())?
            .order(plan.sort.clone())?
            .limit(plan.limit, Some(plan.offset()));
        Ok(filter)
    }

    pub fn collection(&self) -> &'static CollectionSpec {
        self.collection
    }

    pub fn select(&mut self, projection: &Projection) -> Result<&mut Self, FilterError> {
        self.select_fields = Self::resolve_projection(self.collection, projection)?;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Map<String, Value>) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(self.collection, &conditions)?;
        self.where_data = conditions;
        Ok(self)
    }

    pub fn order(&mut self, keys: Vec<SortKey>) -> Result<&mut Self, FilterError> {
        FilterOrder::validate(self.collection, &keys)?;
        self.order_data = keys;
        Ok(self)
    }

    pub fn limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// API names of the fields each returned row will carry
    pub fn selected_field_names(&self) -> Vec<&'static str> {
        self.select_fields.iter().map(|f| f.name).collect()
    }

    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let order_clause = if self.order_data.is_empty() {
            String::new()
        } else {
            FilterOrder::generate(self.collection, &self.order_data)?
        };

        let query = [
            format!("SELECT {} AS \"row\"", Self::projection_sql(&self.select_fields)),
            format!("FROM \"{}\"", self.collection.table),
            if where_result.query.is_empty() { String::new() } else { format!("WHERE {}", where_result.query) },
            order_clause,
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params: where_result.params })
    }

    pub fn to_where_sql(&self) -> Result<SqlResult, FilterError> {
        let (query, params) = FilterWhere::generate(self.collection, &self.where_data, 0)?;
        Ok(SqlResult { query, params })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let where_result = self.to_where_sql()?;
        let query = if where_result.query.is_empty() {
            format!("SELECT COUNT(*) AS count FROM \"{}\"", self.collection.table)
        } else {
            format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.collection.table, where_result.query
            )
        };
        Ok(SqlResult { query, params: where_result.params })
    }

    /// Identity first, then the requested fields in request order
    pub fn resolve_projection(
        collection: &'static CollectionSpec,
        projection: &Projection,
    ) -> Result<Vec<&'static FieldSpec>, FilterError> {
        match projection {
            Projection::All => Ok(collection.visible_fields().collect()),
            Projection::Fields(names) => {
                let mut fields: Vec<&'static FieldSpec> = collection.field("id").into_iter().collect();
                for name in names {
                    let field = collection
                        .field(name)
                        .filter(|f| !f.hidden)
                        .ok_or_else(|| FilterError::UnknownField {
                            collection: collection.name.to_string(),
                            field: name.clone(),
                        })?;
                    if !fields.iter().any(|f| f.name == field.name) {
                        fields.push(field);
                    }
                }
                Ok(fields)
            }
        }
    }

    /// `jsonb_build_object('apiName', "column", ...)`
    pub fn projection_sql(fields: &[&FieldSpec]) -> String {
        let pairs = fields
            .iter()
            .map(|f| format!("'{}', \"{}\"", f.name, f.column))
            .collect::<Vec<_>>()
            .join(", ");
        format!("jsonb_build_object({})", pairs)
    }

    fn build_limit_clause(&self) -> String {
        // Postgres rejects LIMIT/OFFSET beyond bigint
        let clamp = |n: u64| n.min(i64::MAX as u64);
        match (self.limit, self.offset) {
            (Some(l), Some(o)) if o > 0 => format!("LIMIT {} OFFSET {}", clamp(l), clamp(o)),
            (Some(l), _) => format!("LIMIT {}", clamp(l)),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::collections::{BOOTCAMPS, COURSES};
    use crate::filter::types::{QueryDefaults, SqlParam};

    fn plan(raw: &str) -> QueryPlan {
        QueryPlan::from_query_string(raw, &QueryDefaults::default())
    }

    #[test]
    fn full_select_statement() {
        let filter = Filter::from_plan(&COURSES, &plan("tuition[lte]=1000&select=title&sort=tuition&page=2&limit=5")).unwrap();
        let sql = filter.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT jsonb_build_object('id', \"id\", 'title', \"title\") AS \"row\" FROM \"courses\" \
             WHERE \"tuition\" <= CAST($1 AS double precision) \
             ORDER BY \"tuition\" ASC NULLS FIRST, \"id\" ASC LIMIT 5 OFFSET 5"
        );
        assert_eq!(sql.params, vec![SqlParam::Text("1000".into())]);
    }

    #[test]
    fn count_shares_the_filter() {
        let filter = Filter::from_plan(&BOOTCAMPS, &plan("housing=true&page=3")).unwrap();
        let count = filter.to_count_sql().unwrap();
        assert_eq!(
            count.query,
            "SELECT COUNT(*) AS count FROM \"bootcamps\" WHERE \"housing\" = CAST($1 AS boolean)"
        );
        assert_eq!(count.params.len(), 1);

        let all = Filter::from_plan(&BOOTCAMPS, &plan("")).unwrap().to_count_sql().unwrap();
        assert_eq!(all.query, "SELECT COUNT(*) AS count FROM \"bootcamps\"");
    }

    #[test]
    fn select_always_includes_identity_once() {
        let filter = Filter::from_plan(&BOOTCAMPS, &plan("select=name,id,description")).unwrap();
        assert_eq!(filter.selected_field_names(), vec!["id", "name", "description"]);
    }

    #[test]
    fn default_projection_is_every_visible_field() {
        let filter = Filter::from_plan(&BOOTCAMPS, &plan("")).unwrap();
        let names = filter.selected_field_names();
        assert_eq!(names.len(), BOOTCAMPS.visible_fields().count());
        assert!(names.contains(&"averageCost"));
    }

    #[test]
    fn unknown_select_or_sort_is_rejected() {
        assert!(Filter::from_plan(&BOOTCAMPS, &plan("select=name,secret")).is_err());
        assert!(Filter::from_plan(&BOOTCAMPS, &plan("sort=-secret")).is_err());
        assert!(Filter::from_plan(&BOOTCAMPS, &plan("secret=1")).is_err());
    }

    #[test]
    fn first_page_has_no_offset() {
        let sql = Filter::from_plan(&BOOTCAMPS, &plan("limit=10")).unwrap().to_sql().unwrap();
        assert!(sql.query.ends_with("LIMIT 10"));
    }
}
