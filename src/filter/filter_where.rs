use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::FilterError;
use super::types::{FilterOp, SqlParam};
use crate::database::collections::{CollectionSpec, FieldSpec, FieldType};

/// Turns a rewritten filter mapping into a parameterised WHERE clause.
///
/// Every value is bound as text and cast to the column's type in SQL, so the
/// only identifiers that reach the query are columns declared on the
/// collection.
pub struct FilterWhere {
    collection: &'static CollectionSpec,
    param_values: Vec<SqlParam>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(collection: &'static CollectionSpec, starting_param_index: usize) -> Self {
        Self {
            collection,
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    /// Returns the clause (empty when there is nothing to filter) and its parameters
    pub fn generate(
        collection: &'static CollectionSpec,
        where_data: &Map<String, Value>,
        starting_param_index: usize,
    ) -> Result<(String, Vec<SqlParam>), FilterError> {
        let mut filter_where = Self::new(collection, starting_param_index);
        let clause = filter_where.build(where_data)?;
        Ok((clause, filter_where.param_values))
    }

    /// Checks every field name without producing SQL
    pub fn validate(collection: &'static CollectionSpec, where_data: &Map<String, Value>) -> Result<(), FilterError> {
        Self::generate(collection, where_data, 0).map(|_| ())
    }

    fn build(&mut self, where_data: &Map<String, Value>) -> Result<String, FilterError> {
        let mut sql_conditions = Vec::new();
        for (field_name, value) in where_data {
            let field = self.resolve(field_name)?;
            sql_conditions.extend(self.field_conditions(field, value)?);
        }
        Ok(sql_conditions.join(" AND "))
    }

    fn resolve(&self, field_name: &str) -> Result<&'static FieldSpec, FilterError> {
        self.collection
            .field(field_name)
            .filter(|f| !f.hidden)
            .ok_or_else(|| FilterError::UnknownField {
                collection: self.collection.name.to_string(),
                field: field_name.to_string(),
            })
    }

    fn field_conditions(&mut self, field: &FieldSpec, value: &Value) -> Result<Vec<String>, FilterError> {
        match value {
            Value::Null => Ok(vec![format!("\"{}\" IS NULL", field.column)]),
            Value::Object(obj) if Self::is_operator_object(obj) => {
                let mut out = Vec::with_capacity(obj.len());
                for (key, data) in obj {
                    // is_operator_object guarantees every key maps
                    if let Some(op) = FilterOp::from_key(key) {
                        out.push(self.operator_condition(field, op, data)?);
                    }
                }
                Ok(out)
            }
            Value::Object(obj) if obj.keys().any(|k| FilterOp::from_key(k).is_some()) => {
                let unknown: Vec<&str> = obj
                    .keys()
                    .filter(|k| FilterOp::from_key(k).is_none())
                    .map(String::as_str)
                    .collect();
                Err(FilterError::InvalidOperatorData(format!(
                    "{} mixes comparison operators with unknown keys: {}",
                    field.name,
                    unknown.join(", ")
                )))
            }
            Value::Object(_) | Value::Array(_) => Ok(vec![self.literal_condition(field, value)]),
            scalar => {
                let text = coerce(field, scalar)?;
                let placeholder = self.param(SqlParam::Text(text));
                if field.field_type.is_array() {
                    Ok(vec![format!("CAST({} AS text) = ANY(\"{}\")", placeholder, field.column)])
                } else {
                    Ok(vec![format!(
                        "\"{}\" = CAST({} AS {})",
                        field.column,
                        placeholder,
                        field.field_type.sql_cast()
                    )])
                }
            }
        }
    }

    /// Objects made only of operator keys are comparisons; anything else is data
    fn is_operator_object(obj: &Map<String, Value>) -> bool {
        !obj.is_empty() && obj.keys().all(|k| FilterOp::from_key(k).is_some())
    }

    fn operator_condition(&mut self, field: &FieldSpec, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let column = field.column;
        match op {
            FilterOp::In => {
                let items = in_values(data)?;
                if items.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let coerced = items
                    .iter()
                    .map(|item| coerce(field, item))
                    .collect::<Result<Vec<_>, _>>()?;
                let placeholder = self.param(SqlParam::TextList(coerced));
                if field.field_type.is_array() {
                    Ok(format!("\"{}\" && CAST({} AS text[])", column, placeholder))
                } else {
                    Ok(format!(
                        "\"{}\" = ANY(CAST({} AS {}[]))",
                        column,
                        placeholder,
                        field.field_type.element_cast()
                    ))
                }
            }
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                if field.field_type.is_array() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} cannot be compared with {}",
                        field.name,
                        op.key()
                    )));
                }
                if data.is_array() || data.is_object() || data.is_null() {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{} on {} requires a single value",
                        op.key(),
                        field.name
                    )));
                }
                let text = coerce(field, data)?;
                let placeholder = self.param(SqlParam::Text(text));
                Ok(format!(
                    "\"{}\" {} CAST({} AS {})",
                    column,
                    op.to_sql(),
                    placeholder,
                    field.field_type.sql_cast()
                ))
            }
        }
    }

    /// Whole-value comparison for data that is not a recognised operator
    fn literal_condition(&mut self, field: &FieldSpec, value: &Value) -> String {
        let placeholder = self.param(SqlParam::Text(value.to_string()));
        format!("to_jsonb(\"{}\") = CAST({} AS jsonb)", field.column, placeholder)
    }

    fn param(&mut self, value: SqlParam) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// `$in` accepts a list, or a single comma-separated string
fn in_values(data: &Value) -> Result<Vec<Value>, FilterError> {
    match data {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect()),
        Value::Number(_) | Value::Bool(_) => Ok(vec![data.clone()]),
        _ => Err(FilterError::InvalidOperatorData("$in requires a list of values".to_string())),
    }
}

/// Validate a scalar against the field type and return its canonical text form
pub fn coerce(field: &FieldSpec, value: &Value) -> Result<String, FilterError> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => {
            return Err(FilterError::InvalidOperatorData(format!(
                "{} expects a single value",
                field.name
            )))
        }
    };

    let invalid = || FilterError::InvalidValue {
        field: field.name.to_string(),
        value: raw.clone(),
        expected: field.field_type.describe(),
    };

    match field.field_type {
        FieldType::Text | FieldType::TextArray => Ok(raw.clone()),
        FieldType::Number => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(raw.clone()),
            _ => Err(invalid()),
        },
        FieldType::Boolean => match raw.to_ascii_lowercase().as_str() {
            "true" => Ok("true".to_string()),
            "false" => Ok("false".to_string()),
            _ => Err(invalid()),
        },
        FieldType::Uuid | FieldType::Reference(_) => Uuid::parse_str(&raw)
            .map(|id| id.to_string())
            .map_err(|_| invalid()),
        FieldType::Timestamp => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
                return Ok(ts.to_rfc3339());
            }
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(|date| format!("{}T00:00:00Z", date.format("%Y-%m-%d")))
                .map_err(|_| invalid())
        }
    }
}
