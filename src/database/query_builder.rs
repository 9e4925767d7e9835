use serde_json::Value;
use sqlx::{self, postgres::PgArguments, PgPool, Row};

use crate::database::manager::DatabaseError;
use crate::filter::types::{SqlParam, SqlResult};
use crate::filter::Filter;

/// Executes the SQL a [`Filter`] generates and decodes the `jsonb` rows.
pub struct QueryBuilder {
    filter: Filter,
}

impl QueryBuilder {
    pub fn new(filter: Filter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub async fn select_all(&self, pool: &PgPool) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let rows = bind_params(sqlx::query(&sql_result.query), &sql_result.params)
            .fetch_all(pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }

    pub async fn select_optional(&self, pool: &PgPool) -> Result<Option<Value>, DatabaseError> {
        let sql_result = self.filter.to_sql()?;
        let row = bind_params(sqlx::query(&sql_result.query), &sql_result.params)
            .fetch_optional(pool)
            .await?;
        row.map(|r| r.try_get::<Value, _>("row")).transpose().map_err(DatabaseError::from)
    }

    pub async fn count(&self, pool: &PgPool) -> Result<u64, DatabaseError> {
        let sql_result = self.filter.to_count_sql()?;
        let row = bind_params(sqlx::query(&sql_result.query), &sql_result.params)
            .fetch_one(pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

/// Bind filter parameters in order. Everything is text; the SQL casts.
pub fn bind_params<'q>(
    mut q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    for param in params {
        q = match param {
            SqlParam::Text(s) => q.bind(s.as_str()),
            SqlParam::TextList(items) => q.bind(items.as_slice()),
        };
    }
    q
}

/// Statement plus parameters for logging at debug level
pub fn describe(sql: &SqlResult) -> String {
    format!("{} -- {} param(s)", sql.query, sql.params.len())
}
