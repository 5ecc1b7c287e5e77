//! PostgreSQL routine backend.
//!
//! Routines are functions called with named notation:
//! `SELECT * FROM files.sp_file_list(id_account => $1, search => NULL)`.
//! A routine that returns only `refcursor` columns has each cursor fetched
//! into its own result set, which is how one call yields several sets.

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgArguments, PgConnection, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Executor, PgPool, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use super::backend::RoutineBackend;
use super::manager::DatabaseError;
use super::routine::{RawResult, ResultSet, RoutineInvocation, RoutineParam};
use crate::config::{AppConfig, DatabaseConfig, Environment};

pub struct PgBackend {
    database: DatabaseConfig,
    environment: Environment,
}

impl PgBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            database: config.database.clone(),
            environment: config.environment,
        }
    }
}

#[async_trait]
impl RoutineBackend for PgBackend {
    type Pool = PgPool;
    type Tx = sqlx::Transaction<'static, Postgres>;

    async fn connect(&self) -> Result<PgPool, DatabaseError> {
        let connection_string = self.database.connection_url(self.environment)?;

        PgPoolOptions::new()
            .max_connections(self.database.max_connections)
            .acquire_timeout(self.database.acquire_timeout())
            .connect(&connection_string)
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))
    }

    async fn call(&self, pool: &PgPool, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
        // Cursors only live inside a transaction, so pool calls get their own
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;
        let raw = run_routine(&mut tx, invocation).await?;
        tx.commit().await?;
        Ok(raw)
    }

    async fn call_in(&self, tx: &mut Self::Tx, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
        run_routine(tx, invocation).await
    }

    async fn begin(&self, pool: &PgPool) -> Result<Self::Tx, DatabaseError> {
        pool.begin()
            .await
            .map_err(|e| DatabaseError::TransactionError(e.to_string()))
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), DatabaseError> {
        tx.commit()
            .await
            .map_err(|e| DatabaseError::TransactionError(e.to_string()))
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), DatabaseError> {
        tx.rollback()
            .await
            .map_err(|e| DatabaseError::TransactionError(e.to_string()))
    }

    async fn ping(&self, pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }

    async fn close(&self, pool: PgPool) {
        pool.close().await;
    }
}

async fn run_routine(conn: &mut PgConnection, invocation: &RoutineInvocation) -> Result<RawResult, DatabaseError> {
    let statement = call_statement(invocation);
    debug!(routine = invocation.name(), sql = %statement, "Calling routine");

    let mut query = sqlx::query(&statement);
    for (_, value) in invocation.params() {
        query = bind_param(query, value);
    }

    let mut rows: Vec<PgRow> = Vec::new();
    let mut rows_affected = 0;
    {
        let mut stream = query.fetch_many(&mut *conn);
        while let Some(item) = stream.try_next().await.map_err(|e| query_error(invocation, e))? {
            match item {
                sqlx::Either::Left(done) => rows_affected += done.rows_affected(),
                sqlx::Either::Right(row) => rows.push(row),
            }
        }
    }

    if !returns_cursors(&rows) {
        let set = rows_to_json(&rows).map_err(|e| query_error(invocation, e))?;
        return Ok(RawResult::new(vec![set], rows_affected));
    }

    let mut cursors = Vec::new();
    for row in &rows {
        for index in 0..row.len() {
            let name: Option<String> = row
                .try_get_unchecked(index)
                .map_err(|e| query_error(invocation, e))?;
            cursors.extend(name);
        }
    }

    let mut result_sets = Vec::with_capacity(cursors.len());
    for cursor in cursors {
        let fetch = format!("FETCH ALL FROM {}", quote_identifier(&cursor));
        let fetched = (&mut *conn)
            .fetch_all(fetch.as_str())
            .await
            .map_err(|e| query_error(invocation, e))?;
        result_sets.push(rows_to_json(&fetched).map_err(|e| query_error(invocation, e))?);
    }

    Ok(RawResult::new(result_sets, rows_affected))
}

/// `SELECT * FROM <routine>(<name> => $1, ...)`, with nulls inlined
fn call_statement(invocation: &RoutineInvocation) -> String {
    let mut placeholder = 0;
    let arguments: Vec<String> = invocation
        .params()
        .iter()
        .map(|(name, value)| {
            if value.is_null() {
                format!("{} => NULL", quote_identifier(name))
            } else {
                placeholder += 1;
                format!("{} => ${}", quote_identifier(name), placeholder)
            }
        })
        .collect();

    let routine = invocation
        .name()
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".");

    format!("SELECT * FROM {}({})", routine, arguments.join(", "))
}

fn bind_param<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &RoutineParam,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        // Inlined by call_statement
        RoutineParam::Null => q,
        RoutineParam::Bool(b) => q.bind(*b),
        RoutineParam::Int(i) => q.bind(*i),
        RoutineParam::BigInt(i) => q.bind(*i),
        RoutineParam::Float(f) => q.bind(*f),
        RoutineParam::Text(s) => q.bind(s.clone()),
        RoutineParam::Uuid(u) => q.bind(*u),
        RoutineParam::Timestamp(ts) => q.bind(*ts),
        RoutineParam::Date(d) => q.bind(*d),
        RoutineParam::Json(j) => q.bind(j.clone()),
    }
}

fn returns_cursors(rows: &[PgRow]) -> bool {
    rows.first().is_some_and(|row| {
        !row.columns().is_empty()
            && row
                .columns()
                .iter()
                .all(|c| c.type_info().name().eq_ignore_ascii_case("refcursor"))
    })
}

fn rows_to_json(rows: &[PgRow]) -> Result<ResultSet, sqlx::Error> {
    rows.iter().map(row_to_json).collect()
}

/// Convert database row to JSON
fn row_to_json(row: &PgRow) -> Result<Map<String, Value>, sqlx::Error> {
    let mut record = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = extract_column_value(row, index, column.type_info().name())?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Extract typed value from database column
fn extract_column_value(row: &PgRow, index: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float_value(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => float_value(row.try_get::<f64, _>(index)?),
        "NUMERIC" => {
            let decimal = row.try_get::<sqlx::types::BigDecimal, _>(index)?.to_string();
            match decimal.parse::<f64>() {
                Ok(f) if f.is_finite() => float_value(f),
                _ => Value::String(decimal),
            }
        }
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get::<String, _>(index)?),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        "TIMESTAMPTZ" => Value::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?
                .to_rfc3339(),
        ),
        "TIMESTAMP" => Value::String(
            row.try_get::<chrono::NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        _ => match row.try_get_unchecked::<String, _>(index) {
            Ok(text) => Value::String(text),
            Err(_) => {
                tracing::warn!("Unhandled PostgreSQL type: {}, returning null", type_name);
                Value::Null
            }
        },
    };

    Ok(value)
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn query_error(invocation: &RoutineInvocation, e: sqlx::Error) -> DatabaseError {
    DatabaseError::QueryError {
        routine: invocation.name().to_string(),
        message: e.to_string(),
    }
}

/// Quote SQL identifier to prevent injection
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
