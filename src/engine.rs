//! Database execution engine for keel.
//!
//! Every statement runs through an [`Executor`]. The production executor
//! wraps a single MySQL connection via sqlx; tests substitute their own.
//! A [`Db`] carries the executor and the model [`Registry`] and is handed to
//! every builder and model at construction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row as _, TypeInfo};
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::error::{KeelError, KeelResult};
use crate::model::Model;
use crate::schema::Registry;

/// One result row, keyed by column name in select order.
pub type Row = serde_json::Map<String, Value>;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Executed {
    pub rows_affected: u64,
    /// Identity assigned by the last INSERT (0 when none)
    pub last_insert_id: u64,
}

/// The backend seam. `params` bind to `?` placeholders left to right.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>>;

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<Executed>;
}

/// MySQL executor over a single shared connection.
#[derive(Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    /// Connect using `config`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let executor = MySqlExecutor::connect(&DatabaseConfig::load(None)?).await?;
    /// ```
    pub async fn connect(config: &DatabaseConfig) -> KeelResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .connect_with(config.connect_options())
            .await
            .map_err(|e| KeelError::Connection(e.to_string()))?;

        tracing::info!(host = %config.host, schema = %config.schema, "database connection established");

        Ok(Self { pool })
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for MySqlExecutor {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        let rows: Vec<MySqlRow> = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| KeelError::Query(e.to_string()))?;

        rows.iter().map(row_to_map).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<Executed> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(|e| KeelError::Query(e.to_string()))?;

        Ok(Executed {
            rows_affected: result.rows_affected(),
            last_insert_id: result.last_insert_id(),
        })
    }
}

fn bind_params<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [Value],
) -> Query<'q, MySql, MySqlArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(None::<String>),
            Value::Bool(v) => query.bind(*v),
            Value::Number(n) => {
                if let Some(v) = n.as_i64() {
                    query.bind(v)
                } else if let Some(v) = n.as_u64() {
                    query.bind(v)
                } else {
                    query.bind(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(v) => query.bind(v.as_str()),
            // Nested values travel as JSON text
            other => query.bind(other.to_string()),
        };
    }
    query
}

/// How a column is decoded, chosen from its MySQL type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decode {
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    /// Exact decimals keep their text form
    Decimal,
    DateTime,
    Date,
    Time,
    Json,
    Text,
    Bytes,
}

fn decode_for(type_name: &str) -> Decode {
    match type_name {
        "BOOLEAN" => Decode::Bool,
        "YEAR" => Decode::Year,
        t if t.ends_with("UNSIGNED") => Decode::Unsigned,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => Decode::Signed,
        "FLOAT" | "DOUBLE" => Decode::Float,
        "DECIMAL" => Decode::Decimal,
        "DATETIME" | "TIMESTAMP" => Decode::DateTime,
        "DATE" => Decode::Date,
        "TIME" => Decode::Time,
        "JSON" => Decode::Json,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Decode::Bytes,
        _ => Decode::Text,
    }
}

/// UTF-8 bytes become a string, anything else an array of byte values.
fn bytes_to_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => Value::Array(e.into_bytes().into_iter().map(Value::from).collect()),
    }
}

fn decode_column(row: &MySqlRow, i: usize, decode: Decode) -> Result<Value, sqlx::Error> {
    let value = match decode {
        Decode::Bool => row.try_get::<Option<bool>, _>(i)?.map(Value::Bool),
        Decode::Signed => row.try_get::<Option<i64>, _>(i)?.map(Value::from),
        Decode::Unsigned => row.try_get::<Option<u64>, _>(i)?.map(Value::from),
        Decode::Year => row.try_get_unchecked::<Option<u16>, _>(i)?.map(Value::from),
        Decode::Float => row
            .try_get::<Option<f64>, _>(i)?
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Decode::Decimal => row
            .try_get_unchecked::<Option<String>, _>(i)?
            .map(Value::String),
        Decode::DateTime => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(i)?
            .map(|v| Value::String(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        Decode::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(i)?
            .map(|v| Value::String(v.format("%Y-%m-%d").to_string())),
        Decode::Time => row
            .try_get::<Option<chrono::NaiveTime>, _>(i)?
            .map(|v| Value::String(v.format("%H:%M:%S").to_string())),
        Decode::Json => row
            .try_get::<Option<sqlx::types::Json<Value>>, _>(i)?
            .map(|json| json.0),
        // Text in a collation sqlx does not accept as String is read raw
        Decode::Text => match row.try_get::<Option<String>, _>(i) {
            Ok(text) => text.map(Value::String),
            Err(_) => row
                .try_get_unchecked::<Option<Vec<u8>>, _>(i)?
                .map(bytes_to_value),
        },
        Decode::Bytes => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(i)?
            .map(bytes_to_value),
    };

    Ok(value.unwrap_or(Value::Null))
}

/// Convert a MySqlRow to an ordered map. A column that cannot be decoded is
/// an error, never a silent NULL.
fn row_to_map(row: &MySqlRow) -> KeelResult<Row> {
    let mut map = Row::new();

    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let type_name = column.type_info().name();

        let value = decode_column(row, i, decode_for(type_name)).map_err(|e| {
            KeelError::Query(format!(
                "cannot decode column \"{}\" of type {}: {}",
                name, type_name, e
            ))
        })?;

        map.insert(name.to_string(), value);
    }

    Ok(map)
}

/// Explicit context handed to builders and models.
#[derive(Clone)]
pub struct Db {
    executor: Arc<dyn Executor>,
    registry: Arc<Registry>,
}

impl Db {
    pub fn new(executor: Arc<dyn Executor>, registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            executor,
            registry: registry.into(),
        }
    }

    /// Connect to MySQL and wrap the executor.
    pub async fn connect(
        config: &DatabaseConfig,
        registry: impl Into<Arc<Registry>>,
    ) -> KeelResult<Self> {
        let executor = MySqlExecutor::connect(config).await?;
        Ok(Self::new(Arc::new(executor), registry))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// A fresh, unstored instance of the registered model type.
    pub fn model(&self, type_name: &str) -> KeelResult<Model> {
        let schema = self.registry.get(type_name)?;
        Ok(Model::new(self.clone(), schema))
    }

    pub async fn fetch_all(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        tracing::debug!(sql, params = params.len(), "fetching rows");
        self.executor.fetch_all(sql, params).await
    }

    pub async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<Executed> {
        tracing::debug!(sql, params = params.len(), "executing statement");
        self.executor.execute(sql, params).await
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Creates the connection on first use and hands out the same [`Db`]
/// afterwards. Configuration is read at most once.
pub struct ConnectionProvider {
    config: Option<DatabaseConfig>,
    registry: Arc<Registry>,
    db: OnceCell<Db>,
}

impl ConnectionProvider {
    /// Use `config` when the connection is first needed.
    pub fn new(config: DatabaseConfig, registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            config: Some(config),
            registry: registry.into(),
            db: OnceCell::new(),
        }
    }

    /// Read configuration (file and environment) when the connection is first needed.
    pub fn from_env(registry: impl Into<Arc<Registry>>) -> Self {
        Self {
            config: None,
            registry: registry.into(),
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-built context, e.g. one backed by a test executor.
    pub fn with_db(db: Db) -> Self {
        Self {
            config: None,
            registry: db.registry.clone(),
            db: OnceCell::new_with(Some(db)),
        }
    }

    /// The memoized context, connecting on the first call.
    pub async fn get(&self) -> KeelResult<Db> {
        self.db
            .get_or_try_init(|| async {
                let config = match &self.config {
                    Some(config) => config.clone(),
                    None => DatabaseConfig::load(None)?,
                };
                Db::connect(&config, self.registry.clone()).await
            })
            .await
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        self.db.initialized()
    }
}
