use serde_json::Value;

use super::{Builder, Compiled, Statement};
use crate::ast::{Field, Join};
use crate::compiler::compile_wheres;
use crate::engine::{Db, Row};
use crate::error::{KeelError, KeelResult};

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct Select {
    stmt: Statement,
    joins: Vec<Join>,
    limit: Option<u64>,
    offset: Option<u64>,
}

/// What a SELECT produced, shaped by its limit and the `collapse`/`minify` flags.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// `LIMIT 1` matched nothing
    None,
    /// `LIMIT 1`, collapsed and minified, one field requested
    Scalar(Value),
    /// `LIMIT 1`, collapsed
    Row(Row),
    Rows(Vec<Row>),
}

impl Selection {
    pub fn is_none(&self) -> bool {
        matches!(self, Selection::None)
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            Selection::None | Selection::Scalar(_) => Vec::new(),
            Selection::Row(row) => vec![row],
            Selection::Rows(rows) => rows,
        }
    }

    pub fn into_row(self) -> Option<Row> {
        match self {
            Selection::Row(row) => Some(row),
            Selection::Rows(rows) => rows.into_iter().next(),
            Selection::None | Selection::Scalar(_) => None,
        }
    }

    pub fn into_scalar(self) -> Option<Value> {
        match self {
            Selection::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

impl Select {
    pub fn new(db: &Db) -> Self {
        Self {
            stmt: Statement::new(db),
            joins: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Set the columns to select. `"*"` selects every column of the table.
    pub fn select<I, F>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        self.stmt
            .set_fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Set the base table.
    pub fn from(mut self, table: impl Into<String>) -> Self {
        self.stmt.set_table(table);
        self
    }

    /// Replace the joins.
    pub fn join(mut self, joins: impl IntoIterator<Item = Join>) -> Self {
        self.joins = joins.into_iter().collect();
        self.stmt.compiled = None;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.stmt.compiled = None;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self.stmt.compiled = None;
        self
    }

    /// Execute with `collapse` and `minify` both on.
    pub async fn fetch(self) -> KeelResult<Selection> {
        self.run(true, true).await
    }

    /// Execute the query.
    ///
    /// No rows yields [`Selection::None`] under `LIMIT 1` and an empty
    /// [`Selection::Rows`] otherwise. Under `LIMIT 1` with `collapse`, the
    /// first row is returned alone, or just its value when one field was
    /// requested and `minify` is set.
    pub async fn run(mut self, collapse: bool, minify: bool) -> KeelResult<Selection> {
        self.build()?;
        let compiled = self.stmt.take_compiled();
        let rows = self.stmt.db.fetch_all(&compiled.sql, &compiled.params).await?;

        let single = self.limit == Some(1);

        let Some(first) = rows.first() else {
            return Ok(if single {
                Selection::None
            } else {
                Selection::Rows(Vec::new())
            });
        };

        if single && collapse {
            if self.stmt.fields.len() == 1 && minify {
                let value = first.values().next().cloned().unwrap_or(Value::Null);
                return Ok(Selection::Scalar(value));
            }
            return Ok(Selection::Row(first.clone()));
        }

        Ok(Selection::Rows(rows))
    }
}

impl Builder for Select {
    fn statement(&self) -> &Statement {
        &self.stmt
    }

    fn statement_mut(&mut self) -> &mut Statement {
        &mut self.stmt
    }

    fn compile(&self) -> KeelResult<Compiled> {
        let table = self.stmt.table.as_str();
        if table.is_empty() || self.stmt.fields.is_empty() {
            return Err(KeelError::query("Missing table or fields for select query"));
        }

        let fields: Vec<String> = self
            .stmt
            .fields
            .iter()
            .map(|f| f.qualified(table))
            .collect();

        let mut bits = vec![
            "SELECT".to_string(),
            fields.join(", "),
            "FROM".to_string(),
            table.to_string(),
        ];

        if !self.joins.is_empty() {
            let joins: Vec<String> = self.joins.iter().map(|j| j.to_sql(table)).collect();
            bits.push(joins.join(" "));
        }

        let mut params = Vec::new();
        if let Some(wheres) = compile_wheres(&self.stmt.wheres, table, self.stmt.mode, &mut params) {
            bits.push(wheres);
        }

        if let Some(limit) = self.limit.filter(|n| *n > 0) {
            bits.push(format!("LIMIT {}", limit));
        }

        if let Some(offset) = self.offset.filter(|n| *n > 0) {
            bits.push(format!("OFFSET {}", offset));
        }

        Ok(Compiled {
            sql: bits.join(" "),
            params,
        })
    }
}
