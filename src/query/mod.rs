//! Statement builders and the [`Query`] factory.
//!
//! A builder accumulates a table, fields, WHERE clauses and (for selects)
//! joins, limit and offset. [`Builder::build`] compiles them once into SQL
//! text plus positional parameters; `run` builds if needed and executes.
//!
//! ```rust,ignore
//! let row = Query::select(&db, ["id", "email"])
//!     .from("users")
//!     .filter([Where::new("active", true)])
//!     .limit(1)
//!     .run(true, false)
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod update;

pub use self::delete::Delete;
pub use self::insert::Insert;
pub use self::select::{Select, Selection};
pub use self::update::Update;

use serde_json::Value;

use crate::ast::{Field, Where};
use crate::compiler::Mode;
use crate::engine::Db;
use crate::error::{KeelError, KeelResult};

/// Compiled SQL and the values bound to its placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub sql: String,
    pub params: Vec<Value>,
}

/// State shared by every statement kind.
#[derive(Debug, Clone)]
pub struct Statement {
    db: Db,
    table: String,
    fields: Vec<Field>,
    wheres: Vec<Where>,
    mode: Mode,
    compiled: Option<Compiled>,
}

impl Statement {
    fn new(db: &Db) -> Self {
        Self {
            db: db.clone(),
            table: String::new(),
            fields: Vec::new(),
            wheres: Vec::new(),
            mode: Mode::default(),
            compiled: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn wheres(&self) -> &[Where] {
        &self.wheres
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    fn set_table(&mut self, table: impl Into<String>) {
        self.table = table.into();
        self.compiled = None;
    }

    fn set_fields(&mut self, fields: Vec<Field>) {
        self.fields = fields;
        self.compiled = None;
    }

    /// Take the compiled output for execution.
    fn take_compiled(&mut self) -> Compiled {
        self.compiled.take().unwrap_or_else(|| Compiled {
            sql: String::new(),
            params: Vec::new(),
        })
    }
}

/// Behaviour shared by [`Select`], [`Insert`], [`Update`] and [`Delete`].
pub trait Builder: Sized {
    fn statement(&self) -> &Statement;

    fn statement_mut(&mut self) -> &mut Statement;

    /// Produce SQL and parameters from the current state.
    fn compile(&self) -> KeelResult<Compiled>;

    /// Replace the WHERE clauses.
    fn filter(mut self, wheres: impl IntoIterator<Item = Where>) -> Self {
        let stmt = self.statement_mut();
        stmt.wheres = wheres.into_iter().collect();
        stmt.compiled = None;
        self
    }

    /// Append one WHERE clause.
    fn push_where(mut self, clause: Where) -> Self {
        let stmt = self.statement_mut();
        stmt.wheres.push(clause);
        stmt.compiled = None;
        self
    }

    /// Write values into the SQL text instead of binding them.
    ///
    /// No escaping is performed; never use with untrusted input.
    fn inline(mut self) -> Self {
        let stmt = self.statement_mut();
        stmt.mode = Mode::Inline;
        stmt.compiled = None;
        self
    }

    /// Compile once. Later calls return the same output until the
    /// builder is modified.
    fn build(&mut self) -> KeelResult<&Compiled> {
        if self.statement().compiled.is_none() {
            let compiled = self.compile()?;
            tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "compiled statement");
            self.statement_mut().compiled = Some(compiled);
        }
        self.statement()
            .compiled
            .as_ref()
            .ok_or_else(|| KeelError::query("statement was not compiled"))
    }

    /// The compiled SQL, if [`build`](Builder::build) has run.
    fn sql(&self) -> Option<&str> {
        self.statement().compiled.as_ref().map(|c| c.sql.as_str())
    }

    /// The compiled parameters, empty before [`build`](Builder::build).
    fn params(&self) -> &[Value] {
        self.statement()
            .compiled
            .as_ref()
            .map(|c| c.params.as_slice())
            .unwrap_or_default()
    }
}

/// Entry points for each statement kind.
pub struct Query;

impl Query {
    /// `SELECT fields ...`
    pub fn select<I, F>(db: &Db, fields: I) -> Select
    where
        I: IntoIterator<Item = F>,
        F: Into<Field>,
    {
        Select::new(db).select(fields)
    }

    /// `INSERT INTO ... SET fields`
    pub fn insert(db: &Db, fields: impl IntoIterator<Item = Field>) -> Insert {
        Insert::new(db).insert(fields)
    }

    /// `UPDATE table ...`
    pub fn update(db: &Db, table: impl Into<String>) -> Update {
        Update::new(db).update(table)
    }

    /// `DELETE FROM table ...`
    pub fn delete(db: &Db, table: impl Into<String>) -> Delete {
        Delete::new(db).delete(table)
    }

    /// Available statement kinds.
    pub fn types() -> &'static [&'static str] {
        &["select", "insert", "update", "delete"]
    }
}
