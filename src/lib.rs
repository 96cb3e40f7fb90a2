//! # keel — SQL statements and active-record models for MySQL
//!
//! keel builds parameterized SELECT / INSERT / UPDATE / DELETE statements,
//! compiles WHERE clauses with AND/OR grouping, and layers an active-record
//! [`Model`](model::Model) on top.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use keel::prelude::*;
//!
//! let registry = Registry::new()
//!     .register(Schema::new("User").fields(["name", "email"]).hidden(["password"]));
//! let db = Db::connect(&DatabaseConfig::load(None)?, registry).await?;
//!
//! let rows = Query::select(&db, ["id", "email"])
//!     .from("users")
//!     .filter([Where::like("email", "%@example.com"), Where::is_null("banned_at").or()])
//!     .limit(10)
//!     .run(true, true)
//!     .await?;
//!
//! let mut user = db.model("User")?;
//! user.find_or_fail(7, None).await?;
//! ```
//!
//! ## Comparitors
//!
//! | Comparitor  | SQL           |
//! |-------------|---------------|
//! | `Equals`    | `=`           |
//! | `Like`      | `LIKE`        |
//! | `Gt`/`Gte`  | `>` / `>=`    |
//! | `Lt`/`Lte`  | `<` / `<=`    |
//! | `IsNull`    | `IS NULL`     |
//! | `IsNotNull` | `IS NOT NULL` |
//! | `In`        | `IN ( ... )`  |

pub mod ast;
pub mod collection;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod inflect;
pub mod model;
pub mod query;
pub mod schema;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::collection::ModelCollection;
    pub use crate::compiler::Mode;
    pub use crate::config::DatabaseConfig;
    pub use crate::engine::{ConnectionProvider, Db, Executed, Executor, MySqlExecutor, Row};
    pub use crate::error::*;
    pub use crate::model::{Attribute, IntoAttributes, Model, Related};
    pub use crate::query::{Builder, Delete, Insert, Query, Select, Selection, Update};
    pub use crate::schema::{Registry, Schema};
}

/// Parse a command-line condition string into a [`Where`](ast::Where) clause.
///
/// # Example
///
/// ```
/// use keel::parse_filter;
///
/// let clause = parse_filter("|email~%@example.com").unwrap();
/// assert_eq!(clause.field.field, "email");
/// ```
pub fn parse_filter(input: &str) -> Result<ast::Where, error::KeelError> {
    filter::parse(input)
}
