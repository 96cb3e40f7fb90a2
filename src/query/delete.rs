use super::{Builder, Compiled, Statement};
use crate::compiler::compile_wheres;
use crate::engine::Db;
use crate::error::{KeelError, KeelResult};

/// DELETE builder.
#[derive(Debug, Clone)]
pub struct Delete {
    stmt: Statement,
}

impl Delete {
    pub fn new(db: &Db) -> Self {
        Self {
            stmt: Statement::new(db),
        }
    }

    /// Set the table to delete from.
    pub fn delete(mut self, table: impl Into<String>) -> Self {
        self.stmt.set_table(table);
        self
    }

    /// Execute. Matching no rows is not an error.
    pub async fn run(mut self) -> KeelResult<bool> {
        self.build()?;
        let compiled = self.stmt.take_compiled();
        self.stmt.db.execute(&compiled.sql, &compiled.params).await?;
        Ok(true)
    }
}

impl Builder for Delete {
    fn statement(&self) -> &Statement {
        &self.stmt
    }

    fn statement_mut(&mut self) -> &mut Statement {
        &mut self.stmt
    }

    fn compile(&self) -> KeelResult<Compiled> {
        let table = self.stmt.table.as_str();
        if table.is_empty() {
            return Err(KeelError::query("Missing table for delete query"));
        }

        let mut sql = format!("DELETE FROM {}", table);
        let mut params = Vec::new();
        if let Some(wheres) = compile_wheres(&self.stmt.wheres, table, self.stmt.mode, &mut params) {
            sql.push(' ');
            sql.push_str(&wheres);
        }

        Ok(Compiled { sql, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Where;
    use crate::query::tests::{Recorder, db_with};
    use crate::query::Query;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_delete_sql() {
        let (db, _) = db_with(Recorder::default());
        let mut q = Query::delete(&db, "sessions").filter([Where::lt("expires", 100)]);
        q.build().unwrap();
        assert_eq!(q.sql(), Some("DELETE FROM sessions WHERE sessions.expires < ?"));
        assert_eq!(q.params(), &[json!(100)]);

        let mut all = Query::delete(&db, "sessions");
        all.build().unwrap();
        assert_eq!(all.sql(), Some("DELETE FROM sessions"));
    }

    #[test]
    fn test_delete_requires_table() {
        let (db, _) = db_with(Recorder::default());
        let mut q = Query::delete(&db, "");
        assert!(matches!(q.build(), Err(KeelError::Query(_))));
    }
}
