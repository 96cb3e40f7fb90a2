use super::{Builder, Compiled, Statement};
use crate::ast::Field;
use crate::compiler::{compile_assignments, compile_wheres};
use crate::engine::Db;
use crate::error::{KeelError, KeelResult};

/// UPDATE builder.
#[derive(Debug, Clone)]
pub struct Update {
    stmt: Statement,
}

impl Update {
    pub fn new(db: &Db) -> Self {
        Self {
            stmt: Statement::new(db),
        }
    }

    /// Set the table to update.
    pub fn update(mut self, table: impl Into<String>) -> Self {
        self.stmt.set_table(table);
        self
    }

    /// Set the fields (with values) to write.
    pub fn set(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.stmt.set_fields(fields.into_iter().collect());
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

impl Builder for Update {
    fn statement(&self) -> &Statement {
        &self.stmt
    }

    fn statement_mut(&mut self) -> &mut Statement {
        &mut self.stmt
    }

    fn compile(&self) -> KeelResult<Compiled> {
        let table = self.stmt.table.as_str();
        if table.is_empty() || self.stmt.fields.is_empty() {
            return Err(KeelError::query("Missing table or fields for update query"));
        }

        let mut params = Vec::new();
        let mut bits = vec![
            "UPDATE".to_string(),
            table.to_string(),
            "SET".to_string(),
            compile_assignments(&self.stmt.fields, table, self.stmt.mode, &mut params),
        ];

        if let Some(wheres) = compile_wheres(&self.stmt.wheres, table, self.stmt.mode, &mut params) {
            bits.push(wheres);
        }

        Ok(Compiled {
            sql: bits.join(" "),
            params,
        })
    }
}
