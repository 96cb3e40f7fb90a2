use super::{Builder, Compiled, Statement};
use crate::ast::Field;
use crate::compiler::compile_assignments;
use crate::engine::Db;
use crate::error::{KeelError, KeelResult};

/// INSERT builder. Each field carries the value it writes.
#[derive(Debug, Clone)]
pub struct Insert {
    stmt: Statement,
}

impl Insert {
    pub fn new(db: &Db) -> Self {
        Self {
            stmt: Statement::new(db),
        }
    }

    /// Set the fields to write.
    pub fn insert(mut self, fields: impl IntoIterator<Item = Field>) -> Self {
        self.stmt.set_fields(fields.into_iter().collect());
        self
    }

    /// Set the target table.
    pub fn into_table(mut self, table: impl Into<String>) -> Self {
        self.stmt.set_table(table);
        self
    }

    /// Execute, returning the identity the backend assigned to the new row.
    pub async fn run(mut self) -> KeelResult<u64> {
        self.build()?;
        let compiled = self.stmt.take_compiled();
        let executed = self.stmt.db.execute(&compiled.sql, &compiled.params).await?;
        Ok(executed.last_insert_id)
    }
}

impl Builder for Insert {
    fn statement(&self) -> &Statement {
        &self.stmt
    }

    fn statement_mut(&mut self) -> &mut Statement {
        &mut self.stmt
    }

    fn compile(&self) -> KeelResult<Compiled> {
        let table = self.stmt.table.as_str();
        if table.is_empty() || self.stmt.fields.is_empty() {
            return Err(KeelError::query("Missing table or fields for insert query"));
        }

        let mut params = Vec::new();
        let assignments = compile_assignments(&self.stmt.fields, table, self.stmt.mode, &mut params);

        Ok(Compiled {
            sql: format!("INSERT INTO {} SET {}", table, assignments),
            params,
        })
    }
}
