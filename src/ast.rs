//! Condition AST for statement builders.
//!
//! These are plain value objects: a column reference ([`Field`]), a
//! comparison ([`Where`]) and a join ([`Join`]). A [`Field`] without a table
//! is resolved against the owning statement's table when compiled.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{KeelError, KeelResult};

/// A column reference, optionally carrying a value for INSERT/UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub field: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl Field {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            table: None,
            value: None,
        }
    }

    /// Pin this reference to an explicit table.
    pub fn on(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Attach the value written by INSERT/UPDATE.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// `table.field`, falling back to `default_table` when no table is set.
    pub fn qualified(&self, default_table: &str) -> String {
        format!(
            "{}.{}",
            self.table.as_deref().unwrap_or(default_table),
            self.field
        )
    }
}

impl From<&str> for Field {
    fn from(field: &str) -> Self {
        Field::new(field)
    }
}

impl From<String> for Field {
    fn from(field: String) -> Self {
        Field::new(field)
    }
}

/// Comparison operator of a [`Where`] clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Comparitor {
    #[default]
    Equals,
    Like,
    Gt,
    Gte,
    Lt,
    Lte,
    IsNull,
    IsNotNull,
    In,
}

impl Comparitor {
    /// SQL symbol for operators taking a single right-hand operand.
    pub fn sql_symbol(&self) -> Option<&'static str> {
        match self {
            Comparitor::Equals => Some("="),
            Comparitor::Like => Some("LIKE"),
            Comparitor::Gt => Some(">"),
            Comparitor::Gte => Some(">="),
            Comparitor::Lt => Some("<"),
            Comparitor::Lte => Some("<="),
            Comparitor::IsNull | Comparitor::IsNotNull | Comparitor::In => None,
        }
    }

    /// Returns true if this operator has no right-hand side.
    pub fn is_null_check(&self) -> bool {
        matches!(self, Comparitor::IsNull | Comparitor::IsNotNull)
    }
}

/// How a clause attaches to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Relation::And => write!(f, "AND"),
            Relation::Or => write!(f, "OR"),
        }
    }
}

/// One side of a comparison: another column or a scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    Column(Field),
    Value(Value),
}

impl From<Field> for Operand {
    fn from(field: Field) -> Self {
        Operand::Column(field)
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<&str> for Operand {
    fn from(value: &str) -> Self {
        Operand::Value(value.into())
    }
}

impl From<String> for Operand {
    fn from(value: String) -> Self {
        Operand::Value(value.into())
    }
}

impl From<i64> for Operand {
    fn from(value: i64) -> Self {
        Operand::Value(value.into())
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Value(value.into())
    }
}

impl From<f64> for Operand {
    fn from(value: f64) -> Self {
        Operand::Value(value.into())
    }
}

impl From<bool> for Operand {
    fn from(value: bool) -> Self {
        Operand::Value(value.into())
    }
}

/// Right-hand side of a [`Where`] clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Comparison {
    #[default]
    None,
    Single(Operand),
    List(Vec<Operand>),
}

impl Comparison {
    pub fn is_list(&self) -> bool {
        matches!(self, Comparison::List(_))
    }
}

impl From<Field> for Comparison {
    fn from(field: Field) -> Self {
        Comparison::Single(Operand::Column(field))
    }
}

impl From<Operand> for Comparison {
    fn from(operand: Operand) -> Self {
        Comparison::Single(operand)
    }
}

impl From<Value> for Comparison {
    fn from(value: Value) -> Self {
        Comparison::Single(Operand::Value(value))
    }
}

impl From<&str> for Comparison {
    fn from(value: &str) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<String> for Comparison {
    fn from(value: String) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<i64> for Comparison {
    fn from(value: i64) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<i32> for Comparison {
    fn from(value: i32) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<bool> for Comparison {
    fn from(value: bool) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<f64> for Comparison {
    fn from(value: f64) -> Self {
        Comparison::Single(Operand::Value(value.into()))
    }
}

impl From<Vec<Operand>> for Comparison {
    fn from(list: Vec<Operand>) -> Self {
        Comparison::List(list)
    }
}

/// A single condition of a WHERE clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub field: Field,
    pub comparison: Comparison,
    #[serde(default)]
    pub comparitor: Comparitor,
    #[serde(default)]
    pub relation: Relation,
}

impl Where {
    /// An `=` comparison joined with AND.
    pub fn new(field: impl Into<Field>, comparison: impl Into<Comparison>) -> Self {
        Self {
            field: field.into(),
            comparison: comparison.into(),
            comparitor: Comparitor::default(),
            relation: Relation::default(),
        }
    }

    /// Checked construction: IN requires a list and only IN accepts one.
    pub fn try_new(
        field: impl Into<Field>,
        comparison: impl Into<Comparison>,
        comparitor: Comparitor,
        relation: Relation,
    ) -> KeelResult<Self> {
        let comparison = comparison.into();
        if (comparitor == Comparitor::In) != comparison.is_list() {
            return Err(KeelError::query(format!(
                "{:?} comparitor cannot take {} comparison",
                comparitor,
                if comparison.is_list() { "a list" } else { "a single" }
            )));
        }
        Ok(Self {
            field: field.into(),
            comparison,
            comparitor,
            relation,
        })
    }

    pub fn eq(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value)
    }

    pub fn like(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value).comparitor(Comparitor::Like)
    }

    pub fn gt(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value).comparitor(Comparitor::Gt)
    }

    pub fn gte(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value).comparitor(Comparitor::Gte)
    }

    pub fn lt(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value).comparitor(Comparitor::Lt)
    }

    pub fn lte(field: impl Into<Field>, value: impl Into<Comparison>) -> Self {
        Self::new(field, value).comparitor(Comparitor::Lte)
    }

    pub fn is_null(field: impl Into<Field>) -> Self {
        Self::new(field, Comparison::None).comparitor(Comparitor::IsNull)
    }

    pub fn is_not_null(field: impl Into<Field>) -> Self {
        Self::new(field, Comparison::None).comparitor(Comparitor::IsNotNull)
    }

    pub fn is_in<I, O>(field: impl Into<Field>, items: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Operand>,
    {
        let list = items.into_iter().map(Into::into).collect::<Vec<_>>();
        Self::new(field, Comparison::List(list)).comparitor(Comparitor::In)
    }

    pub fn comparitor(mut self, comparitor: Comparitor) -> Self {
        self.comparitor = comparitor;
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relation = relation;
        self
    }

    /// Attach this clause to the previous one with OR.
    pub fn or(self) -> Self {
        self.relation(Relation::Or)
    }
}

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
}

impl std::fmt::Display for JoinKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinKind::Inner => write!(f, "INNER JOIN"),
            JoinKind::Left => write!(f, "LEFT JOIN"),
            JoinKind::Right => write!(f, "RIGHT JOIN"),
        }
    }
}

/// A join definition. The foreign side must name its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub local: Field,
    pub foreign: Field,
    #[serde(default)]
    pub kind: JoinKind,
}

impl Join {
    pub fn new(local: impl Into<Field>, foreign: Field) -> Self {
        Self {
            local: local.into(),
            foreign,
            kind: JoinKind::default(),
        }
    }

    pub fn inner(local: impl Into<Field>, foreign: Field) -> Self {
        Self::new(local, foreign)
    }

    pub fn left(local: impl Into<Field>, foreign: Field) -> Self {
        Self::new(local, foreign).kind(JoinKind::Left)
    }

    pub fn right(local: impl Into<Field>, foreign: Field) -> Self {
        Self::new(local, foreign).kind(JoinKind::Right)
    }

    pub fn kind(mut self, kind: JoinKind) -> Self {
        self.kind = kind;
        self
    }

    /// `KIND JOIN foreign_table ON local = foreign`.
    pub fn to_sql(&self, default_table: &str) -> String {
        let foreign_table = self.foreign.table.as_deref().unwrap_or_default();
        format!(
            "{} {} ON {} = {}.{}",
            self.kind,
            foreign_table,
            self.local.qualified(default_table),
            foreign_table,
            self.foreign.field
        )
    }
}
