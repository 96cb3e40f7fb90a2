//! Model metadata.
//!
//! A [`Schema`] describes one model type: its table, primary key, field
//! groups, relationships and computed accessors. Schemas are registered by
//! type name in a [`Registry`], which is how relationships find the model
//! on the other side.
//!
//! ```rust,ignore
//! let registry = Registry::new()
//!     .register(Schema::new("User").fields(["name", "email"]).hidden(["password"]))
//!     .register(
//!         Schema::new("Post")
//!             .fields(["title", "user_id"])
//!             .dates(["published_at"])
//!             .has_one("author", "User")
//!             .has_many_via("comments", "Comment", Some("post_id"), Some("id")),
//!     );
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::{KeelError, KeelResult};
use crate::inflect;
use crate::model::Model;

/// Whether a relationship resolves to one model or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    HasOne,
    HasMany,
}

/// A declared relationship to another registered model type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDef {
    pub kind: RelationKind,
    /// Type name of the related model
    pub related: String,
    /// Column on the related table; defaults to its primary key
    pub foreign_field: Option<String>,
    /// Attribute on this model; defaults to the related type's foreign key
    pub local_field: Option<String>,
}

/// A zero-argument accessor computed from a model.
pub type Computed = Arc<dyn Fn(&Model) -> Value + Send + Sync>;

/// Metadata for one model type.
#[derive(Clone)]
pub struct Schema {
    type_name: String,
    table: String,
    primary_field: String,
    auto_increment: bool,
    fields: Vec<String>,
    dates: Vec<String>,
    hidden: Vec<String>,
    relations: IndexMap<String, RelationDef>,
    computed: IndexMap<String, Computed>,
}

impl Schema {
    /// The table defaults to the plural snake case of `type_name`.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self {
            table: inflect::table_name(&type_name),
            type_name,
            primary_field: "id".to_string(),
            auto_increment: true,
            fields: Vec::new(),
            dates: Vec::new(),
            hidden: Vec::new(),
            relations: IndexMap::new(),
            computed: IndexMap::new(),
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn primary_field(mut self, field: impl Into<String>) -> Self {
        self.primary_field = field.into();
        self
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    /// Plain data fields.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Fields read back as timestamps.
    pub fn dates<I, S>(mut self, dates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dates = dates.into_iter().map(Into::into).collect();
        self
    }

    /// Fields stored and fillable but left out of serialization.
    pub fn hidden<I, S>(mut self, hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = hidden.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_one(self, name: impl Into<String>, related: impl Into<String>) -> Self {
        self.relation(name, RelationKind::HasOne, related, None, None)
    }

    pub fn has_one_via(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_field: Option<&str>,
        local_field: Option<&str>,
    ) -> Self {
        self.relation(name, RelationKind::HasOne, related, foreign_field, local_field)
    }

    pub fn has_many(self, name: impl Into<String>, related: impl Into<String>) -> Self {
        self.relation(name, RelationKind::HasMany, related, None, None)
    }

    pub fn has_many_via(
        self,
        name: impl Into<String>,
        related: impl Into<String>,
        foreign_field: Option<&str>,
        local_field: Option<&str>,
    ) -> Self {
        self.relation(name, RelationKind::HasMany, related, foreign_field, local_field)
    }

    fn relation(
        mut self,
        name: impl Into<String>,
        kind: RelationKind,
        related: impl Into<String>,
        foreign_field: Option<&str>,
        local_field: Option<&str>,
    ) -> Self {
        self.relations.insert(
            name.into(),
            RelationDef {
                kind,
                related: related.into(),
                foreign_field: foreign_field.map(str::to_string),
                local_field: local_field.map(str::to_string),
            },
        );
        self
    }

    /// Register a computed accessor readable through [`Model::get`].
    pub fn computed(
        mut self,
        name: impl Into<String>,
        accessor: impl Fn(&Model) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.computed.insert(name.into(), Arc::new(accessor));
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn primary(&self) -> &str {
        &self.primary_field
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn data_fields(&self) -> &[String] {
        &self.fields
    }

    pub fn date_fields(&self) -> &[String] {
        &self.dates
    }

    pub fn hidden_fields(&self) -> &[String] {
        &self.hidden
    }

    pub fn is_date(&self, field: &str) -> bool {
        self.dates.iter().any(|d| d == field)
    }

    pub fn is_hidden(&self, field: &str) -> bool {
        self.hidden.iter().any(|h| h == field)
    }

    pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn computed_accessor(&self, name: &str) -> Option<&Computed> {
        self.computed.get(name)
    }

    /// Conventional foreign key pointing at this type, e.g. `user_id`.
    pub fn foreign_key(&self) -> String {
        inflect::foreign_key(&self.type_name)
    }

    /// Primary, data, date and (optionally) hidden fields, in that order.
    pub fn fillable(&self, show_primary: bool, show_hidden: bool) -> Vec<&str> {
        let primary = show_primary.then_some(self.primary_field.as_str());
        let hidden: &[String] = if show_hidden { &self.hidden } else { &[] };

        primary
            .into_iter()
            .chain(self.fields.iter().map(String::as_str))
            .chain(self.dates.iter().map(String::as_str))
            .chain(hidden.iter().map(String::as_str))
            .collect()
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("primary_field", &self.primary_field)
            .field("auto_increment", &self.auto_increment)
            .field("fields", &self.fields)
            .field("dates", &self.dates)
            .field("hidden", &self.hidden)
            .field("relations", &self.relations)
            .field("computed", &self.computed.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Model schemas by type name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    schemas: HashMap<String, Arc<Schema>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a schema, replacing any earlier one with the same type name.
    pub fn register(mut self, schema: Schema) -> Self {
        self.insert(schema);
        self
    }

    pub fn insert(&mut self, schema: Schema) {
        self.schemas
            .insert(schema.type_name.clone(), Arc::new(schema));
    }

    pub fn get(&self, type_name: &str) -> KeelResult<Arc<Schema>> {
        self.schemas
            .get(type_name)
            .cloned()
            .ok_or_else(|| KeelError::model(format!("Unknown model type \"{}\"", type_name)))
    }

    /// Table name registered for a type.
    pub fn table_of(&self, type_name: &str) -> Option<&str> {
        self.schemas.get(type_name).map(|s| s.table_name())
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
