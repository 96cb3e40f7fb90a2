//! Active-record models.
//!
//! A [`Model`] is one row of a registered type. It loads itself with
//! [`find`](Model::find), persists with [`create`](Model::create) /
//! [`save`](Model::save), removes itself with [`delete`](Model::delete) and
//! resolves declared relationships on demand with [`with`](Model::with).
//!
//! ```rust,ignore
//! let mut post = db.model("Post")?;
//! post.find_or_fail(12, None).await?;
//! post.with(&["author.country", "comments"]).await?;
//! println!("{}", post.to_array());
//! ```

use std::sync::Arc;

use async_recursion::async_recursion;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::ast::{Field, Where};
use crate::collection::ModelCollection;
use crate::engine::{Db, Row};
use crate::error::{KeelError, KeelResult};
use crate::query::{Builder, Query, Select, Selection};
use crate::schema::{RelationDef, RelationKind, Schema};

/// A resolved relationship, cached on the model that loaded it.
#[derive(Debug, Clone)]
pub enum Related {
    One(Model),
    Many(ModelCollection),
    None,
}

impl Related {
    pub fn is_empty(&self) -> bool {
        match self {
            Related::One(_) => false,
            Related::Many(models) => models.is_empty(),
            Related::None => true,
        }
    }

    pub fn as_one(&self) -> Option<&Model> {
        match self {
            Related::One(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&ModelCollection> {
        match self {
            Related::Many(models) => Some(models),
            _ => None,
        }
    }

    pub fn to_array(&self) -> Value {
        match self {
            Related::One(model) => model.to_array(),
            Related::Many(models) => models.to_array(),
            Related::None => Value::Null,
        }
    }
}

impl PartialEq for Related {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}

/// Result of reading a named attribute, in lookup order.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute<'a> {
    /// A date field parsed into a timestamp
    Date(NaiveDateTime),
    Value(&'a Value),
    Related(&'a Related),
    /// Output of a computed accessor
    Computed(Value),
    Missing,
}

impl<'a> Attribute<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Attribute::Missing)
    }

    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Attribute::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDateTime> {
        match self {
            Attribute::Date(date) => Some(*date),
            _ => None,
        }
    }
}

/// Conversion into a keyed attribute map.
///
/// Anything that is not a non-empty keyed mapping fails with
/// [`KeelError::Array`].
pub trait IntoAttributes {
    fn into_attributes(self) -> KeelResult<Row>;
}

impl IntoAttributes for Row {
    fn into_attributes(self) -> KeelResult<Row> {
        if self.is_empty() {
            return Err(KeelError::Array("Array must be associative".into()));
        }
        Ok(self)
    }
}

impl IntoAttributes for Value {
    fn into_attributes(self) -> KeelResult<Row> {
        match self {
            Value::Object(map) => map.into_attributes(),
            _ => Err(KeelError::Array("Array must be associative".into())),
        }
    }
}

/// One row of a registered model type.
#[derive(Debug, Clone)]
pub struct Model {
    db: Db,
    schema: Arc<Schema>,
    attributes: Row,
    relationships: IndexMap<String, Related>,
    stored: bool,
}

impl Model {
    pub(crate) fn new(db: Db, schema: Arc<Schema>) -> Self {
        Self {
            db,
            schema,
            attributes: Row::new(),
            relationships: IndexMap::new(),
            stored: false,
        }
    }

    /// A new, empty, unstored instance of the same type.
    pub fn fresh(&self) -> Model {
        Model::new(self.db.clone(), self.schema.clone())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn table(&self) -> &str {
        self.schema.table_name()
    }

    /// Raw attributes, hidden fields included.
    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// Attributes limited to the primary, data and date fields.
    pub fn public_attributes(&self) -> Row {
        let visible = self.schema.fillable(true, false);
        self.attributes
            .iter()
            .filter(|(key, _)| visible.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn relationships(&self) -> &IndexMap<String, Related> {
        &self.relationships
    }

    /// A relationship cached by [`with`](Model::with).
    pub fn related(&self, name: &str) -> Option<&Related> {
        self.relationships.get(name)
    }

    pub fn primary_key(&self) -> Option<&Value> {
        self.attributes
            .get(self.schema.primary())
            .filter(|value| !value.is_null())
    }

    pub fn has_primary_key(&self) -> bool {
        self.primary_key().is_some()
    }

    pub fn is_stored(&self) -> bool {
        self.stored
    }

    /// See [`Schema::fillable`].
    pub fn fillable(&self, show_primary: bool, show_hidden: bool) -> Vec<&str> {
        self.schema.fillable(show_primary, show_hidden)
    }

    /// Read a named attribute.
    ///
    /// Lookup order: date field, plain attribute, cached relationship,
    /// computed accessor. `"primary_key"` reads the primary field.
    pub fn get(&self, name: &str) -> Attribute<'_> {
        let name = if name == "primary_key" {
            self.schema.primary()
        } else {
            name
        };

        if let Some(value) = self.attributes.get(name) {
            if self.schema.is_date(name) {
                if let Some(timestamp) = parse_timestamp(value) {
                    return Attribute::Date(timestamp);
                }
            }
            return Attribute::Value(value);
        }

        if let Some(related) = self.relationships.get(name) {
            return Attribute::Related(related);
        }

        if let Some(accessor) = self.schema.computed_accessor(name) {
            return Attribute::Computed(accessor(self));
        }

        Attribute::Missing
    }

    /// Replace the attributes with the fillable subset of `attributes`
    /// without touching the backend.
    pub fn make(&mut self, attributes: impl IntoAttributes) -> KeelResult<&mut Self> {
        let attributes = attributes.into_attributes()?;
        let fillable = self.schema.fillable(true, true);

        self.attributes = attributes
            .into_iter()
            .filter(|(key, _)| fillable.contains(&key.as_str()))
            .collect();

        Ok(self)
    }

    /// Insert a new row built from the fillable subset of `attributes`.
    ///
    /// With auto-increment the assigned identity is written back into the
    /// primary field. The returned model is stored.
    pub async fn create(&self, attributes: impl IntoAttributes) -> KeelResult<Model> {
        let mut model = self.fresh();
        model.make(attributes)?;

        let fields: Vec<Field> = model
            .attributes
            .iter()
            .map(|(key, value)| Field::new(key.as_str()).with_value(value.clone()))
            .collect();

        let identity = Query::insert(&self.db, fields)
            .into_table(self.table())
            .run()
            .await?;

        if self.schema.is_auto_increment() {
            model
                .attributes
                .insert(self.schema.primary().to_string(), Value::from(identity));
        }

        model.stored = true;
        Ok(model)
    }

    /// Merge fillable, non-primary attributes, then [`save`](Model::save) if asked.
    pub async fn update(
        &mut self,
        attributes: impl IntoAttributes,
        save: bool,
    ) -> KeelResult<&mut Self> {
        let attributes = attributes.into_attributes()?;
        let fillable = self.schema.fillable(false, true);

        for (key, value) in attributes {
            if fillable.contains(&key.as_str()) {
                self.attributes.insert(key, value);
            }
        }

        if save {
            self.save().await?;
        }

        Ok(self)
    }

    /// Write the current attributes to the row with this primary key.
    pub async fn save(&self) -> KeelResult<bool> {
        let Some(key) = self.primary_key().cloned() else {
            return Err(KeelError::model("Model must have a primary key to be updated"));
        };

        let fields: Vec<Field> = self
            .schema
            .fillable(false, true)
            .into_iter()
            .filter_map(|name| {
                self.attributes
                    .get(name)
                    .map(|value| Field::new(name).with_value(value.clone()))
            })
            .collect();

        Query::update(&self.db, self.table())
            .set(fields)
            .filter([Where::new(self.schema.primary(), key)])
            .run()
            .await
    }

    /// Delete the row with this primary key. The model is no longer stored.
    pub async fn delete(&mut self) -> KeelResult<bool> {
        let Some(key) = self.primary_key().cloned() else {
            return Err(KeelError::model("Model must have a primary key to be deleted"));
        };

        Query::delete(&self.db, self.table())
            .filter([Where::new(self.schema.primary(), key)])
            .run()
            .await?;

        self.stored = false;
        Ok(true)
    }

    /// Load the first row whose `field` (default: primary) is LIKE `value`.
    ///
    /// On a miss the model is left untouched and unstored.
    pub async fn find(
        &mut self,
        value: impl Into<Value>,
        field: Option<&str>,
    ) -> KeelResult<&mut Self> {
        let selection = self
            .select_by(value.into(), field)
            .limit(1)
            .run(true, false)
            .await?;

        if let Selection::Row(row) = selection {
            self.attributes = row;
            self.stored = true;
        }

        Ok(self)
    }

    /// [`find`](Model::find), failing if nothing was found.
    pub async fn find_or_fail(
        &mut self,
        value: impl Into<Value>,
        field: Option<&str>,
    ) -> KeelResult<&mut Self> {
        self.find(value, field).await?;

        if !self.stored {
            return Err(KeelError::model("Model instance not found"));
        }

        Ok(self)
    }

    /// [`find`](Model::find), or create from `fill` plus `{field: value}`
    /// (the pair is left out when `field` is the primary field).
    pub async fn find_or_create(
        &mut self,
        fill: impl IntoAttributes,
        value: impl Into<Value>,
        field: Option<&str>,
    ) -> KeelResult<Model> {
        let value = value.into();
        self.find(value.clone(), field).await?;

        if self.stored {
            return Ok(self.clone());
        }

        let mut attributes = Row::new();
        if let Some(field) = field.filter(|f| *f != self.schema.primary()) {
            attributes.insert(field.to_string(), value);
        }
        attributes.extend(fill.into_attributes()?);

        self.create(attributes).await
    }

    /// Every row whose `field` (default: primary) is LIKE `value`.
    pub async fn find_many(
        &self,
        value: impl Into<Value>,
        field: Option<&str>,
    ) -> KeelResult<ModelCollection> {
        let rows = self
            .select_by(value.into(), field)
            .run(false, false)
            .await?
            .into_rows();

        let mut models = Vec::with_capacity(rows.len());
        for row in rows {
            let mut model = self.fresh();
            model.make(row)?;
            model.stored = true;
            models.push(model);
        }

        Ok(ModelCollection::new(models))
    }

    fn select_by(&self, value: Value, field: Option<&str>) -> Select {
        let fillable = self.schema.fillable(true, true);
        let fields = if fillable.len() > 1 { fillable } else { vec!["*"] };

        Query::select(&self.db, fields)
            .from(self.table())
            .filter([Where::like(field.unwrap_or(self.schema.primary()), value)])
    }

    /// Load `related` through the local attribute `local_field` (default:
    /// the related type's conventional foreign key).
    pub async fn has_one(
        &self,
        mut related: Model,
        foreign_field: Option<&str>,
        local_field: Option<&str>,
    ) -> KeelResult<Model> {
        let value = self.local_value(&related, local_field)?;
        related.find(value, foreign_field).await?;
        Ok(related)
    }

    /// Load every `related` row matching the local attribute `local_field`.
    pub async fn has_many(
        &self,
        related: Model,
        foreign_field: Option<&str>,
        local_field: Option<&str>,
    ) -> KeelResult<ModelCollection> {
        let value = self.local_value(&related, local_field)?;
        related.find_many(value, foreign_field).await
    }

    fn local_value(&self, related: &Model, local_field: Option<&str>) -> KeelResult<Value> {
        let local_field = local_field
            .map(str::to_string)
            .unwrap_or_else(|| related.schema.foreign_key());

        self.attributes.get(&local_field).cloned().ok_or_else(|| {
            KeelError::model(format!(
                "\"{}\" does not exist in stored attributes",
                local_field
            ))
        })
    }

    /// Resolve and cache relationships named by dot paths such as
    /// `"author.country"`. Unknown names are skipped.
    pub async fn with(&mut self, paths: &[&str]) -> KeelResult<&mut Self> {
        if !self.has_primary_key() {
            return Err(KeelError::model(
                "A model must have a primary key before attempting to get relationships",
            ));
        }

        for path in paths {
            self.load_path(path).await?;
        }

        Ok(self)
    }

    #[async_recursion]
    async fn load_path(&mut self, path: &str) -> KeelResult<()> {
        let (name, rest) = match path.split_once('.') {
            Some((name, rest)) => (name, Some(rest)),
            None => (path, None),
        };

        let Some(def) = self.schema.relation_def(name).cloned() else {
            tracing::debug!(model = self.schema.type_name(), relationship = name, "unknown relationship");
            return Ok(());
        };

        let resolved = self.resolve(&def).await?;
        let related = self.relationships.entry(name.to_string()).or_insert(Related::None);
        *related = resolved;

        let Some(rest) = rest else {
            return Ok(());
        };

        match related {
            Related::One(model) => {
                model.with(&[rest]).await?;
            }
            Related::Many(models) if !models.is_empty() => {
                models.with(&[rest]).await?;
            }
            _ => {}
        }

        Ok(())
    }

    async fn resolve(&self, def: &RelationDef) -> KeelResult<Related> {
        let related = self.db.model(&def.related)?;
        let foreign = def.foreign_field.as_deref();
        let local = def.local_field.as_deref();

        match def.kind {
            RelationKind::HasOne => {
                let model = self.has_one(related, foreign, local).await?;
                Ok(if model.is_stored() {
                    Related::One(model)
                } else {
                    Related::None
                })
            }
            RelationKind::HasMany => Ok(Related::Many(self.has_many(related, foreign, local).await?)),
        }
    }

    /// Visible attributes merged with relationships, recursively.
    pub fn to_array(&self) -> Value {
        let mut map = Row::new();

        for (key, value) in &self.attributes {
            if self.schema.is_hidden(key) {
                continue;
            }
            map.insert(key.clone(), self.strip_hidden(value));
        }

        for (key, related) in &self.relationships {
            map.insert(key.clone(), related.to_array());
        }

        Value::Object(map)
    }

    fn strip_hidden(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !self.schema.is_hidden(key))
                    .map(|(key, value)| (key.clone(), self.strip_hidden(value)))
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.strip_hidden(v)).collect()),
            other => other.clone(),
        }
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.schema().type_name() == other.schema().type_name()
            && self.is_stored() == other.is_stored()
            && self.to_array() == other.to_array()
    }
}

/// Parse a stored date: SQL datetime, ISO 8601 / RFC 3339, plain date, or
/// unix seconds.
fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => {
            const FORMATS: [&str; 4] = [
                "%Y-%m-%d %H:%M:%S",
                "%Y-%m-%d %H:%M:%S%.f",
                "%Y-%m-%dT%H:%M:%S",
                "%Y-%m-%dT%H:%M:%S%.f",
            ];
            FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .or_else(|| {
                    chrono::DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|dt| dt.naive_utc())
                })
                .or_else(|| {
                    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}
