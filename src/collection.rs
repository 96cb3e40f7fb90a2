//! Ordered groups of models.

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::KeelResult;
use crate::model::Model;

/// An ordered collection of models, usually of one type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelCollection {
    models: Vec<Model>,
}

impl ModelCollection {
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Model> {
        self.models.get(index)
    }

    pub fn first(&self) -> Option<&Model> {
        self.models.first()
    }

    pub fn push(&mut self, model: Model) {
        self.models.push(model);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Model> {
        self.models.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Model> {
        self.models.iter_mut()
    }

    pub fn into_vec(self) -> Vec<Model> {
        self.models
    }

    /// Resolve the same relationship paths on every member.
    pub async fn with(&mut self, paths: &[&str]) -> KeelResult<&mut Self> {
        for model in &mut self.models {
            model.with(paths).await?;
        }
        Ok(self)
    }

    /// Delete every member, front to back. A failure stops the loop and
    /// leaves the failing model and the rest in place.
    pub async fn delete(&mut self) -> KeelResult<&mut Self> {
        while let Some(model) = self.models.first_mut() {
            model.delete().await?;
            self.models.remove(0);
        }
        Ok(self)
    }

    /// Each member's [`Model::to_array`], in order.
    pub fn to_array(&self) -> Value {
        Value::Array(self.models.iter().map(Model::to_array).collect())
    }
}

impl From<Vec<Model>> for ModelCollection {
    fn from(models: Vec<Model>) -> Self {
        Self::new(models)
    }
}

impl FromIterator<Model> for ModelCollection {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for ModelCollection {
    type Item = Model;
    type IntoIter = std::vec::IntoIter<Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.into_iter()
    }
}

impl<'a> IntoIterator for &'a ModelCollection {
    type Item = &'a Model;
    type IntoIter = std::slice::Iter<'a, Model>;

    fn into_iter(self) -> Self::IntoIter {
        self.models.iter()
    }
}

impl Serialize for ModelCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}
