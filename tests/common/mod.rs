#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use keel::prelude::*;
use serde_json::Value;

/// Records every statement and answers reads from a queue of canned results.
#[derive(Default)]
pub struct FakeBackend {
    pub statements: Mutex<Vec<(String, Vec<Value>)>>,
    pub results: Mutex<VecDeque<Vec<Row>>>,
    pub insert_id: u64,
}

impl FakeBackend {
    pub fn with_insert_id(insert_id: u64) -> Self {
        Self {
            insert_id,
            ..Self::default()
        }
    }

    /// Queue the rows returned by the next read.
    pub fn push_rows(&self, rows: Vec<Value>) {
        self.results
            .lock()
            .unwrap()
            .push_back(rows.into_iter().map(row).collect());
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn params(&self, index: usize) -> Vec<Value> {
        self.statements.lock().unwrap()[index].1.clone()
    }

    pub fn count(&self) -> usize {
        self.statements.lock().unwrap().len()
    }
}

#[async_trait]
impl Executor for FakeBackend {
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> KeelResult<Vec<Row>> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(self.results.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> KeelResult<Executed> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        Ok(Executed {
            rows_affected: 1,
            last_insert_id: self.insert_id,
        })
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

/// User, Post, Comment and Country with the usual relationships.
pub fn registry() -> Registry {
    Registry::new()
        .register(
            Schema::new("User")
                .fields(["name", "email", "country_id"])
                .dates(["created_at"])
                .hidden(["password"])
                .has_one("country", "Country")
                .has_many_via("posts", "Post", Some("user_id"), Some("id"))
                .computed("display_name", |user| {
                    match (user.get("name").as_value(), user.get("email").as_value()) {
                        (Some(Value::String(name)), Some(Value::String(email))) => {
                            Value::String(format!("{} <{}>", name, email))
                        }
                        _ => Value::Null,
                    }
                }),
        )
        .register(
            Schema::new("Post")
                .fields(["title", "user_id"])
                .has_one("user", "User")
                .has_many_via("comments", "Comment", Some("post_id"), Some("id")),
        )
        .register(Schema::new("Comment").fields(["body", "post_id"]))
        .register(Schema::new("Country").table("countries").fields(["name"]))
}

pub fn setup(backend: FakeBackend) -> (Db, Arc<FakeBackend>) {
    let backend = Arc::new(backend);
    (Db::new(backend.clone(), registry()), backend)
}
