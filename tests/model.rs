mod common;

use common::{FakeBackend, row, setup};
use keel::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;

const USER_SELECT: &str = "SELECT users.id, users.name, users.email, users.country_id, users.created_at, users.password FROM users";

fn ann() -> serde_json::Value {
    json!({
        "id": 7,
        "name": "Ann",
        "email": "ann@example.com",
        "country_id": 3,
        "created_at": "2024-03-01 12:30:00",
        "password": "hash"
    })
}

#[tokio::test]
async fn test_find_loads_first_match() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();

    assert!(user.is_stored());
    assert_eq!(user.primary_key(), Some(&json!(7)));
    assert_eq!(
        backend.sql(),
        vec![format!("{} WHERE users.id LIKE ? LIMIT 1", USER_SELECT)]
    );
    assert_eq!(backend.params(0), vec![json!(7)]);
}

#[tokio::test]
async fn test_find_miss_leaves_model_unstored() {
    let (db, backend) = setup(FakeBackend::default());

    let mut user = db.model("User").unwrap();
    user.find("nobody@example.com", Some("email")).await.unwrap();
    assert!(!user.is_stored());
    assert!(user.attributes().is_empty());
    assert_eq!(
        backend.sql()[0],
        format!("{} WHERE users.email LIKE ? LIMIT 1", USER_SELECT)
    );

    let err = user.find_or_fail(99, None).await.unwrap_err();
    assert!(matches!(err, KeelError::Model(_)));
}

#[tokio::test]
async fn test_find_miss_keeps_made_attributes() {
    let (db, backend) = setup(FakeBackend::default());

    let mut user = db.model("User").unwrap();
    user.make(json!({"id": 4, "name": "Ann", "email": "ann@example.com"}))
        .unwrap();
    let before = user.attributes().clone();

    user.find(4, None).await.unwrap();

    assert!(!user.is_stored());
    assert_eq!(user.attributes(), &before);
    assert_eq!(
        serde_json::to_string(user.attributes()).unwrap(),
        serde_json::to_string(&before).unwrap()
    );
    assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn test_create_assigns_identity() {
    let (db, backend) = setup(FakeBackend::with_insert_id(7));

    let user = db
        .model("User")
        .unwrap()
        .create(json!({"name": "Ann", "email": "ann@example.com", "admin": true}))
        .await
        .unwrap();

    assert!(user.is_stored());
    assert_eq!(user.get("id"), Attribute::Value(&json!(7)));
    assert_eq!(
        backend.sql(),
        vec!["INSERT INTO users SET users.name = ?, users.email = ?"]
    );
    assert_eq!(backend.params(0), vec![json!("Ann"), json!("ann@example.com")]);
}

#[tokio::test]
async fn test_create_rejects_sequences() {
    let (db, backend) = setup(FakeBackend::default());
    let err = db
        .model("User")
        .unwrap()
        .create(json!(["Ann", "ann@example.com"]))
        .await
        .unwrap_err();
    assert!(matches!(err, KeelError::Array(_)));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_create_then_round_trip() {
    let (db, backend) = setup(FakeBackend::with_insert_id(7));
    let created = db
        .model("User")
        .unwrap()
        .create(json!({"name": "Ann", "email": "ann@example.com", "password": "hash"}))
        .await
        .unwrap();

    backend.push_rows(vec![json!({
        "id": 7, "name": "Ann", "email": "ann@example.com", "password": "hash"
    })]);
    let mut found = db.model("User").unwrap();
    found.find(7, None).await.unwrap();

    assert_eq!(created.to_array(), found.to_array());
    assert_eq!(
        found.to_array(),
        json!({"id": 7, "name": "Ann", "email": "ann@example.com"})
    );
}

#[tokio::test]
async fn test_with_requires_primary_key() {
    let (db, backend) = setup(FakeBackend::default());
    let mut user = db.model("User").unwrap();
    user.make(json!({"name": "Ann"})).unwrap();

    let err = user.with(&["posts"]).await.unwrap_err();
    assert!(matches!(err, KeelError::Model(_)));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_with_resolves_nested_paths() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);
    backend.push_rows(vec![json!({"id": 3, "name": "New Zealand"})]);
    backend.push_rows(vec![
        json!({"id": 1, "title": "First", "user_id": 7}),
        json!({"id": 2, "title": "Second", "user_id": 7}),
    ]);
    backend.push_rows(vec![json!({"id": 10, "body": "Nice", "post_id": 1})]);
    backend.push_rows(vec![]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();
    user.with(&["country", "posts.comments"]).await.unwrap();

    assert_eq!(
        backend.sql()[1..],
        [
            "SELECT countries.id, countries.name FROM countries WHERE countries.id LIKE ? LIMIT 1",
            "SELECT posts.id, posts.title, posts.user_id FROM posts WHERE posts.user_id LIKE ?",
            "SELECT comments.id, comments.body, comments.post_id FROM comments WHERE comments.post_id LIKE ?",
            "SELECT comments.id, comments.body, comments.post_id FROM comments WHERE comments.post_id LIKE ?",
        ]
    );
    assert_eq!(backend.params(1), vec![json!(3)]);
    assert_eq!(backend.params(2), vec![json!(7)]);
    assert_eq!(backend.params(4), vec![json!(2)]);

    assert_eq!(
        user.to_array(),
        json!({
            "id": 7,
            "name": "Ann",
            "email": "ann@example.com",
            "country_id": 3,
            "created_at": "2024-03-01 12:30:00",
            "country": {"id": 3, "name": "New Zealand"},
            "posts": [
                {
                    "id": 1, "title": "First", "user_id": 7,
                    "comments": [{"id": 10, "body": "Nice", "post_id": 1}]
                },
                {"id": 2, "title": "Second", "user_id": 7, "comments": []}
            ]
        })
    );
}

#[tokio::test]
async fn test_with_skips_unknown_and_caches_missing_one() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();
    user.with(&["tags", "country"]).await.unwrap();

    assert_eq!(backend.count(), 2);
    assert_eq!(user.related("tags"), None);
    assert_eq!(user.related("country"), Some(&Related::None));
    assert_eq!(user.to_array()["country"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_has_one_needs_local_attribute() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![json!({"id": 1, "title": "Orphan"})]);

    let mut post = db.model("Post").unwrap();
    post.find(1, None).await.unwrap();
    let err = post.with(&["user"]).await.unwrap_err();

    assert!(matches!(err, KeelError::Model(message) if message.contains("user_id")));
    assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn test_attribute_lookup_order() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);
    backend.push_rows(vec![json!({"id": 3, "name": "New Zealand"})]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();
    user.with(&["country"]).await.unwrap();

    let created = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    assert_eq!(user.get("created_at"), Attribute::Date(created));
    assert_eq!(user.get("primary_key"), Attribute::Value(&json!(7)));
    assert!(matches!(user.get("country"), Attribute::Related(Related::One(c)) if c.get("name").as_value() == Some(&json!("New Zealand"))));
    assert_eq!(
        user.get("display_name"),
        Attribute::Computed(json!("Ann <ann@example.com>"))
    );
    assert!(user.get("nickname").is_missing());
}

#[tokio::test]
async fn test_update_and_save() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();
    user.update(json!({"name": "Bo", "id": 99, "admin": true}), true)
        .await
        .unwrap();

    assert_eq!(user.primary_key(), Some(&json!(7)));
    assert_eq!(user.attributes().get("admin"), None);
    assert_eq!(
        backend.sql()[1],
        "UPDATE users SET users.name = ?, users.email = ?, users.country_id = ?, users.created_at = ?, users.password = ? WHERE users.id = ?"
    );
    assert_eq!(
        backend.params(1),
        vec![
            json!("Bo"),
            json!("ann@example.com"),
            json!(3),
            json!("2024-03-01 12:30:00"),
            json!("hash"),
            json!(7)
        ]
    );
}

#[tokio::test]
async fn test_update_without_save_stays_local() {
    let (db, backend) = setup(FakeBackend::default());
    let mut user = db.model("User").unwrap();
    user.make(json!({"id": 7, "name": "Ann"})).unwrap();
    user.update(json!({"name": "Bo"}), false).await.unwrap();

    assert_eq!(user.get("name"), Attribute::Value(&json!("Bo")));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_save_and_delete_require_primary_key() {
    let (db, backend) = setup(FakeBackend::default());
    let mut user = db.model("User").unwrap();
    user.make(json!({"name": "Ann"})).unwrap();

    assert!(matches!(user.save().await, Err(KeelError::Model(_))));
    assert!(matches!(user.delete().await, Err(KeelError::Model(_))));
    assert_eq!(backend.count(), 0);
}

#[tokio::test]
async fn test_delete() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);

    let mut user = db.model("User").unwrap();
    user.find(7, None).await.unwrap();
    assert!(user.delete().await.unwrap());

    assert!(!user.is_stored());
    assert_eq!(backend.sql()[1], "DELETE FROM users WHERE users.id = ?");
    assert_eq!(backend.params(1), vec![json!(7)]);
}

#[tokio::test]
async fn test_find_or_create() {
    let (db, backend) = setup(FakeBackend::with_insert_id(12));

    let mut user = db.model("User").unwrap();
    let created = user
        .find_or_create(json!({"name": "Ann"}), "ann@example.com", Some("email"))
        .await
        .unwrap();

    assert!(created.is_stored());
    assert_eq!(created.primary_key(), Some(&json!(12)));
    assert_eq!(
        backend.sql()[1],
        "INSERT INTO users SET users.email = ?, users.name = ?"
    );
    assert_eq!(backend.params(1), vec![json!("ann@example.com"), json!("Ann")]);
}

#[tokio::test]
async fn test_find_or_create_by_primary_key_omits_pair() {
    let (db, backend) = setup(FakeBackend::with_insert_id(5));

    let mut user = db.model("User").unwrap();
    user.find_or_create(json!({"name": "Ann"}), 4, None)
        .await
        .unwrap();
    assert_eq!(backend.sql()[1], "INSERT INTO users SET users.name = ?");
}

#[tokio::test]
async fn test_find_or_create_returns_existing() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![ann()]);

    let mut user = db.model("User").unwrap();
    let found = user
        .find_or_create(json!({"name": "Other"}), 7, None)
        .await
        .unwrap();
    assert_eq!(found.get("name"), Attribute::Value(&json!("Ann")));
    assert_eq!(backend.count(), 1);
}

#[tokio::test]
async fn test_find_many() {
    let (db, backend) = setup(FakeBackend::default());
    backend.push_rows(vec![
        json!({"id": 1, "title": "First", "user_id": 7}),
        json!({"id": 2, "title": "Second", "user_id": 7}),
    ]);

    let posts = db
        .model("Post")
        .unwrap()
        .find_many(7, Some("user_id"))
        .await
        .unwrap();

    assert_eq!(posts.len(), 2);
    assert!(posts.iter().all(Model::is_stored));
    assert_eq!(
        backend.sql(),
        vec!["SELECT posts.id, posts.title, posts.user_id FROM posts WHERE posts.user_id LIKE ?"]
    );
}

#[test]
fn test_make_filters_and_hides() {
    let (db, _) = setup(FakeBackend::default());
    let mut user = db.model("User").unwrap();
    user.make(json!({
        "name": "Ann",
        "password": "hash",
        "email": {"address": "ann@example.com", "password": "nested"},
        "admin": true
    }))
    .unwrap();

    assert!(!user.is_stored());
    assert_eq!(
        user.attributes().keys().collect::<Vec<_>>(),
        ["name", "password", "email"]
    );
    assert_eq!(
        user.to_array(),
        json!({"name": "Ann", "email": {"address": "ann@example.com"}})
    );
    assert_eq!(
        user.public_attributes(),
        row(json!({"name": "Ann", "email": {"address": "ann@example.com", "password": "nested"}}))
    );
    assert_eq!(serde_json::to_value(&user).unwrap(), user.to_array());
}

#[test]
fn test_unknown_model_type() {
    let (db, _) = setup(FakeBackend::default());
    assert!(matches!(db.model("Ghost"), Err(KeelError::Model(_))));
}
