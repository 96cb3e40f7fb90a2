//! Naming conventions for tables and foreign keys.

use heck::ToSnakeCase;

/// `BlogPost` -> `blog_post`
pub fn snake(name: &str) -> String {
    name.to_snake_case()
}

/// Plural of the last word: `blog_post` -> `blog_posts`
pub fn pluralize(word: &str) -> String {
    inflect_last_word(word, |w| pluralizer::pluralize(w, 2, false))
}

/// Singular of the last word: `blog_posts` -> `blog_post`
pub fn singularize(word: &str) -> String {
    inflect_last_word(word, |w| pluralizer::pluralize(w, 1, false))
}

/// Table name for a model type: `BlogPost` -> `blog_posts`
pub fn table_name(type_name: &str) -> String {
    pluralize(&snake(type_name)).to_lowercase()
}

/// Conventional foreign key for a model type: `BlogPost` -> `blog_post_id`
pub fn foreign_key(type_name: &str) -> String {
    format!("{}_id", singularize(&snake(type_name)).to_lowercase())
}

fn inflect_last_word(word: &str, inflect: impl Fn(&str) -> String) -> String {
    match word.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => format!("{}_{}", head, inflect(last)),
        _ => inflect(word),
    }
}
