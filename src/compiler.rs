//! WHERE-clause compiler shared by every statement builder.
//!
//! Clauses are emitted in order. A clause followed by an OR clause opens a
//! group, and an OR clause closes the innermost open group after its own
//! fragment, so `a AND b OR c` reads `( a OR b ) AND c`. The first clause's
//! relation is ignored and any group still open at the end is closed, so the
//! output is always balanced.

use serde_json::Value;

use crate::ast::{Comparison, Comparitor, Field, Operand, Relation, Where};

/// How values reach the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Values become `?` placeholders and are bound in order.
    #[default]
    Prepared,
    /// Values are written into the SQL text. No escaping is performed, so
    /// this must never see untrusted input.
    Inline,
}

/// Compile `wheres` against `table`, appending bound values to `params`.
///
/// Returns `None` when there is nothing to emit.
pub fn compile_wheres(
    wheres: &[Where],
    table: &str,
    mode: Mode,
    params: &mut Vec<Value>,
) -> Option<String> {
    let emitted: Vec<(Relation, String)> = wheres
        .iter()
        .filter_map(|clause| {
            let predicate = compile_predicate(clause, table, mode, params);
            if predicate.is_none() {
                tracing::trace!(field = %clause.field.field, "skipping clause without a usable comparison");
            }
            predicate.map(|predicate| (clause.relation, predicate))
        })
        .collect();

    let mut bits = vec!["WHERE".to_string()];
    let mut open = 0usize;

    // Grouping looks at the next emitted clause, never at a skipped one.
    for (i, (relation, predicate)) in emitted.iter().enumerate() {
        let mut w: Vec<String> = Vec::new();

        if i > 0 {
            w.push(relation.to_string());
        }

        let next_is_or = emitted
            .get(i + 1)
            .is_some_and(|(next, _)| *next == Relation::Or);
        if next_is_or {
            w.push("(".to_string());
            open += 1;
        }

        w.push(predicate.clone());

        if i > 0 && *relation == Relation::Or && open > 0 {
            w.push(")".to_string());
            open -= 1;
        }

        bits.push(w.join(" "));
    }

    if bits.len() == 1 {
        return None;
    }

    for _ in 0..open {
        bits.push(")".to_string());
    }

    Some(bits.join(" "))
}

/// `field op rhs` for one clause, or `None` if the clause must be skipped.
fn compile_predicate(
    clause: &Where,
    table: &str,
    mode: Mode,
    params: &mut Vec<Value>,
) -> Option<String> {
    let column = clause.field.qualified(table);

    match clause.comparitor {
        Comparitor::IsNull => Some(format!("{} IS NULL", column)),
        Comparitor::IsNotNull => Some(format!("{} IS NOT NULL", column)),
        Comparitor::In => {
            let Comparison::List(items) = &clause.comparison else {
                return None;
            };
            if items.is_empty() {
                // Nothing can match an empty list.
                return Some(format!("{} IN ( NULL )", column));
            }
            let rendered: Vec<String> = items
                .iter()
                .map(|item| render_operand(item, table, mode, params))
                .collect();
            Some(format!("{} IN ( {} )", column, rendered.join(", ")))
        }
        basic => {
            let symbol = basic.sql_symbol()?;
            let rhs = match &clause.comparison {
                Comparison::Single(operand) => render_operand(operand, table, mode, params),
                Comparison::None => render_operand(&Operand::Value(Value::Null), table, mode, params),
                Comparison::List(_) => return None,
            };
            Some(format!("{} {} {}", column, symbol, rhs))
        }
    }
}

/// A column renders qualified; a value renders as `?` or as a literal.
pub(crate) fn render_operand(
    operand: &Operand,
    table: &str,
    mode: Mode,
    params: &mut Vec<Value>,
) -> String {
    match operand {
        Operand::Column(field) => field.qualified(table),
        Operand::Value(value) => render_value(value, mode, params),
    }
}

pub(crate) fn render_value(value: &Value, mode: Mode, params: &mut Vec<Value>) -> String {
    match mode {
        Mode::Prepared => {
            params.push(value.clone());
            "?".to_string()
        }
        Mode::Inline => inline_literal(value),
    }
}

/// `table.field = ?` assignments for INSERT ... SET and UPDATE ... SET.
pub(crate) fn compile_assignments(
    fields: &[Field],
    table: &str,
    mode: Mode,
    params: &mut Vec<Value>,
) -> String {
    fields
        .iter()
        .map(|field| {
            let value = field.value.clone().unwrap_or(Value::Null);
            format!(
                "{} = {}",
                field.qualified(table),
                render_value(&value, mode, params)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Numbers (and numeric strings) bare, everything else single-quoted.
pub fn inline_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) if is_numeric(s) => s.clone(),
        Value::String(s) => format!("'{}'", s),
        other => format!("'{}'", other),
    }
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
        && s.parse::<f64>().is_ok_and(f64::is_finite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile(wheres: &[Where]) -> (Option<String>, Vec<Value>) {
        let mut params = Vec::new();
        let sql = compile_wheres(wheres, "t", Mode::Prepared, &mut params);
        (sql, params)
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(compile(&[]), (None, vec![]));
    }

    #[test]
    fn test_single_clause() {
        let (sql, params) = compile(&[Where::new("name", "bob")]);
        assert_eq!(sql.as_deref(), Some("WHERE t.name = ?"));
        assert_eq!(params, vec![json!("bob")]);
    }

    #[test]
    fn test_or_groups_with_preceding_clause() {
        let (sql, params) = compile(&[
            Where::new("a", 1),
            Where::new("b", 2).or(),
            Where::new("c", 3),
        ]);
        assert_eq!(
            sql.as_deref(),
            Some("WHERE ( t.a = ? OR t.b = ? ) AND t.c = ?")
        );
        assert_eq!(params, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_two_or_groups() {
        let (sql, _) = compile(&[
            Where::new("a", 1),
            Where::new("b", 2).or(),
            Where::new("c", 3),
            Where::new("d", 4).or(),
        ]);
        assert_eq!(
            sql.as_deref(),
            Some("WHERE ( t.a = ? OR t.b = ? ) AND ( t.c = ? OR t.d = ? )")
        );
    }

    #[test]
    fn test_consecutive_ors_stay_balanced() {
        let (sql, _) = compile(&[
            Where::new("a", 1),
            Where::new("b", 2).or(),
            Where::new("c", 3).or(),
        ]);
        assert_eq!(
            sql.as_deref(),
            Some("WHERE ( t.a = ? OR ( t.b = ? ) OR t.c = ? )")
        );
    }

    #[test]
    fn test_leading_or_is_ignored() {
        let (sql, _) = compile(&[Where::new("a", 1).or(), Where::new("b", 2)]);
        assert_eq!(sql.as_deref(), Some("WHERE t.a = ? AND t.b = ?"));

        let (sql, _) = compile(&[Where::new("a", 1).or()]);
        assert_eq!(sql.as_deref(), Some("WHERE t.a = ?"));

        let (sql, _) = compile(&[Where::new("a", 1).or(), Where::new("b", 2).or()]);
        assert_eq!(sql.as_deref(), Some("WHERE ( t.a = ? OR t.b = ? )"));
    }

    #[test]
    fn test_in_with_non_list_is_skipped() {
        let bad = Where::new("id", 5).comparitor(Comparitor::In);
        assert_eq!(compile(&[bad.clone()]), (None, vec![]));

        let (sql, params) = compile(&[Where::new("a", 1), bad, Where::new("b", 2)]);
        assert_eq!(sql.as_deref(), Some("WHERE t.a = ? AND t.b = ?"));
        assert_eq!(params, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_skipped_or_clause_opens_no_group() {
        let bad = Where::new("id", 5).comparitor(Comparitor::In).or();
        let (sql, _) = compile(&[Where::new("a", 1), bad]);
        assert_eq!(sql.as_deref(), Some("WHERE t.a = ?"));
    }

    #[test]
    fn test_grouping_looks_past_skipped_clause() {
        let bad = Where::new("bad", 5).comparitor(Comparitor::In);
        let (sql, params) = compile(&[
            Where::new("x", 1),
            Where::new("a", 2),
            bad,
            Where::new("c", 3).or(),
        ]);
        assert_eq!(
            sql.as_deref(),
            Some("WHERE t.x = ? AND ( t.a = ? OR t.c = ? )")
        );
        assert_eq!(params, vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn test_in_list_binds_each_element() {
        let (sql, params) = compile(&[Where::is_in("id", [3, 1, 2])]);
        assert_eq!(sql.as_deref(), Some("WHERE t.id IN ( ?, ?, ? )"));
        assert_eq!(params, vec![json!(3), json!(1), json!(2)]);
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let (sql, params) = compile(&[Where::is_in("id", Vec::<i64>::new())]);
        assert_eq!(sql.as_deref(), Some("WHERE t.id IN ( NULL )"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_placeholders_match_params() {
        let wheres = [
            Where::gt("age", 18),
            Where::like("name", "b%").or(),
            Where::is_null("deleted_at"),
            Where::is_in("role", ["admin", "mod"]),
            Where::lte("score", 9.5),
        ];
        let (sql, params) = compile(&wheres);
        let sql = sql.unwrap();
        assert_eq!(sql.matches('?').count(), params.len());
        assert_eq!(
            params,
            vec![json!(18), json!("b%"), json!("admin"), json!("mod"), json!(9.5)]
        );
    }

    #[test]
    fn test_null_checks_bind_nothing() {
        let (sql, params) = compile(&[Where::is_null("a"), Where::is_not_null("b")]);
        assert_eq!(sql.as_deref(), Some("WHERE t.a IS NULL AND t.b IS NOT NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_column_comparison_binds_nothing() {
        let (sql, params) = compile(&[Where::new(
            Field::new("author_id").on("posts"),
            Field::new("id").on("users"),
        )]);
        assert_eq!(sql.as_deref(), Some("WHERE posts.author_id = users.id"));
        assert!(params.is_empty());
    }

    #[test]
    fn test_inline_mode() {
        let mut params = Vec::new();
        let sql = compile_wheres(
            &[
                Where::new("name", "bob"),
                Where::gte("age", 18),
                Where::is_in("code", vec![Operand::from("7"), Operand::from("x")]),
            ],
            "t",
            Mode::Inline,
            &mut params,
        );
        assert_eq!(
            sql.as_deref(),
            Some("WHERE t.name = 'bob' AND t.age >= 18 AND t.code IN ( 7, 'x' )")
        );
        assert!(params.is_empty());
    }

    #[test]
    fn test_inline_literals() {
        assert_eq!(inline_literal(&json!(null)), "NULL");
        assert_eq!(inline_literal(&json!(true)), "1");
        assert_eq!(inline_literal(&json!(1.5)), "1.5");
        assert_eq!(inline_literal(&json!("-3")), "-3");
        assert_eq!(inline_literal(&json!("inf")), "'inf'");
    }
}
