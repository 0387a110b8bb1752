//! Condition chain evaluation.
//!
//! A trigger's conditions are combined as a strict left fold: each condition
//! joins the result accumulated so far through its own `logical_operator`.
//! There is no AND-before-OR precedence, so `[A, AND B, OR C]` is
//! `((A && B) || C)`.

use serde_json::Value;

use tripwire_types::agent::{Condition, ConditionOperator, LogicalOperator};
use tripwire_types::event::lookup_path;

/// Evaluate a condition chain against event data. An empty chain matches.
pub fn evaluate_chain(conditions: &[Condition], data: &Value) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    iter.fold(evaluate(first, data), |acc, condition| {
        let current = evaluate(condition, data);
        match condition.logical_operator.unwrap_or(LogicalOperator::And) {
            LogicalOperator::And => acc && current,
            LogicalOperator::Or => acc || current,
        }
    })
}

/// Evaluate one condition. A missing field is false for every operator.
pub fn evaluate(condition: &Condition, data: &Value) -> bool {
    let Some(actual) = lookup_path(data, &condition.field) else {
        return false;
    };
    compare(actual, condition.operator, &condition.value)
}

fn compare(actual: &Value, operator: ConditionOperator, expected: &Value) -> bool {
    match operator {
        ConditionOperator::Equals => loosely_equal(actual, expected),
        ConditionOperator::NotEquals => !loosely_equal(actual, expected),
        ConditionOperator::GreaterThan => numeric(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => numeric(actual, expected, |a, b| a < b),
        ConditionOperator::GreaterOrEqual => numeric(actual, expected, |a, b| a >= b),
        ConditionOperator::LessOrEqual => numeric(actual, expected, |a, b| a <= b),
        ConditionOperator::Contains => contains(actual, expected),
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (as_number(actual), as_number(expected)) {
        return a == b;
    }
    match (actual, expected) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Bool(a), Value::String(b)) | (Value::String(b), Value::Bool(a)) => {
            b.parse::<bool>().is_ok_and(|b| b == *a)
        }
        _ => actual == expected,
    }
}

fn numeric(actual: &Value, expected: &Value, cmp: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(haystack) => match expected {
            Value::String(needle) => haystack.contains(needle.as_str()),
            other => haystack.contains(&other.to_string()),
        },
        Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
        _ => false,
    }
}

/// Numbers and numeric strings are both treated as numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cond(
        field: &str,
        operator: ConditionOperator,
        value: Value,
        logical: Option<LogicalOperator>,
    ) -> Condition {
        Condition {
            field: field.to_string(),
            operator,
            value,
            logical_operator: logical,
        }
    }

    #[test]
    fn empty_chain_matches() {
        assert!(evaluate_chain(&[], &json!({})));
    }

    #[test]
    fn price_change_chain_matches() {
        let data = json!({
            "token": { "symbol": "SOL" },
            "changeNormalized": { "window": "24h", "percentage": 12 }
        });
        let chain = vec![
            cond("token.symbol", ConditionOperator::Equals, json!("SOL"), None),
            cond(
                "changeNormalized.window",
                ConditionOperator::Equals,
                json!("24h"),
                Some(LogicalOperator::And),
            ),
            cond(
                "changeNormalized.percentage",
                ConditionOperator::GreaterThan,
                json!(10),
                Some(LogicalOperator::And),
            ),
        ];
        assert!(evaluate_chain(&chain, &data));
    }

    #[test]
    fn left_fold_disagrees_with_precedence() {
        // [A, OR B, AND C] with A=true, B=false, C=false
        // left fold:  ((true || false) && false) = false
        // precedence: true || (false && false)   = true
        let data = json!({ "a": 1, "b": 0, "c": 0 });
        let chain = vec![
            cond("a", ConditionOperator::Equals, json!(1), None),
            cond("b", ConditionOperator::Equals, json!(1), Some(LogicalOperator::Or)),
            cond("c", ConditionOperator::Equals, json!(1), Some(LogicalOperator::And)),
        ];
        assert!(!evaluate_chain(&chain, &data));
    }

    #[test]
    fn left_fold_and_then_or() {
        // [A, AND B, OR C] with A=false, B=true, C=true == ((A && B) || C) = true
        let data = json!({ "a": 0, "b": 1, "c": 1 });
        let chain = vec![
            cond("a", ConditionOperator::Equals, json!(1), None),
            cond("b", ConditionOperator::Equals, json!(1), Some(LogicalOperator::And)),
            cond("c", ConditionOperator::Equals, json!(1), Some(LogicalOperator::Or)),
        ];
        assert!(evaluate_chain(&chain, &data));
    }

    #[test]
    fn first_logical_operator_is_ignored() {
        let data = json!({ "a": 1 });
        let chain = vec![cond(
            "a",
            ConditionOperator::Equals,
            json!(1),
            Some(LogicalOperator::Or),
        )];
        assert!(evaluate_chain(&chain, &data));
    }

    #[test]
    fn missing_logical_operator_means_and() {
        let data = json!({ "a": 1, "b": 2 });
        let chain = vec![
            cond("a", ConditionOperator::Equals, json!(1), None),
            cond("b", ConditionOperator::Equals, json!(3), None),
        ];
        assert!(!evaluate_chain(&chain, &data));
    }

    #[test]
    fn missing_field_is_false_even_for_not_equals() {
        let data = json!({});
        let c = cond("absent", ConditionOperator::NotEquals, json!("x"), None);
        assert!(!evaluate(&c, &data));
    }

    #[test]
    fn numeric_strings_compare_as_numbers() {
        let data = json!({ "amount": "1500.5" });
        assert!(evaluate(
            &cond("amount", ConditionOperator::GreaterOrEqual, json!(1500), None),
            &data
        ));
        assert!(evaluate(
            &cond("amount", ConditionOperator::Equals, json!(1500.5), None),
            &data
        ));
    }

    #[test]
    fn ordering_on_non_numbers_is_false() {
        let data = json!({ "symbol": "SOL" });
        let c = cond("symbol", ConditionOperator::LessThan, json!("ZZZ"), None);
        assert!(!evaluate(&c, &data));
    }

    #[test]
    fn contains_handles_strings_and_arrays() {
        let data = json!({ "memo": "swap SOL to USDC", "tags": ["defi", "swap"] });
        assert!(evaluate(
            &cond("memo", ConditionOperator::Contains, json!("USDC"), None),
            &data
        ));
        assert!(evaluate(
            &cond("tags", ConditionOperator::Contains, json!("swap"), None),
            &data
        ));
        assert!(!evaluate(
            &cond("tags", ConditionOperator::Contains, json!("nft"), None),
            &data
        ));
    }

    #[test]
    fn string_equality_is_case_sensitive() {
        let data = json!({ "symbol": "sol" });
        let c = cond("symbol", ConditionOperator::Equals, json!("SOL"), None);
        assert!(!evaluate(&c, &data));
    }

    #[test]
    fn bool_matches_bool_string() {
        let data = json!({ "liquidatable": true });
        let c = cond("liquidatable", ConditionOperator::Equals, json!("true"), None);
        assert!(evaluate(&c, &data));
    }
}
