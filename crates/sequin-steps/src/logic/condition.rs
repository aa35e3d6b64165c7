//! Conditions shared by `if` and `while` blocks.
//!
//! A condition reads three parameters: `input`, `operator` and, for binary
//! operators, `value`. An `input` that is still an unresolved reference
//! counts as missing.

use serde_json::Value;
use sequin_step::ExecutionContext;
use sequin_step::reference::is_reference;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  Exists,
  NotExists,
  IsEmpty,
  IsNotEmpty,
  Equals,
  NotEquals,
  Contains,
  NotContains,
  GreaterThan,
  LessThan,
  IsTrue,
  IsFalse,
}

impl Operator {
  pub fn parse(name: &str) -> Option<Self> {
    let op = match name.trim() {
      "exists" => Self::Exists,
      "not_exists" => Self::NotExists,
      "is_empty" => Self::IsEmpty,
      "is_not_empty" => Self::IsNotEmpty,
      "equals" => Self::Equals,
      "not_equals" => Self::NotEquals,
      "contains" => Self::Contains,
      "not_contains" => Self::NotContains,
      "greater_than" => Self::GreaterThan,
      "less_than" => Self::LessThan,
      "is_true" => Self::IsTrue,
      "is_false" => Self::IsFalse,
      _ => return None,
    };
    Some(op)
  }
}

/// Evaluate the condition configured on the current step.
pub fn evaluate(ctx: &ExecutionContext) -> Result<bool, String> {
  let operator = match ctx.input_str("operator") {
    Some(name) => Operator::parse(&name).ok_or_else(|| format!("unknown operator '{name}'"))?,
    None => Operator::IsTrue,
  };
  let input = present(ctx.input("input"));
  let value = present(ctx.input("value"));

  let result = match operator {
    Operator::Exists => input.is_some(),
    Operator::NotExists => input.is_none(),
    Operator::IsEmpty => is_empty(input),
    Operator::IsNotEmpty => !is_empty(input),
    Operator::Equals => loosely_equal(input, value),
    Operator::NotEquals => !loosely_equal(input, value),
    Operator::Contains => contains(input, value),
    Operator::NotContains => !contains(input, value),
    Operator::GreaterThan => compare(input, value)? == std::cmp::Ordering::Greater,
    Operator::LessThan => compare(input, value)? == std::cmp::Ordering::Less,
    Operator::IsTrue => truthy(input),
    Operator::IsFalse => !truthy(input),
  };
  Ok(result)
}

fn present(value: Option<&Value>) -> Option<&Value> {
  match value? {
    Value::Null => None,
    Value::String(s) if is_reference(s) => None,
    other => Some(other),
  }
}

fn is_empty(value: Option<&Value>) -> bool {
  match value {
    None => true,
    Some(Value::String(s)) => s.is_empty(),
    Some(Value::Array(items)) => items.is_empty(),
    Some(Value::Object(map)) => map.is_empty(),
    Some(_) => false,
  }
}

fn as_number(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

fn as_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn loosely_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
  match (left, right) {
    (None, None) => true,
    (Some(l), Some(r)) => match (as_number(l), as_number(r)) {
      (Some(a), Some(b)) => a == b,
      _ => l == r || as_text(l) == as_text(r),
    },
    _ => false,
  }
}

fn contains(haystack: Option<&Value>, needle: Option<&Value>) -> bool {
  let (Some(haystack), Some(needle)) = (haystack, needle) else {
    return false;
  };
  match haystack {
    Value::Array(items) => items
      .iter()
      .any(|item| loosely_equal(Some(item), Some(needle))),
    Value::Object(map) => map.contains_key(&as_text(needle)),
    other => as_text(other).contains(&as_text(needle)),
  }
}

fn compare(left: Option<&Value>, right: Option<&Value>) -> Result<std::cmp::Ordering, String> {
  let l = left.and_then(as_number);
  let r = right.and_then(as_number);
  match (l, r) {
    (Some(a), Some(b)) => a
      .partial_cmp(&b)
      .ok_or_else(|| "values are not comparable".to_string()),
    _ => Err("comparison needs two numbers".to_string()),
  }
}

fn truthy(value: Option<&Value>) -> bool {
  match value {
    None => false,
    Some(Value::Bool(b)) => *b,
    Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
    Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
    Some(Value::Array(items)) => !items.is_empty(),
    Some(Value::Object(map)) => !map.is_empty(),
    Some(Value::Null) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_support::context_at;
  use serde_json::json;
  use sequin_workflow::Step;

  fn check(input: Value, operator: &str, value: Option<Value>) -> Result<bool, String> {
    let mut step = Step::new("c", "logic.if.start")
      .with_param("input", input)
      .with_param("operator", operator);
    if let Some(value) = value {
      step = step.with_param("value", value);
    }
    evaluate(&context_at(vec![step], 0))
  }

  #[test]
  fn test_existence() {
    assert_eq!(check(json!("x"), "exists", None), Ok(true));
    assert_eq!(check(json!("{{s1.missing}}"), "exists", None), Ok(false));
    assert_eq!(check(Value::Null, "not_exists", None), Ok(true));
  }

  #[test]
  fn test_equality_is_loose_for_numbers() {
    assert_eq!(check(json!("3"), "equals", Some(json!(3))), Ok(true));
    assert_eq!(check(json!("abc"), "not_equals", Some(json!("abd"))), Ok(true));
  }

  #[test]
  fn test_contains() {
    assert_eq!(check(json!("hello world"), "contains", Some(json!("world"))), Ok(true));
    assert_eq!(check(json!([1, 2, 3]), "contains", Some(json!("2"))), Ok(true));
    assert_eq!(check(json!({"a": 1}), "not_contains", Some(json!("b"))), Ok(true));
  }

  #[test]
  fn test_numeric_comparison() {
    assert_eq!(check(json!(5), "greater_than", Some(json!(3))), Ok(true));
    assert_eq!(check(json!("2.5"), "less_than", Some(json!(3))), Ok(true));
    assert!(check(json!("abc"), "less_than", Some(json!(3))).is_err());
  }

  #[test]
  fn test_truthiness_and_emptiness() {
    assert_eq!(check(json!("TRUE"), "is_true", None), Ok(true));
    assert_eq!(check(json!(0), "is_false", None), Ok(true));
    assert_eq!(check(json!([]), "is_empty", None), Ok(true));
    assert_eq!(check(json!(""), "is_not_empty", None), Ok(false));
  }

  #[test]
  fn test_unknown_operator() {
    assert_eq!(
      check(json!(1), "roughly", None),
      Err("unknown operator 'roughly'".to_string())
    );
  }
}
