//! Parameter resolution.
//!
//! String parameters may reference earlier step outputs (`{{stepId.outputId}}`)
//! or named variables (`[[name]]`). Resolved parameters are collected in an
//! overlay map; the raw parameters are left untouched. References that do not
//! resolve stay in the text as written, and substituted text is never scanned
//! again.

use std::collections::HashMap;

use serde_json::Value;
use sequin_step::reference::{Reference, Segment, parse_segments};
use sequin_step::{NamedVariables, StepOutputs};

/// Resolve every string parameter that contains at least one resolvable
/// reference.
pub fn resolve_parameters(
  parameters: &HashMap<String, Value>,
  outputs: &StepOutputs,
  named: &NamedVariables,
) -> HashMap<String, Value> {
  parameters
    .iter()
    .filter_map(|(key, value)| {
      let Value::String(text) = value else {
        return None;
      };
      resolve_text(text, outputs, named).map(|resolved| (key.clone(), resolved))
    })
    .collect()
}

/// Resolve the references in one string.
///
/// A string that is a single reference resolves to the referenced value with
/// its type intact. Otherwise references are substituted as text. Returns
/// `None` when nothing resolved.
pub fn resolve_text(text: &str, outputs: &StepOutputs, named: &NamedVariables) -> Option<Value> {
  let segments = parse_segments(text);

  if let [Segment::Reference { reference, .. }] = segments.as_slice() {
    return lookup(reference, outputs, named);
  }

  let mut resolved_any = false;
  let mut result = String::with_capacity(text.len());
  for segment in &segments {
    match segment {
      Segment::Literal(literal) => result.push_str(literal),
      Segment::Reference { reference, raw } => match lookup(reference, outputs, named) {
        Some(value) => {
          resolved_any = true;
          result.push_str(&value_to_text(&value));
        }
        None => result.push_str(raw),
      },
    }
  }

  resolved_any.then_some(Value::String(result))
}

/// Text form of a value when embedded in a larger string.
pub fn value_to_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn lookup(reference: &Reference, outputs: &StepOutputs, named: &NamedVariables) -> Option<Value> {
  match reference {
    Reference::Output { step_id, output_id } => outputs.get(step_id, output_id),
    Reference::Named { name } => named.get(name),
  }
}
