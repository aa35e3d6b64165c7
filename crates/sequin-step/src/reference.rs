//! Reference syntax inside string parameters.
//!
//! - `{{stepId.outputId}}` refers to an output of an earlier step
//! - `[[name]]` refers to a named variable
//!
//! Anything that does not parse as a reference is literal text.

/// A parsed reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
  Output { step_id: String, output_id: String },
  Named { name: String },
}

/// A segment of a string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  Literal(String),
  /// A reference together with its source text, used as the fallback.
  Reference { reference: Reference, raw: String },
}

/// Parse a string into literal and reference segments.
pub fn parse_segments(input: &str) -> Vec<Segment> {
  let mut segments = Vec::new();
  let mut literal = String::new();
  let mut rest = input;

  while let Some(open) = next_opener(rest) {
    let (close, build): (&str, fn(&str) -> Option<Reference>) = if rest[open..].starts_with("{{") {
      ("}}", parse_output)
    } else {
      ("]]", parse_named)
    };

    let body_start = open + 2;
    let Some(len) = rest[body_start..].find(close) else {
      break;
    };
    let body = &rest[body_start..body_start + len];
    let end = body_start + len + 2;

    match build(body) {
      Some(reference) => {
        literal.push_str(&rest[..open]);
        if !literal.is_empty() {
          segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Reference {
          reference,
          raw: rest[open..end].to_string(),
        });
        rest = &rest[end..];
      }
      None => {
        // Not a reference; keep the opener as text and rescan after it.
        literal.push_str(&rest[..body_start]);
        rest = &rest[body_start..];
      }
    }
  }

  literal.push_str(rest);
  if !literal.is_empty() {
    segments.push(Segment::Literal(literal));
  }
  segments
}

/// Parse a string that consists of exactly one reference.
pub fn parse_reference(input: &str) -> Option<Reference> {
  match parse_segments(input).as_slice() {
    [Segment::Reference { reference, .. }] => Some(reference.clone()),
    _ => None,
  }
}

/// Whether the string is exactly one reference.
pub fn is_reference(input: &str) -> bool {
  parse_reference(input).is_some()
}

/// Whether the string contains any reference.
pub fn has_references(input: &str) -> bool {
  parse_segments(input)
    .iter()
    .any(|segment| matches!(segment, Segment::Reference { .. }))
}

fn next_opener(input: &str) -> Option<usize> {
  match (input.find("{{"), input.find("[[")) {
    (Some(a), Some(b)) => Some(a.min(b)),
    (a, b) => a.or(b),
  }
}

fn parse_output(body: &str) -> Option<Reference> {
  let (step_id, output_id) = body.trim().split_once('.')?;
  if !is_identifier(step_id) || output_id.is_empty() || output_id.contains(char::is_whitespace) {
    return None;
  }
  Some(Reference::Output {
    step_id: step_id.to_string(),
    output_id: output_id.to_string(),
  })
}

fn parse_named(body: &str) -> Option<Reference> {
  let name = body.trim();
  if name.is_empty() || name.contains('[') {
    return None;
  }
  Some(Reference::Named {
    name: name.to_string(),
  })
}

fn is_identifier(s: &str) -> bool {
  !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || c == '{' || c == '}')
}
