//! Control-flow steps.

pub mod branch;
pub mod condition;
pub mod flow;
pub mod loops;

/// Pairing ids of the built-in block families.
pub mod pairing {
  pub const COUNT_LOOP: &str = "loop";
  pub const FOR_EACH: &str = "foreach";
  pub const WHILE: &str = "while";
  pub const IF: &str = "if";
}
