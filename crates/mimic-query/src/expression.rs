use bson::Bson;
use regex::Regex;

/// A recursive filter expression tree.
///
/// Owns field names and values so a parsed filter can outlive the
/// document it came from (e.g. a `$pull` condition reused across every
/// document of an update).
#[derive(Debug, Clone)]
pub enum Expression {
    // Logical
    And(Vec<Expression>),
    Or(Vec<Expression>),
    // Comparison: field path and value
    Eq(String, Bson),
    Ne(String, Bson),
    Gt(String, Bson),
    Gte(String, Bson),
    Lt(String, Bson),
    Lte(String, Bson),
    // Pattern
    Regex(String, Regex),
    // Existence
    Exists(String, bool),
}
