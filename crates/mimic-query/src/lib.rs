mod eval;
mod expression;
pub mod mutation;
mod parse_filter;
pub mod path;
mod projection;
mod query;

pub use eval::{matches, value_cmp, value_eq};
pub use expression::Expression;
pub use mutation::{
    FieldMutation, Mutation, MutationError, MutationOp, ParseError, PullCondition, parse_mutation,
};
pub use parse_filter::{FilterParseError, parse_filter};
pub use projection::{FieldProjection, ProjectionParseError};
pub use query::FindOptions;
