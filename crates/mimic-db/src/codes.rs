//! MongoDB error codes raised by the aggregation engine.

// ── Pipeline ────────────────────────────────────────────────────

pub const PROJECT_NOT_OBJECT: i32 = 15969;
pub const STAGE_FIELD_COUNT: i32 = 16435;
pub const UNKNOWN_STAGE: i32 = 16436;

// ── Projection specification ────────────────────────────────────

pub const EXPRESSION_FIELD_COUNT: i32 = 15983;
pub const INVALID_OPERATOR: i32 = 15999;
pub const EMPTY_PROJECTION: i32 = 40177;
pub const MIXED_PROJECTION: i32 = 40178;

// ── Operators ───────────────────────────────────────────────────

pub const BAD_ARITY: i32 = 16020;
pub const DATE_TYPE: i32 = 16006;
pub const SUBSTR_START: i32 = 16034;
pub const SUBSTR_LENGTH: i32 = 16035;
pub const DIVIDE_NON_NUMERIC: i32 = 16609;
pub const SIZE_NOT_ARRAY: i32 = 17124;
pub const COND_MISSING_IF: i32 = 17080;
pub const COND_MISSING_THEN: i32 = 17081;
pub const COND_MISSING_ELSE: i32 = 17082;
pub const COND_UNKNOWN_ARG: i32 = 17083;

// ── $filter ─────────────────────────────────────────────────────

pub const UNDEFINED_VARIABLE: i32 = 17276;
pub const FILTER_NOT_OBJECT: i32 = 28646;
pub const FILTER_UNKNOWN_ARG: i32 = 28647;
pub const FILTER_MISSING_INPUT: i32 = 28648;
pub const FILTER_MISSING_COND: i32 = 28650;
pub const FILTER_INPUT_NOT_ARRAY: i32 = 28651;
