//! Keyword table for `$project` expression operators.

use bson::Document;

use super::date::DateComponent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperatorKind {
    Size,
    IfNull,
    Concat,
    Substr,
    Cmp,
    Strcasecmp,
    Cond,
    ToLower,
    ToUpper,
    Divide,
    Date(DateComponent),
    Filter,
}

const KEYWORDS: &[(&str, OperatorKind)] = &[
    ("$size", OperatorKind::Size),
    ("$ifNull", OperatorKind::IfNull),
    ("$concat", OperatorKind::Concat),
    ("$substr", OperatorKind::Substr),
    ("$cmp", OperatorKind::Cmp),
    ("$strcasecmp", OperatorKind::Strcasecmp),
    ("$cond", OperatorKind::Cond),
    ("$toLower", OperatorKind::ToLower),
    ("$toUpper", OperatorKind::ToUpper),
    ("$divide", OperatorKind::Divide),
    ("$dayOfYear", OperatorKind::Date(DateComponent::DayOfYear)),
    ("$dayOfMonth", OperatorKind::Date(DateComponent::DayOfMonth)),
    ("$dayOfWeek", OperatorKind::Date(DateComponent::DayOfWeek)),
    ("$year", OperatorKind::Date(DateComponent::Year)),
    ("$month", OperatorKind::Date(DateComponent::Month)),
    ("$week", OperatorKind::Date(DateComponent::Week)),
    ("$hour", OperatorKind::Date(DateComponent::Hour)),
    ("$minute", OperatorKind::Date(DateComponent::Minute)),
    ("$second", OperatorKind::Date(DateComponent::Second)),
    ("$millisecond", OperatorKind::Date(DateComponent::Millisecond)),
    ("$filter", OperatorKind::Filter),
];

/// Find the operator keyword among the fragment's keys, if any.
pub(crate) fn lookup(fragment: &Document) -> Option<(&'static str, OperatorKind)> {
    KEYWORDS
        .iter()
        .find(|(keyword, _)| fragment.contains_key(keyword))
        .copied()
}
