//! Dot-notation navigation over owned documents.
//!
//! A path like `"address.city"` descends through sub-documents. A purely
//! numeric segment (`"tags.0"`) indexes into an array. Any other segment met
//! on a non-document value ends the lookup.

use bson::{Bson, Document};

/// Segment before the first `.` (the whole path when undotted).
pub fn top_level(path: &str) -> &str {
    path.split_once('.').map_or(path, |(top, _)| top)
}

pub fn get<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    match path.split_once('.') {
        None => doc.get(path),
        Some((first, rest)) => get_in(doc.get(first)?, rest),
    }
}

fn get_in<'a>(value: &'a Bson, path: &str) -> Option<&'a Bson> {
    let (first, rest) = match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    let child = match value {
        Bson::Document(doc) => doc.get(first)?,
        Bson::Array(arr) => arr.get(first.parse::<usize>().ok()?)?,
        _ => return None,
    };
    match rest {
        Some(rest) => get_in(child, rest),
        None => Some(child),
    }
}

/// Physical presence: a stored `null` counts as present.
pub fn contains(doc: &Document, path: &str) -> bool {
    get(doc, path).is_some()
}

pub fn get_mut<'a>(doc: &'a mut Document, path: &str) -> Option<&'a mut Bson> {
    match path.split_once('.') {
        None => doc.get_mut(path),
        Some((first, rest)) => get_mut_in(doc.get_mut(first)?, rest),
    }
}

fn get_mut_in<'a>(value: &'a mut Bson, path: &str) -> Option<&'a mut Bson> {
    let (first, rest) = match path.split_once('.') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    let child = match value {
        Bson::Document(doc) => doc.get_mut(first)?,
        Bson::Array(arr) => arr.get_mut(first.parse::<usize>().ok()?)?,
        _ => return None,
    };
    match rest {
        Some(rest) => get_mut_in(child, rest),
        None => Some(child),
    }
}

/// Write `value` at `path`, creating intermediate sub-documents. An
/// intermediate that is not a document is replaced by one.
pub fn set(doc: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            doc.insert(path, value);
        }
        Some((first, rest)) => {
            let child = doc
                .entry(first.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));
            if !matches!(child, Bson::Document(_)) {
                *child = Bson::Document(Document::new());
            }
            if let Bson::Document(sub) = child {
                set(sub, rest, value);
            }
        }
    }
}

pub fn remove(doc: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => doc.remove(path),
        Some((first, rest)) => match doc.get_mut(first)? {
            Bson::Document(sub) => remove(sub, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn get_flat_and_nested() {
        let d = doc! { "name": "Alice", "address": { "city": "Austin", "geo": { "lat": 30 } } };
        assert_eq!(get(&d, "name"), Some(&Bson::String("Alice".into())));
        assert_eq!(get(&d, "address.city"), Some(&Bson::String("Austin".into())));
        assert_eq!(get(&d, "address.geo.lat"), Some(&Bson::Int32(30)));
        assert_eq!(get(&d, "address.zip"), None);
        assert_eq!(get(&d, "name.first"), None);
    }

    #[test]
    fn get_indexes_arrays() {
        let d = doc! { "tags": ["a", "b"], "items": [{ "sku": "x" }] };
        assert_eq!(get(&d, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(get(&d, "items.0.sku"), Some(&Bson::String("x".into())));
        assert_eq!(get(&d, "tags.5"), None);
        assert_eq!(get(&d, "items.sku"), None);
    }

    #[test]
    fn contains_counts_null() {
        let d = doc! { "gone": null };
        assert!(contains(&d, "gone"));
        assert!(!contains(&d, "missing"));
    }

    #[test]
    fn set_creates_intermediates() {
        let mut d = doc! {};
        set(&mut d, "a.b.c", Bson::Int32(1));
        set(&mut d, "a.b.d", Bson::Int32(2));
        assert_eq!(d, doc! { "a": { "b": { "c": 1, "d": 2 } } });
    }

    #[test]
    fn set_replaces_scalar_intermediate() {
        let mut d = doc! { "a": 5 };
        set(&mut d, "a.b", Bson::Boolean(true));
        assert_eq!(d, doc! { "a": { "b": true } });
    }

    #[test]
    fn remove_nested() {
        let mut d = doc! { "a": { "b": 1, "c": 2 } };
        assert_eq!(remove(&mut d, "a.b"), Some(Bson::Int32(1)));
        assert_eq!(d, doc! { "a": { "c": 2 } });
        assert_eq!(remove(&mut d, "a.zzz"), None);
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut d = doc! { "a": { "list": [1, 2] } };
        if let Some(Bson::Array(arr)) = get_mut(&mut d, "a.list") {
            arr.push(Bson::Int32(3));
        }
        assert_eq!(d, doc! { "a": { "list": [1, 2, 3] } });
    }

    #[test]
    fn top_level_segment() {
        assert_eq!(top_level("a.b.c"), "a");
        assert_eq!(top_level("plain"), "plain");
    }
}
