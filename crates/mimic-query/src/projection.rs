use std::collections::HashMap;

use bson::{Bson, Document};

use crate::eval::matches;
use crate::expression::Expression;
use crate::parse_filter::parse_filter;

/// Parse error for find-style projection documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionParseError(pub String);

impl std::fmt::Display for ProjectionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "projection parse error: {}", self.0)
    }
}

impl std::error::Error for ProjectionParseError {}

/// A pre-built tree of dot-notation field paths.
///
/// Given `["foo.bar.baz", "foo.bar.bux", "name"]`, builds:
/// ```text
/// { "foo": Branch({ "bar": Branch({ "baz": Leaf, "bux": Leaf }) }),
///   "name": Leaf }
/// ```
#[derive(Debug, Clone)]
enum FieldNode {
    /// Take (or drop) the entire field value.
    Leaf,
    /// Recurse into sub-fields.
    Branch(HashMap<String, FieldNode>),
    /// Keep the first array element matching the query.
    ElemMatch(Expression),
}

#[derive(Debug, Clone)]
enum Mode {
    All,
    Include(HashMap<String, FieldNode>),
    Exclude(HashMap<String, FieldNode>),
}

/// Field selection applied by `find`, built once per query and reused for
/// every document.
#[derive(Debug, Clone)]
pub struct FieldProjection {
    mode: Mode,
    include_id: bool,
}

impl FieldProjection {
    /// Selects every field.
    pub fn all() -> Self {
        Self {
            mode: Mode::All,
            include_id: true,
        }
    }

    /// Parse a projection document. Values of `0`/`false` exclude, any other
    /// value includes; `null` entries are ignored. `_id` may be excluded in
    /// either mode, but other inclusions and exclusions cannot be mixed.
    pub fn parse(spec: &Document) -> Result<Self, ProjectionParseError> {
        let mut include_id = true;
        let mut explicit_id = false;
        let mut included: HashMap<String, FieldNode> = HashMap::new();
        let mut excluded: HashMap<String, FieldNode> = HashMap::new();

        for (key, value) in spec {
            if matches!(value, Bson::Null) {
                continue;
            }
            if key == "_id" {
                include_id = !is_exclusion(value);
                explicit_id = include_id;
                continue;
            }
            match value {
                Bson::Document(sub) => {
                    let query = match sub.get("$elemMatch") {
                        Some(Bson::Document(q)) if sub.len() == 1 => q,
                        Some(_) if sub.len() == 1 => {
                            return Err(ProjectionParseError(format!(
                                "$elemMatch on '{key}' needs a query document"
                            )));
                        }
                        _ => {
                            return Err(ProjectionParseError(format!(
                                "unsupported projection value for '{key}'"
                            )));
                        }
                    };
                    let expr = parse_filter(query)
                        .map_err(|e| ProjectionParseError(format!("$elemMatch on '{key}': {e}")))?;
                    insert_path(&mut included, key, FieldNode::ElemMatch(expr));
                }
                v if is_exclusion(v) => insert_path(&mut excluded, key, FieldNode::Leaf),
                _ => insert_path(&mut included, key, FieldNode::Leaf),
            }
        }

        if !included.is_empty() && !excluded.is_empty() {
            return Err(ProjectionParseError(
                "cannot mix inclusion and exclusion of fields other than _id".into(),
            ));
        }

        let mode = if !included.is_empty() || (explicit_id && excluded.is_empty()) {
            Mode::Include(included)
        } else if !excluded.is_empty() || !include_id {
            Mode::Exclude(excluded)
        } else {
            Mode::All
        };

        Ok(Self { mode, include_id })
    }

    pub fn is_all(&self) -> bool {
        matches!(self.mode, Mode::All)
    }

    /// Project a document. The source is never modified.
    pub fn apply(&self, doc: &Document) -> Document {
        let mut dest = Document::new();
        if self.include_id {
            if let Some(id) = doc.get("_id") {
                dest.insert("_id", id.clone());
            }
        }
        match &self.mode {
            Mode::All => copy_fields(doc, &mut dest),
            Mode::Include(tree) => include_document(doc, tree, &mut dest, true),
            Mode::Exclude(tree) => exclude_document(doc, tree, &mut dest, true),
        }
        dest
    }
}

fn is_exclusion(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => !b,
        Bson::Int32(v) => *v == 0,
        Bson::Int64(v) => *v == 0,
        Bson::Double(v) => *v == 0.0,
        _ => false,
    }
}

fn copy_fields(src: &Document, dest: &mut Document) {
    for (key, value) in src {
        if key != "_id" {
            dest.insert(key.clone(), value.clone());
        }
    }
}

fn include_document(
    src: &Document,
    tree: &HashMap<String, FieldNode>,
    dest: &mut Document,
    top_level: bool,
) {
    for (key, value) in src {
        // _id is decided by the caller at the top level
        if top_level && key == "_id" {
            continue;
        }
        let node = match tree.get(key) {
            Some(node) => node,
            None => continue,
        };

        match node {
            FieldNode::Leaf => {
                dest.insert(key.clone(), value.clone());
            }
            FieldNode::ElemMatch(expr) => {
                if let Bson::Array(arr) = value {
                    let first = arr
                        .iter()
                        .find(|elem| std::matches!(elem, Bson::Document(d) if matches(d, expr)));
                    if let Some(first) = first {
                        dest.insert(key.clone(), Bson::Array(vec![first.clone()]));
                    }
                }
            }
            FieldNode::Branch(children) => match value {
                Bson::Document(sub) => {
                    let mut trimmed = Document::new();
                    include_document(sub, children, &mut trimmed, false);
                    dest.insert(key.clone(), trimmed);
                }
                Bson::Array(arr) => {
                    let out: Vec<Bson> = arr
                        .iter()
                        .filter_map(|elem| match elem {
                            Bson::Document(elem_doc) => {
                                let mut trimmed = Document::new();
                                include_document(elem_doc, children, &mut trimmed, false);
                                Some(Bson::Document(trimmed))
                            }
                            _ => None,
                        })
                        .collect();
                    dest.insert(key.clone(), out);
                }
                // A scalar where a sub-document was expected is dropped
                _ => {}
            },
        }
    }
}

fn exclude_document(
    src: &Document,
    tree: &HashMap<String, FieldNode>,
    dest: &mut Document,
    top_level: bool,
) {
    for (key, value) in src {
        if top_level && key == "_id" {
            continue;
        }
        match (tree.get(key), value) {
            (Some(FieldNode::Leaf), _) => {}
            (Some(FieldNode::Branch(children)), Bson::Document(sub)) => {
                let mut trimmed = Document::new();
                exclude_document(sub, children, &mut trimmed, false);
                dest.insert(key.clone(), trimmed);
            }
            (Some(FieldNode::Branch(children)), Bson::Array(arr)) => {
                let out: Vec<Bson> = arr
                    .iter()
                    .map(|elem| match elem {
                        Bson::Document(elem_doc) => {
                            let mut trimmed = Document::new();
                            exclude_document(elem_doc, children, &mut trimmed, false);
                            Bson::Document(trimmed)
                        }
                        other => other.clone(),
                    })
                    .collect();
                dest.insert(key.clone(), out);
            }
            _ => {
                dest.insert(key.clone(), value.clone());
            }
        }
    }
}

fn insert_path(map: &mut HashMap<String, FieldNode>, path: &str, node: FieldNode) {
    match path.split_once('.') {
        None => {
            // Leaf takes the whole field and overrides any existing Branch
            // (if someone asks for both "foo" and "foo.bar", "foo" wins).
            map.insert(path.to_string(), node);
        }
        Some((top, rest)) => {
            let entry = map
                .entry(top.to_string())
                .or_insert_with(|| FieldNode::Branch(HashMap::new()));
            if let FieldNode::Branch(children) = entry {
                insert_path(children, rest, node);
            }
        }
    }
}
