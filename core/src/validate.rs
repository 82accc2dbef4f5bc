//! Structural validation of lexicon documents.
//!
//! Validation runs over the generic JSON value before it is converted into the
//! typed [`LexiconDoc`](crate::LexiconDoc) model, so that every offending path
//! can be reported at once instead of stopping at the first serde error.
//!
//! # Examples
//!
//! ```
//! use lexicon_pm_core::validate_document;
//!
//! let doc = serde_json::json!({
//!     "lexicon": 1,
//!     "id": "com.example.foo",
//!     "defs": {
//!         "main": { "type": "record", "record": { "type": "object", "properties": {} } },
//!         "view": { "type": "query" },
//!         "item": { "type": "array" }
//!     }
//! });
//!
//! let issues = validate_document(&doc);
//! let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
//! assert_eq!(paths, vec!["/defs/item/items", "/defs/view"]);
//! ```

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::lexicon::{LEX_SCHEME, LEXICON_FORMAT_VERSION, MAIN_DEF};
use crate::nsid::Nsid;

const KNOWN_TYPES: &[&str] = &[
    "query",
    "procedure",
    "subscription",
    "record",
    "object",
    "array",
    "params",
    "token",
    "ref",
    "union",
    "string",
    "integer",
    "boolean",
    "bytes",
    "cid-link",
    "blob",
    "unknown",
];

const PRIMARY_TYPES: &[&str] = &["query", "procedure", "subscription", "record"];

const STRING_FORMATS: &[&str] = &[
    "at-identifier",
    "at-uri",
    "cid",
    "datetime",
    "did",
    "handle",
    "language",
    "nsid",
    "record-key",
    "tid",
    "uri",
];

/// Kind of structural problem found at a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IssueKind {
    /// A required field is absent.
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
    /// A field has the wrong JSON type.
    #[error("expected {0}")]
    WrongType(&'static str),
    /// The `lexicon` marker names a format version this crate does not know.
    #[error("unsupported lexicon version {0}")]
    UnsupportedVersion(u64),
    /// The declared `id` is not a valid NSID.
    #[error("invalid document id `{0}`")]
    InvalidId(String),
    /// The `type` discriminator is not one of the known kinds.
    #[error("unknown definition type `{0}`")]
    UnknownType(String),
    /// A known kind appears in a position where it is not allowed.
    #[error("`{kind}` is not allowed in {position}")]
    NotAllowedHere {
        kind: String,
        position: &'static str,
    },
    /// A primary kind (query, procedure, subscription, record) outside `main`.
    #[error("`{0}` definitions must be named `main`")]
    PrimaryOutsideMain(String),
    /// A `required`/`nullable` entry names a property that does not exist.
    #[error("`{0}` is not a declared property")]
    UndeclaredProperty(String),
    /// A reference string is not `#def`, `nsid` or `nsid#def`.
    #[error("invalid reference `{0}`")]
    InvalidReference(String),
    /// A string `format` outside the known set.
    #[error("unknown string format `{0}`")]
    UnknownFormat(String),
    /// A lower bound exceeds its upper bound.
    #[error("`{lower}` is greater than `{upper}`")]
    InvertedRange {
        lower: &'static str,
        upper: &'static str,
    },
    /// The value passed structural checks but still failed to map onto the
    /// typed model.
    #[error("{0}")]
    Malformed(String),
}

/// A single validation failure and where it occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Slash-separated JSON path, e.g. `/defs/main/record/properties/text`.
    pub path: String,
    pub kind: IssueKind,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.kind)
    }
}

/// Where a definition sits in the document; decides which kinds are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Main,
    Auxiliary,
    Property,
    ParamsProperty,
    ArrayItem,
    ParamsArrayItem,
    Payload,
    RecordBody,
    Parameters,
}

impl Position {
    fn label(self) -> &'static str {
        match self {
            Position::Main | Position::Auxiliary => "a top-level definition",
            Position::Property => "an object property",
            Position::ParamsProperty => "a parameter",
            Position::ArrayItem | Position::ParamsArrayItem => "array items",
            Position::Payload => "a payload schema",
            Position::RecordBody => "a record body",
            Position::Parameters => "xrpc parameters",
        }
    }

    fn allows(self, kind: &str) -> bool {
        match self {
            Position::Main => !matches!(kind, "ref" | "union" | "params"),
            Position::Auxiliary => !matches!(kind, "ref" | "union" | "params"),
            Position::Property => matches!(
                kind,
                "array"
                    | "ref"
                    | "union"
                    | "string"
                    | "integer"
                    | "boolean"
                    | "bytes"
                    | "cid-link"
                    | "blob"
                    | "unknown"
            ),
            Position::ParamsProperty => {
                matches!(kind, "array" | "string" | "integer" | "boolean" | "unknown")
            }
            Position::ArrayItem => matches!(
                kind,
                "ref"
                    | "union"
                    | "string"
                    | "integer"
                    | "boolean"
                    | "bytes"
                    | "cid-link"
                    | "blob"
                    | "unknown"
            ),
            Position::ParamsArrayItem => {
                matches!(kind, "string" | "integer" | "boolean" | "unknown")
            }
            Position::Payload => matches!(kind, "object" | "ref" | "union"),
            Position::RecordBody => kind == "object",
            Position::Parameters => kind == "params",
        }
    }
}

/// Validates the structure of a raw lexicon document, returning every issue.
///
/// An empty result means the value can be converted into a
/// [`LexiconDoc`](crate::LexiconDoc).
pub fn validate_document(value: &Value) -> Vec<ValidationIssue> {
    let mut v = Validator::default();
    let Some(obj) = value.as_object() else {
        v.push("", IssueKind::WrongType("an object"));
        return v.issues;
    };

    match obj.get("lexicon") {
        None => v.push("/lexicon", IssueKind::MissingField("lexicon")),
        Some(marker) => match marker.as_u64() {
            Some(LEXICON_FORMAT_VERSION) => {}
            Some(other) => v.push("/lexicon", IssueKind::UnsupportedVersion(other)),
            None => v.push("/lexicon", IssueKind::WrongType("an integer")),
        },
    }

    match obj.get("id") {
        None => v.push("/id", IssueKind::MissingField("id")),
        Some(Value::String(id)) => {
            if !Nsid::is_valid(id) {
                v.push("/id", IssueKind::InvalidId(id.clone()));
            }
        }
        Some(_) => v.push("/id", IssueKind::WrongType("a string")),
    }

    if let Some(revision) = obj.get("revision") {
        if revision.as_u64().is_none() {
            v.push("/revision", IssueKind::WrongType("a non-negative integer"));
        }
    }
    v.optional_string(obj, "/description", "description");

    match obj.get("defs") {
        None => v.push("/defs", IssueKind::MissingField("defs")),
        Some(Value::Object(defs)) => {
            for (name, def) in defs {
                let position = if name == MAIN_DEF {
                    Position::Main
                } else {
                    Position::Auxiliary
                };
                v.definition(&format!("/defs/{name}"), def, position);
            }
        }
        Some(_) => v.push("/defs", IssueKind::WrongType("an object")),
    }

    v.issues.sort_by(|a, b| a.path.cmp(&b.path));
    v.issues
}

#[derive(Default)]
struct Validator {
    issues: Vec<ValidationIssue>,
}

impl Validator {
    fn push(&mut self, path: &str, kind: IssueKind) {
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            kind,
        });
    }

    fn definition(&mut self, path: &str, value: &Value, position: Position) {
        let Some(obj) = value.as_object() else {
            self.push(path, IssueKind::WrongType("an object"));
            return;
        };
        let kind = match obj.get("type") {
            None => {
                self.push(&format!("{path}/type"), IssueKind::MissingField("type"));
                return;
            }
            Some(Value::String(kind)) => kind.as_str(),
            Some(_) => {
                self.push(&format!("{path}/type"), IssueKind::WrongType("a string"));
                return;
            }
        };
        if !KNOWN_TYPES.contains(&kind) {
            self.push(path, IssueKind::UnknownType(kind.to_string()));
            return;
        }
        if position == Position::Auxiliary && PRIMARY_TYPES.contains(&kind) {
            self.push(path, IssueKind::PrimaryOutsideMain(kind.to_string()));
            return;
        }
        if !position.allows(kind) {
            self.push(
                path,
                IssueKind::NotAllowedHere {
                    kind: kind.to_string(),
                    position: position.label(),
                },
            );
            return;
        }

        self.optional_string(obj, &format!("{path}/description"), "description");

        match kind {
            "query" | "procedure" | "subscription" => self.xrpc(path, obj, kind),
            "record" => {
                self.optional_string(obj, &format!("{path}/key"), "key");
                match obj.get("record") {
                    None => self.push(&format!("{path}/record"), IssueKind::MissingField("record")),
                    Some(body) => self.definition(&format!("{path}/record"), body, Position::RecordBody),
                }
            }
            "object" => self.object(path, obj, Position::Property),
            "params" => self.object(path, obj, Position::ParamsProperty),
            "array" => {
                let item_position = if position == Position::ParamsProperty {
                    Position::ParamsArrayItem
                } else {
                    Position::ArrayItem
                };
                match obj.get("items") {
                    None => self.push(&format!("{path}/items"), IssueKind::MissingField("items")),
                    Some(items) => self.definition(&format!("{path}/items"), items, item_position),
                }
                self.range(path, obj, "minLength", "maxLength");
            }
            "ref" => match obj.get("ref") {
                None => self.push(&format!("{path}/ref"), IssueKind::MissingField("ref")),
                Some(Value::String(target)) => self.reference(&format!("{path}/ref"), target),
                Some(_) => self.push(&format!("{path}/ref"), IssueKind::WrongType("a string")),
            },
            "union" => {
                match obj.get("refs") {
                    None => self.push(&format!("{path}/refs"), IssueKind::MissingField("refs")),
                    Some(Value::Array(refs)) => {
                        for (i, target) in refs.iter().enumerate() {
                            let item_path = format!("{path}/refs/{i}");
                            match target.as_str() {
                                Some(target) => self.reference(&item_path, target),
                                None => self.push(&item_path, IssueKind::WrongType("a string")),
                            }
                        }
                    }
                    Some(_) => self.push(&format!("{path}/refs"), IssueKind::WrongType("an array")),
                }
                if let Some(closed) = obj.get("closed") {
                    if !closed.is_boolean() {
                        self.push(&format!("{path}/closed"), IssueKind::WrongType("a boolean"));
                    }
                }
            }
            "string" => self.string(path, obj),
            "integer" => {
                for field in ["minimum", "maximum", "default", "const"] {
                    if let Some(n) = obj.get(field) {
                        if n.as_i64().is_none() {
                            self.push(&format!("{path}/{field}"), IssueKind::WrongType("an integer"));
                        }
                    }
                }
                self.array_of(obj, &format!("{path}/enum"), "enum", Value::is_i64, "an integer");
                if let (Some(min), Some(max)) = (
                    obj.get("minimum").and_then(Value::as_i64),
                    obj.get("maximum").and_then(Value::as_i64),
                ) {
                    if min > max {
                        self.push(
                            path,
                            IssueKind::InvertedRange {
                                lower: "minimum",
                                upper: "maximum",
                            },
                        );
                    }
                }
            }
            "boolean" => {
                for field in ["default", "const"] {
                    if let Some(b) = obj.get(field) {
                        if !b.is_boolean() {
                            self.push(&format!("{path}/{field}"), IssueKind::WrongType("a boolean"));
                        }
                    }
                }
            }
            "bytes" => self.range(path, obj, "minLength", "maxLength"),
            "blob" => {
                self.array_of(obj, &format!("{path}/accept"), "accept", Value::is_string, "a string");
                if let Some(size) = obj.get("maxSize") {
                    if size.as_u64().is_none() {
                        self.push(&format!("{path}/maxSize"), IssueKind::WrongType("a non-negative integer"));
                    }
                }
            }
            _ => {}
        }
    }

    fn xrpc(&mut self, path: &str, obj: &Map<String, Value>, kind: &str) {
        if let Some(params) = obj.get("parameters") {
            self.definition(&format!("{path}/parameters"), params, Position::Parameters);
        }

        let bodies: &[&str] = match kind {
            "query" => &["output"],
            "procedure" => &["input", "output"],
            _ => &["message"],
        };
        for &field in bodies {
            let Some(body) = obj.get(field) else { continue };
            let body_path = format!("{path}/{field}");
            let Some(body) = body.as_object() else {
                self.push(&body_path, IssueKind::WrongType("an object"));
                continue;
            };
            if field != "message" {
                match body.get("encoding") {
                    None => self.push(&format!("{body_path}/encoding"), IssueKind::MissingField("encoding")),
                    Some(Value::String(_)) => {}
                    Some(_) => self.push(&format!("{body_path}/encoding"), IssueKind::WrongType("a string")),
                }
            }
            self.optional_string(body, &format!("{body_path}/description"), "description");
            if let Some(schema) = body.get("schema") {
                self.definition(&format!("{body_path}/schema"), schema, Position::Payload);
            }
        }

        if let Some(errors) = obj.get("errors") {
            let errors_path = format!("{path}/errors");
            match errors.as_array() {
                None => self.push(&errors_path, IssueKind::WrongType("an array")),
                Some(errors) => {
                    for (i, error) in errors.iter().enumerate() {
                        if error.get("name").and_then(Value::as_str).is_none() {
                            self.push(&format!("{errors_path}/{i}/name"), IssueKind::MissingField("name"));
                        }
                    }
                }
            }
        }
    }

    fn object(&mut self, path: &str, obj: &Map<String, Value>, property_position: Position) {
        let properties = match obj.get("properties") {
            None => None,
            Some(Value::Object(props)) => Some(props),
            Some(_) => {
                self.push(&format!("{path}/properties"), IssueKind::WrongType("an object"));
                None
            }
        };
        if let Some(props) = properties {
            for (name, prop) in props {
                self.definition(&format!("{path}/properties/{name}"), prop, property_position);
            }
        }

        for field in ["required", "nullable"] {
            let Some(listed) = obj.get(field) else { continue };
            let field_path = format!("{path}/{field}");
            let Some(listed) = listed.as_array() else {
                self.push(&field_path, IssueKind::WrongType("an array"));
                continue;
            };
            for (i, name) in listed.iter().enumerate() {
                match name.as_str() {
                    None => self.push(&format!("{field_path}/{i}"), IssueKind::WrongType("a string")),
                    Some(name) => {
                        if !properties.is_some_and(|p| p.contains_key(name)) {
                            self.push(
                                &format!("{field_path}/{i}"),
                                IssueKind::UndeclaredProperty(name.to_string()),
                            );
                        }
                    }
                }
            }
        }
    }

    fn string(&mut self, path: &str, obj: &Map<String, Value>) {
        if let Some(format) = obj.get("format") {
            match format.as_str() {
                Some(f) if STRING_FORMATS.contains(&f) => {}
                Some(f) => self.push(&format!("{path}/format"), IssueKind::UnknownFormat(f.to_string())),
                None => self.push(&format!("{path}/format"), IssueKind::WrongType("a string")),
            }
        }
        self.range(path, obj, "minLength", "maxLength");
        self.range(path, obj, "minGraphemes", "maxGraphemes");
        self.array_of(obj, &format!("{path}/knownValues"), "knownValues", Value::is_string, "a string");
        self.array_of(obj, &format!("{path}/enum"), "enum", Value::is_string, "a string");
        self.optional_string(obj, &format!("{path}/default"), "default");
        self.optional_string(obj, &format!("{path}/const"), "const");
    }

    fn range(&mut self, path: &str, obj: &Map<String, Value>, lower: &'static str, upper: &'static str) {
        let mut bounds = [None, None];
        for (slot, field) in bounds.iter_mut().zip([lower, upper]) {
            if let Some(n) = obj.get(field) {
                match n.as_u64() {
                    Some(n) => *slot = Some(n),
                    None => self.push(&format!("{path}/{field}"), IssueKind::WrongType("a non-negative integer")),
                }
            }
        }
        if let [Some(min), Some(max)] = bounds {
            if min > max {
                self.push(path, IssueKind::InvertedRange { lower, upper });
            }
        }
    }

    fn reference(&mut self, path: &str, target: &str) {
        let stripped = target.strip_prefix(LEX_SCHEME).unwrap_or(target);
        let (document, fragment) = match stripped.split_once('#') {
            Some((document, fragment)) => (document, Some(fragment)),
            None => (stripped, None),
        };
        let document_ok = document.is_empty() || Nsid::is_valid(document);
        let fragment_ok = fragment.is_none_or(|f| !f.is_empty());
        if !document_ok || !fragment_ok || stripped.is_empty() || stripped == "#" {
            self.push(path, IssueKind::InvalidReference(target.to_string()));
        }
    }

    fn optional_string(&mut self, obj: &Map<String, Value>, path: &str, field: &str) {
        if let Some(value) = obj.get(field) {
            if !value.is_string() {
                self.push(path, IssueKind::WrongType("a string"));
            }
        }
    }

    fn array_of(
        &mut self,
        obj: &Map<String, Value>,
        path: &str,
        field: &str,
        check: fn(&Value) -> bool,
        expected: &'static str,
    ) {
        let Some(value) = obj.get(field) else { return };
        let Some(items) = value.as_array() else {
            self.push(path, IssueKind::WrongType("an array"));
            return;
        };
        for (i, item) in items.iter().enumerate() {
            if !check(item) {
                self.push(&format!("{path}/{i}"), IssueKind::WrongType(expected));
            }
        }
    }
}
