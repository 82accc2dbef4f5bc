//! Lexicon schema document model.
//!
//! A [`LexiconDoc`] is a map from definition name to [`LexDef`]. Every
//! definition carries a `type` discriminator; the model is a closed tagged
//! enum so that dispatch over definition kinds is exhaustive at compile time.
//!
//! The same enum is used for top-level definitions, object properties, array
//! items and payload schemas. Which kinds are allowed in which position is a
//! structural rule enforced by [`validate_document`](crate::validate_document),
//! not by the type system.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Version of the lexicon document format understood by this crate.
pub const LEXICON_FORMAT_VERSION: u64 = 1;

/// Name of the conventional primary definition.
pub const MAIN_DEF: &str = "main";

/// Scheme prefix allowed on references (`lex:com.example.foo#bar`).
pub const LEX_SCHEME: &str = "lex:";

/// A parsed and validated schema document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconDoc {
    /// Format marker, always [`LEXICON_FORMAT_VERSION`].
    pub lexicon: u64,
    /// Declared identifier of the document.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Definitions keyed by definition name.
    pub defs: BTreeMap<String, LexDef>,
}

impl LexiconDoc {
    /// Returns the `main` definition, if present.
    pub fn main(&self) -> Option<&LexDef> {
        self.defs.get(MAIN_DEF)
    }

    /// Returns the full URI of a definition (`{id}#{def}`).
    pub fn def_uri(&self, def_id: &str) -> String {
        format!("{}#{}", self.id, def_id)
    }
}

/// Discriminated definition kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LexDef {
    Query(LexXrpcQuery),
    Procedure(LexXrpcProcedure),
    Subscription(LexXrpcSubscription),
    Record(LexRecord),
    Object(LexObject),
    Array(LexArray),
    Params(LexParams),
    Token(LexToken),
    Ref(LexRef),
    Union(LexRefUnion),
    String(LexString),
    Integer(LexInteger),
    Boolean(LexBoolean),
    Bytes(LexBytes),
    CidLink(LexCidLink),
    Blob(LexBlob),
    Unknown(LexUnknown),
}

impl LexDef {
    /// Returns the `type` tag as it appears in the document.
    pub fn kind(&self) -> &'static str {
        match self {
            LexDef::Query(_) => "query",
            LexDef::Procedure(_) => "procedure",
            LexDef::Subscription(_) => "subscription",
            LexDef::Record(_) => "record",
            LexDef::Object(_) => "object",
            LexDef::Array(_) => "array",
            LexDef::Params(_) => "params",
            LexDef::Token(_) => "token",
            LexDef::Ref(_) => "ref",
            LexDef::Union(_) => "union",
            LexDef::String(_) => "string",
            LexDef::Integer(_) => "integer",
            LexDef::Boolean(_) => "boolean",
            LexDef::Bytes(_) => "bytes",
            LexDef::CidLink(_) => "cid-link",
            LexDef::Blob(_) => "blob",
            LexDef::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<XrpcParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<LexXrpcBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<LexXrpcError>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcProcedure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<XrpcParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<LexXrpcBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<LexXrpcBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<LexXrpcError>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcSubscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<XrpcParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<LexXrpcMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<LexXrpcError>>,
}

/// Input or output body of a query or procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub encoding: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<LexDef>>,
}

/// Message payload of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<LexDef>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexXrpcError {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub record: RecordBody,
}

impl LexRecord {
    /// Returns the object describing the record's fields.
    pub fn object(&self) -> &LexObject {
        match &self.record {
            RecordBody::Object(object) => object,
        }
    }
}

/// Body of a record definition. Always an `object`; kept as a tagged enum so
/// the `type` field survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RecordBody {
    Object(LexObject),
}

/// Query-string parameters of an xrpc method. Always `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum XrpcParameters {
    Params(LexParams),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nullable: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, LexDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexArray {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub items: Box<LexDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, LexDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexToken {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Reference to another definition, local (`#name`) or global (`nsid#name`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "ref")]
    pub target: String,
}

/// One-of over several referenced definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexRefUnion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub refs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexString {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_graphemes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_graphemes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_values: Option<Vec<String>>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub constant: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexInteger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<i64>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<i64>,
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub constant: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexBoolean {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<bool>,
    #[serde(default, rename = "const", skip_serializing_if = "Option::is_none")]
    pub constant: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexBytes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexCidLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexBlob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexUnknown {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
