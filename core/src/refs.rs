//! Cross-document reference extraction.
//!
//! [`extract_references`] answers one question: which other schema documents
//! does the generator need in order to emit types for this document under a
//! given [`OutputTarget`]?
//!
//! Only shapes the generator synthesizes declarations for are visited:
//! payload schemas of queries and procedures, subscription messages (server
//! only), record and object property maps, and top-level array items. Inside a
//! property map a `ref` contributes its target, a `union` contributes each
//! member, and an `array` contributes the refs of its item schema. Nothing is
//! followed deeper, because referenced documents are resolved on their own.
//!
//! Local references (`#def`) and references back into the same document are
//! not dependencies and are left out.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::lexicon::{LEX_SCHEME, LexDef, LexObject, LexXrpcBody, LexiconDoc};
use crate::nsid::Nsid;
use crate::target::OutputTarget;

/// Returns the identifiers of the documents `doc` references under `target`.
///
/// # Examples
///
/// ```
/// use lexicon_pm_core::{extract_references, read_lexicon, OutputTarget};
///
/// let doc = read_lexicon(r#"{
///     "lexicon": 1,
///     "id": "com.example.foo",
///     "defs": {
///         "main": {
///             "type": "record",
///             "record": {
///                 "type": "object",
///                 "properties": { "bar": { "type": "ref", "ref": "lex:com.example.bar#view" } }
///             }
///         }
///     }
/// }"#, "foo.json", None).unwrap();
///
/// let refs = extract_references(&doc, OutputTarget::Client);
/// let ids: Vec<&str> = refs.iter().map(|n| n.as_str()).collect();
/// assert_eq!(ids, vec!["com.example.bar"]);
/// ```
pub fn extract_references(doc: &LexiconDoc, target: OutputTarget) -> BTreeSet<Nsid> {
    let mut refs = Collector {
        own_id: &doc.id,
        found: BTreeSet::new(),
    };

    for def in doc.defs.values() {
        match def {
            LexDef::Query(query) => refs.body(query.output.as_ref()),
            LexDef::Procedure(procedure) => {
                refs.body(procedure.input.as_ref());
                refs.body(procedure.output.as_ref());
            }
            LexDef::Subscription(subscription) => {
                if target.includes_subscriptions() {
                    if let Some(schema) = subscription.message.as_ref().and_then(|m| m.schema.as_deref()) {
                        refs.payload(schema);
                    }
                }
            }
            LexDef::Record(record) => refs.object(record.object()),
            LexDef::Object(object) => refs.object(object),
            LexDef::Array(array) => refs.item(&array.items),
            LexDef::Params(_)
            | LexDef::Token(_)
            | LexDef::Ref(_)
            | LexDef::Union(_)
            | LexDef::String(_)
            | LexDef::Integer(_)
            | LexDef::Boolean(_)
            | LexDef::Bytes(_)
            | LexDef::CidLink(_)
            | LexDef::Blob(_)
            | LexDef::Unknown(_) => {}
        }
    }

    refs.found
}

/// Strips the `lex:` scheme and `#fragment` from a reference string, returning
/// the document identifier part. Returns `None` for purely local references.
///
/// # Examples
///
/// ```
/// use lexicon_pm_core::reference_document;
///
/// assert_eq!(reference_document("lex:com.example.bar#view"), Some("com.example.bar"));
/// assert_eq!(reference_document("com.example.bar"), Some("com.example.bar"));
/// assert_eq!(reference_document("#view"), None);
/// ```
pub fn reference_document(reference: &str) -> Option<&str> {
    let stripped = reference.strip_prefix(LEX_SCHEME).unwrap_or(reference);
    let document = stripped.split('#').next().unwrap_or_default();
    (!document.is_empty()).then_some(document)
}

struct Collector<'a> {
    own_id: &'a str,
    found: BTreeSet<Nsid>,
}

impl Collector<'_> {
    fn add(&mut self, reference: &str) {
        let Some(document) = reference_document(reference) else {
            return;
        };
        if document == self.own_id {
            return;
        }
        if let Ok(nsid) = Nsid::parse(document) {
            self.found.insert(nsid);
        }
    }

    fn body(&mut self, body: Option<&LexXrpcBody>) {
        if let Some(schema) = body.and_then(|b| b.schema.as_deref()) {
            self.payload(schema);
        }
    }

    fn payload(&mut self, schema: &LexDef) {
        match schema {
            LexDef::Ref(r) => self.add(&r.target),
            LexDef::Union(u) => u.refs.iter().for_each(|r| self.add(r)),
            LexDef::Object(object) => self.object(object),
            _ => {}
        }
    }

    fn object(&mut self, object: &LexObject) {
        self.properties(&object.properties);
    }

    fn properties(&mut self, properties: &BTreeMap<String, LexDef>) {
        for property in properties.values() {
            match property {
                LexDef::Ref(r) => self.add(&r.target),
                LexDef::Union(u) => u.refs.iter().for_each(|r| self.add(r)),
                LexDef::Array(array) => self.item(&array.items),
                _ => {}
            }
        }
    }

    fn item(&mut self, item: &LexDef) {
        match item {
            LexDef::Ref(r) => self.add(&r.target),
            LexDef::Union(u) => u.refs.iter().for_each(|r| self.add(r)),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_lexicon;

    fn ids(doc: &LexiconDoc, target: OutputTarget) -> Vec<String> {
        extract_references(doc, target)
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    fn doc(text: &str) -> LexiconDoc {
        read_lexicon(text, "test.json", None).unwrap()
    }

    #[test]
    fn test_procedure_input_and_output() {
        let doc = doc(r##"{
            "lexicon": 1,
            "id": "com.example.createThing",
            "defs": {
                "main": {
                    "type": "procedure",
                    "input": {
                        "encoding": "application/json",
                        "schema": {
                            "type": "object",
                            "properties": {
                                "thing": { "type": "ref", "ref": "com.example.thing" },
                                "labels": { "type": "array", "items": { "type": "union", "refs": ["com.example.label#a", "com.example.other"] } }
                            }
                        }
                    },
                    "output": {
                        "encoding": "application/json",
                        "schema": { "type": "ref", "ref": "lex:com.example.defs#result" }
                    }
                }
            }
        }"##);
        let expected = vec![
            "com.example.defs",
            "com.example.label",
            "com.example.other",
            "com.example.thing",
        ];
        assert_eq!(ids(&doc, OutputTarget::Client), expected);
        assert_eq!(ids(&doc, OutputTarget::Server), expected);
    }

    #[test]
    fn test_subscription_only_for_server() {
        let doc = doc(r##"{
            "lexicon": 1,
            "id": "com.example.subscribe",
            "defs": {
                "main": {
                    "type": "subscription",
                    "message": { "schema": { "type": "union", "refs": ["#commit", "com.example.defs#info"] } }
                },
                "commit": {
                    "type": "object",
                    "properties": { "repo": { "type": "ref", "ref": "com.example.repo" } }
                }
            }
        }"##);
        assert_eq!(ids(&doc, OutputTarget::Client), vec!["com.example.repo"]);
        assert_eq!(
            ids(&doc, OutputTarget::Server),
            vec!["com.example.defs", "com.example.repo"]
        );
    }

    #[test]
    fn test_skips_local_and_self_references() {
        let doc = doc(r##"{
            "lexicon": 1,
            "id": "com.example.defs",
            "defs": {
                "view": {
                    "type": "object",
                    "properties": {
                        "a": { "type": "ref", "ref": "#other" },
                        "b": { "type": "ref", "ref": "com.example.defs#other" }
                    }
                },
                "list": { "type": "array", "items": { "type": "ref", "ref": "com.example.item" } },
                "other": { "type": "string" }
            }
        }"##);
        assert_eq!(ids(&doc, OutputTarget::Client), vec!["com.example.item"]);
    }

    #[test]
    fn test_does_not_descend_past_one_level() {
        let doc = doc(r##"{
            "lexicon": 1,
            "id": "com.example.foo",
            "defs": {
                "main": {
                    "type": "query",
                    "output": {
                        "encoding": "application/json",
                        "schema": {
                            "type": "object",
                            "properties": { "n": { "type": "integer" } }
                        }
                    }
                }
            }
        }"##);
        assert!(extract_references(&doc, OutputTarget::Client).is_empty());
    }
}
