//! API generator boundary.
//!
//! A generator receives the documents one output target needs and returns
//! files relative to that target's output directory. Its output goes through
//! the reconciler like the schema tree does.

use lexicon_pm_core::{LexiconDoc, OutputTarget};

use crate::error::GenerateError;
use crate::reconcile::GeneratedFile;

/// Turns resolved documents into source files for one output target.
pub trait ApiGenerator {
    /// Generates files for `target` from `docs`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerateError`] if a document cannot be rendered.
    fn generate(&self, target: OutputTarget, docs: &[&LexiconDoc]) -> Result<Vec<GeneratedFile>, GenerateError>;
}

/// Emits a TypeScript module embedding every document.
///
/// `lexicons.ts` exports the documents as a `schemas` array and an `ids` map
/// from PascalCase names to identifiers; `index.ts` re-exports it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconsModuleGenerator;

impl ApiGenerator for LexiconsModuleGenerator {
    fn generate(&self, target: OutputTarget, docs: &[&LexiconDoc]) -> Result<Vec<GeneratedFile>, GenerateError> {
        let mut docs = docs.to_vec();
        docs.sort_by(|a, b| a.id.cmp(&b.id));

        let mut out = format!("// Generated by lexpm for {target}. Do not edit.\n\n");
        out.push_str("export const schemas = [\n");
        for doc in &docs {
            let json = serde_json::to_string_pretty(doc).map_err(|e| GenerateError::Serialize {
                nsid: doc.id.clone(),
                source: e,
            })?;
            for line in json.lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
            out.truncate(out.len() - 1);
            out.push_str(",\n");
        }
        out.push_str("] as const\n\n");

        out.push_str("export const ids = {\n");
        for doc in &docs {
            out.push_str(&format!("  {}: '{}',\n", pascal_case(&doc.id), doc.id));
        }
        out.push_str("} as const\n");

        Ok(vec![
            GeneratedFile::new("index.ts", "export * from './lexicons'\n"),
            GeneratedFile::new("lexicons.ts", out),
        ])
    }
}

/// `app.bsky.feed.post` → `AppBskyFeedPost`.
fn pascal_case(id: &str) -> String {
    id.split(['.', '-'])
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use lexicon_pm_core::read_lexicon;

    use super::*;

    fn doc(id: &str) -> LexiconDoc {
        let text = format!(
            r#"{{"lexicon": 1, "id": "{id}", "defs": {{"main": {{"type": "object", "properties": {{}}}}}}}}"#
        );
        read_lexicon(&text, "test", Some(id)).unwrap()
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("app.bsky.feed.post"), "AppBskyFeedPost");
        assert_eq!(pascal_case("com.example.get-thing"), "ComExampleGetThing");
    }

    #[test]
    fn test_documents_sorted_by_id() {
        let b = doc("com.example.bbb");
        let a = doc("com.example.aaa");
        let files = LexiconsModuleGenerator
            .generate(OutputTarget::Client, &[&b, &a])
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "index.ts");
        let module = &files[1].content;
        assert!(module.starts_with("// Generated by lexpm for TSClient."));
        let first = module.find("\"com.example.aaa\"").unwrap();
        let second = module.find("\"com.example.bbb\"").unwrap();
        assert!(first < second);
        assert!(module.contains("  ComExampleAaa: 'com.example.aaa',\n"));
        assert!(module.contains("] as const\n"));
    }

    #[test]
    fn test_same_input_same_output() {
        let a = doc("com.example.aaa");
        let first = LexiconsModuleGenerator.generate(OutputTarget::Server, &[&a]).unwrap();
        let second = LexiconsModuleGenerator.generate(OutputTarget::Server, &[&a]).unwrap();
        assert_eq!(first, second);
    }
}
