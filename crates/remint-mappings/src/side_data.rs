//! Comment and metadata side-data documents.
//!
//! Comments are emitted as one JSON object per class, indexed by the class's
//! default-namespace name; fields and methods are keyed `"name:descriptor"`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::tree::MappingTree;
use crate::Result;

#[derive(Debug, Serialize)]
struct ClassComments {
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    methods: BTreeMap<String, MethodComments>,
}

#[derive(Debug, Serialize)]
struct MethodComments {
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParameterComment>,
}

#[derive(Debug, Serialize)]
struct ParameterComment {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

/// Mapping provenance written next to the comment document.
#[derive(Debug, Clone, Serialize)]
pub struct MappingMetadata {
    pub name: String,
    pub version: String,
}

/// Builds the comment document for every class that carries comment data.
pub fn comments_json(tree: &MappingTree) -> serde_json::Value {
    let mut out = BTreeMap::new();

    for (class_name, class) in tree.classes() {
        let mut fields = BTreeMap::new();
        for (key, field) in &class.fields {
            if let Some(comment) = &field.comment {
                fields.insert(format!("{}:{}", key.name, key.desc), comment.clone());
            }
        }

        let mut methods = BTreeMap::new();
        for (key, method) in &class.methods {
            let parameters: Vec<ParameterComment> = method
                .parameters
                .values()
                .filter(|p| !p.name.is_empty() || p.comment.is_some())
                .map(|p| ParameterComment {
                    name: p.name.clone(),
                    comment: p.comment.clone(),
                })
                .collect();
            if method.comment.is_none() && parameters.is_empty() {
                continue;
            }
            methods.insert(
                format!("{}:{}", key.name, key.desc),
                MethodComments {
                    comment: method.comment.clone(),
                    parameters,
                },
            );
        }

        if class.comment.is_none() && fields.is_empty() && methods.is_empty() {
            continue;
        }
        out.insert(
            class_name.to_string(),
            ClassComments {
                comment: class.comment.clone(),
                fields,
                methods,
            },
        );
    }

    serde_json::to_value(out).expect("comment document serializes")
}

/// Writes the comment document to `path`, creating parent directories.
pub fn write_comments_json(tree: &MappingTree, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&comments_json(tree))?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Writes `{name, version}` metadata to `path`.
pub fn write_metadata_json(metadata: &MappingMetadata, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::tree::{ClassMapping, FieldMapping, MemberKey, MethodMapping, ParameterMapping};

    #[test]
    fn emits_only_commented_entries() {
        let mut tree = MappingTree::new(vec!["named".into()]);

        let mut apple = ClassMapping::new(vec!["com/example/Apple".into()]);
        apple.comment = Some("A fruit.".into());
        apple.fields.insert(
            MemberKey::new("count", "I"),
            FieldMapping {
                names: vec!["count".into()],
                desc: "I".into(),
                comment: Some("How many.".into()),
            },
        );
        apple.fields.insert(
            MemberKey::new("silent", "J"),
            FieldMapping {
                names: vec!["silent".into()],
                desc: "J".into(),
                comment: None,
            },
        );
        let mut grow = MethodMapping {
            names: vec!["grow".into()],
            desc: "(I)V".into(),
            comment: None,
            parameters: Default::default(),
        };
        grow.parameters.insert(
            1,
            ParameterMapping {
                name: "amount".into(),
                comment: Some("By how much.".into()),
            },
        );
        apple.methods.insert(MemberKey::new("grow", "(I)V"), grow);
        tree.insert_class(apple);

        tree.insert_class(ClassMapping::new(vec!["com/example/Mute".into()]));

        let doc = comments_json(&tree);
        assert_eq!(
            doc,
            json!({
                "com/example/Apple": {
                    "comment": "A fruit.",
                    "fields": { "count:I": "How many." },
                    "methods": {
                        "grow:(I)V": {
                            "parameters": [
                                { "name": "amount", "comment": "By how much." }
                            ]
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn writes_metadata() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("meta/mappings-metadata.json");
        write_metadata_json(
            &MappingMetadata {
                name: "mojmaps".into(),
                version: "1.20.4".into(),
            },
            &path,
        )
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value, json!({ "name": "mojmaps", "version": "1.20.4" }));
    }
}
