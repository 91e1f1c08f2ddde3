//! Parser for Proguard-style mapping text.
//!
//! ```text
//! com.example.Foo -> a:
//!     int count -> b
//!     12:14:void grow(int,long) -> c
//! ```
//!
//! Names are dot-separated binary names; member types are Java source types.
//! Both are converted to JVM internal names and descriptors so member
//! descriptors round-trip unchanged through the tree.

use remint_core::name::internal_name;

use crate::tree::{FieldMapping, MappingTree, MemberKey, MethodMapping};
use crate::{MappingError, Result};

/// Parses Proguard text into a two-namespace tree.
///
/// The left-hand names key the tree (namespace `left_ns` at index 0); the
/// right-hand names land in `right_ns`. For Mojang mappings the left side is
/// the human-readable one, so callers typically invert the result before
/// applying it to an obfuscated jar.
pub fn parse_proguard(contents: &str, left_ns: &str, right_ns: &str) -> Result<MappingTree> {
    let mut tree = MappingTree::new(vec![left_ns.to_string(), right_ns.to_string()]);
    let mut current: Option<String> = None;

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end();
        if line.is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        let line = line.trim_start();

        let (lhs, rhs) = line
            .split_once(" -> ")
            .ok_or_else(|| MappingError::bad_format(line_no, "missing -> arrow"))?;

        if !indented {
            let obf = rhs
                .strip_suffix(':')
                .ok_or_else(|| MappingError::bad_format(line_no, "class line missing trailing colon"))?;
            let left = internal_name(lhs.trim());
            let class = tree.get_or_insert_class(&left);
            class.names = vec![left.clone(), internal_name(obf.trim())];
            current = Some(left);
            continue;
        }

        let owner = current
            .clone()
            .ok_or_else(|| MappingError::bad_format(line_no, "member before class"))?;

        // Strip the optional `startline:endline:` prefix.
        let lhs = strip_line_numbers(lhs);
        let obf = rhs.trim().to_string();

        if let Some(paren) = lhs.find('(') {
            let close = lhs
                .rfind(')')
                .ok_or_else(|| MappingError::bad_format(line_no, "unterminated parameter list"))?;
            let head = &lhs[..paren];
            let (ret_ty, name) = head
                .rsplit_once(' ')
                .ok_or_else(|| MappingError::bad_format(line_no, "method line missing return type"))?;
            let params_src = &lhs[paren + 1..close];

            let mut desc = String::from("(");
            if !params_src.trim().is_empty() {
                for param in params_src.split(',') {
                    desc.push_str(&java_type_to_descriptor(param.trim(), line_no)?);
                }
            }
            desc.push(')');
            desc.push_str(&java_type_to_descriptor(ret_ty.trim(), line_no)?);

            let names = vec![name.to_string(), obf];
            let class = tree.get_or_insert_class(&owner);
            class.methods.insert(
                MemberKey::new(name, desc.clone()),
                MethodMapping {
                    names,
                    desc,
                    comment: None,
                    parameters: Default::default(),
                },
            );
        } else {
            let (ty, name) = lhs
                .rsplit_once(' ')
                .ok_or_else(|| MappingError::bad_format(line_no, "field line missing type"))?;
            let desc = java_type_to_descriptor(ty.trim(), line_no)?;
            let names = vec![name.to_string(), obf];
            let class = tree.get_or_insert_class(&owner);
            class.fields.insert(
                MemberKey::new(name, desc.clone()),
                FieldMapping {
                    names,
                    desc,
                    comment: None,
                },
            );
        }
    }

    Ok(tree)
}

fn strip_line_numbers(lhs: &str) -> &str {
    let mut rest = lhs;
    for _ in 0..2 {
        match rest.split_once(':') {
            Some((num, tail)) if num.chars().all(|c| c.is_ascii_digit()) && !num.is_empty() => {
                rest = tail;
            }
            _ => break,
        }
    }
    rest
}

fn java_type_to_descriptor(ty: &str, line_no: usize) -> Result<String> {
    let mut dims = 0usize;
    let mut base = ty;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dims += 1;
    }
    if base.is_empty() {
        return Err(MappingError::bad_format(line_no, format!("bad type {ty:?}")));
    }

    let elem = match base {
        "void" => "V".to_string(),
        "boolean" => "Z".to_string(),
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "short" => "S".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "float" => "F".to_string(),
        "double" => "D".to_string(),
        class => format!("L{};", internal_name(class)),
    };

    Ok(format!("{}{}", "[".repeat(dims), elem))
}
