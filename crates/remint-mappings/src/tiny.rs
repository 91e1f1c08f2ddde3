//! Parser for the tab-delimited tiny mapping formats.
//!
//! v1 header: `v1\t<ns>...`; body rows are `CLASS`, `FIELD` and `METHOD`
//! lines keyed by default-namespace owner names.
//!
//! v2 header: `tiny\t2\t<minor>\t<ns>...` followed by an optional property
//! section, then an indent-structured hierarchy of `c` (class), `f`/`m`
//! (members), `p` (parameter) and `c` (comment) rows.

use crate::tree::{FieldMapping, MappingTree, MemberKey, MethodMapping, ParameterMapping};
use crate::{MappingError, Result};

const ESCAPED_NAMES_PROPERTY: &str = "escaped-names";

/// Parses tiny v1 or v2 text, selected by the header line.
pub fn parse_tiny(contents: &str) -> Result<MappingTree> {
    let mut lines = contents.lines();
    let header = lines
        .next()
        .ok_or_else(|| MappingError::bad_format(1, "empty mapping file"))?;
    let cols: Vec<&str> = header.split('\t').collect();

    match cols.first().copied() {
        Some("v1") => parse_v1(&cols[1..], lines),
        Some("tiny") => {
            if cols.len() < 4 {
                return Err(MappingError::bad_format(1, "truncated tiny v2 header"));
            }
            if cols[1] != "2" {
                return Err(MappingError::Unsupported(format!(
                    "tiny major version {}",
                    cols[1]
                )));
            }
            let minor: u32 = cols[2].parse().map_err(|_| {
                MappingError::bad_format(1, format!("bad tiny minor version {:?}", cols[2]))
            })?;
            if minor != 0 {
                return Err(MappingError::Unsupported(format!(
                    "tiny version 2.{minor}"
                )));
            }
            parse_v2(&cols[3..], contents)
        }
        _ => Err(MappingError::bad_format(1, "unrecognized tiny header")),
    }
}

fn parse_v1<'a>(
    namespaces: &[&str],
    lines: impl Iterator<Item = &'a str>,
) -> Result<MappingTree> {
    if namespaces.is_empty() {
        return Err(MappingError::bad_format(1, "tiny v1 header has no namespaces"));
    }
    let ns_count = namespaces.len();
    let mut tree = MappingTree::new(namespaces.iter().map(|s| s.to_string()).collect());

    for (idx, line) in lines.enumerate() {
        let line_no = idx + 2;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        match cols[0] {
            "CLASS" => {
                if cols.len() < 2 {
                    return Err(MappingError::bad_format(line_no, "truncated CLASS line"));
                }
                let names = pad_names(&cols[1..], ns_count);
                let class = tree.get_or_insert_class(cols[1]);
                class.names = names;
            }
            "FIELD" | "METHOD" => {
                if cols.len() < 4 {
                    return Err(MappingError::bad_format(line_no, "truncated member line"));
                }
                let owner = cols[1];
                let desc = cols[2].to_string();
                let names = pad_names(&cols[3..], ns_count);
                let key = MemberKey::new(names[0].clone(), desc.clone());
                let class = tree.get_or_insert_class(owner);
                if cols[0] == "FIELD" {
                    class.fields.insert(
                        key,
                        FieldMapping {
                            names,
                            desc,
                            comment: None,
                        },
                    );
                } else {
                    class.methods.insert(
                        key,
                        MethodMapping {
                            names,
                            desc,
                            comment: None,
                            parameters: Default::default(),
                        },
                    );
                }
            }
            other => {
                return Err(MappingError::bad_format(
                    line_no,
                    format!("unknown tiny v1 prefix {other:?}"),
                ));
            }
        }
    }

    Ok(tree)
}

struct V2Cursor {
    class: Option<String>,
    member: Option<(MemberOwner, MemberKey)>,
    param_slot: Option<u16>,
}

#[derive(Clone, Copy, PartialEq)]
enum MemberOwner {
    Field,
    Method,
}

fn parse_v2(namespaces: &[&str], contents: &str) -> Result<MappingTree> {
    let ns_count = namespaces.len();
    if ns_count == 0 {
        return Err(MappingError::bad_format(1, "tiny v2 header has no namespaces"));
    }
    let mut tree = MappingTree::new(namespaces.iter().map(|s| s.to_string()).collect());

    // Property section: indented lines between the header and the first
    // class row. `escaped-names` switches on escape handling for the rest of
    // the file, so it has to be scanned before any name is interned.
    let mut body_start = 1usize;
    for (idx, line) in contents.lines().enumerate().skip(1) {
        let Some(rest) = line.strip_prefix('\t') else {
            body_start = idx;
            break;
        };
        body_start = idx + 1;
        let (key, value) = match rest.split_once('\t') {
            Some((k, v)) => (k, Some(v.to_string())),
            None => (rest, None),
        };
        tree.set_property(key, value);
    }
    let escaped = tree.properties().contains_key(ESCAPED_NAMES_PROPERTY);

    let mut cursor = V2Cursor {
        class: None,
        member: None,
        param_slot: None,
    };

    for (idx, line) in contents.lines().enumerate().skip(body_start) {
        let line_no = idx + 1;
        if line.is_empty() {
            continue;
        }
        let indent = line.bytes().take_while(|&b| b == b'\t').count();
        let cols: Vec<&str> = line[indent..].split('\t').collect();
        let kind = cols[0];

        match (indent, kind) {
            (0, "c") => {
                if cols.len() < 2 {
                    return Err(MappingError::bad_format(line_no, "truncated class line"));
                }
                let names = unescape_names(&cols[1..], ns_count, escaped, line_no)?;
                let default = names[0].clone();
                let class = tree.get_or_insert_class(&default);
                class.names = names;
                cursor.class = Some(default);
                cursor.member = None;
                cursor.param_slot = None;
            }
            (1, "f") | (1, "m") => {
                let class_name = cursor
                    .class
                    .clone()
                    .ok_or_else(|| MappingError::bad_format(line_no, "member before class"))?;
                if cols.len() < 3 {
                    return Err(MappingError::bad_format(line_no, "truncated member line"));
                }
                let desc = unescape(cols[1], escaped, line_no)?;
                let names = unescape_names(&cols[2..], ns_count, escaped, line_no)?;
                let key = MemberKey::new(names[0].clone(), desc.clone());
                let class = tree.get_or_insert_class(&class_name);
                let owner = if kind == "f" {
                    class.fields.insert(
                        key.clone(),
                        FieldMapping {
                            names,
                            desc,
                            comment: None,
                        },
                    );
                    MemberOwner::Field
                } else {
                    class.methods.insert(
                        key.clone(),
                        MethodMapping {
                            names,
                            desc,
                            comment: None,
                            parameters: Default::default(),
                        },
                    );
                    MemberOwner::Method
                };
                cursor.member = Some((owner, key));
                cursor.param_slot = None;
            }
            (2, "p") => {
                let (class_name, key) = cursor_method(&cursor, line_no)?;
                if cols.len() < 3 {
                    return Err(MappingError::bad_format(line_no, "truncated parameter line"));
                }
                let slot: u16 = cols[1].parse().map_err(|_| {
                    MappingError::bad_format(line_no, format!("bad parameter slot {:?}", cols[1]))
                })?;
                // The slot-local name column is the last namespace's; earlier
                // columns may be blank in common tooling output.
                let name = cols[2..]
                    .iter()
                    .rev()
                    .find(|n| !n.is_empty())
                    .copied()
                    .unwrap_or("");
                let name = unescape(name, escaped, line_no)?;
                let class = tree.class_mut(&class_name).expect("cursor class exists");
                let method = class.methods.get_mut(&key).expect("cursor method exists");
                method.parameters.insert(
                    slot,
                    ParameterMapping {
                        name,
                        comment: None,
                    },
                );
                cursor.param_slot = Some(slot);
            }
            (2, "v") => {
                // Local-variable rows carry no information the remap core
                // consumes; accept and skip them.
                cursor.param_slot = None;
            }
            (1, "c") | (2, "c") | (3, "c") => {
                if cols.len() < 2 {
                    return Err(MappingError::bad_format(line_no, "truncated comment line"));
                }
                let comment = unescape(cols[1], escaped, line_no)?;
                attach_comment(&mut tree, &cursor, indent, comment, line_no)?;
            }
            (_, other) => {
                return Err(MappingError::bad_format(
                    line_no,
                    format!("unknown tiny v2 prefix {other:?} at indent {indent}"),
                ));
            }
        }
    }

    Ok(tree)
}

fn cursor_method(cursor: &V2Cursor, line_no: usize) -> Result<(String, MemberKey)> {
    let class = cursor
        .class
        .clone()
        .ok_or_else(|| MappingError::bad_format(line_no, "parameter before class"))?;
    match &cursor.member {
        Some((MemberOwner::Method, key)) => Ok((class, key.clone())),
        _ => Err(MappingError::bad_format(
            line_no,
            "parameter line outside a method",
        )),
    }
}

fn attach_comment(
    tree: &mut MappingTree,
    cursor: &V2Cursor,
    indent: usize,
    comment: String,
    line_no: usize,
) -> Result<()> {
    let class_name = cursor
        .class
        .clone()
        .ok_or_else(|| MappingError::bad_format(line_no, "comment before class"))?;
    let class = tree.class_mut(&class_name).expect("cursor class exists");

    match indent {
        1 => {
            class.comment = Some(comment);
            Ok(())
        }
        2 => match &cursor.member {
            Some((MemberOwner::Field, key)) => {
                class.fields.get_mut(key).expect("cursor field exists").comment = Some(comment);
                Ok(())
            }
            Some((MemberOwner::Method, key)) => {
                class.methods.get_mut(key).expect("cursor method exists").comment = Some(comment);
                Ok(())
            }
            None => Err(MappingError::bad_format(line_no, "comment outside a member")),
        },
        3 => {
            let (_, key) = cursor_method(cursor, line_no)?;
            let slot = cursor
                .param_slot
                .ok_or_else(|| MappingError::bad_format(line_no, "comment outside a parameter"))?;
            let method = class.methods.get_mut(&key).expect("cursor method exists");
            method
                .parameters
                .get_mut(&slot)
                .expect("cursor parameter exists")
                .comment = Some(comment);
            Ok(())
        }
        _ => Err(MappingError::bad_format(line_no, "malformed comment indent")),
    }
}

fn pad_names(cols: &[&str], ns_count: usize) -> Vec<String> {
    let mut names: Vec<String> = cols.iter().take(ns_count).map(|s| s.to_string()).collect();
    names.resize(ns_count, String::new());
    names
}

fn unescape_names(
    cols: &[&str],
    ns_count: usize,
    escaped: bool,
    line_no: usize,
) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(ns_count);
    for col in cols.iter().take(ns_count) {
        names.push(unescape(col, escaped, line_no)?);
    }
    while names.len() < ns_count {
        names.push(String::new());
    }
    Ok(names)
}

fn unescape(value: &str, escaped: bool, line_no: usize) -> Result<String> {
    if !escaped || !value.contains('\\') {
        return Ok(value.to_string());
    }

    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            other => {
                return Err(MappingError::bad_format(
                    line_no,
                    format!("bad escape sequence \\{}", other.map(String::from).unwrap_or_default()),
                ));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::MappingError;

    #[test]
    fn parses_v1() {
        let text = "v1\tofficial\tnamed\n\
                    CLASS\ta\tcom/example/Apple\n\
                    FIELD\ta\tI\tb\tcount\n\
                    METHOD\ta\t()V\tc\tgrow\n";
        let tree = parse_tiny(text).unwrap();
        assert_eq!(tree.namespaces(), ["official", "named"]);

        let class = tree.class("a").unwrap();
        assert_eq!(class.name(1), "com/example/Apple");
        assert_eq!(class.field("b", "I").unwrap().name(1), "count");
        assert_eq!(class.method("c", "()V").unwrap().name(1), "grow");
    }

    #[test]
    fn parses_v2_with_comments_and_parameters() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    c\ta\tcom/example/Apple\n\
                    \tc\tA tasty fruit.\n\
                    \tf\tI\tb\tcount\n\
                    \t\tc\tHow many.\n\
                    \tm\t(IJ)V\tc\tgrow\n\
                    \t\tp\t1\tamount\n\
                    \t\t\tc\tBy how much.\n\
                    \t\tp\t2\tseed\n";
        let tree = parse_tiny(text).unwrap();

        let class = tree.class("a").unwrap();
        assert_eq!(class.comment.as_deref(), Some("A tasty fruit."));
        assert_eq!(
            class.field("b", "I").unwrap().comment.as_deref(),
            Some("How many.")
        );

        let method = class.method("c", "(IJ)V").unwrap();
        assert_eq!(method.name(1), "grow");
        assert_eq!(method.parameters[&1].name, "amount");
        assert_eq!(
            method.parameters[&1].comment.as_deref(),
            Some("By how much.")
        );
        assert_eq!(method.parameters[&2].name, "seed");
    }

    #[test]
    fn honors_escaped_names_property() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    \tescaped-names\n\
                    c\ta\tcom/example/Tab\\tbed\n";
        let tree = parse_tiny(text).unwrap();
        let class = tree.class("a").unwrap();
        assert_eq!(class.name(1), "com/example/Tab\tbed");
    }

    #[test]
    fn leaves_backslashes_without_property() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    c\ta\tcom/example/Tab\\tbed\n";
        let tree = parse_tiny(text).unwrap();
        assert_eq!(tree.class("a").unwrap().name(1), "com/example/Tab\\tbed");
    }

    #[test]
    fn rejects_unknown_prefix() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    x\ta\tb\n";
        assert!(matches!(
            parse_tiny(text),
            Err(MappingError::BadFormat { line: 2, .. })
        ));
    }

    #[test]
    fn rejects_unsupported_versions() {
        let text = "tiny\t3\t0\tofficial\tnamed\n";
        assert!(matches!(parse_tiny(text), Err(MappingError::Unsupported(_))));

        let text = "tiny\t2\t1\tofficial\tnamed\n";
        assert!(matches!(parse_tiny(text), Err(MappingError::Unsupported(_))));
    }

    #[test]
    fn rejects_malformed_indent() {
        let text = "tiny\t2\t0\tofficial\tnamed\n\
                    c\ta\tApple\n\
                    \t\t\t\tc\tway too deep\n";
        assert!(matches!(parse_tiny(text), Err(MappingError::BadFormat { .. })));
    }
}
