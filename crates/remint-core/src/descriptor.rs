//! JVM type and method descriptor handling.

use std::fmt;

/// A parsed method descriptor: the parameter descriptors in declaration order
/// plus the return descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub params: Vec<String>,
    pub ret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadDescriptor(pub String);

impl fmt::Display for BadDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid descriptor: {}", self.0)
    }
}

impl std::error::Error for BadDescriptor {}

/// Consumes one field-type descriptor from the front of `rest`, returning the
/// descriptor and the remainder.
fn split_type(rest: &str) -> Option<(&str, &str)> {
    let mut chars = rest.char_indices();
    loop {
        let (idx, c) = chars.next()?;
        match c {
            '[' => continue,
            'L' => {
                let semi = rest[idx..].find(';')?;
                return Some(rest.split_at(idx + semi + 1));
            }
            'B' | 'C' | 'D' | 'F' | 'I' | 'J' | 'S' | 'Z' | 'V' => {
                return Some(rest.split_at(idx + 1));
            }
            _ => return None,
        }
    }
}

/// Parses a method descriptor such as `(I[Ljava/lang/String;)V`.
pub fn parse_method_descriptor(desc: &str) -> Result<MethodDescriptor, BadDescriptor> {
    let inner = desc
        .strip_prefix('(')
        .ok_or_else(|| BadDescriptor(desc.to_string()))?;
    let close = inner
        .find(')')
        .ok_or_else(|| BadDescriptor(desc.to_string()))?;
    let (mut params_str, ret) = inner.split_at(close);
    let ret = &ret[1..];
    if ret.is_empty() {
        return Err(BadDescriptor(desc.to_string()));
    }

    let mut params = Vec::new();
    while !params_str.is_empty() {
        let (ty, rest) =
            split_type(params_str).ok_or_else(|| BadDescriptor(desc.to_string()))?;
        if ty.ends_with('V') {
            return Err(BadDescriptor(desc.to_string()));
        }
        params.push(ty.to_string());
        params_str = rest;
    }

    Ok(MethodDescriptor {
        params,
        ret: ret.to_string(),
    })
}

/// Returns the parameter descriptors of a method descriptor, or an empty list
/// if the descriptor is malformed.
pub fn method_descriptor_params(desc: &str) -> Vec<String> {
    parse_method_descriptor(desc)
        .map(|d| d.params)
        .unwrap_or_default()
}

/// Returns the return descriptor of a method descriptor.
pub fn method_descriptor_return(desc: &str) -> Option<String> {
    parse_method_descriptor(desc).ok().map(|d| d.ret)
}

/// The number of local-variable slots a value of this type occupies.
///
/// `long` and `double` take two slots, everything else one.
pub fn type_width(desc: &str) -> u16 {
    match desc.as_bytes().first() {
        Some(b'J') | Some(b'D') => 2,
        _ => 1,
    }
}

/// Rewrites every class reference (`L...;` segment) in a field or method
/// descriptor through `map`. Primitives and array dimensions pass through
/// unchanged.
pub fn remap_descriptor(desc: &str, mut map: impl FnMut(&str) -> String) -> String {
    remap_descriptor_inner(desc, &mut map)
}

fn remap_descriptor_inner(desc: &str, map: &mut dyn FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(desc.len());
    let bytes = desc.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'L' => {
                let Some(semi) = desc[i..].find(';') else {
                    out.push_str(&desc[i..]);
                    break;
                };
                let name = &desc[i + 1..i + semi];
                out.push('L');
                out.push_str(&map(name));
                out.push(';');
                i += semi + 1;
            }
            b => {
                out.push(b as char);
                i += 1;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parses_method_descriptors() {
        let d = parse_method_descriptor("(I[Ljava/lang/String;J)V").unwrap();
        assert_eq!(d.params, vec!["I", "[Ljava/lang/String;", "J"]);
        assert_eq!(d.ret, "V");

        let d = parse_method_descriptor("()Ljava/util/List;").unwrap();
        assert!(d.params.is_empty());
        assert_eq!(d.ret, "Ljava/util/List;");
    }

    #[test]
    fn rejects_malformed_descriptors() {
        assert!(parse_method_descriptor("I").is_err());
        assert!(parse_method_descriptor("()").is_err());
        assert!(parse_method_descriptor("(Q)V").is_err());
    }

    #[test]
    fn widths() {
        assert_eq!(type_width("J"), 2);
        assert_eq!(type_width("D"), 2);
        assert_eq!(type_width("I"), 1);
        assert_eq!(type_width("[J"), 1);
        assert_eq!(type_width("Ljava/lang/Object;"), 1);
    }

    #[test]
    fn remaps_descriptors() {
        let mapped = remap_descriptor("(ILa;[[Lb/c;)La;", |name| match name {
            "a" => "Apple".to_string(),
            "b/c" => "b/Cherry".to_string(),
            other => other.to_string(),
        });
        assert_eq!(mapped, "(ILApple;[[Lb/Cherry;)LApple;");
    }
}
