//! Java language keywords and identifier validity.

/// Reserved words that can never be used as Java identifiers.
///
/// Includes the literals `true`, `false` and `null`, which are not keywords
/// in the JLS sense but are equally unusable as names.
const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const",
    "continue", "default", "do", "double", "else", "enum", "extends", "false", "final", "finally",
    "float", "for", "goto", "if", "implements", "import", "instanceof", "int", "interface", "long",
    "native", "new", "null", "package", "private", "protected", "public", "return", "short",
    "static", "strictfp", "super", "switch", "synchronized", "this", "throw", "throws",
    "transient", "true", "try", "void", "volatile", "while",
];

pub fn is_java_keyword(name: &str) -> bool {
    JAVA_KEYWORDS.binary_search(&name).is_ok()
}

/// Whether `name` is a syntactically valid Java identifier.
///
/// This is the ASCII subset check: obfuscated names outside it are exactly
/// the ones that need resynthesis. Keywords are *not* rejected here; callers
/// that care use [`is_java_keyword`] separately.
pub fn is_valid_java_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_' || first == '$') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_is_sorted() {
        let mut sorted = JAVA_KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, JAVA_KEYWORDS);
    }

    #[test]
    fn keywords() {
        assert!(is_java_keyword("class"));
        assert!(is_java_keyword("int"));
        assert!(is_java_keyword("null"));
        assert!(!is_java_keyword("string"));
        assert!(!is_java_keyword("is"));
    }

    #[test]
    fn identifiers() {
        assert!(is_valid_java_identifier("foo"));
        assert!(is_valid_java_identifier("_x1"));
        assert!(is_valid_java_identifier("$anon"));
        assert!(!is_valid_java_identifier(""));
        assert!(!is_valid_java_identifier("1abc"));
        assert!(!is_valid_java_identifier("a-b"));
    }
}
