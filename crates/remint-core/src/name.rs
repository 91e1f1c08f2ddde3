/// Converts an internal name (`a/b/C`) to a binary name (`a.b.C`).
pub fn binary_name(internal: &str) -> String {
    internal.replace('/', ".")
}

/// Converts a binary name (`a.b.C`) to an internal name (`a/b/C`).
pub fn internal_name(binary: &str) -> String {
    binary.replace('.', "/")
}

/// Returns the simple class name of an internal name: the segment after the
/// last `/`, cut at the first `$` if any.
///
/// `net/minecraft/Style$1` becomes `Style`, `a/b` becomes `b`.
pub fn simple_class_name(internal: &str) -> &str {
    let last = internal.rsplit('/').next().unwrap_or(internal);
    match last.find('$') {
        Some(0) => last,
        Some(idx) => &last[..idx],
        None => last,
    }
}

/// Derives the SourceFile attribute value for a class that lacks one.
pub fn source_file_name(internal: &str) -> String {
    format!("{}.java", simple_class_name(internal))
}
