/// Concrete mapping text grammars the pipeline can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingFormat {
    TinyV1,
    TinyV2,
    Proguard,
}

impl MappingFormat {
    /// Sniffs the format from file contents.
    ///
    /// Tiny files declare themselves in the header; anything with `->`
    /// arrows is taken as Proguard output.
    pub fn from_contents(contents: &str) -> Option<Self> {
        let first = contents
            .lines()
            .find(|l| !l.trim().is_empty() && !l.trim_start().starts_with('#'))?;
        if first.starts_with("tiny\t") {
            return Some(MappingFormat::TinyV2);
        }
        if first.starts_with("v1\t") {
            return Some(MappingFormat::TinyV1);
        }
        if contents.contains(" -> ") {
            return Some(MappingFormat::Proguard);
        }
        None
    }
}
