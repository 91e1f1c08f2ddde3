use std::collections::HashMap;

use crate::classfile::ClassFile;
use crate::Result;

/// The classes of one remap job, indexed by their current internal name.
///
/// Owned by the job; the index is rebuilt after every remap pass because
/// class names change under it.
#[derive(Debug, Default)]
pub struct ClassSet {
    classes: Vec<ClassFile>,
    by_name: HashMap<String, usize>,
}

impl ClassSet {
    pub fn from_classes(classes: Vec<ClassFile>) -> Result<Self> {
        let mut set = Self {
            classes,
            by_name: HashMap::new(),
        };
        set.rebuild_index()?;
        Ok(set)
    }

    /// Parses raw `.class` entry bytes into a set.
    pub fn parse_all<'a>(entries: impl IntoIterator<Item = &'a [u8]>) -> Result<Self> {
        let classes = entries
            .into_iter()
            .map(ClassFile::parse)
            .collect::<Result<Vec<_>>>()?;
        Self::from_classes(classes)
    }

    pub fn rebuild_index(&mut self) -> Result<()> {
        self.by_name.clear();
        for (i, class) in self.classes.iter().enumerate() {
            self.by_name.insert(class.this_class_name()?, i);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClassFile> {
        self.by_name.get(name).map(|&i| &self.classes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassFile> {
        self.classes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClassFile> {
        self.classes.iter_mut()
    }

    pub fn into_classes(self) -> Vec<ClassFile> {
        self.classes
    }
}
