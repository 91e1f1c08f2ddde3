//! Per-class supertype index.
//!
//! The hierarchy is a DAG of internal names, not objects: a table from class
//! name to its declared supertypes (superclass first, then interfaces),
//! filtered to classes present in the remap job. Transitive walks recurse
//! with a visited set.

use std::collections::{HashMap, HashSet};

use crate::class_set::ClassSet;
use crate::Result;

#[derive(Debug, Default)]
pub struct HierarchyIndex {
    supers: HashMap<String, Vec<String>>,
}

impl HierarchyIndex {
    pub fn build(classes: &ClassSet) -> Result<Self> {
        let mut supers = HashMap::with_capacity(classes.len());
        for class in classes.iter() {
            let name = class.this_class_name()?;
            let mut declared = Vec::new();
            if let Some(super_name) = class.super_class_name()? {
                if classes.contains(&super_name) {
                    declared.push(super_name);
                }
            }
            for iface in class.interface_names()? {
                if classes.contains(&iface) {
                    declared.push(iface);
                }
            }
            supers.insert(name, declared);
        }
        Ok(Self { supers })
    }

    /// Declared supertypes of `name`, superclass first. Empty for classes
    /// outside the job.
    pub fn supertypes(&self, name: &str) -> &[String] {
        self.supers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Depth-first search over `start` and its transitive supertypes in
    /// declared order, returning the first `Some` that `f` produces.
    pub fn find_first<T>(&self, start: &str, mut f: impl FnMut(&str) -> Option<T>) -> Option<T> {
        let mut visited = HashSet::new();
        self.find_first_inner(start, &mut visited, &mut f)
    }

    fn find_first_inner<T>(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        f: &mut impl FnMut(&str) -> Option<T>,
    ) -> Option<T> {
        if !visited.insert(name.to_string()) {
            return None;
        }
        if let Some(found) = f(name) {
            return Some(found);
        }
        for super_name in self.supertypes(name) {
            if let Some(found) = self.find_first_inner(super_name, visited, f) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ClassBuilder;

    #[test]
    fn filters_to_job_classes_and_walks_superclass_first() {
        let classes = ClassSet::from_classes(vec![
            ClassBuilder::new("C")
                .super_class("P")
                .interfaces(&["IFirst", "Missing"])
                .build(),
            ClassBuilder::new("P").super_class("java/lang/Object").build(),
            ClassBuilder::new("IFirst").super_class("java/lang/Object").build(),
        ])
        .unwrap();
        let hierarchy = HierarchyIndex::build(&classes).unwrap();

        assert_eq!(hierarchy.supertypes("C"), ["P", "IFirst"]);
        assert!(hierarchy.supertypes("P").is_empty());

        let mut order = Vec::new();
        let _ = hierarchy.find_first::<()>("C", |name| {
            order.push(name.to_string());
            None
        });
        assert_eq!(order, ["C", "P", "IFirst"]);
    }
}
