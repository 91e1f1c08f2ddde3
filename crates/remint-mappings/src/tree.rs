use std::collections::BTreeMap;

use remint_core::descriptor::remap_descriptor;

use crate::{MappingError, Result};

/// Lookup key for fields and methods inside a [`ClassMapping`].
///
/// Equality and ordering use both the name and the JVM descriptor, so
/// overloads are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    pub name: String,
    pub desc: String,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterMapping {
    pub name: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// One entry per tree namespace; empty string means "same as default".
    pub names: Vec<String>,
    pub desc: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMapping {
    pub names: Vec<String>,
    pub desc: String,
    pub comment: Option<String>,
    /// Sparse map from local-variable slot to parameter mapping. Slot 0 is
    /// `this` for instance methods; `long`/`double` occupy two slots.
    pub parameters: BTreeMap<u16, ParameterMapping>,
}

impl FieldMapping {
    pub fn name(&self, ns: usize) -> &str {
        resolve_name(&self.names, ns)
    }
}

impl MethodMapping {
    pub fn name(&self, ns: usize) -> &str {
        resolve_name(&self.names, ns)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMapping {
    /// One entry per tree namespace; index 0 is the default name, which is
    /// also the key this mapping sits under.
    pub names: Vec<String>,
    pub comment: Option<String>,
    pub fields: BTreeMap<MemberKey, FieldMapping>,
    pub methods: BTreeMap<MemberKey, MethodMapping>,
}

impl ClassMapping {
    pub fn new(names: Vec<String>) -> Self {
        Self {
            names,
            comment: None,
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
        }
    }

    pub fn name(&self, ns: usize) -> &str {
        resolve_name(&self.names, ns)
    }

    pub fn field(&self, name: &str, desc: &str) -> Option<&FieldMapping> {
        self.fields.get(&MemberKey::new(name, desc))
    }

    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodMapping> {
        self.methods.get(&MemberKey::new(name, desc))
    }
}

fn resolve_name(names: &[String], ns: usize) -> &str {
    match names.get(ns) {
        Some(name) if !name.is_empty() => name,
        _ => names.first().map(String::as_str).unwrap_or(""),
    }
}

/// A multi-namespace mapping tree.
///
/// Namespace 0 is the *default* namespace: the keys of every lookup table are
/// names in that namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTree {
    namespaces: Vec<String>,
    properties: BTreeMap<String, Option<String>>,
    classes: BTreeMap<String, ClassMapping>,
}

impl MappingTree {
    pub fn new(namespaces: Vec<String>) -> Self {
        Self {
            namespaces,
            properties: BTreeMap::new(),
            classes: BTreeMap::new(),
        }
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn namespace_index(&self, label: &str) -> Option<usize> {
        self.namespaces.iter().position(|ns| ns == label)
    }

    pub fn properties(&self) -> &BTreeMap<String, Option<String>> {
        &self.properties
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Option<String>) {
        self.properties.insert(key.into(), value);
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &ClassMapping)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Looks up a class by its default-namespace name.
    pub fn class(&self, default_name: &str) -> Option<&ClassMapping> {
        self.classes.get(default_name)
    }

    pub fn class_mut(&mut self, default_name: &str) -> Option<&mut ClassMapping> {
        self.classes.get_mut(default_name)
    }

    /// Like [`MappingTree::class`] but surfaces the miss as an error.
    pub fn require_class(&self, default_name: &str) -> Result<&ClassMapping> {
        self.class(default_name)
            .ok_or_else(|| MappingError::MissingClass(default_name.to_string()))
    }

    /// Inserts a class keyed by its default name. A class may appear exactly
    /// once per tree; inserting a duplicate replaces the old entry.
    pub fn insert_class(&mut self, mapping: ClassMapping) {
        debug_assert_eq!(mapping.names.len(), self.namespaces.len());
        self.classes
            .insert(mapping.names[0].clone(), mapping);
    }

    pub fn get_or_insert_class(&mut self, default_name: &str) -> &mut ClassMapping {
        let ns_count = self.namespaces.len();
        self.classes
            .entry(default_name.to_string())
            .or_insert_with(|| {
                let mut names = vec![String::new(); ns_count];
                names[0] = default_name.to_string();
                ClassMapping::new(names)
            })
    }

    /// Maps an internal class name into namespace `ns`, or returns the input
    /// unchanged when no mapping exists.
    ///
    /// Array and primitive forms pass through at the element level; composing
    /// descriptors is the remapper's job.
    pub fn map_type<'a>(&'a self, internal: &'a str, ns: usize) -> &'a str {
        match self.classes.get(internal) {
            Some(class) => class.name(ns),
            None => internal,
        }
    }

    /// Remaps every class reference in a field or method descriptor into
    /// namespace `ns`.
    pub fn map_desc(&self, desc: &str, ns: usize) -> String {
        remap_descriptor(desc, |name| self.map_type(name, ns).to_string())
    }

    /// Returns a new tree whose default namespace is `target`.
    ///
    /// All keyed tables are rebuilt under the new default names, descriptors
    /// included. The namespace labels are permuted so `target` sits at index
    /// 0. Comments and parameter tables carry over verbatim.
    pub fn invert(&self, target: &str) -> Result<MappingTree> {
        let tgt = self
            .namespace_index(target)
            .ok_or_else(|| MappingError::UnknownNamespace(target.to_string()))?;

        let mut namespaces = self.namespaces.clone();
        namespaces.swap(0, tgt);

        let mut out = MappingTree {
            namespaces,
            properties: self.properties.clone(),
            classes: BTreeMap::new(),
        };

        for class in self.classes.values() {
            let mut names = resolve_all(&class.names);
            names.swap(0, tgt);

            let mut inverted = ClassMapping::new(names);
            inverted.comment = class.comment.clone();

            for field in class.fields.values() {
                let mut names = resolve_all(&field.names);
                names.swap(0, tgt);
                let desc = self.map_desc(&field.desc, tgt);
                let key = MemberKey::new(names[0].clone(), desc.clone());
                inverted.fields.insert(
                    key,
                    FieldMapping {
                        names,
                        desc,
                        comment: field.comment.clone(),
                    },
                );
            }

            for method in class.methods.values() {
                let mut names = resolve_all(&method.names);
                names.swap(0, tgt);
                let desc = self.map_desc(&method.desc, tgt);
                let key = MemberKey::new(names[0].clone(), desc.clone());
                inverted.methods.insert(
                    key,
                    MethodMapping {
                        names,
                        desc,
                        comment: method.comment.clone(),
                        parameters: method.parameters.clone(),
                    },
                );
            }

            out.insert_class(inverted);
        }

        Ok(out)
    }

    /// Produces a tree containing the union of both trees' classes.
    ///
    /// Both trees must carry the same namespace labels. Where both contain
    /// the same class, the member tables are unioned by [`MemberKey`]; name
    /// vectors must agree on shared entries.
    pub fn merge(&self, other: &MappingTree) -> Result<MappingTree> {
        if self.namespaces != other.namespaces {
            return Err(MappingError::InconsistentMappings(format!(
                "namespace mismatch: {:?} vs {:?}",
                self.namespaces, other.namespaces
            )));
        }

        let mut out = self.clone();
        for (name, class) in &other.classes {
            match out.classes.get_mut(name) {
                None => {
                    out.classes.insert(name.clone(), class.clone());
                }
                Some(existing) => merge_class(name, existing, class)?,
            }
        }
        Ok(out)
    }
}

fn resolve_all(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| {
            if n.is_empty() {
                names[0].clone()
            } else {
                n.clone()
            }
        })
        .collect()
}

fn names_agree(a: &[String], b: &[String]) -> bool {
    resolve_all(a) == resolve_all(b)
}

fn merge_class(name: &str, into: &mut ClassMapping, from: &ClassMapping) -> Result<()> {
    if !names_agree(&into.names, &from.names) {
        return Err(MappingError::InconsistentMappings(format!(
            "class {name}: name vectors {:?} and {:?} disagree",
            into.names, from.names
        )));
    }
    if into.comment.is_none() {
        into.comment = from.comment.clone();
    }

    for (key, field) in &from.fields {
        match into.fields.get_mut(key) {
            None => {
                into.fields.insert(key.clone(), field.clone());
            }
            Some(existing) => {
                if !names_agree(&existing.names, &field.names) {
                    return Err(MappingError::InconsistentMappings(format!(
                        "field {name}.{}:{}: name vectors disagree",
                        key.name, key.desc
                    )));
                }
                if existing.comment.is_none() {
                    existing.comment = field.comment.clone();
                }
            }
        }
    }

    for (key, method) in &from.methods {
        match into.methods.get_mut(key) {
            None => {
                into.methods.insert(key.clone(), method.clone());
            }
            Some(existing) => {
                if !names_agree(&existing.names, &method.names) {
                    return Err(MappingError::InconsistentMappings(format!(
                        "method {name}.{}{}: name vectors disagree",
                        key.name, key.desc
                    )));
                }
                if existing.comment.is_none() {
                    existing.comment = method.comment.clone();
                }
                for (slot, param) in &method.parameters {
                    match existing.parameters.get(slot) {
                        None => {
                            existing.parameters.insert(*slot, param.clone());
                        }
                        Some(prev) if prev.name != param.name => {
                            return Err(MappingError::InconsistentMappings(format!(
                                "method {name}.{}{} parameter {slot}: {:?} vs {:?}",
                                key.name, key.desc, prev.name, param.name
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
    }

    Ok(())
}

/// Two mapping stages presented as one unit: an *intermediate* tree applied
/// first, then a *named* tree applied to the result.
///
/// This type deliberately exposes only its components: chained trees cannot
/// be inverted, merged or used for single-step type mapping, so those
/// operations simply do not exist here. The remapper consumes the stages in
/// sequence.
#[derive(Debug, Clone)]
pub struct CombinedMappingTree {
    intermediate: MappingTree,
    named: MappingTree,
}

impl CombinedMappingTree {
    pub fn new(intermediate: MappingTree, named: MappingTree) -> Self {
        Self { intermediate, named }
    }

    pub fn intermediate(&self) -> &MappingTree {
        &self.intermediate
    }

    pub fn named(&self) -> &MappingTree {
        &self.named
    }
}
