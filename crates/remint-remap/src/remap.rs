//! One remap pass: rewriting a class through a mapping tree.
//!
//! The pool is mutated append-only (see [`crate::pool`]): `Class` entries are
//! repointed at freshly interned names, member refs get fresh `NameAndType`
//! entries, and everything that embeds pool indexes without being parsed
//! (code bytes, stack maps, bootstrap methods, annotations) stays untouched
//! and stays valid. `MethodHandle` constants need no handling of their own:
//! handles with a field kind point at a `Fieldref` and the rest at a method
//! ref, so rewriting the refs rewrites the handles.

use std::collections::HashMap;

use remint_core::descriptor::remap_descriptor;
use remint_core::name::source_file_name;
use remint_mappings::MappingTree;

use crate::classfile::{AttrInfo, Attribute, ClassFile, MemberInfo};
use crate::hierarchy::HierarchyIndex;
use crate::pool::{ConstantPool, CpEntry};
use crate::signature::{remap_class_signature, remap_field_signature, remap_method_signature};
use crate::{RemapError, Result};

#[derive(Clone, Copy, PartialEq)]
enum MemberKind {
    Field,
    Method,
}

pub struct RemapPass<'a> {
    tree: &'a MappingTree,
    ns: usize,
    hierarchy: &'a HierarchyIndex,
    /// SourceFile synthesis uses final names, so chained remaps enable it
    /// only on the last pass.
    synthesize_source_file: bool,
}

impl<'a> RemapPass<'a> {
    pub fn new(
        tree: &'a MappingTree,
        namespace: &str,
        hierarchy: &'a HierarchyIndex,
        synthesize_source_file: bool,
    ) -> Result<Self> {
        let ns = tree
            .namespace_index(namespace)
            .ok_or_else(|| RemapError::UnknownNamespace(namespace.to_string()))?;
        Ok(Self {
            tree,
            ns,
            hierarchy,
            synthesize_source_file,
        })
    }

    /// Maps an internal name, accepting the array form (`[La;`) that
    /// `CONSTANT_Class` entries may carry.
    fn map_class(&self, name: &str) -> String {
        if name.starts_with('[') {
            self.map_desc(name)
        } else {
            self.tree.map_type(name, self.ns).to_string()
        }
    }

    fn map_desc(&self, desc: &str) -> String {
        remap_descriptor(desc, |name| self.tree.map_type(name, self.ns).to_string())
    }

    /// Hierarchy-sensitive member resolution: the mapping for a member
    /// referenced on `owner` may live on any supertype, because Java lets a
    /// subclass inherit non-overridden members without re-declaring them and
    /// mappings typically list the member only on the declarer.
    fn resolve_member(
        &self,
        owner: &str,
        name: &str,
        desc: &str,
        kind: MemberKind,
    ) -> Option<String> {
        self.hierarchy.find_first(owner, |cls| {
            let class = self.tree.class(cls)?;
            match kind {
                MemberKind::Field => class.field(name, desc).map(|f| f.name(self.ns).to_string()),
                MemberKind::Method => class.method(name, desc).map(|m| m.name(self.ns).to_string()),
            }
        })
    }

    pub fn remap_class(&self, class: &mut ClassFile) -> Result<()> {
        let this_old = class.this_class_name()?;

        // Old class names by pool index, snapshotted before any repointing so
        // attribute handling can still resolve pre-pass owners.
        let mut old_class_names: HashMap<u16, String> = HashMap::new();
        for idx in class.pool.indices().collect::<Vec<_>>() {
            if let CpEntry::Class { .. } = class.pool.get(idx)? {
                old_class_names.insert(idx, class.pool.class_name(idx)?);
            }
        }

        self.rewrite_pool(&mut class.pool, &old_class_names)?;

        let mut fields = std::mem::take(&mut class.fields);
        for field in &mut fields {
            self.rewrite_member(&mut class.pool, &this_old, field, MemberKind::Field)?;
        }
        class.fields = fields;

        let mut methods = std::mem::take(&mut class.methods);
        for method in &mut methods {
            self.rewrite_member(&mut class.pool, &this_old, method, MemberKind::Method)?;
        }
        class.methods = methods;

        let mut attributes = std::mem::take(&mut class.attributes);
        let mut has_source_file = false;
        for attr in &mut attributes {
            match &mut attr.info {
                AttrInfo::SourceFile { .. } => has_source_file = true,
                AttrInfo::Signature { signature_index } => {
                    self.rewrite_signature(
                        &mut class.pool,
                        signature_index,
                        remap_class_signature,
                    )?;
                }
                AttrInfo::EnclosingMethod {
                    class_index,
                    method_index,
                } => {
                    if *method_index != 0 {
                        let owner = old_class_names
                            .get(class_index)
                            .cloned()
                            .unwrap_or_default();
                        let (name, desc) = class.pool.name_and_type(*method_index)?;
                        let new_name = self
                            .resolve_member(&owner, &name, &desc, MemberKind::Method)
                            .unwrap_or_else(|| name.clone());
                        let new_desc = self.map_desc(&desc);
                        if new_name != name || new_desc != desc {
                            *method_index =
                                class.pool.intern_name_and_type(&new_name, &new_desc)?;
                        }
                    }
                }
                AttrInfo::InnerClasses(entries) => {
                    for entry in entries.iter_mut() {
                        if entry.inner_name_index == 0 {
                            continue;
                        }
                        let Some(old_full) = old_class_names.get(&entry.inner_class_info) else {
                            continue;
                        };
                        let new_full = self.map_class(old_full);
                        let new_simple = inner_simple_name(&new_full);
                        if class.pool.utf8(entry.inner_name_index)? != new_simple {
                            entry.inner_name_index = class.pool.intern_utf8(new_simple)?;
                        }
                    }
                }
                AttrInfo::Record(components) => {
                    for component in components.iter_mut() {
                        let name = class.pool.utf8(component.name_index)?;
                        let desc = class.pool.utf8(component.descriptor_index)?;
                        let new_name = self
                            .resolve_member(&this_old, &name, &desc, MemberKind::Field)
                            .unwrap_or_else(|| name.clone());
                        let new_desc = self.map_desc(&desc);
                        if new_name != name {
                            component.name_index = class.pool.intern_utf8(&new_name)?;
                        }
                        if new_desc != desc {
                            component.descriptor_index = class.pool.intern_utf8(&new_desc)?;
                        }
                        for sub in &mut component.attributes {
                            if let AttrInfo::Signature { signature_index } = &mut sub.info {
                                self.rewrite_signature(
                                    &mut class.pool,
                                    signature_index,
                                    remap_field_signature,
                                )?;
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        class.attributes = attributes;

        if self.synthesize_source_file && !has_source_file {
            let new_this = class.pool.class_name(class.this_class)?;
            let value_index = class.pool.intern_utf8(&source_file_name(&new_this))?;
            let name_index = class.pool.intern_utf8("SourceFile")?;
            class.attributes.push(Attribute {
                name_index,
                info: AttrInfo::SourceFile {
                    sourcefile_index: value_index,
                },
            });
        }

        Ok(())
    }

    fn rewrite_pool(
        &self,
        pool: &mut ConstantPool,
        old_class_names: &HashMap<u16, String>,
    ) -> Result<()> {
        enum Edit {
            ClassName { idx: u16, new_name: String },
            RefNat { idx: u16, name: String, desc: String },
            MethodTypeDesc { idx: u16, desc: String },
        }

        let mut edits = Vec::new();
        for idx in pool.indices().collect::<Vec<_>>() {
            match pool.get(idx)? {
                CpEntry::Class { .. } => {
                    let old = &old_class_names[&idx];
                    let new_name = self.map_class(old);
                    if new_name != *old {
                        edits.push(Edit::ClassName { idx, new_name });
                    }
                }
                CpEntry::Fieldref {
                    class_index,
                    name_and_type_index,
                }
                | CpEntry::Methodref {
                    class_index,
                    name_and_type_index,
                }
                | CpEntry::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    let kind = match pool.get(idx)? {
                        CpEntry::Fieldref { .. } => MemberKind::Field,
                        _ => MemberKind::Method,
                    };
                    let owner = old_class_names
                        .get(class_index)
                        .ok_or(RemapError::InvalidConstantPoolIndex(*class_index))?;
                    let (name, desc) = pool.name_and_type(*name_and_type_index)?;
                    let new_name = self
                        .resolve_member(owner, &name, &desc, kind)
                        .unwrap_or_else(|| name.clone());
                    let new_desc = self.map_desc(&desc);
                    if new_name != name || new_desc != desc {
                        edits.push(Edit::RefNat {
                            idx,
                            name: new_name,
                            desc: new_desc,
                        });
                    }
                }
                CpEntry::Dynamic {
                    name_and_type_index,
                    ..
                }
                | CpEntry::InvokeDynamic {
                    name_and_type_index,
                    ..
                } => {
                    // The call-site name is owner-less; only the descriptor
                    // carries class references.
                    let (name, desc) = pool.name_and_type(*name_and_type_index)?;
                    let new_desc = self.map_desc(&desc);
                    if new_desc != desc {
                        edits.push(Edit::RefNat {
                            idx,
                            name,
                            desc: new_desc,
                        });
                    }
                }
                CpEntry::MethodType { descriptor_index } => {
                    let desc = pool.utf8(*descriptor_index)?;
                    let new_desc = self.map_desc(&desc);
                    if new_desc != desc {
                        edits.push(Edit::MethodTypeDesc { idx, desc: new_desc });
                    }
                }
                _ => {}
            }
        }

        for edit in edits {
            match edit {
                Edit::ClassName { idx, new_name } => {
                    let name_index = pool.intern_utf8(&new_name)?;
                    match pool.get_mut(idx)? {
                        CpEntry::Class { name_index: slot } => *slot = name_index,
                        _ => unreachable!("planned edit targets a Class entry"),
                    }
                }
                Edit::RefNat { idx, name, desc } => {
                    let nat = pool.intern_name_and_type(&name, &desc)?;
                    match pool.get_mut(idx)? {
                        CpEntry::Fieldref {
                            name_and_type_index,
                            ..
                        }
                        | CpEntry::Methodref {
                            name_and_type_index,
                            ..
                        }
                        | CpEntry::InterfaceMethodref {
                            name_and_type_index,
                            ..
                        }
                        | CpEntry::Dynamic {
                            name_and_type_index,
                            ..
                        }
                        | CpEntry::InvokeDynamic {
                            name_and_type_index,
                            ..
                        } => *name_and_type_index = nat,
                        _ => unreachable!("planned edit targets a ref entry"),
                    }
                }
                Edit::MethodTypeDesc { idx, desc } => {
                    let descriptor_index = pool.intern_utf8(&desc)?;
                    match pool.get_mut(idx)? {
                        CpEntry::MethodType {
                            descriptor_index: slot,
                        } => *slot = descriptor_index,
                        _ => unreachable!("planned edit targets a MethodType entry"),
                    }
                }
            }
        }

        Ok(())
    }

    fn rewrite_member(
        &self,
        pool: &mut ConstantPool,
        this_old: &str,
        member: &mut MemberInfo,
        kind: MemberKind,
    ) -> Result<()> {
        let name = pool.utf8(member.name_index)?;
        let desc = pool.utf8(member.descriptor_index)?;

        // Definitions resolve through the hierarchy too: an override declared
        // only on the superclass in the mappings must rename here as well.
        let new_name = self
            .resolve_member(this_old, &name, &desc, kind)
            .unwrap_or_else(|| name.clone());
        let new_desc = self.map_desc(&desc);
        if new_name != name {
            member.name_index = pool.intern_utf8(&new_name)?;
        }
        if new_desc != desc {
            member.descriptor_index = pool.intern_utf8(&new_desc)?;
        }

        for attr in &mut member.attributes {
            match &mut attr.info {
                AttrInfo::Signature { signature_index } => match kind {
                    MemberKind::Field => self.rewrite_signature(
                        pool,
                        signature_index,
                        remap_field_signature,
                    )?,
                    MemberKind::Method => self.rewrite_signature(
                        pool,
                        signature_index,
                        remap_method_signature,
                    )?,
                },
                AttrInfo::Code(code) => {
                    for sub in &mut code.attributes {
                        match &mut sub.info {
                            AttrInfo::LocalVariableTable(entries) => {
                                for entry in entries.iter_mut() {
                                    let var_desc = pool.utf8(entry.descriptor_index)?;
                                    let new_var_desc = self.map_desc(&var_desc);
                                    if new_var_desc != var_desc {
                                        entry.descriptor_index =
                                            pool.intern_utf8(&new_var_desc)?;
                                    }
                                }
                            }
                            AttrInfo::LocalVariableTypeTable(entries) => {
                                for entry in entries.iter_mut() {
                                    self.rewrite_signature(
                                        pool,
                                        &mut entry.descriptor_index,
                                        remap_field_signature,
                                    )?;
                                }
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn rewrite_signature(
        &self,
        pool: &mut ConstantPool,
        index: &mut u16,
        remap: fn(&str, &dyn Fn(&str) -> String) -> String,
    ) -> Result<()> {
        let sig = pool.utf8(*index)?;
        let mapped = remap(&sig, &|name| self.tree.map_type(name, self.ns).to_string());
        if mapped != sig {
            *index = pool.intern_utf8(&mapped)?;
        }
        Ok(())
    }
}

/// The InnerClasses `inner_name` is the simple name: the part after the last
/// `$`, or after the last `/` for classes an obfuscator un-nested.
fn inner_simple_name(full: &str) -> &str {
    let last = full.rsplit('/').next().unwrap_or(full);
    match last.rfind('$') {
        Some(idx) if idx + 1 < last.len() => &last[idx + 1..],
        _ => last,
    }
}
