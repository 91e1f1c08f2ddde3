//! Local-variable and parameter name synthesis.
//!
//! Runs after the final remap pass. Mapped parameter names win; variables
//! that never had source names (or carry `lvtN` placeholders) get readable,
//! non-colliding identifiers derived from their type descriptors. The
//! mapping tree handed in here is the *inverted* one, so its default names
//! line up with the already-remapped classes.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use remint_core::descriptor::{method_descriptor_params, type_width};
use remint_core::keywords::{is_java_keyword, is_valid_java_identifier};
use remint_mappings::MappingTree;

use crate::class_set::ClassSet;
use crate::classfile::{AttrInfo, ClassFile, MemberInfo, ACC_PRIVATE};
use crate::hierarchy::HierarchyIndex;
use crate::pool::ConstantPool;
use crate::Result;

/// Placeholder names produced by decompiler-oriented tooling; they carry no
/// information and are always resynthesized.
fn is_placeholder(name: &str) -> bool {
    static LVT_NAME: OnceLock<Regex> = OnceLock::new();
    LVT_NAME
        .get_or_init(|| Regex::new(r"^lvt\d+$").expect("placeholder pattern compiles"))
        .is_match(name)
}

pub struct Renamer<'a> {
    tree: &'a MappingTree,
    hierarchy: &'a HierarchyIndex,
    /// Declared methods per class: `(name, descriptor)` to access flags.
    /// Needed to honor visibility during the super-declaration walk.
    declared_methods: HashMap<String, HashMap<(String, String), u16>>,
}

impl<'a> Renamer<'a> {
    pub fn new(
        tree: &'a MappingTree,
        hierarchy: &'a HierarchyIndex,
        classes: &ClassSet,
    ) -> Result<Self> {
        let mut declared_methods = HashMap::with_capacity(classes.len());
        for class in classes.iter() {
            let mut methods = HashMap::with_capacity(class.methods.len());
            for method in &class.methods {
                let name = method.name(&class.pool)?;
                let desc = method.descriptor(&class.pool)?;
                methods.insert((name, desc), method.access_flags);
            }
            declared_methods.insert(class.this_class_name()?, methods);
        }
        Ok(Self {
            tree,
            hierarchy,
            declared_methods,
        })
    }

    pub fn rename_class(&self, class: &mut ClassFile) -> Result<()> {
        let this = class.this_class_name()?;
        let mut methods = std::mem::take(&mut class.methods);
        for method in &mut methods {
            self.rename_method(&mut class.pool, &this, method)?;
        }
        class.methods = methods;
        Ok(())
    }

    fn rename_method(
        &self,
        pool: &mut ConstantPool,
        this: &str,
        method: &mut MemberInfo,
    ) -> Result<()> {
        let has_lvt = method.code().is_some_and(|code| {
            code.attributes
                .iter()
                .any(|a| matches!(a.info, AttrInfo::LocalVariableTable(_)))
        });
        let has_params_attr = method
            .attributes
            .iter()
            .any(|a| matches!(a.info, AttrInfo::MethodParameters(_)));
        if !has_lvt && !has_params_attr {
            return Ok(());
        }

        let name = method.name(pool)?;
        let desc = method.descriptor(pool)?;
        let params = method_descriptor_params(&desc);
        let is_static = method.is_static();

        let mut taken: HashSet<String> = HashSet::new();
        let mut counters: HashMap<String, u32> = HashMap::new();
        // Final name per parameter slot.
        let mut assignments: HashMap<u16, String> = HashMap::new();
        let mut pending: Vec<(u16, String)> = Vec::new();

        let mut slot: u16 = if is_static { 0 } else { 1 };
        for (i, param_desc) in params.iter().enumerate() {
            if let Some(mapped) = self.mapped_parameter_name(this, &name, &desc, slot) {
                taken.insert(mapped.clone());
                assignments.insert(slot, mapped);
            } else if let Some(existing) = existing_parameter_name(pool, method, i, slot)? {
                taken.insert(existing);
            } else {
                pending.push((slot, param_desc.clone()));
            }
            slot += type_width(param_desc);
        }
        let params_end = slot;

        for (slot, param_desc) in pending {
            if let Some(synthesized) = self.synthesize(&param_desc, &mut taken, &mut counters) {
                assignments.insert(slot, synthesized);
            }
        }

        self.apply_to_method_parameters(pool, method, &params, is_static, &assignments)?;
        self.apply_to_local_variables(pool, method, is_static, params_end, &assignments, taken, counters)
    }

    /// A mapped name for the parameter at `slot`, from the method's own
    /// mapping or from a non-private, non-constructor super-declaration
    /// found by the usual hierarchy walk.
    fn mapped_parameter_name(
        &self,
        this: &str,
        method_name: &str,
        method_desc: &str,
        slot: u16,
    ) -> Option<String> {
        self.hierarchy.find_first(this, |cls| {
            if cls != this {
                if method_name == "<init>" {
                    return None;
                }
                let access = self
                    .declared_methods
                    .get(cls)?
                    .get(&(method_name.to_string(), method_desc.to_string()))?;
                if access & ACC_PRIVATE != 0 {
                    return None;
                }
            }
            let mapping = self.tree.class(cls)?.method(method_name, method_desc)?;
            let param = mapping.parameters.get(&slot)?;
            (!param.name.is_empty()).then(|| param.name.clone())
        })
    }

    fn apply_to_method_parameters(
        &self,
        pool: &mut ConstantPool,
        method: &mut MemberInfo,
        params: &[String],
        is_static: bool,
        assignments: &HashMap<u16, String>,
    ) -> Result<()> {
        let mut attrs = std::mem::take(&mut method.attributes);
        for attr in &mut attrs {
            let AttrInfo::MethodParameters(entries) = &mut attr.info else {
                continue;
            };
            let mut slot: u16 = if is_static { 0 } else { 1 };
            for (i, param_desc) in params.iter().enumerate() {
                if let (Some(entry), Some(name)) = (entries.get_mut(i), assignments.get(&slot)) {
                    entry.name_index = pool.intern_utf8(name)?;
                }
                slot += type_width(param_desc);
            }
        }
        method.attributes = attrs;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_to_local_variables(
        &self,
        pool: &mut ConstantPool,
        method: &mut MemberInfo,
        is_static: bool,
        params_end: u16,
        assignments: &HashMap<u16, String>,
        mut taken: HashSet<String>,
        mut counters: HashMap<String, u32>,
    ) -> Result<()> {
        let Some(code) = method.code_mut() else {
            return Ok(());
        };

        for attr in &mut code.attributes {
            let AttrInfo::LocalVariableTable(entries) = &mut attr.info else {
                continue;
            };

            // First sweep: decide per entry, recording taken names before any
            // synthesis happens.
            enum Action {
                Keep,
                Assign(String),
                Synthesize(String),
            }
            let mut actions = Vec::with_capacity(entries.len());
            for entry in entries.iter() {
                if !is_static && entry.index == 0 {
                    // `this`
                    actions.push(Action::Keep);
                    continue;
                }
                if let Some(name) = assignments.get(&entry.index) {
                    if entry.index < params_end {
                        actions.push(Action::Assign(name.clone()));
                        continue;
                    }
                }
                let current = pool.utf8(entry.name_index)?;
                if is_placeholder(&current) {
                    let var_desc = pool.utf8(entry.descriptor_index)?;
                    actions.push(Action::Synthesize(var_desc));
                } else {
                    taken.insert(current);
                    actions.push(Action::Keep);
                }
            }

            for (entry, action) in entries.iter_mut().zip(actions) {
                match action {
                    Action::Keep => {}
                    Action::Assign(name) => {
                        entry.name_index = pool.intern_utf8(&name)?;
                    }
                    Action::Synthesize(var_desc) => {
                        if let Some(name) = self.synthesize(&var_desc, &mut taken, &mut counters)
                        {
                            entry.name_index = pool.intern_utf8(&name)?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Synthesizes a fresh name from a type descriptor, or `None` when no
    /// base name can be derived (the variable keeps its current name).
    fn synthesize(
        &self,
        desc: &str,
        taken: &mut HashSet<String>,
        counters: &mut HashMap<String, u32>,
    ) -> Option<String> {
        let (base, letter_increment) = self.base_name(desc)?;
        let name = if letter_increment {
            next_letter_name(&base, taken)
        } else {
            next_counted_name(base, taken, counters)
        };
        taken.insert(name.clone());
        Some(name)
    }

    fn base_name(&self, desc: &str) -> Option<(String, bool)> {
        match desc.as_bytes().first()? {
            b'B' => Some(("b".to_string(), true)),
            b'C' => Some(("c".to_string(), true)),
            b'D' => Some(("d".to_string(), true)),
            b'F' => Some(("f".to_string(), true)),
            b'I' => Some(("i".to_string(), true)),
            b'J' => Some(("l".to_string(), true)),
            b'S' => Some(("s".to_string(), true)),
            b'Z' => Some(("bl".to_string(), false)),
            b'L' => {
                let internal = desc.strip_prefix('L')?.strip_suffix(';')?;
                self.object_base(internal).map(|base| (base, false))
            }
            b'[' => {
                let (element, letter_increment) = self.base_name(&desc[1..])?;
                let plural = format!("{element}s");
                let base = if is_java_keyword(&plural) {
                    element
                } else {
                    plural
                };
                Some((base, letter_increment))
            }
            other => {
                tracing::debug!(
                    target = "remint.rename",
                    descriptor = desc,
                    leading = *other,
                    "unsupported descriptor in name synthesis; keeping original name"
                );
                None
            }
        }
    }

    fn object_base(&self, internal: &str) -> Option<String> {
        let mut reasons: Vec<String> = Vec::new();
        if let Some(base) = derive_from_class_name(internal, &mut reasons) {
            return Some(base);
        }

        // Anonymous classes (`Style$1`) derive nothing usable from their own
        // name; fall back to the nearest supertype that does.
        let fallback = self.hierarchy.find_first(internal, |cls| {
            if cls == internal || cls == "java/lang/Object" {
                return None;
            }
            derive_from_class_name(cls, &mut reasons)
        });

        if fallback.is_none() {
            tracing::debug!(
                target = "remint.rename",
                class = internal,
                reasons = ?reasons,
                "no usable base name for local variable"
            );
        }
        fallback
    }
}

fn existing_parameter_name(
    pool: &ConstantPool,
    method: &MemberInfo,
    param_index: usize,
    slot: u16,
) -> Result<Option<String>> {
    for attr in &method.attributes {
        if let AttrInfo::MethodParameters(entries) = &attr.info {
            if let Some(entry) = entries.get(param_index) {
                if entry.name_index != 0 {
                    let name = pool.utf8(entry.name_index)?;
                    if !name.is_empty() && !is_placeholder(&name) {
                        return Ok(Some(name));
                    }
                }
            }
        }
    }

    if let Some(code) = method.code() {
        for attr in &code.attributes {
            if let AttrInfo::LocalVariableTable(entries) = &attr.info {
                for entry in entries {
                    if entry.index == slot && entry.start_pc == 0 {
                        let name = pool.utf8(entry.name_index)?;
                        if !name.is_empty() && !is_placeholder(&name) {
                            return Ok(Some(name));
                        }
                    }
                }
            }
        }
    }

    Ok(None)
}

fn derive_from_class_name(internal: &str, reasons: &mut Vec<String>) -> Option<String> {
    let last = internal.rsplit('/').next().unwrap_or(internal);
    let segment = last.rsplit('$').next().unwrap_or(last);

    let mut candidate: String = lowercase_first(segment);
    if is_valid_java_identifier(&candidate) {
        return Some(candidate);
    }

    candidate = lowercase_first(candidate.trim_start_matches(|c: char| c.is_ascii_digit()));
    if !candidate.is_empty() && is_valid_java_identifier(&candidate) {
        return Some(candidate);
    }

    reasons.push(format!("{internal}: segment {segment:?} yields no identifier"));
    None
}

fn lowercase_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Base-26 little-endian letter sequences: `a..z, aa, ba, ..., za, ab, ...`.
fn letter_name(mut index: u64) -> String {
    let mut out = String::new();
    loop {
        out.push((b'a' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    out
}

fn letter_index(name: &str) -> u64 {
    let mut index = 0u64;
    let mut scale = 1u64;
    for (i, b) in name.bytes().enumerate() {
        let value = (b - b'a') as u64;
        index += if i == 0 { value } else { (value + 1) * scale };
        scale *= 26;
    }
    index
}

fn next_letter_name(base: &str, taken: &HashSet<String>) -> String {
    let mut index = letter_index(base);
    loop {
        let candidate = letter_name(index);
        if !taken.contains(&candidate) && !is_java_keyword(&candidate) {
            return candidate;
        }
        index += 1;
    }
}

fn next_counted_name(
    mut base: String,
    taken: &HashSet<String>,
    counters: &mut HashMap<String, u32>,
) -> String {
    if is_java_keyword(&base) {
        base.push('_');
    }
    let counter = counters.entry(base.clone()).or_insert(0);
    loop {
        *counter += 1;
        let candidate = if *counter == 1 {
            base.clone()
        } else {
            format!("{base}{counter}")
        };
        if !taken.contains(&candidate) {
            return candidate;
        }
    }
}
