//! End-to-end remap scenarios over hand-built classes.

use pretty_assertions::assert_eq;

use remint_mappings::{
    ClassMapping, CombinedMappingTree, FieldMapping, MappingTree, MemberKey, MethodMapping,
    ParameterMapping,
};
use remint_remap::builder::{ClassBuilder, MethodSpec};
use remint_remap::{
    remap_class_set, AttrInfo, ClassFile, ClassSet, CpEntry, RemapInput, RemapOptions,
    ACC_BRIDGE, ACC_STATIC, ACC_SYNTHETIC,
};

fn two_ns_tree() -> MappingTree {
    MappingTree::new(vec!["official".into(), "named".into()])
}

fn class_entry(names: &[&str]) -> ClassMapping {
    ClassMapping::new(names.iter().map(|s| s.to_string()).collect())
}

fn field_entry(names: &[&str], desc: &str) -> (MemberKey, FieldMapping) {
    (
        MemberKey::new(names[0], desc),
        FieldMapping {
            names: names.iter().map(|s| s.to_string()).collect(),
            desc: desc.to_string(),
            comment: None,
        },
    )
}

fn method_entry(names: &[&str], desc: &str) -> (MemberKey, MethodMapping) {
    (
        MemberKey::new(names[0], desc),
        MethodMapping {
            names: names.iter().map(|s| s.to_string()).collect(),
            desc: desc.to_string(),
            comment: None,
            parameters: Default::default(),
        },
    )
}

fn remap_one(class: ClassFile, tree: &MappingTree, ns: &str, options: RemapOptions) -> ClassFile {
    let set = ClassSet::from_classes(vec![class]).unwrap();
    let out = remap_class_set(set, RemapInput::Single(tree), ns, options, &|| false).unwrap();
    out.into_classes().remove(0)
}

fn plain_options() -> RemapOptions {
    RemapOptions {
        fix_bridges: false,
        rename_locals: false,
    }
}

/// Finds the single `Fieldref` / `Methodref` in a class and resolves it.
fn resolve_only_ref(class: &ClassFile, want_field: bool) -> (String, String, String) {
    for idx in 1..class.pool.slot_count() as u16 {
        let Ok(entry) = class.pool.get(idx) else {
            continue;
        };
        let (class_index, nat_index) = match entry {
            CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            } if want_field => (*class_index, *name_and_type_index),
            CpEntry::Methodref {
                class_index,
                name_and_type_index,
            } if !want_field => (*class_index, *name_and_type_index),
            _ => continue,
        };
        let owner = class.pool.class_name(class_index).unwrap();
        let (name, desc) = class.pool.name_and_type(nat_index).unwrap();
        return (owner, name, desc);
    }
    panic!("expected a member ref in the pool");
}

#[test]
fn trivial_mapping_is_byte_identical() {
    let mut tree = MappingTree::new(vec!["named".into()]);
    tree.insert_class(class_entry(&["A"]));

    let class = ClassBuilder::new("A")
        .source_file("A.java")
        .with_method(MethodSpec::new("m", "(I)I", 0x0001).code(1, 2, vec![0x1b, 0xac]))
        .build();
    let before = class.serialize();

    let after = remap_one(class, &tree, "named", plain_options()).serialize();
    assert_eq!(before, after);
}

#[test]
fn trivial_mapping_synthesizes_source_file() {
    let tree = MappingTree::new(vec!["named".into()]);
    let class = ClassBuilder::new("a/B$Inner")
        .with_method(MethodSpec::new("m", "()V", 0x0001).code(0, 1, vec![0xb1]))
        .build();

    let out = remap_one(class, &tree, "named", plain_options());
    let source_file = out
        .attributes
        .iter()
        .find_map(|attr| match attr.info {
            AttrInfo::SourceFile { sourcefile_index } => {
                Some(out.pool.utf8(sourcefile_index).unwrap())
            }
            _ => None,
        })
        .expect("SourceFile synthesized");
    assert_eq!(source_file, "B.java");
}

#[test]
fn class_rename_keeps_unmapped_field() {
    let mut tree = two_ns_tree();
    tree.insert_class(class_entry(&["a", "Apple"]));

    let class = ClassBuilder::new("a").field("b", "I", 0x0002).build();
    let out = remap_one(class, &tree, "named", plain_options());

    assert_eq!(out.this_class_name().unwrap(), "Apple");
    assert_eq!(out.fields[0].name(&out.pool).unwrap(), "b");
    assert_eq!(out.fields[0].descriptor(&out.pool).unwrap(), "I");
}

#[test]
fn field_reference_resolves_through_superclass() {
    let mut tree = two_ns_tree();
    let mut p = class_entry(&["P", "P"]);
    let (key, mapping) = field_entry(&["x", "count"], "I");
    p.fields.insert(key, mapping);
    tree.insert_class(p);

    let parent = ClassBuilder::new("P").field("x", "I", 0x0004).build();

    let mut builder = ClassBuilder::new("C").super_class("P");
    let field_ref = builder.field_ref("C", "x", "I");
    let code = vec![0x2a, 0xb4, (field_ref >> 8) as u8, field_ref as u8, 0xac];
    let child = builder
        .with_method(MethodSpec::new("m", "()I", 0x0001).code(1, 1, code))
        .build();

    let set = ClassSet::from_classes(vec![parent, child]).unwrap();
    let out = remap_class_set(
        set,
        RemapInput::Single(&tree),
        "named",
        plain_options(),
        &|| false,
    )
    .unwrap();

    let child = out.get("C").expect("C kept its name").clone();
    let (owner, name, desc) = resolve_only_ref(&child, true);
    assert_eq!((owner.as_str(), name.as_str(), desc.as_str()), ("C", "count", "I"));

    // The declaring class carries the renamed field definition.
    let parent = out.get("P").unwrap();
    assert_eq!(parent.fields[0].name(&parent.pool).unwrap(), "count");
}

#[test]
fn local_variable_synthesis_from_descriptors() {
    let tree = two_ns_tree();

    let class = ClassBuilder::new("A")
        .with_method(
            MethodSpec::new("f", "(ILjava/lang/String;)V", 0x0001)
                .code(0, 3, vec![0xb1])
                .local(0, 1, "this", "LA;", 0)
                .local(0, 1, "lvt1", "I", 1)
                .local(0, 1, "lvt2", "Ljava/lang/String;", 2),
        )
        .build();

    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: false,
            rename_locals: true,
        },
    );

    let code = out.methods[0].code().unwrap();
    let names: Vec<String> = code
        .attributes
        .iter()
        .find_map(|attr| match &attr.info {
            AttrInfo::LocalVariableTable(entries) => Some(
                entries
                    .iter()
                    .map(|e| out.pool.utf8(e.name_index).unwrap())
                    .collect(),
            ),
            _ => None,
        })
        .unwrap();
    assert_eq!(names, ["this", "i", "string"]);
}

#[test]
fn mapped_parameter_names_win_over_synthesis() {
    let mut tree = two_ns_tree();
    let mut a = class_entry(&["a", "Apple"]);
    let (key, mut grow) = method_entry(&["c", "grow"], "(IJ)V");
    grow.parameters.insert(
        1,
        ParameterMapping {
            name: "amount".into(),
            comment: None,
        },
    );
    grow.parameters.insert(
        2,
        ParameterMapping {
            name: "seed".into(),
            comment: None,
        },
    );
    a.methods.insert(key, grow);
    tree.insert_class(a);

    let class = ClassBuilder::new("a")
        .with_method(
            MethodSpec::new("c", "(IJ)V", 0x0001)
                .code(0, 4, vec![0xb1])
                .local(0, 1, "this", "La;", 0)
                .local(0, 1, "lvt1", "I", 1)
                .local(0, 1, "lvt2", "J", 2),
        )
        .build();

    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: false,
            rename_locals: true,
        },
    );

    assert_eq!(out.this_class_name().unwrap(), "Apple");
    assert_eq!(out.methods[0].name(&out.pool).unwrap(), "grow");

    let code = out.methods[0].code().unwrap();
    let names: Vec<String> = code
        .attributes
        .iter()
        .find_map(|attr| match &attr.info {
            AttrInfo::LocalVariableTable(entries) => Some(
                entries
                    .iter()
                    .map(|e| out.pool.utf8(e.name_index).unwrap())
                    .collect(),
            ),
            _ => None,
        })
        .unwrap();
    assert_eq!(names, ["this", "amount", "seed"]);
}

#[test]
fn bridge_flag_restored_on_probable_bridge() {
    let mut builder = ClassBuilder::new("A");
    let target = builder.method_ref("A", "get", "()Ljava/lang/String;");
    let code = vec![0x2a, 0xb6, (target >> 8) as u8, target as u8, 0xb0];
    let class = builder
        .with_method(
            MethodSpec::new("get", "()Ljava/lang/Object;", ACC_SYNTHETIC).code(1, 1, code),
        )
        .method("get", "()Ljava/lang/String;", 0x0001)
        .build();

    let tree = MappingTree::new(vec!["named".into()]);
    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: true,
            rename_locals: false,
        },
    );

    let bridge = &out.methods[0];
    assert_eq!(bridge.descriptor(&out.pool).unwrap(), "()Ljava/lang/Object;");
    assert_ne!(bridge.access_flags & ACC_BRIDGE, 0);

    // The specialization itself is untouched.
    assert_eq!(out.methods[1].access_flags & ACC_BRIDGE, 0);
}

#[test]
fn bridge_flag_not_set_for_foreign_targets() {
    let mut builder = ClassBuilder::new("A");
    let target = builder.method_ref("other/Owner", "get", "()Ljava/lang/String;");
    let code = vec![0x2a, 0xb6, (target >> 8) as u8, target as u8, 0xb0];
    let class = builder
        .with_method(
            MethodSpec::new("get", "()Ljava/lang/Object;", ACC_SYNTHETIC).code(1, 1, code),
        )
        .build();

    let tree = MappingTree::new(vec!["named".into()]);
    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: true,
            rename_locals: false,
        },
    );
    assert_eq!(out.methods[0].access_flags & ACC_BRIDGE, 0);
}

#[test]
fn invokedynamic_handle_is_rewritten() {
    let mut tree = two_ns_tree();
    tree.insert_class(class_entry(&["a", "A"]));
    tree.insert_class(class_entry(&["z", "Z"]));
    let mut a = class_entry(&["a", "A"]);
    let (key, mapping) = method_entry(&["b", "compute"], "(I)Lz;");
    a.methods.insert(key, mapping);
    tree.insert_class(a);

    let mut builder = ClassBuilder::new("caller");
    let target = builder.method_ref("a", "b", "(I)Lz;");
    let handle = builder.method_handle(6, target); // REF_invokeStatic
    let _indy = builder.invoke_dynamic(0, "apply", "(I)Lz;");
    let class = builder.build();

    let out = remap_one(class, &tree, "named", plain_options());

    // The handle's target ref now reads A.compute(I)LZ;.
    let (owner, name, desc) = resolve_only_ref(&out, false);
    assert_eq!(
        (owner.as_str(), name.as_str(), desc.as_str()),
        ("A", "compute", "(I)LZ;")
    );

    // The handle still points at that ref.
    let mut handle_target = None;
    let mut indy_desc = None;
    for idx in 1..out.pool.slot_count() as u16 {
        match out.pool.get(idx) {
            Ok(CpEntry::MethodHandle {
                reference_index, ..
            }) => handle_target = Some(*reference_index),
            Ok(CpEntry::InvokeDynamic {
                name_and_type_index,
                ..
            }) => {
                indy_desc = Some(out.pool.name_and_type(*name_and_type_index).unwrap());
            }
            _ => {}
        }
    }
    let _ = handle;
    assert!(matches!(
        out.pool.get(handle_target.unwrap()).unwrap(),
        CpEntry::Methodref { .. }
    ));
    // The dynamic call site keeps its name but follows the type rename.
    assert_eq!(indy_desc.unwrap(), ("apply".to_string(), "(I)LZ;".to_string()));
}

#[test]
fn chained_trees_apply_in_sequence() {
    let mut stage_one = MappingTree::new(vec!["official".into(), "intermediary".into()]);
    stage_one.insert_class(class_entry(&["a", "class_1"]));

    let mut stage_two = MappingTree::new(vec!["intermediary".into(), "named".into()]);
    stage_two.insert_class(class_entry(&["class_1", "com/example/Apple"]));

    let combined = CombinedMappingTree::new(stage_one, stage_two);

    let class = ClassBuilder::new("a").build();
    let set = ClassSet::from_classes(vec![class]).unwrap();
    let out = remap_class_set(
        set,
        RemapInput::Chained(&combined),
        "named",
        plain_options(),
        &|| false,
    )
    .unwrap();

    let class = out.get("com/example/Apple").expect("final name applied");
    // SourceFile synthesis happens on the final pass only, so the name comes
    // from the named namespace, not the intermediary one.
    let source_file = class
        .attributes
        .iter()
        .find_map(|attr| match attr.info {
            AttrInfo::SourceFile { sourcefile_index } => {
                Some(class.pool.utf8(sourcefile_index).unwrap())
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(source_file, "Apple.java");
}

#[test]
fn record_components_follow_field_mappings() {
    let mut tree = two_ns_tree();
    let mut rec = class_entry(&["r", "Point"]);
    let (key, mapping) = field_entry(&["q", "x"], "I");
    rec.fields.insert(key, mapping);
    tree.insert_class(rec);

    let class = ClassBuilder::new("r")
        .field("q", "I", 0x8012)
        .record_component("q", "I")
        .build();

    let out = remap_one(class, &tree, "named", plain_options());
    let components = out
        .attributes
        .iter()
        .find_map(|attr| match &attr.info {
            AttrInfo::Record(components) => Some(components),
            _ => None,
        })
        .unwrap();
    assert_eq!(out.pool.utf8(components[0].name_index).unwrap(), "x");
}

#[test]
fn static_methods_start_parameter_slots_at_zero() {
    let tree = two_ns_tree();
    let class = ClassBuilder::new("A")
        .with_method(
            MethodSpec::new("f", "(JI)V", ACC_STATIC | 0x0001)
                .code(0, 3, vec![0xb1])
                .local(0, 1, "lvt0", "J", 0)
                .local(0, 1, "lvt1", "I", 2),
        )
        .build();

    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: false,
            rename_locals: true,
        },
    );

    let code = out.methods[0].code().unwrap();
    let names: Vec<String> = code
        .attributes
        .iter()
        .find_map(|attr| match &attr.info {
            AttrInfo::LocalVariableTable(entries) => Some(
                entries
                    .iter()
                    .map(|e| out.pool.utf8(e.name_index).unwrap())
                    .collect(),
            ),
            _ => None,
        })
        .unwrap();
    // long at slot 0, int at slot 2; `l` then `i`.
    assert_eq!(names, ["l", "i"]);
}

#[test]
fn synthesized_names_never_collide() {
    let tree = two_ns_tree();
    let class = ClassBuilder::new("A")
        .with_method(
            MethodSpec::new("f", "(II)V", ACC_STATIC | 0x0001)
                .code(0, 6, vec![0xb1])
                .local(0, 1, "lvt0", "I", 0)
                .local(0, 1, "lvt1", "I", 1)
                .local(0, 1, "lvt2", "I", 2)
                .local(0, 1, "lvt3", "Ljava/lang/String;", 3)
                .local(0, 1, "lvt4", "Ljava/lang/String;", 4)
                .local(0, 1, "lvt5", "[Ljava/lang/String;", 5),
        )
        .build();

    let out = remap_one(
        class,
        &tree,
        "named",
        RemapOptions {
            fix_bridges: false,
            rename_locals: true,
        },
    );

    let code = out.methods[0].code().unwrap();
    let names: Vec<String> = code
        .attributes
        .iter()
        .find_map(|attr| match &attr.info {
            AttrInfo::LocalVariableTable(entries) => Some(
                entries
                    .iter()
                    .map(|e| out.pool.utf8(e.name_index).unwrap())
                    .collect(),
            ),
            _ => None,
        })
        .unwrap();

    assert_eq!(names, ["i", "j", "k", "string", "string2", "strings"]);

    let unique: std::collections::HashSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len(), "synthesized names must not collide");
    for name in &names {
        assert!(
            name.chars().next().unwrap().is_ascii_alphabetic(),
            "{name:?} is not a valid identifier"
        );
    }
}

#[test]
fn cancellation_aborts_between_classes() {
    let tree = MappingTree::new(vec!["named".into()]);
    let set = ClassSet::from_classes(vec![ClassBuilder::new("A").build()]).unwrap();
    let err = remap_class_set(
        set,
        RemapInput::Single(&tree),
        "named",
        plain_options(),
        &|| true,
    )
    .unwrap_err();
    assert!(matches!(err, remint_remap::RemapError::Cancelled));
}
