//! Bytecode remapping.
//!
//! Takes the classes of one jar, applies one mapping tree (or two chained
//! trees) to every class, field, method, local variable and parameter, and
//! produces classes whose bytecode references the new names consistently:
//! member references resolve through the class hierarchy, invokedynamic
//! handles are rewritten, stripped `BRIDGE` flags are restored, and local
//! variables without source names get deterministic, hygienic identifiers.

pub mod builder;
mod bridge;
mod class_set;
mod classfile;
mod hierarchy;
mod insn;
mod mutf8;
mod pool;
mod reader;
mod remap;
mod rename;
mod signature;

pub use bridge::restore_bridge_flags;
pub use class_set::ClassSet;
pub use classfile::{
    AttrInfo, Attribute, ClassFile, CodeAttr, ExceptionTableEntry, InnerClassEntry,
    LocalVariableEntry, MemberInfo, MethodParameter, RecordComponent, ACC_BRIDGE, ACC_PRIVATE,
    ACC_STATIC, ACC_SYNTHETIC,
};
pub use hierarchy::HierarchyIndex;
pub use pool::{ConstantPool, CpEntry};
pub use remap::RemapPass;
pub use rename::Renamer;

use remint_mappings::{CombinedMappingTree, MappingError, MappingTree};

pub type Result<T> = std::result::Result<T, RemapError>;

#[derive(Debug, thiserror::Error)]
pub enum RemapError {
    #[error("unexpected end of class file")]
    UnexpectedEof,
    #[error("invalid classfile magic: 0x{0:08x}")]
    InvalidMagic(u32),
    #[error("invalid constant pool index: {0}")]
    InvalidConstantPoolIndex(u16),
    #[error("invalid constant pool tag: {0}")]
    InvalidConstantPoolTag(u8),
    #[error("constant pool type mismatch at index {index}: expected {expected}, found {found}")]
    ConstantPoolTypeMismatch {
        index: u16,
        expected: &'static str,
        found: &'static str,
    },
    #[error("invalid modified UTF-8 constant")]
    InvalidModifiedUtf8,
    #[error("malformed {0} attribute data")]
    MalformedAttribute(&'static str),
    #[error("constant pool overflow")]
    ConstantPoolOverflow,
    #[error("unknown opcode: 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),
    #[error("remap job cancelled")]
    Cancelled,
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// The mapping input of one remap job.
///
/// Chained trees are applied in sequence: the intermediate tree in a full
/// pass over all classes, then the named tree over the result, with the
/// hierarchy rebuilt between passes. The stage boundary is defined by the
/// named tree's default namespace, which the intermediate tree must contain.
#[derive(Clone, Copy)]
pub enum RemapInput<'a> {
    Single(&'a MappingTree),
    Chained(&'a CombinedMappingTree),
}

#[derive(Debug, Clone, Copy)]
pub struct RemapOptions {
    /// Restore stripped `BRIDGE` flags after the final pass.
    pub fix_bridges: bool,
    /// Synthesize local-variable and parameter names after the final pass.
    pub rename_locals: bool,
}

impl Default for RemapOptions {
    fn default() -> Self {
        Self {
            fix_bridges: true,
            rename_locals: true,
        }
    }
}

/// Remaps a whole class set into `namespace`.
///
/// `cancelled` is polled between classes; remapping is whole-archive or
/// nothing, so a cancelled job yields no partial output.
pub fn remap_class_set(
    mut classes: ClassSet,
    input: RemapInput<'_>,
    namespace: &str,
    options: RemapOptions,
    cancelled: &dyn Fn() -> bool,
) -> Result<ClassSet> {
    let final_tree: &MappingTree = match input {
        RemapInput::Single(tree) => {
            classes = run_pass(classes, tree, namespace, true, cancelled)?;
            tree
        }
        RemapInput::Chained(combined) => {
            let link_ns = combined
                .named()
                .namespaces()
                .first()
                .cloned()
                .ok_or_else(|| RemapError::UnknownNamespace(String::new()))?;
            classes = run_pass(classes, combined.intermediate(), &link_ns, false, cancelled)?;
            classes = run_pass(classes, combined.named(), namespace, true, cancelled)?;
            combined.named()
        }
    };

    if options.fix_bridges {
        for class in classes.iter_mut() {
            if cancelled() {
                return Err(RemapError::Cancelled);
            }
            restore_bridge_flags(class)?;
        }
    }

    if options.rename_locals {
        // The renamer looks classes up by their remapped names, so it works
        // against the inversion of the final tree.
        let inverted = final_tree.invert(namespace)?;
        let hierarchy = HierarchyIndex::build(&classes)?;
        let renamer = Renamer::new(&inverted, &hierarchy, &classes)?;
        let mut renamed = classes.into_classes();
        for class in &mut renamed {
            if cancelled() {
                return Err(RemapError::Cancelled);
            }
            renamer.rename_class(class)?;
        }
        classes = ClassSet::from_classes(renamed)?;
    }

    Ok(classes)
}

fn run_pass(
    classes: ClassSet,
    tree: &MappingTree,
    namespace: &str,
    synthesize_source_file: bool,
    cancelled: &dyn Fn() -> bool,
) -> Result<ClassSet> {
    let hierarchy = HierarchyIndex::build(&classes)?;
    let pass = RemapPass::new(tree, namespace, &hierarchy, synthesize_source_file)?;

    let mut remapped = classes.into_classes();
    for class in &mut remapped {
        if cancelled() {
            return Err(RemapError::Cancelled);
        }
        pass.remap_class(class)?;
    }
    ClassSet::from_classes(remapped)
}
