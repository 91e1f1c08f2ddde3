//! Bridge flag restoration.
//!
//! Some obfuscators strip `ACC_BRIDGE` from compiler-generated bridge
//! methods; decompilers produce much clearer output when the flag is
//! present. A synthetic method whose calls all target a same-named,
//! same-arity method on its own type hierarchy is, with high confidence, a
//! bridge.

use remint_core::descriptor::method_descriptor_params;

use crate::classfile::{ClassFile, ACC_BRIDGE, ACC_SYNTHETIC};
use crate::insn::{
    InsnIter, OP_INVOKEINTERFACE, OP_INVOKESPECIAL, OP_INVOKESTATIC, OP_INVOKEVIRTUAL,
};
use crate::pool::{ConstantPool, CpEntry};
use crate::Result;

/// Restores `ACC_BRIDGE` on probable bridges; returns how many were set.
pub fn restore_bridge_flags(class: &mut ClassFile) -> Result<usize> {
    let this = class.this_class_name()?;
    let super_name = class.super_class_name()?;
    let interfaces = class.interface_names()?;

    let pool = &class.pool;
    let mut restored = 0usize;

    for method in &mut class.methods {
        if method.access_flags & ACC_SYNTHETIC == 0 || method.access_flags & ACC_BRIDGE != 0 {
            continue;
        }

        let is_bridge = {
            let Some(code) = method.code() else {
                continue;
            };
            let name = pool.utf8(method.name_index)?;
            let desc = pool.utf8(method.descriptor_index)?;
            let arity = method_descriptor_params(&desc).len();
            probe_calls(
                pool,
                &code.code,
                &this,
                super_name.as_deref(),
                &interfaces,
                &name,
                arity,
            )?
        };

        if is_bridge {
            method.access_flags |= ACC_BRIDGE;
            restored += 1;
        }
    }

    Ok(restored)
}

/// True iff the body contains at least one call and every call targets a
/// non-interface method named `name` with `arity` parameters on `this`, its
/// superclass or a declared interface.
fn probe_calls(
    pool: &ConstantPool,
    code: &[u8],
    this: &str,
    super_name: Option<&str>,
    interfaces: &[String],
    name: &str,
    arity: usize,
) -> Result<bool> {
    let mut saw_call = false;

    for insn in InsnIter::new(code) {
        let insn = insn?;
        match insn.opcode {
            OP_INVOKEVIRTUAL | OP_INVOKESPECIAL | OP_INVOKESTATIC => {
                let CpEntry::Methodref {
                    class_index,
                    name_and_type_index,
                } = pool.get(insn.pool_index())?
                else {
                    // Interface targets disqualify the heuristic.
                    return Ok(false);
                };
                let owner = pool.class_name(*class_index)?;
                let (target_name, target_desc) = pool.name_and_type(*name_and_type_index)?;

                let owner_ok = owner == this
                    || super_name == Some(owner.as_str())
                    || interfaces.iter().any(|i| *i == owner);
                if !owner_ok
                    || target_name != name
                    || method_descriptor_params(&target_desc).len() != arity
                {
                    return Ok(false);
                }
                saw_call = true;
            }
            OP_INVOKEINTERFACE => return Ok(false),
            _ => {}
        }
    }

    Ok(saw_call)
}
