//! The constant pool, with append-only mutation.
//!
//! Remapping never renumbers or removes existing entries, so every index
//! embedded in code bytes, stack map frames and unparsed attributes stays
//! valid. Changed names are interned as fresh `Utf8`/`NameAndType` entries at
//! the end of the pool and the referencing entries are repointed.

use crate::mutf8;
use crate::reader::{Reader, Writer};
use crate::{RemapError, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum CpEntry {
    /// Raw modified UTF-8 bytes, kept undecoded for bit-fidelity.
    Utf8(Vec<u8>),
    Integer(i32),
    /// IEEE bits, not `f32`: NaN payloads must survive re-serialization.
    Float(u32),
    Long(i64),
    Double(u64),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    Fieldref {
        class_index: u16,
        name_and_type_index: u16,
    },
    Methodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodref {
        class_index: u16,
        name_and_type_index: u16,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    Dynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
}

impl CpEntry {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            CpEntry::Utf8(_) => "Utf8",
            CpEntry::Integer(_) => "Integer",
            CpEntry::Float(_) => "Float",
            CpEntry::Long(_) => "Long",
            CpEntry::Double(_) => "Double",
            CpEntry::Class { .. } => "Class",
            CpEntry::String { .. } => "String",
            CpEntry::Fieldref { .. } => "Fieldref",
            CpEntry::Methodref { .. } => "Methodref",
            CpEntry::InterfaceMethodref { .. } => "InterfaceMethodref",
            CpEntry::NameAndType { .. } => "NameAndType",
            CpEntry::MethodHandle { .. } => "MethodHandle",
            CpEntry::MethodType { .. } => "MethodType",
            CpEntry::Dynamic { .. } => "Dynamic",
            CpEntry::InvokeDynamic { .. } => "InvokeDynamic",
            CpEntry::Module { .. } => "Module",
            CpEntry::Package { .. } => "Package",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    /// Slot 0 is unused; the slot after a `Long`/`Double` is `None`.
    entries: Vec<Option<CpEntry>>,
}

impl ConstantPool {
    /// An empty pool (just the unused slot 0), for building classes from
    /// scratch.
    pub fn new() -> Self {
        Self {
            entries: vec![None],
        }
    }

    pub fn parse(reader: &mut Reader<'_>) -> Result<Self> {
        let count = reader.read_u2()? as usize;
        if count == 0 {
            return Err(RemapError::MalformedAttribute("constant_pool_count must be >= 1"));
        }

        let mut entries = vec![None; count];
        let mut i = 1usize;
        while i < count {
            let tag = reader.read_u1()?;
            let entry = match tag {
                1 => {
                    let len = reader.read_u2()? as usize;
                    CpEntry::Utf8(reader.read_bytes(len)?.to_vec())
                }
                3 => CpEntry::Integer(reader.read_u4()? as i32),
                4 => CpEntry::Float(reader.read_u4()?),
                5 => CpEntry::Long(reader.read_u8()? as i64),
                6 => CpEntry::Double(reader.read_u8()?),
                7 => CpEntry::Class {
                    name_index: reader.read_u2()?,
                },
                8 => CpEntry::String {
                    string_index: reader.read_u2()?,
                },
                9 => CpEntry::Fieldref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                10 => CpEntry::Methodref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                11 => CpEntry::InterfaceMethodref {
                    class_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                12 => CpEntry::NameAndType {
                    name_index: reader.read_u2()?,
                    descriptor_index: reader.read_u2()?,
                },
                15 => CpEntry::MethodHandle {
                    reference_kind: reader.read_u1()?,
                    reference_index: reader.read_u2()?,
                },
                16 => CpEntry::MethodType {
                    descriptor_index: reader.read_u2()?,
                },
                17 => CpEntry::Dynamic {
                    bootstrap_method_attr_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                18 => CpEntry::InvokeDynamic {
                    bootstrap_method_attr_index: reader.read_u2()?,
                    name_and_type_index: reader.read_u2()?,
                },
                19 => CpEntry::Module {
                    name_index: reader.read_u2()?,
                },
                20 => CpEntry::Package {
                    name_index: reader.read_u2()?,
                },
                other => return Err(RemapError::InvalidConstantPoolTag(other)),
            };

            let wide = matches!(entry, CpEntry::Long(_) | CpEntry::Double(_));
            entries[i] = Some(entry);
            if wide {
                if i + 1 >= count {
                    return Err(RemapError::MalformedAttribute("malformed constant pool"));
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        Ok(Self { entries })
    }

    pub fn serialize(&self, out: &mut Writer) {
        out.write_u2(self.entries.len() as u16);
        for entry in self.entries.iter().flatten() {
            match entry {
                CpEntry::Utf8(bytes) => {
                    out.write_u1(1);
                    out.write_u2(bytes.len() as u16);
                    out.write_bytes(bytes);
                }
                CpEntry::Integer(v) => {
                    out.write_u1(3);
                    out.write_u4(*v as u32);
                }
                CpEntry::Float(bits) => {
                    out.write_u1(4);
                    out.write_u4(*bits);
                }
                CpEntry::Long(v) => {
                    out.write_u1(5);
                    out.write_u8(*v as u64);
                }
                CpEntry::Double(bits) => {
                    out.write_u1(6);
                    out.write_u8(*bits);
                }
                CpEntry::Class { name_index } => {
                    out.write_u1(7);
                    out.write_u2(*name_index);
                }
                CpEntry::String { string_index } => {
                    out.write_u1(8);
                    out.write_u2(*string_index);
                }
                CpEntry::Fieldref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u1(9);
                    out.write_u2(*class_index);
                    out.write_u2(*name_and_type_index);
                }
                CpEntry::Methodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u1(10);
                    out.write_u2(*class_index);
                    out.write_u2(*name_and_type_index);
                }
                CpEntry::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    out.write_u1(11);
                    out.write_u2(*class_index);
                    out.write_u2(*name_and_type_index);
                }
                CpEntry::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    out.write_u1(12);
                    out.write_u2(*name_index);
                    out.write_u2(*descriptor_index);
                }
                CpEntry::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    out.write_u1(15);
                    out.write_u1(*reference_kind);
                    out.write_u2(*reference_index);
                }
                CpEntry::MethodType { descriptor_index } => {
                    out.write_u1(16);
                    out.write_u2(*descriptor_index);
                }
                CpEntry::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.write_u1(17);
                    out.write_u2(*bootstrap_method_attr_index);
                    out.write_u2(*name_and_type_index);
                }
                CpEntry::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    out.write_u1(18);
                    out.write_u2(*bootstrap_method_attr_index);
                    out.write_u2(*name_and_type_index);
                }
                CpEntry::Module { name_index } => {
                    out.write_u1(19);
                    out.write_u2(*name_index);
                }
                CpEntry::Package { name_index } => {
                    out.write_u1(20);
                    out.write_u2(*name_index);
                }
            }
        }
    }

    /// Number of pool slots, including slot 0 and wide-entry padding.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        (1..self.entries.len() as u16).filter(|&i| self.entries[i as usize].is_some())
    }

    pub fn get(&self, index: u16) -> Result<&CpEntry> {
        let idx = index as usize;
        if idx == 0 || idx >= self.entries.len() {
            return Err(RemapError::InvalidConstantPoolIndex(index));
        }
        self.entries[idx]
            .as_ref()
            .ok_or(RemapError::InvalidConstantPoolIndex(index))
    }

    pub fn get_mut(&mut self, index: u16) -> Result<&mut CpEntry> {
        let idx = index as usize;
        if idx == 0 || idx >= self.entries.len() {
            return Err(RemapError::InvalidConstantPoolIndex(index));
        }
        self.entries[idx]
            .as_mut()
            .ok_or(RemapError::InvalidConstantPoolIndex(index))
    }

    pub fn utf8_bytes(&self, index: u16) -> Result<&[u8]> {
        match self.get(index)? {
            CpEntry::Utf8(bytes) => Ok(bytes),
            other => Err(self.mismatch(index, "Utf8", other)),
        }
    }

    pub fn utf8(&self, index: u16) -> Result<String> {
        mutf8::decode(self.utf8_bytes(index)?)
    }

    pub fn class_name(&self, index: u16) -> Result<String> {
        match self.get(index)? {
            CpEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(self.mismatch(index, "Class", other)),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(String, String)> {
        match self.get(index)? {
            CpEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?)),
            other => Err(self.mismatch(index, "NameAndType", other)),
        }
    }

    fn mismatch(&self, index: u16, expected: &'static str, found: &CpEntry) -> RemapError {
        RemapError::ConstantPoolTypeMismatch {
            index,
            expected,
            found: found.kind(),
        }
    }

    /// Appends an entry and returns its index. `Long`/`Double` also claim the
    /// following slot.
    pub fn push_entry(&mut self, entry: CpEntry) -> Result<u16> {
        let wide = matches!(entry, CpEntry::Long(_) | CpEntry::Double(_));
        let index = self.push(entry)?;
        if wide {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Returns the index of a `Class` entry with this name, appending one if
    /// none exists.
    pub fn intern_class(&mut self, name: &str) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        let wanted = CpEntry::Class { name_index };
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.as_ref() == Some(&wanted) {
                return Ok(i as u16);
            }
        }
        self.push(wanted)
    }

    fn push(&mut self, entry: CpEntry) -> Result<u16> {
        let index = self.entries.len();
        // constant_pool_count is a u16 and counts slots including slot 0.
        if index >= u16::MAX as usize {
            return Err(RemapError::ConstantPoolOverflow);
        }
        self.entries.push(Some(entry));
        Ok(index as u16)
    }

    /// Returns the index of a `Utf8` entry with this value, appending one if
    /// none exists. Existing entries are shared, never mutated.
    pub fn intern_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = mutf8::encode(value);
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if let Some(CpEntry::Utf8(existing)) = entry {
                if *existing == bytes {
                    return Ok(i as u16);
                }
            }
        }
        self.push(CpEntry::Utf8(bytes))
    }

    /// Returns the index of a `NameAndType` with these values, appending the
    /// entry (and its `Utf8`s) if needed.
    pub fn intern_name_and_type(&mut self, name: &str, desc: &str) -> Result<u16> {
        let name_index = self.intern_utf8(name)?;
        let descriptor_index = self.intern_utf8(desc)?;
        let wanted = CpEntry::NameAndType {
            name_index,
            descriptor_index,
        };
        for (i, entry) in self.entries.iter().enumerate().skip(1) {
            if entry.as_ref() == Some(&wanted) {
                return Ok(i as u16);
            }
        }
        self.push(wanted)
    }
}
