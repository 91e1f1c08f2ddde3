//! A lossless, shallowly-parsed classfile model.
//!
//! Attributes the remapper edits are parsed into structure; everything else
//! is carried as raw bytes. Because the constant pool is append-only, raw
//! attributes (code bodies, stack maps, bootstrap methods, annotations) stay
//! valid without inspection, and serializing an untouched class reproduces
//! the input bit-for-bit.

use crate::pool::ConstantPool;
use crate::reader::{Reader, Writer};
use crate::{RemapError, Result};

pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_BRIDGE: u16 = 0x0040;
pub const ACC_SYNTHETIC: u16 = 0x1000;

const MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name_index: u16,
    pub info: AttrInfo,
}

#[derive(Debug, Clone)]
pub enum AttrInfo {
    /// Anything the remapper does not edit, byte-preserved.
    Raw(Vec<u8>),
    SourceFile {
        sourcefile_index: u16,
    },
    Signature {
        signature_index: u16,
    },
    EnclosingMethod {
        class_index: u16,
        method_index: u16,
    },
    InnerClasses(Vec<InnerClassEntry>),
    Record(Vec<RecordComponent>),
    Code(CodeAttr),
    LocalVariableTable(Vec<LocalVariableEntry>),
    LocalVariableTypeTable(Vec<LocalVariableEntry>),
    MethodParameters(Vec<MethodParameter>),
}

#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    pub inner_class_info: u16,
    pub outer_class_info: u16,
    pub inner_name_index: u16,
    pub access_flags: u16,
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub struct CodeAttr {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exceptions: Vec<ExceptionTableEntry>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Copy)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Shared shape of `LocalVariableTable` and `LocalVariableTypeTable` rows;
/// for the latter, `descriptor_index` holds the signature.
#[derive(Debug, Clone, Copy)]
pub struct LocalVariableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

#[derive(Debug, Clone, Copy)]
pub struct MethodParameter {
    pub name_index: u16,
    pub access_flags: u16,
}

#[derive(Clone, Copy, PartialEq)]
enum AttrTarget {
    Class,
    Field,
    Method,
    Code,
    RecordComponent,
}

impl ClassFile {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(RemapError::InvalidMagic(magic));
        }

        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        let pool = ConstantPool::parse(&mut reader)?;

        let access_flags = reader.read_u2()?;
        let this_class = reader.read_u2()?;
        let super_class = reader.read_u2()?;

        let interfaces_count = reader.read_u2()? as usize;
        let mut interfaces = Vec::with_capacity(interfaces_count);
        for _ in 0..interfaces_count {
            interfaces.push(reader.read_u2()?);
        }

        let fields = parse_members(&mut reader, &pool, AttrTarget::Field)?;
        let methods = parse_members(&mut reader, &pool, AttrTarget::Method)?;
        let attributes = parse_attributes(&mut reader, &pool, AttrTarget::Class)?;

        reader.ensure_empty()?;

        Ok(Self {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Writer::new();
        out.write_u4(MAGIC);
        out.write_u2(self.minor_version);
        out.write_u2(self.major_version);
        self.pool.serialize(&mut out);
        out.write_u2(self.access_flags);
        out.write_u2(self.this_class);
        out.write_u2(self.super_class);
        out.write_u2(self.interfaces.len() as u16);
        for iface in &self.interfaces {
            out.write_u2(*iface);
        }
        write_members(&mut out, &self.fields);
        write_members(&mut out, &self.methods);
        write_attributes(&mut out, &self.attributes);
        out.into_bytes()
    }

    pub fn this_class_name(&self) -> Result<String> {
        self.pool.class_name(self.this_class)
    }

    pub fn super_class_name(&self) -> Result<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(self.pool.class_name(self.super_class)?))
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .iter()
            .map(|&idx| self.pool.class_name(idx))
            .collect()
    }
}

impl MemberInfo {
    pub fn name(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.name_index)
    }

    pub fn descriptor(&self, pool: &ConstantPool) -> Result<String> {
        pool.utf8(self.descriptor_index)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    pub fn code(&self) -> Option<&CodeAttr> {
        self.attributes.iter().find_map(|attr| match &attr.info {
            AttrInfo::Code(code) => Some(code),
            _ => None,
        })
    }

    pub fn code_mut(&mut self) -> Option<&mut CodeAttr> {
        self.attributes.iter_mut().find_map(|attr| match &mut attr.info {
            AttrInfo::Code(code) => Some(code),
            _ => None,
        })
    }
}

fn parse_members(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    target: AttrTarget,
) -> Result<Vec<MemberInfo>> {
    let count = reader.read_u2()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access_flags = reader.read_u2()?;
        let name_index = reader.read_u2()?;
        let descriptor_index = reader.read_u2()?;
        let attributes = parse_attributes(reader, pool, target)?;
        members.push(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        });
    }
    Ok(members)
}

fn parse_attributes(
    reader: &mut Reader<'_>,
    pool: &ConstantPool,
    target: AttrTarget,
) -> Result<Vec<Attribute>> {
    let count = reader.read_u2()? as usize;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let info_bytes = reader.read_bytes(length)?;
        let name = pool.utf8(name_index)?;

        let mut sub = Reader::new(info_bytes);
        let info = match (name.as_str(), target) {
            ("SourceFile", AttrTarget::Class) => {
                let sourcefile_index = sub.read_u2()?;
                sub.ensure_empty()?;
                AttrInfo::SourceFile { sourcefile_index }
            }
            ("Signature", _) => {
                let signature_index = sub.read_u2()?;
                sub.ensure_empty()?;
                AttrInfo::Signature { signature_index }
            }
            ("EnclosingMethod", AttrTarget::Class) => {
                let class_index = sub.read_u2()?;
                let method_index = sub.read_u2()?;
                sub.ensure_empty()?;
                AttrInfo::EnclosingMethod {
                    class_index,
                    method_index,
                }
            }
            ("InnerClasses", AttrTarget::Class) => {
                let num = sub.read_u2()? as usize;
                let mut entries = Vec::with_capacity(num);
                for _ in 0..num {
                    entries.push(InnerClassEntry {
                        inner_class_info: sub.read_u2()?,
                        outer_class_info: sub.read_u2()?,
                        inner_name_index: sub.read_u2()?,
                        access_flags: sub.read_u2()?,
                    });
                }
                sub.ensure_empty()?;
                AttrInfo::InnerClasses(entries)
            }
            ("Record", AttrTarget::Class) => {
                let num = sub.read_u2()? as usize;
                let mut components = Vec::with_capacity(num);
                for _ in 0..num {
                    let name_index = sub.read_u2()?;
                    let descriptor_index = sub.read_u2()?;
                    let attributes =
                        parse_attributes(&mut sub, pool, AttrTarget::RecordComponent)?;
                    components.push(RecordComponent {
                        name_index,
                        descriptor_index,
                        attributes,
                    });
                }
                sub.ensure_empty()?;
                AttrInfo::Record(components)
            }
            ("Code", AttrTarget::Method) => {
                let max_stack = sub.read_u2()?;
                let max_locals = sub.read_u2()?;
                let code_length = sub.read_u4()? as usize;
                let code = sub.read_bytes(code_length)?.to_vec();
                let exception_count = sub.read_u2()? as usize;
                let mut exceptions = Vec::with_capacity(exception_count);
                for _ in 0..exception_count {
                    exceptions.push(ExceptionTableEntry {
                        start_pc: sub.read_u2()?,
                        end_pc: sub.read_u2()?,
                        handler_pc: sub.read_u2()?,
                        catch_type: sub.read_u2()?,
                    });
                }
                let attributes = parse_attributes(&mut sub, pool, AttrTarget::Code)?;
                sub.ensure_empty()?;
                AttrInfo::Code(CodeAttr {
                    max_stack,
                    max_locals,
                    code,
                    exceptions,
                    attributes,
                })
            }
            ("LocalVariableTable", AttrTarget::Code) => {
                AttrInfo::LocalVariableTable(parse_local_variables(&mut sub)?)
            }
            ("LocalVariableTypeTable", AttrTarget::Code) => {
                AttrInfo::LocalVariableTypeTable(parse_local_variables(&mut sub)?)
            }
            ("MethodParameters", AttrTarget::Method) => {
                let num = sub.read_u1()? as usize;
                let mut params = Vec::with_capacity(num);
                for _ in 0..num {
                    params.push(MethodParameter {
                        name_index: sub.read_u2()?,
                        access_flags: sub.read_u2()?,
                    });
                }
                sub.ensure_empty()?;
                AttrInfo::MethodParameters(params)
            }
            _ => AttrInfo::Raw(info_bytes.to_vec()),
        };

        attributes.push(Attribute { name_index, info });
    }
    Ok(attributes)
}

fn parse_local_variables(sub: &mut Reader<'_>) -> Result<Vec<LocalVariableEntry>> {
    let num = sub.read_u2()? as usize;
    let mut entries = Vec::with_capacity(num);
    for _ in 0..num {
        entries.push(LocalVariableEntry {
            start_pc: sub.read_u2()?,
            length: sub.read_u2()?,
            name_index: sub.read_u2()?,
            descriptor_index: sub.read_u2()?,
            index: sub.read_u2()?,
        });
    }
    sub.ensure_empty()?;
    Ok(entries)
}

fn write_members(out: &mut Writer, members: &[MemberInfo]) {
    out.write_u2(members.len() as u16);
    for member in members {
        out.write_u2(member.access_flags);
        out.write_u2(member.name_index);
        out.write_u2(member.descriptor_index);
        write_attributes(out, &member.attributes);
    }
}

fn write_attributes(out: &mut Writer, attributes: &[Attribute]) {
    out.write_u2(attributes.len() as u16);
    for attr in attributes {
        out.write_u2(attr.name_index);
        let body = serialize_attr_info(&attr.info);
        out.write_u4(body.len() as u32);
        out.write_bytes(&body);
    }
}

fn serialize_attr_info(info: &AttrInfo) -> Vec<u8> {
    let mut out = Writer::new();
    match info {
        AttrInfo::Raw(bytes) => out.write_bytes(bytes),
        AttrInfo::SourceFile { sourcefile_index } => out.write_u2(*sourcefile_index),
        AttrInfo::Signature { signature_index } => out.write_u2(*signature_index),
        AttrInfo::EnclosingMethod {
            class_index,
            method_index,
        } => {
            out.write_u2(*class_index);
            out.write_u2(*method_index);
        }
        AttrInfo::InnerClasses(entries) => {
            out.write_u2(entries.len() as u16);
            for entry in entries {
                out.write_u2(entry.inner_class_info);
                out.write_u2(entry.outer_class_info);
                out.write_u2(entry.inner_name_index);
                out.write_u2(entry.access_flags);
            }
        }
        AttrInfo::Record(components) => {
            out.write_u2(components.len() as u16);
            for component in components {
                out.write_u2(component.name_index);
                out.write_u2(component.descriptor_index);
                write_attributes(&mut out, &component.attributes);
            }
        }
        AttrInfo::Code(code) => {
            out.write_u2(code.max_stack);
            out.write_u2(code.max_locals);
            out.write_u4(code.code.len() as u32);
            out.write_bytes(&code.code);
            out.write_u2(code.exceptions.len() as u16);
            for entry in &code.exceptions {
                out.write_u2(entry.start_pc);
                out.write_u2(entry.end_pc);
                out.write_u2(entry.handler_pc);
                out.write_u2(entry.catch_type);
            }
            write_attributes(&mut out, &code.attributes);
        }
        AttrInfo::LocalVariableTable(entries) | AttrInfo::LocalVariableTypeTable(entries) => {
            out.write_u2(entries.len() as u16);
            for entry in entries {
                out.write_u2(entry.start_pc);
                out.write_u2(entry.length);
                out.write_u2(entry.name_index);
                out.write_u2(entry.descriptor_index);
                out.write_u2(entry.index);
            }
        }
        AttrInfo::MethodParameters(params) => {
            out.write_u1(params.len() as u8);
            for param in params {
                out.write_u2(param.name_index);
                out.write_u2(param.access_flags);
            }
        }
    }
    out.into_bytes()
}
