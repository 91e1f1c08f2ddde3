//! Programmatic classfile construction.
//!
//! Primarily a test facility: remap scenarios need precise little classes
//! (specific pool shapes, code bytes, variable tables) that would be
//! unwieldy to ship as binary fixtures.

use crate::classfile::{
    AttrInfo, Attribute, ClassFile, CodeAttr, LocalVariableEntry, MemberInfo, MethodParameter,
};
use crate::pool::{ConstantPool, CpEntry};
use crate::Result;

pub struct ClassBuilder {
    name: String,
    super_name: String,
    interfaces: Vec<String>,
    access_flags: u16,
    source_file: Option<String>,
    fields: Vec<(String, String, u16)>,
    methods: Vec<MethodSpec>,
    record_components: Vec<(String, String)>,
    pool: ConstantPool,
}

pub struct MethodSpec {
    name: String,
    desc: String,
    access_flags: u16,
    code: Option<CodeSpec>,
    parameter_names: Option<Vec<String>>,
}

struct CodeSpec {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    locals: Vec<(u16, u16, String, String, u16)>,
}

impl MethodSpec {
    pub fn new(name: &str, desc: &str, access_flags: u16) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            access_flags,
            code: None,
            parameter_names: None,
        }
    }

    pub fn code(mut self, max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        self.code = Some(CodeSpec {
            max_stack,
            max_locals,
            code,
            locals: Vec::new(),
        });
        self
    }

    /// Adds a LocalVariableTable row; requires [`MethodSpec::code`] first.
    pub fn local(mut self, start_pc: u16, length: u16, name: &str, desc: &str, index: u16) -> Self {
        self.code
            .as_mut()
            .expect("local() requires code()")
            .locals
            .push((start_pc, length, name.to_string(), desc.to_string(), index));
        self
    }

    pub fn parameter_names(mut self, names: &[&str]) -> Self {
        self.parameter_names = Some(names.iter().map(|s| s.to_string()).collect());
        self
    }
}

impl ClassBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            interfaces: Vec::new(),
            access_flags: 0x0021, // public super
            source_file: None,
            fields: Vec::new(),
            methods: Vec::new(),
            record_components: Vec::new(),
            pool: ConstantPool::new(),
        }
    }

    pub fn super_class(mut self, name: &str) -> Self {
        self.super_name = name.to_string();
        self
    }

    pub fn interfaces(mut self, names: &[&str]) -> Self {
        self.interfaces = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn access(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn source_file(mut self, name: &str) -> Self {
        self.source_file = Some(name.to_string());
        self
    }

    pub fn field(mut self, name: &str, desc: &str, access_flags: u16) -> Self {
        self.fields
            .push((name.to_string(), desc.to_string(), access_flags));
        self
    }

    pub fn method(self, name: &str, desc: &str, access_flags: u16) -> Self {
        self.with_method(MethodSpec::new(name, desc, access_flags))
    }

    pub fn with_method(mut self, spec: MethodSpec) -> Self {
        self.methods.push(spec);
        self
    }

    pub fn record_component(mut self, name: &str, desc: &str) -> Self {
        self.record_components.push((name.to_string(), desc.to_string()));
        self
    }

    /// Interns a `Methodref`, for embedding its index in code bytes.
    pub fn method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.push_ref(owner, name, desc, RefKind::Method)
    }

    pub fn field_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.push_ref(owner, name, desc, RefKind::Field)
    }

    pub fn interface_method_ref(&mut self, owner: &str, name: &str, desc: &str) -> u16 {
        self.push_ref(owner, name, desc, RefKind::InterfaceMethod)
    }

    pub fn method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.pool
            .push_entry(CpEntry::MethodHandle {
                reference_kind,
                reference_index,
            })
            .expect("pool has room")
    }

    pub fn method_type(&mut self, desc: &str) -> u16 {
        let descriptor_index = self.pool.intern_utf8(desc).expect("pool has room");
        self.pool
            .push_entry(CpEntry::MethodType { descriptor_index })
            .expect("pool has room")
    }

    pub fn invoke_dynamic(&mut self, bootstrap_index: u16, name: &str, desc: &str) -> u16 {
        let nat = self
            .pool
            .intern_name_and_type(name, desc)
            .expect("pool has room");
        self.pool
            .push_entry(CpEntry::InvokeDynamic {
                bootstrap_method_attr_index: bootstrap_index,
                name_and_type_index: nat,
            })
            .expect("pool has room")
    }

    fn push_ref(&mut self, owner: &str, name: &str, desc: &str, kind: RefKind) -> u16 {
        let class_index = self.pool.intern_class(owner).expect("pool has room");
        let name_and_type_index = self
            .pool
            .intern_name_and_type(name, desc)
            .expect("pool has room");
        let entry = match kind {
            RefKind::Field => CpEntry::Fieldref {
                class_index,
                name_and_type_index,
            },
            RefKind::Method => CpEntry::Methodref {
                class_index,
                name_and_type_index,
            },
            RefKind::InterfaceMethod => CpEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            },
        };
        self.pool.push_entry(entry).expect("pool has room")
    }

    pub fn build(mut self) -> ClassFile {
        self.try_build().expect("class builds")
    }

    fn try_build(&mut self) -> Result<ClassFile> {
        let pool = &mut self.pool;
        let this_class = pool.intern_class(&self.name)?;
        let super_class = pool.intern_class(&self.super_name)?;
        let interfaces = self
            .interfaces
            .iter()
            .map(|i| pool.intern_class(i))
            .collect::<Result<Vec<_>>>()?;

        let mut fields = Vec::with_capacity(self.fields.len());
        for (name, desc, access_flags) in &self.fields {
            fields.push(MemberInfo {
                access_flags: *access_flags,
                name_index: pool.intern_utf8(name)?,
                descriptor_index: pool.intern_utf8(desc)?,
                attributes: Vec::new(),
            });
        }

        let mut methods = Vec::with_capacity(self.methods.len());
        for spec in &self.methods {
            let mut attributes = Vec::new();

            if let Some(code_spec) = &spec.code {
                let mut code_attrs = Vec::new();
                if !code_spec.locals.is_empty() {
                    let entries = code_spec
                        .locals
                        .iter()
                        .map(|(start_pc, length, name, desc, index)| {
                            Ok(LocalVariableEntry {
                                start_pc: *start_pc,
                                length: *length,
                                name_index: pool.intern_utf8(name)?,
                                descriptor_index: pool.intern_utf8(desc)?,
                                index: *index,
                            })
                        })
                        .collect::<Result<Vec<_>>>()?;
                    code_attrs.push(Attribute {
                        name_index: pool.intern_utf8("LocalVariableTable")?,
                        info: AttrInfo::LocalVariableTable(entries),
                    });
                }
                attributes.push(Attribute {
                    name_index: pool.intern_utf8("Code")?,
                    info: AttrInfo::Code(CodeAttr {
                        max_stack: code_spec.max_stack,
                        max_locals: code_spec.max_locals,
                        code: code_spec.code.clone(),
                        exceptions: Vec::new(),
                        attributes: code_attrs,
                    }),
                });
            }

            if let Some(names) = &spec.parameter_names {
                let params = names
                    .iter()
                    .map(|name| {
                        Ok(MethodParameter {
                            name_index: if name.is_empty() {
                                0
                            } else {
                                pool.intern_utf8(name)?
                            },
                            access_flags: 0,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                attributes.push(Attribute {
                    name_index: pool.intern_utf8("MethodParameters")?,
                    info: AttrInfo::MethodParameters(params),
                });
            }

            methods.push(MemberInfo {
                access_flags: spec.access_flags,
                name_index: pool.intern_utf8(&spec.name)?,
                descriptor_index: pool.intern_utf8(&spec.desc)?,
                attributes,
            });
        }

        let mut attributes = Vec::new();
        if !self.record_components.is_empty() {
            let components = self
                .record_components
                .iter()
                .map(|(name, desc)| {
                    Ok(crate::classfile::RecordComponent {
                        name_index: pool.intern_utf8(name)?,
                        descriptor_index: pool.intern_utf8(desc)?,
                        attributes: Vec::new(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            attributes.push(Attribute {
                name_index: pool.intern_utf8("Record")?,
                info: AttrInfo::Record(components),
            });
        }
        if let Some(source_file) = &self.source_file {
            let sourcefile_index = pool.intern_utf8(source_file)?;
            attributes.push(Attribute {
                name_index: pool.intern_utf8("SourceFile")?,
                info: AttrInfo::SourceFile { sourcefile_index },
            });
        }

        Ok(ClassFile {
            minor_version: 0,
            major_version: 61,
            pool: std::mem::replace(pool, ConstantPool::new()),
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}

enum RefKind {
    Field,
    Method,
    InterfaceMethod,
}
