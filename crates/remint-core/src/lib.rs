//! Shared, dependency-minimized core types used across the remint pipeline.
//!
//! Everything here operates on JVM *internal names* (`java/lang/Object`) and
//! *descriptors* (`Ljava/lang/String;`, `(IJ)V`). Higher-level crates depend
//! on this one for the common vocabulary so they never disagree about name
//! forms.

pub mod descriptor;
pub mod keywords;
pub mod name;

pub use descriptor::{
    method_descriptor_params, method_descriptor_return, parse_method_descriptor,
    remap_descriptor, type_width, MethodDescriptor,
};
pub use keywords::{is_java_keyword, is_valid_java_identifier};
pub use name::{binary_name, internal_name, simple_class_name, source_file_name};
