//! Class-File Structures for the Hotswap Agent
//!
//! This crate provides the constant pool, annotation attribute model,
//! class-file encoding and the proxy-definition builders used to carry
//! recorded annotation data into freshly synthesized classes.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod annotation;
pub mod classfile;
pub mod constants;
pub mod descriptor;
pub mod encoder;
pub mod proxy;
pub mod verify;

pub use annotation::{
    AnnotationInfo, AnnotationsAttribute, CodecError, ElementValue, ParameterAnnotationsAttribute,
    MAX_NESTING_DEPTH,
};
pub use classfile::{access, Attribute, ClassFile, MemberInfo};
pub use constants::{Constant, ConstantPool};
pub use encoder::{ClassReader, ClassWriter, DecodeError};
pub use proxy::{build_annotation_proxy, build_parameter_proxy, ProxyOptions};
pub use verify::{verify_class_file, VerifyError};
