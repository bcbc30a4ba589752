//! Proxy definitions
//!
//! A proxy is the smallest class that can carry an annotation attribute:
//! public, extending `java/lang/Object`, no fields, and nothing else but the
//! copied attribute. Parameter annotations need a method to hang on, so
//! parameter proxies are abstract and declare one abstract method whose
//! arity matches the recorded parameter count.
//!
//! Building is pure: the same attribute and name always give the same bytes.

use std::sync::Arc;

use crate::annotation::{AnnotationsAttribute, CodecError, ParameterAnnotationsAttribute};
use crate::classfile::{access, Attribute, ClassFile, MemberInfo, MIN_ANNOTATION_MAJOR};
use crate::constants::ConstantPool;
use crate::descriptor::object_method_descriptor;

/// Superclass of every proxy
pub const PROXY_SUPERCLASS: &str = "java/lang/Object";

/// Name of the method carrying parameter annotations
pub const PARAMETER_METHOD: &str = "parameters";

/// Options for proxy assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyOptions {
    /// Class-file major version to emit
    pub major_version: u16,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            major_version: MIN_ANNOTATION_MAJOR,
        }
    }
}

/// Start a proxy class with `this` and `super` already in the pool
fn proxy_shell(
    internal_name: &str,
    access_flags: u16,
    options: ProxyOptions,
) -> Result<(ConstantPool, ClassFile), CodecError> {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class(internal_name)?;
    let super_class = pool.add_class(PROXY_SUPERCLASS)?;
    let class = ClassFile {
        minor_version: 0,
        major_version: options.major_version,
        pool: Arc::new(ConstantPool::new()),
        access_flags,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        attributes: Vec::new(),
    };
    Ok((pool, class))
}

/// Assemble a proxy carrying `annotations` as its class-level attribute
pub fn build_annotation_proxy(
    internal_name: &str,
    annotations: &AnnotationsAttribute,
    options: ProxyOptions,
) -> Result<Vec<u8>, CodecError> {
    let (mut pool, mut class) = proxy_shell(
        internal_name,
        access::PUBLIC | access::SUPER | access::SYNTHETIC,
        options,
    )?;

    let name_index = pool.add_utf8(AnnotationsAttribute::NAME)?;
    let info = annotations.copy_body_to(&mut pool)?;
    class.attributes.push(Attribute { name_index, info });
    class.pool = Arc::new(pool);

    tracing::trace!(
        proxy = internal_name,
        annotations = annotations.len(),
        "assembled annotation proxy"
    );
    class.encode()
}

/// Assemble a proxy whose single method carries `parameters`
pub fn build_parameter_proxy(
    internal_name: &str,
    parameters: &ParameterAnnotationsAttribute,
    options: ProxyOptions,
) -> Result<Vec<u8>, CodecError> {
    let (mut pool, mut class) = proxy_shell(
        internal_name,
        access::PUBLIC | access::SUPER | access::ABSTRACT | access::SYNTHETIC,
        options,
    )?;

    let method_name = pool.add_utf8(PARAMETER_METHOD)?;
    let descriptor = pool.add_utf8(&object_method_descriptor(parameters.parameter_count()))?;
    let attribute_name = pool.add_utf8(ParameterAnnotationsAttribute::NAME)?;
    let info = parameters.copy_body_to(&mut pool)?;
    class.methods.push(MemberInfo {
        access_flags: access::PUBLIC | access::ABSTRACT,
        name_index: method_name,
        descriptor_index: descriptor,
        attributes: vec![Attribute {
            name_index: attribute_name,
            info,
        }],
    });
    class.pool = Arc::new(pool);

    tracing::trace!(
        proxy = internal_name,
        parameters = parameters.parameter_count(),
        "assembled parameter proxy"
    );
    class.encode()
}
