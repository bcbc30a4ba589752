//! Integration tests for carrying annotation attributes between classes

use std::sync::Arc;

use hotswap_classfile::annotation::element;
use hotswap_classfile::proxy::PARAMETER_METHOD;
use hotswap_classfile::{
    access, build_annotation_proxy, build_parameter_proxy, verify_class_file, AnnotationInfo,
    AnnotationsAttribute, Attribute, ClassFile, ConstantPool, DecodeError, ElementValue,
    ParameterAnnotationsAttribute, ProxyOptions, VerifyError, MAX_NESTING_DEPTH,
};

/// A class as a compiler would emit it: some unrelated constants first,
/// then `@Named(value = "svc", kind = Kind.SINGLETON, type = Integer.class)`
fn annotated_class() -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class("com/example/Service").unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    pool.add_string("unrelated literal").unwrap();
    pool.add_double(6.02e23).unwrap();

    let mut named = AnnotationInfo::new(pool.add_utf8("Lcom/example/Named;").unwrap());
    named.members.push((
        pool.add_utf8("value").unwrap(),
        ElementValue::Const {
            tag: element::STRING,
            index: pool.add_utf8("svc").unwrap(),
        },
    ));
    named.members.push((
        pool.add_utf8("kind").unwrap(),
        ElementValue::Enum {
            type_name_index: pool.add_utf8("Lcom/example/Kind;").unwrap(),
            const_name_index: pool.add_utf8("SINGLETON").unwrap(),
        },
    ));
    named.members.push((
        pool.add_utf8("type").unwrap(),
        ElementValue::Class {
            descriptor_index: pool.add_utf8("Ljava/lang/Integer;").unwrap(),
        },
    ));
    let attr_name = pool.add_utf8(AnnotationsAttribute::NAME).unwrap();
    let pool = Arc::new(pool);
    let body = AnnotationsAttribute::new(pool.clone(), vec![named])
        .encode_body()
        .unwrap();

    ClassFile {
        minor_version: 0,
        major_version: 52,
        pool,
        access_flags: access::PUBLIC | access::SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        attributes: vec![Attribute {
            name_index: attr_name,
            info: body,
        }],
    }
    .encode()
    .unwrap()
}

#[test]
fn test_transcode_attribute_from_compiled_class() {
    let original = ClassFile::decode(&annotated_class()).unwrap();
    verify_class_file(&original).unwrap();
    let attr = original.annotations().unwrap().expect("class is annotated");

    let bytes = build_annotation_proxy("proxy/Named$1", &attr, ProxyOptions::default()).unwrap();
    let proxy = ClassFile::decode(&bytes).unwrap();
    verify_class_file(&proxy).unwrap();

    // The proxy pool holds only what the proxy needs
    assert!(proxy.pool.len() < original.pool.len());

    let copied = proxy.annotations().unwrap().unwrap();
    let named = &copied.annotations[0];
    assert_eq!(named.type_descriptor(&proxy.pool), Some("Lcom/example/Named;"));

    let names: Vec<_> = named
        .members
        .iter()
        .map(|(n, _)| proxy.pool.utf8(*n).unwrap())
        .collect();
    assert_eq!(names, vec!["value", "kind", "type"]);

    match &named.members[1].1 {
        ElementValue::Enum {
            type_name_index,
            const_name_index,
        } => {
            assert_eq!(proxy.pool.utf8(*type_name_index), Some("Lcom/example/Kind;"));
            assert_eq!(proxy.pool.utf8(*const_name_index), Some("SINGLETON"));
        }
        other => panic!("expected enum, got {:?}", other),
    }
    match &named.members[2].1 {
        ElementValue::Class { descriptor_index } => {
            assert_eq!(proxy.pool.utf8(*descriptor_index), Some("Ljava/lang/Integer;"));
        }
        other => panic!("expected class literal, got {:?}", other),
    }
}

#[test]
fn test_parameter_proxy_verifies() {
    let original = ClassFile::decode(&annotated_class()).unwrap();
    let attr = original.annotations().unwrap().unwrap();
    let params = ParameterAnnotationsAttribute::new(
        attr.pool.clone(),
        vec![Vec::new(), attr.annotations.clone()],
    );

    let bytes = build_parameter_proxy("proxy/Params$1", &params, ProxyOptions::default()).unwrap();
    let proxy = ClassFile::decode(&bytes).unwrap();
    verify_class_file(&proxy).unwrap();

    let parsed = proxy.parameter_annotations(PARAMETER_METHOD).unwrap().unwrap();
    assert_eq!(parsed.parameter_count(), 2);
    assert_eq!(
        parsed.parameters[1][0].type_descriptor(&proxy.pool),
        Some("Lcom/example/Named;")
    );
}

#[test]
fn test_deeply_nested_attribute_is_rejected() {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class("com/example/Deep").unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let marker = pool.add_utf8("Lcom/example/Deep;").unwrap();
    let member = pool.add_utf8("value").unwrap();
    let attr_name = pool.add_utf8(AnnotationsAttribute::NAME).unwrap();

    // @Deep(value = {{{{ ... }}}}) with far more levels than any stack allows
    let mut body = vec![0, 1];
    body.extend_from_slice(&marker.to_be_bytes());
    body.extend_from_slice(&[0, 1]);
    body.extend_from_slice(&member.to_be_bytes());
    for _ in 0..200_000 {
        body.extend_from_slice(&[element::ARRAY, 0, 1]);
    }

    let bytes = ClassFile {
        minor_version: 0,
        major_version: 52,
        pool: Arc::new(pool),
        access_flags: access::PUBLIC | access::SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        attributes: vec![Attribute {
            name_index: attr_name,
            info: body,
        }],
    }
    .encode()
    .unwrap();

    let class = ClassFile::decode(&bytes).unwrap();
    let expected = DecodeError::NestingTooDeep {
        offset: 8 + 3 * MAX_NESTING_DEPTH,
    };
    assert_eq!(class.annotations().unwrap_err(), expected);
    assert!(matches!(
        verify_class_file(&class),
        Err(VerifyError::MalformedAttribute { source, .. }) if source == expected
    ));
}
