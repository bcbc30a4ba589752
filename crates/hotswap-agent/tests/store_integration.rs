//! End-to-end recording and querying through the metadata service

use std::sync::Arc;
use std::thread;

use hotswap_agent::marker::{annotations_attribute, parameter_annotations_attribute};
use hotswap_agent::{
    AgentConfig, Annotation, AnnotationError, AnnotationService, ClassKey, ClassLoader,
    ConstructorKey, DefinitionRegistry, FieldKey, LoadError, MarkerDecl, MarkerType, MemberValue,
    MethodKey, ReflectiveKey, RuntimeLoader, SynthesisError,
};
use hotswap_classfile::{access, Attribute, AnnotationsAttribute, ClassFile, ConstantPool};

const TAG: &str = "com.example.Tag";
const TAGS: &str = "com.example.Tags";

struct Fixture {
    service: AnnotationService,
    loader: Arc<RuntimeLoader>,
}

impl Fixture {
    fn new() -> Self {
        let registry = Arc::new(DefinitionRegistry::new());
        let service = AnnotationService::new(AgentConfig::default(), registry.clone()).unwrap();
        let loader = Arc::new(RuntimeLoader::new("app", registry));
        loader.declare_marker(MarkerDecl::new(TAG).member("value"));
        loader.declare_marker(MarkerDecl::new(TAGS).member("value"));
        loader.declare_marker(
            MarkerDecl::new("com.example.Limit")
                .member("max")
                .member_with_default("unit", MemberValue::Class("java.lang.Integer".to_string())),
        );
        loader.declare_marker(MarkerDecl::new("com.example.Wrapper").member("inner"));
        Self { service, loader }
    }

    fn synthesis_count(&self) -> u64 {
        self.service.store().synthesizer().synthesis_count()
    }
}

fn tag(value: &str) -> Annotation {
    Annotation::new(TAG).with("value", MemberValue::String(value.to_string()))
}

fn marker(name: &str) -> MarkerType {
    MarkerType::new(name)
}

/// A class file as the compiler left it, with optional class-level annotations
fn class_bytes(name: &str, annotations: &[Annotation]) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let this_class = pool.add_class(name).unwrap();
    let super_class = pool.add_class("java/lang/Object").unwrap();
    let mut attributes = Vec::new();
    if !annotations.is_empty() {
        let attr = annotations_attribute(annotations).unwrap();
        let name_index = pool.add_utf8(AnnotationsAttribute::NAME).unwrap();
        let info = attr.copy_body_to(&mut pool).unwrap();
        attributes.push(Attribute { name_index, info });
    }
    ClassFile {
        minor_version: 0,
        major_version: 52,
        pool: Arc::new(pool),
        access_flags: access::PUBLIC | access::SUPER,
        this_class,
        super_class,
        interfaces: Vec::new(),
        fields: Vec::new(),
        methods: Vec::new(),
        attributes,
    }
    .encode()
    .unwrap()
}

#[test]
fn test_unrecorded_key_is_flagged() {
    let fx = Fixture::new();
    let query = fx.service.query();
    let field = FieldKey::new(ClassKey::new(1), 1);

    assert!(!query.is_field_data_recorded(field));
    assert!(matches!(
        query.get_field_annotations(field),
        Err(AnnotationError::Unrecorded(ReflectiveKey::Field(k))) if k == field
    ));
    assert!(query.get_field_annotation(field, &marker(TAG)).is_err());
    assert!(query.is_field_annotation_present(field, &marker(TAG)).is_err());
    // Reads do not populate
    assert!(!query.is_field_data_recorded(field));
}

#[test]
fn test_absent_attribute_fast_path() {
    let fx = Fixture::new();
    let store = fx.service.store();
    let class = ClassKey::new(2);
    let field = FieldKey::new(class, 1);
    let method = MethodKey::new(class, 2);
    let ctor = ConstructorKey::new(class, 3);

    store.record_class_annotations(class, fx.loader.as_ref(), None).unwrap();
    store.record_field_annotations(field, fx.loader.as_ref(), None).unwrap();
    store.record_method_annotations(method, fx.loader.as_ref(), None).unwrap();
    store.record_constructor_annotations(ctor, fx.loader.as_ref(), None).unwrap();

    let query = fx.service.query();
    assert!(query.get_class_annotations(class).unwrap().is_empty());
    assert!(query.get_field_annotations(field).unwrap().is_empty());
    assert!(!query.is_method_annotation_present(method, &marker(TAG)).unwrap());
    assert_eq!(query.get_constructor_annotation(ctor, &marker(TAG)).unwrap(), None);
    assert_eq!(fx.synthesis_count(), 0);
}

#[test]
fn test_single_string_marker_on_field() {
    let fx = Fixture::new();
    let field = FieldKey::new(ClassKey::new(3), 1);
    let attr = annotations_attribute(&[tag("1")]).unwrap();

    fx.service
        .store()
        .record_field_annotations(field, fx.loader.as_ref(), Some(&attr))
        .unwrap();

    let query = fx.service.query();
    assert!(query.is_field_annotation_present(field, &marker(TAG)).unwrap());
    let found = query.get_field_annotation(field, &marker(TAG)).unwrap().unwrap();
    assert_eq!(found.value().and_then(MemberValue::as_str), Some("1"));
    assert_eq!(fx.synthesis_count(), 1);
}

#[test]
fn test_array_of_nested_markers() {
    let fx = Fixture::new();
    let field = FieldKey::new(ClassKey::new(4), 1);
    let tags = Annotation::new(TAGS).with(
        "value",
        MemberValue::Array(vec![
            MemberValue::Annotation(Box::new(tag("1"))),
            MemberValue::Annotation(Box::new(tag("2"))),
        ]),
    );
    let attr = annotations_attribute(&[tags]).unwrap();
    fx.service
        .store()
        .record_field_annotations(field, fx.loader.as_ref(), Some(&attr))
        .unwrap();

    let found = fx
        .service
        .query()
        .get_field_annotation(field, &marker(TAGS))
        .unwrap()
        .unwrap();
    let values: Vec<&str> = found
        .value()
        .and_then(MemberValue::as_array)
        .unwrap()
        .iter()
        .map(|v| {
            v.as_annotation()
                .and_then(Annotation::value)
                .and_then(MemberValue::as_str)
                .unwrap()
        })
        .collect();
    assert_eq!(values, vec!["1", "2"]);
}

#[test]
fn test_class_annotations_survive_replacement() {
    let fx = Fixture::new();
    let original_bytes = class_bytes("com/example/Service", &[tag("1")]);
    let original = fx.loader.define_class(&original_bytes).unwrap();
    assert!(original.is_annotation_present(&marker(TAG)));

    // The engine records from the original definition before replacing it
    let original_key = ClassKey::new(100);
    let attr = ClassFile::decode(&original_bytes).unwrap().annotations().unwrap();
    fx.service
        .store()
        .record_class_annotations(original_key, fx.loader.as_ref(), attr.as_ref())
        .unwrap();

    fx.loader
        .redefine_class(&class_bytes("com/example/Service", &[]))
        .unwrap();

    let replaced = fx.loader.load_class("com/example/Service").unwrap();
    assert!(replaced.annotations().is_empty());
    assert!(!replaced.is_annotation_present(&marker(TAG)));

    let kept = fx
        .service
        .query()
        .get_class_annotation(original_key, &marker(TAG))
        .unwrap();
    assert_eq!(kept, Some(tag("1")));
}

#[test]
fn test_round_trip_fidelity() {
    let fx = Fixture::new();
    let method = MethodKey::new(ClassKey::new(5), 1);
    let written = vec![
        tag("x"),
        Annotation::new("com.example.Limit").with("max", MemberValue::Int(10)),
        Annotation::new("com.example.Wrapper").with(
            "inner",
            MemberValue::Annotation(Box::new(
                Annotation::new("com.example.Limit")
                    .with("max", MemberValue::Int(-1))
                    .with("unit", MemberValue::Class("I".to_string())),
            )),
        ),
    ];
    let attr = annotations_attribute(&written).unwrap();
    fx.service
        .store()
        .record_method_annotations(method, fx.loader.as_ref(), Some(&attr))
        .unwrap();

    let query = fx.service.query();
    let set = query.get_method_annotations(method).unwrap();
    let types: Vec<&str> = set.iter().map(|a| a.marker.as_str()).collect();
    assert_eq!(types, vec![TAG, "com.example.Limit", "com.example.Wrapper"]);

    // Declared default filled in by the loader
    let limit = query
        .get_method_annotation(method, &marker("com.example.Limit"))
        .unwrap()
        .unwrap();
    assert_eq!(limit.member("max"), Some(&MemberValue::Int(10)));
    assert_eq!(
        limit.member("unit").and_then(MemberValue::as_class),
        Some("java.lang.Integer")
    );

    let wrapper = query
        .get_method_annotation(method, &marker("com.example.Wrapper"))
        .unwrap()
        .unwrap();
    let inner = wrapper.member("inner").and_then(MemberValue::as_annotation).unwrap();
    assert_eq!(inner.member("max").and_then(MemberValue::as_int), Some(-1));
    assert_eq!(inner.member("unit").and_then(MemberValue::as_class), Some("I"));

    assert_eq!(
        query.get_method_annotation(method, &marker("com.example.Absent")).unwrap(),
        None
    );
}

#[test]
fn test_per_entity_isolation() {
    let fx = Fixture::new();
    let class = ClassKey::new(6);
    let a = FieldKey::new(class, 1);
    let b = FieldKey::new(class, 2);
    let store = fx.service.store();

    let attr = annotations_attribute(&[tag("a")]).unwrap();
    store.record_field_annotations(a, fx.loader.as_ref(), Some(&attr)).unwrap();
    assert!(!store.is_field_data_recorded(b));
    assert!(!store.is_class_data_recorded(class));
    assert!(!store.is_method_data_recorded(MethodKey::new(class, 1)));

    store.record_field_annotations(b, fx.loader.as_ref(), None).unwrap();
    assert_eq!(
        store.get_field_annotation(a, &marker(TAG)).unwrap(),
        Some(tag("a"))
    );
    assert!(store.get_field_annotations(b).unwrap().is_empty());
}

#[test]
fn test_rerecord_replaces_whole_set() {
    let fx = Fixture::new();
    let field = FieldKey::new(ClassKey::new(7), 1);
    let store = fx.service.store();

    let first = annotations_attribute(&[tag("old"), Annotation::new("com.example.Limit")]).unwrap();
    store.record_field_annotations(field, fx.loader.as_ref(), Some(&first)).unwrap();
    let before = store.get_field_annotations(field).unwrap();

    let second = annotations_attribute(&[tag("new")]).unwrap();
    store.record_field_annotations(field, fx.loader.as_ref(), Some(&second)).unwrap();

    let after = store.get_field_annotations(field).unwrap();
    assert_eq!(after.annotations(), &[tag("new")]);
    assert!(!store
        .is_field_annotation_present(field, &marker("com.example.Limit"))
        .unwrap());
    // Holders of the old set keep a consistent snapshot
    assert_eq!(before.len(), 2);
}

#[test]
fn test_unknown_marker_leaves_key_unrecorded() {
    let fx = Fixture::new();
    let class = ClassKey::new(8);
    let attr = annotations_attribute(&[Annotation::new("com.example.NotLoaded")]).unwrap();

    let err = fx
        .service
        .store()
        .record_class_annotations(class, fx.loader.as_ref(), Some(&attr))
        .unwrap_err();
    assert!(matches!(
        &err,
        AnnotationError::Synthesis {
            source: SynthesisError::Load {
                source: LoadError::MarkerNotFound { .. },
                ..
            },
            ..
        }
    ));
    assert_eq!(err.key(), ReflectiveKey::Class(class));
    assert!(!fx.service.query().is_class_data_recorded(class));

    // Other keys are unaffected
    fx.service
        .store()
        .record_class_annotations(ClassKey::new(9), fx.loader.as_ref(), None)
        .unwrap();
    assert!(fx.service.query().is_class_data_recorded(ClassKey::new(9)));
}

#[test]
fn test_parameter_annotations() {
    let fx = Fixture::new();
    let class = ClassKey::new(10);
    let method = MethodKey::new(class, 1);
    let ctor = ConstructorKey::new(class, 2);
    let store = fx.service.store();

    let attr = parameter_annotations_attribute(&[vec![], vec![tag("p1")], vec![]]).unwrap();
    store
        .record_method_parameter_annotations(method, fx.loader.as_ref(), 3, Some(&attr))
        .unwrap();
    store
        .record_constructor_parameter_annotations(ctor, fx.loader.as_ref(), 1, None)
        .unwrap();

    let query = fx.service.query();
    let params = query.get_method_parameter_annotations(method).unwrap();
    assert_eq!(params.len(), 3);
    assert!(params[0].is_empty());
    assert_eq!(params.parameter(1).unwrap().get(&marker(TAG)), Some(&tag("p1")));
    assert!(params[2].is_empty());

    let ctor_params = query.get_constructor_parameter_annotations(ctor).unwrap();
    assert_eq!(ctor_params.len(), 1);
    assert!(ctor_params[0].is_empty());

    // Parameter data is separate from the entity's own annotations
    assert!(!store.is_method_data_recorded(method));
    assert!(query.get_constructor_annotations(ctor).is_err());
}

#[test]
fn test_parameter_count_mismatch() {
    let fx = Fixture::new();
    let method = MethodKey::new(ClassKey::new(11), 1);
    let attr = parameter_annotations_attribute(&[vec![tag("a")], vec![]]).unwrap();

    let err = fx
        .service
        .store()
        .record_method_parameter_annotations(method, fx.loader.as_ref(), 1, Some(&attr))
        .unwrap_err();
    assert!(matches!(
        err,
        AnnotationError::ParameterCountMismatch {
            declared: 1,
            recorded: 2,
            ..
        }
    ));
    assert!(fx.service.query().get_method_parameter_annotations(method).is_err());
}

#[test]
fn test_child_loader_sees_parent_markers() {
    let fx = Fixture::new();
    let child: Arc<dyn ClassLoader> =
        Arc::new(RuntimeLoader::with_parent("plugin", Arc::clone(&fx.loader)));
    let field = FieldKey::new(ClassKey::new(12), 1);
    let attr = annotations_attribute(&[tag("child")]).unwrap();

    fx.service
        .store()
        .record_field_annotations(field, child.as_ref(), Some(&attr))
        .unwrap();
    assert_eq!(
        fx.service.query().get_field_annotation(field, &marker(TAG)).unwrap(),
        Some(tag("child"))
    );
}

#[test]
fn test_concurrent_record_and_read() {
    const WRITERS: u64 = 8;
    const PER_WRITER: u64 = 25;

    let fx = Arc::new(Fixture::new());
    let key = |w: u64, i: u64| FieldKey::new(ClassKey::new(1000 + w), i);
    let expected = |w: u64, i: u64| format!("{}-{}", w, i);

    // Readers poll while writers record; anything visible must be complete
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || {
                let query = fx.service.query();
                for _ in 0..50 {
                    for w in 0..WRITERS {
                        for i in 0..PER_WRITER {
                            if !query.is_field_data_recorded(key(w, i)) {
                                continue;
                            }
                            let set = query.get_field_annotations(key(w, i)).unwrap();
                            assert_eq!(set.len(), 2);
                            assert_eq!(set.get(&MarkerType::new(TAG)), Some(&set[0]));
                            assert!(set.contains(&MarkerType::new("com.example.Limit")));
                        }
                    }
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let fx = Arc::clone(&fx);
            thread::spawn(move || {
                for i in 0..PER_WRITER {
                    let attr = annotations_attribute(&[
                        tag(&expected(w, i)),
                        Annotation::new("com.example.Limit").with("max", MemberValue::Long(i as i64)),
                    ])
                    .unwrap();
                    fx.service
                        .store()
                        .record_field_annotations(key(w, i), fx.loader.as_ref(), Some(&attr))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in writers {
        handle.join().unwrap();
    }
    for handle in readers {
        handle.join().unwrap();
    }

    let query = fx.service.query();
    for w in 0..WRITERS {
        for i in 0..PER_WRITER {
            let found = query
                .get_field_annotation(key(w, i), &marker(TAG))
                .unwrap()
                .unwrap();
            assert_eq!(
                found.value().and_then(MemberValue::as_str),
                Some(expected(w, i).as_str())
            );
        }
    }
    assert_eq!(fx.synthesis_count(), WRITERS * PER_WRITER);
}
