use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hotswap_classfile::annotation::element;
use hotswap_classfile::{
    build_annotation_proxy, AnnotationInfo, AnnotationsAttribute, ClassFile, ConstantPool,
    ElementValue, ProxyOptions,
};
use std::sync::Arc;

fn attribute_with(markers: usize) -> AnnotationsAttribute {
    let mut pool = ConstantPool::new();
    let value = pool.add_utf8("value").unwrap();
    let mut annotations = Vec::with_capacity(markers);
    for i in 0..markers {
        let mut info =
            AnnotationInfo::new(pool.add_utf8(&format!("Lcom/example/Marker{};", i)).unwrap());
        info.members.push((
            value,
            ElementValue::Const {
                tag: element::STRING,
                index: pool.add_utf8(&i.to_string()).unwrap(),
            },
        ));
        annotations.push(info);
    }
    AnnotationsAttribute::new(Arc::new(pool), annotations)
}

fn bench_build_proxy(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_annotation_proxy");
    for markers in [1usize, 8, 64] {
        let attr = attribute_with(markers);
        group.bench_with_input(BenchmarkId::new("markers", markers), &attr, |b, attr| {
            b.iter(|| {
                build_annotation_proxy(black_box("proxy/Bench$1"), attr, ProxyOptions::default())
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_decode_proxy(c: &mut Criterion) {
    let bytes =
        build_annotation_proxy("proxy/Bench$1", &attribute_with(8), ProxyOptions::default())
            .unwrap();

    c.bench_function("decode_proxy", |b| {
        b.iter(|| {
            let class = ClassFile::decode(black_box(&bytes)).unwrap();
            class.annotations().unwrap()
        });
    });
}

criterion_group!(benches, bench_build_proxy, bench_decode_proxy);
criterion_main!(benches);
