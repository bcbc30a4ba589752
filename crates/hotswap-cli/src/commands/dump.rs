//! `hotswap dump`: print a class file's annotations as JSON.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use hotswap_agent::{Annotation, DefinitionRegistry, MarkerResolution, RuntimeLoader};
use hotswap_classfile::verify_class_file;
use serde::Serialize;

#[derive(Serialize)]
struct ClassDump<'a> {
    class: &'a str,
    annotations: &'a [Annotation],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    methods: Vec<MethodDump<'a>>,
}

#[derive(Serialize)]
struct MethodDump<'a> {
    name: &'a str,
    descriptor: &'a str,
    parameters: &'a [Vec<Annotation>],
}

pub fn execute(file: &Path) -> anyhow::Result<()> {
    let (bytes, class) = super::read_class(file)?;
    verify_class_file(&class).with_context(|| format!("verifying {}", file.display()))?;

    // No marker declarations are available here, so members are shown as written
    let loader = RuntimeLoader::new("dump", Arc::new(DefinitionRegistry::new()))
        .with_resolution(MarkerResolution::Lenient);
    let loaded = loader.define_class(&bytes)?;

    let dump = ClassDump {
        class: loaded.name(),
        annotations: loaded.annotations(),
        methods: loaded
            .methods()
            .iter()
            .filter(|m| !m.parameter_annotations.is_empty())
            .map(|m| MethodDump {
                name: &m.name,
                descriptor: &m.descriptor,
                parameters: &m.parameter_annotations,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
