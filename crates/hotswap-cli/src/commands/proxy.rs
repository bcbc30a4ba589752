//! `hotswap proxy`: build a proxy class from JSON annotations.

use std::path::Path;

use anyhow::{bail, Context};
use hotswap_agent::marker::{annotations_attribute, parameter_annotations_attribute};
use hotswap_agent::{AgentConfig, Annotation, ProxyNamer};
use hotswap_classfile::{
    build_annotation_proxy, build_parameter_proxy, verify_class_file, ClassFile, ProxyOptions,
};
use tracing::info;

pub fn execute(
    config: &AgentConfig,
    input: &Path,
    output: &Path,
    name: Option<String>,
    parameters: bool,
) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let name = name.unwrap_or_else(|| ProxyNamer::new(config.proxy_prefix.clone()).next_name());
    if name.contains('.') {
        bail!("proxy name '{}' must be an internal name (use '/' separators)", name);
    }
    let options = ProxyOptions {
        major_version: config.class_major_version,
    };

    let bytes = if parameters {
        let per_parameter: Vec<Vec<Annotation>> = serde_json::from_str(&json)
            .with_context(|| format!("parsing parameter annotations in {}", input.display()))?;
        let attr = parameter_annotations_attribute(&per_parameter)?;
        build_parameter_proxy(&name, &attr, options)?
    } else {
        let annotations: Vec<Annotation> = serde_json::from_str(&json)
            .with_context(|| format!("parsing annotations in {}", input.display()))?;
        let attr = annotations_attribute(&annotations)?;
        build_annotation_proxy(&name, &attr, options)?
    };

    if config.verify_proxies {
        let class = ClassFile::decode(&bytes)?;
        verify_class_file(&class).with_context(|| format!("verifying proxy {}", name))?;
    }

    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    info!(proxy = %name, len = bytes.len(), "wrote proxy definition");
    println!("{}", name);
    Ok(())
}
