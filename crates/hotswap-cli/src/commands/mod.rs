//! Subcommand implementations

pub mod dump;
pub mod proxy;
pub mod verify;

use std::path::Path;

use anyhow::Context;
use hotswap_agent::AgentConfig;
use hotswap_classfile::ClassFile;

/// Read `--config` if given, else `./hotswap.toml` if present, else defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AgentConfig> {
    let local = Path::new("hotswap.toml");
    match path {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None if local.is_file() => {
            AgentConfig::from_file(local).context("loading configuration from hotswap.toml")
        }
        None => Ok(AgentConfig::default()),
    }
}

/// Read and decode a class file
pub fn read_class(path: &Path) -> anyhow::Result<(Vec<u8>, ClassFile)> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let class =
        ClassFile::decode(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    Ok((bytes, class))
}
