//! `hotswap verify`: structural verification of class files.

use std::path::PathBuf;

use anyhow::{bail, Context};
use hotswap_classfile::verify_class_file;
use tracing::debug;

pub fn execute(files: &[PathBuf]) -> anyhow::Result<()> {
    let mut failed = 0;
    for file in files {
        let result = super::read_class(file).and_then(|(_, class)| {
            verify_class_file(&class)
                .with_context(|| format!("verifying {}", file.display()))?;
            Ok(class)
        });
        match result {
            Ok(class) => {
                debug!(file = %file.display(), major = class.major_version, "verified");
                println!("ok: {} ({})", file.display(), class.name().unwrap_or("?"));
            }
            Err(e) => {
                failed += 1;
                eprintln!("error: {:#}", e);
            }
        }
    }
    if failed > 0 {
        bail!("{} of {} class files failed verification", failed, files.len());
    }
    Ok(())
}
