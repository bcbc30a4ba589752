//! Proxy class names

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// Global proxy ID counter, shared by every namer in the process
static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// Issues process-unique internal names under a package prefix
#[derive(Debug, Clone)]
pub struct ProxyNamer {
    prefix: String,
}

impl ProxyNamer {
    /// Create a namer; `prefix` is an internal name such as `org/hotswap/proxy/AnnotationProxy`
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Prefix in use
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next unique name, `<prefix>$<n>`
    pub fn next_name(&self) -> String {
        let id = NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}${}", self.prefix, id);
        trace!(name = %name, "allocated proxy name");
        name
    }
}
