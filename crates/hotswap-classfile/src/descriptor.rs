//! Name and descriptor conversions
//!
//! Binary names use dots (`com.example.Tag`), internal names use slashes
//! (`com/example/Tag`) and field descriptors wrap internal names as
//! `Lcom/example/Tag;`.

/// Binary name to internal name
pub fn to_internal(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// Internal name to binary name
pub fn to_binary(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// Binary name of a reference type to its field descriptor
pub fn object_descriptor(binary_name: &str) -> String {
    format!("L{};", to_internal(binary_name))
}

/// Field descriptor of a reference type back to its binary name
pub fn binary_from_descriptor(descriptor: &str) -> Option<String> {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .filter(|inner| !inner.is_empty())
        .map(to_binary)
}

/// Descriptor of a `void` method taking `param_count` object parameters
pub fn object_method_descriptor(param_count: usize) -> String {
    let mut descriptor = String::with_capacity(2 + param_count * 18 + 1);
    descriptor.push('(');
    for _ in 0..param_count {
        descriptor.push_str("Ljava/lang/Object;");
    }
    descriptor.push_str(")V");
    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_conversions() {
        assert_eq!(object_descriptor("com.example.Tag"), "Lcom/example/Tag;");
        assert_eq!(
            binary_from_descriptor("Lcom/example/Tag$Inner;").as_deref(),
            Some("com.example.Tag$Inner")
        );
        assert_eq!(binary_from_descriptor("I"), None);
        assert_eq!(binary_from_descriptor("L;"), None);
    }

    #[test]
    fn test_method_descriptor() {
        assert_eq!(object_method_descriptor(0), "()V");
        assert_eq!(
            object_method_descriptor(2),
            "(Ljava/lang/Object;Ljava/lang/Object;)V"
        );
    }
}
