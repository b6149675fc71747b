//! Key namespacing.

/// Builds the key actually sent to the backing store.
///
/// Caller keys are opaque; the only transformation is an optional
/// namespace prefix so several adapters can share one store.
///
/// Format: `"{namespace}:{key}"`, or `key` unchanged without a namespace.
#[derive(Clone, Debug, Default)]
pub struct KeyBuilder {
    namespace: Option<String>,
}

impl KeyBuilder {
    pub fn new(namespace: Option<String>) -> Self {
        KeyBuilder { namespace }
    }

    pub fn build(&self, key: &str) -> String {
        match &self.namespace {
            Some(ns) => format!("{}:{}", ns, key),
            None => key.to_string(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}
