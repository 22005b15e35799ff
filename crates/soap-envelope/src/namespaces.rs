//! Namespace Prefix Table.
//!
//! Owned by one envelope build and discarded with it; nothing here is shared
//! between calls.

use std::collections::HashMap;

use tracing::error;

/// An `xmlns:prefix="uri"` declaration to attach to the next element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    pub prefix: String,
    pub uri: String,
}

impl NamespaceDeclaration {
    /// Attribute name of the declaration (`xmlns:prefix`).
    pub fn attribute_name(&self) -> String {
        format!("xmlns:{}", self.prefix)
    }
}

/// Bijective namespace URI → prefix mapping.
#[derive(Debug, Clone, Default)]
pub struct NamespacePrefixes {
    prefixes: HashMap<String, String>,
}

impl NamespacePrefixes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `uri` under `prefix` and return the declaration to emit.
    ///
    /// A URI that is already bound keeps its first prefix; the returned
    /// declaration then repeats the existing binding.
    pub fn bind(&mut self, uri: &str, prefix: &str) -> NamespaceDeclaration {
        let prefix = self.insert(uri, prefix);
        NamespaceDeclaration {
            prefix,
            uri: uri.to_string(),
        }
    }

    /// Register `uri` under `prefix` without producing a declaration.
    /// Returns the prefix in effect for `uri`.
    pub fn insert(&mut self, uri: &str, prefix: &str) -> String {
        self.prefixes
            .entry(uri.to_string())
            .or_insert_with(|| prefix.to_string())
            .clone()
    }

    pub fn prefix(&self, uri: &str) -> Option<&str> {
        self.prefixes.get(uri).map(String::as_str)
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.prefixes.contains_key(uri)
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Qualified name `prefix:local_name`.
    ///
    /// An unbound URI is logged and yields `:local_name`; serialization goes
    /// on with the malformed name so the output stays inspectable.
    pub fn resolve(&self, uri: &str, local_name: &str) -> String {
        let prefix = match self.prefix(uri) {
            Some(prefix) => prefix,
            None => {
                error!(
                    namespace = uri,
                    local_name, "Namespace not bound to any prefix"
                );
                ""
            }
        };
        format!("{prefix}:{local_name}")
    }

    /// First `nN` prefix (starting at `n1`) not yet in use.
    pub fn next_free_prefix(&self) -> String {
        (1..)
            .map(|ordinal| format!("n{ordinal}"))
            .find(|candidate| !self.prefixes.values().any(|p| p == candidate))
            .unwrap_or_else(|| format!("n{}", self.prefixes.len() + 1))
    }
}
