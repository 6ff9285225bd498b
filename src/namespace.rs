//! Namespace merger.
//!
//! Named namespaces are resolved up front into an immutable `NamespaceMap`,
//! then attached to the root object as read-only, enumerable data properties
//! before any walk starts. Resolution failures are configuration errors and
//! abort the merge.

use crate::graph::{DefineError, Heap, ObjectId, PropertyDescriptor, Slot, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A namespace value as handed back by a provider.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedNamespace {
    pub value: Value,
    /// Left to the provider; the merger never forces it either way.
    pub configurable: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("namespace '{name}' could not be resolved")]
    Unresolved { name: String },
    #[error("namespace '{name}' is listed more than once")]
    Duplicate { name: String },
    #[error("root is not an object; namespaces cannot be attached")]
    RootNotObject,
    #[error("failed to attach namespace '{name}'")]
    Define {
        name: String,
        #[source]
        source: DefineError,
    },
}

/// External module-resolution collaborator.
pub trait NamespaceProvider {
    fn resolve(&self, name: &str) -> Result<ResolvedNamespace, MergeError>;
}

/// Provider backed by the `modules` table of a graph snapshot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModuleTable {
    modules: BTreeMap<String, ResolvedNamespace>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, object: ObjectId, configurable: bool) {
        self.modules.insert(
            name.into(),
            ResolvedNamespace {
                value: Value::Object(object),
                configurable,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedNamespace> {
        self.modules.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedNamespace)> {
        self.modules.iter().map(|(name, ns)| (name.as_str(), ns))
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl NamespaceProvider for ModuleTable {
    fn resolve(&self, name: &str) -> Result<ResolvedNamespace, MergeError> {
        self.get(name).cloned().ok_or_else(|| MergeError::Unresolved {
            name: name.to_string(),
        })
    }
}

/// Ordered, resolved namespaces. Built once and never mutated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NamespaceMap {
    entries: Vec<(String, ResolvedNamespace)>,
}

impl NamespaceMap {
    /// Resolve every name in order; the first failure aborts.
    pub fn resolve<P>(names: &[String], provider: &P) -> Result<Self, MergeError>
    where
        P: NamespaceProvider + ?Sized,
    {
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(MergeError::Duplicate { name: name.clone() });
            }
            let resolved = provider.resolve(name)?;
            entries.push((name.clone(), resolved));
        }
        Ok(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedNamespace)> {
        self.entries.iter().map(|(name, ns)| (name.as_str(), ns))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Attach every namespace in `map` to `root` as a non-writable, enumerable
/// data property.
pub fn merge_namespaces(
    heap: &mut Heap,
    root: &Value,
    map: &NamespaceMap,
) -> Result<(), MergeError> {
    let root = root.as_object().ok_or(MergeError::RootNotObject)?;
    for (name, namespace) in map.iter() {
        let descriptor = PropertyDescriptor {
            slot: Slot::Data {
                value: namespace.value.clone(),
                writable: false,
            },
            enumerable: true,
            configurable: namespace.configurable,
        };
        heap.define_property(root, name, descriptor)
            .map_err(|source| MergeError::Define {
                name: name.to_string(),
                source,
            })?;
        tracing::debug!(namespace = name, "attached namespace to root");
    }
    Ok(())
}

/// Resolve `names` through `provider` and attach them to `root`.
pub fn attach_namespaces<P>(
    heap: &mut Heap,
    root: &Value,
    names: &[String],
    provider: &P,
) -> Result<NamespaceMap, MergeError>
where
    P: NamespaceProvider + ?Sized,
{
    let map = NamespaceMap::resolve(names, provider)?;
    merge_namespaces(heap, root, &map)?;
    Ok(map)
}
