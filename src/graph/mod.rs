//! Object graph model the walker runs over.
//!
//! `ObjectModel` is the seam: anything that can say whether a reference is
//! callable, list its own property names, and read a property (possibly
//! faulting) can be walked. `Heap` is the arena-backed implementation the
//! binaries load from snapshot documents.

pub mod heap;
pub mod snapshot;

pub use heap::{DefineError, Getter, Heap, Object, ObjectId, Property, PropertyDescriptor, Slot};
pub use snapshot::{GRAPH_SCHEMA_VERSION, GraphSnapshot, LoadedGraph, load_graph_from_path};

use std::fmt::Debug;
use std::hash::Hash;
use thiserror::Error;

/// A value read out of the graph.
///
/// Only `Object` values carry identity; primitives are leaves and are never
/// callable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value<R = ObjectId> {
    Undefined,
    Null,
    Primitive(serde_json::Value),
    Object(R),
}

impl<R: Copy> Value<R> {
    /// The referenced object, if this value is one.
    pub fn as_object(&self) -> Option<R> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// `undefined` or `null`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }
}

/// Recoverable failure while inspecting a single node or property.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PropertyFault {
    #[error("getter for '{name}' threw: {message}")]
    Threw { name: String, message: String },
    #[error("access to '{name}' was revoked")]
    Revoked { name: String },
    #[error("own property names of {object} could not be enumerated: {reason}")]
    Opaque { object: String, reason: String },
    #[error("reference {0} does not belong to this graph")]
    Detached(String),
}

/// Capabilities the walker needs from a node: named children and an
/// optional invocability bit. `Ref` identity is reference identity.
pub trait ObjectModel {
    type Ref: Copy + Eq + Hash + Debug;

    fn is_callable(&self, obj: Self::Ref) -> bool;

    /// Own property names in definition order. Inherited names are not
    /// included.
    fn own_property_names(&self, obj: Self::Ref) -> Result<Vec<String>, PropertyFault>;

    fn read_property(&self, obj: Self::Ref, name: &str) -> Result<Value<Self::Ref>, PropertyFault>;
}
