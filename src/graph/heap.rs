//! Arena-backed object graph.
//!
//! Objects live in a `Vec` and are addressed by `ObjectId`, so identity is the
//! arena index and cycles are plain index references. Property order is
//! definition order; redefining a configurable property keeps its slot.

use super::{ObjectModel, PropertyFault, Value};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub(crate) usize);

impl ObjectId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Getter {
    Returns(Value),
    Throws(String),
    Revoked,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    Data { value: Value, writable: bool },
    Accessor(Getter),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: String,
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

/// Attributes for `Heap::define_property`.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    pub slot: Slot,
    pub enumerable: bool,
    pub configurable: bool,
}

impl PropertyDescriptor {
    /// Plain writable, enumerable, configurable data property.
    pub fn data(value: Value) -> Self {
        Self {
            slot: Slot::Data {
                value,
                writable: true,
            },
            enumerable: true,
            configurable: true,
        }
    }

    pub fn accessor(getter: Getter) -> Self {
        Self {
            slot: Slot::Accessor(getter),
            enumerable: true,
            configurable: true,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Object {
    pub label: String,
    pub callable: bool,
    pub prototype: Option<ObjectId>,
    /// When set, own-name enumeration faults with this reason.
    pub opaque: Option<String>,
    properties: Vec<Property>,
    /// Name to position in `properties`.
    index: HashMap<String, usize>,
}

impl Object {
    /// Own properties in definition order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    fn own(&self, name: &str) -> Option<&Property> {
        self.index.get(name).map(|&at| &self.properties[at])
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DefineError {
    #[error("cannot redefine non-configurable property '{name}' on {object}")]
    NonConfigurable { object: String, name: String },
    #[error("object {0} does not exist")]
    UnknownObject(ObjectId),
}

#[derive(Clone, Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object with no properties.
    pub fn alloc(&mut self, label: impl Into<String>, callable: bool) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(Object {
            label: label.into(),
            callable,
            ..Object::default()
        });
        id
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        (0..self.objects.len()).map(ObjectId)
    }

    pub fn label(&self, id: ObjectId) -> Option<&str> {
        self.object(id).map(|obj| obj.label.as_str())
    }

    pub fn set_prototype(&mut self, id: ObjectId, prototype: Option<ObjectId>) {
        if let Some(obj) = self.object_mut(id) {
            obj.prototype = prototype;
        }
    }

    pub fn set_opaque(&mut self, id: ObjectId, reason: impl Into<String>) {
        if let Some(obj) = self.object_mut(id) {
            obj.opaque = Some(reason.into());
        }
    }

    /// Add `name` to `id`, or redefine it in place when the existing property
    /// is configurable.
    pub fn define_property(
        &mut self,
        id: ObjectId,
        name: &str,
        descriptor: PropertyDescriptor,
    ) -> Result<(), DefineError> {
        let obj = self
            .objects
            .get_mut(id.0)
            .ok_or(DefineError::UnknownObject(id))?;
        let property = Property {
            name: name.to_string(),
            slot: descriptor.slot,
            enumerable: descriptor.enumerable,
            configurable: descriptor.configurable,
        };
        match obj.index.get(name).copied() {
            Some(at) if !obj.properties[at].configurable => Err(DefineError::NonConfigurable {
                object: obj.label.clone(),
                name: name.to_string(),
            }),
            Some(at) => {
                obj.properties[at] = property;
                Ok(())
            }
            None => {
                obj.index.insert(name.to_string(), obj.properties.len());
                obj.properties.push(property);
                Ok(())
            }
        }
    }

    /// Shorthand for a default data property.
    pub fn set(&mut self, id: ObjectId, name: &str, value: Value) -> Result<(), DefineError> {
        self.define_property(id, name, PropertyDescriptor::data(value))
    }

    fn get(&self, id: ObjectId) -> Result<&Object, PropertyFault> {
        self.object(id)
            .ok_or_else(|| PropertyFault::Detached(id.to_string()))
    }
}

impl ObjectModel for Heap {
    type Ref = ObjectId;

    fn is_callable(&self, obj: ObjectId) -> bool {
        self.object(obj).map(|o| o.callable).unwrap_or(false)
    }

    fn own_property_names(&self, obj: ObjectId) -> Result<Vec<String>, PropertyFault> {
        let object = self.get(obj)?;
        if let Some(reason) = &object.opaque {
            return Err(PropertyFault::Opaque {
                object: object.label.clone(),
                reason: reason.clone(),
            });
        }
        Ok(object.properties.iter().map(|p| p.name.clone()).collect())
    }

    fn read_property(&self, obj: ObjectId, name: &str) -> Result<Value, PropertyFault> {
        let mut current = Some(obj);
        let mut hops = 0;
        while let Some(id) = current {
            let object = self.get(id)?;
            if let Some(prop) = object.own(name) {
                return match &prop.slot {
                    Slot::Data { value, .. } => Ok(value.clone()),
                    Slot::Accessor(Getter::Returns(value)) => Ok(value.clone()),
                    Slot::Accessor(Getter::Throws(message)) => Err(PropertyFault::Threw {
                        name: name.to_string(),
                        message: message.clone(),
                    }),
                    Slot::Accessor(Getter::Revoked) => Err(PropertyFault::Revoked {
                        name: name.to_string(),
                    }),
                };
            }
            // Prototype chains may be cyclic in a hand-written snapshot.
            hops += 1;
            if hops > self.objects.len() {
                break;
            }
            current = object.prototype;
        }
        Ok(Value::Undefined)
    }
}
