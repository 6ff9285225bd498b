//! Graph snapshot documents.
//!
//! A snapshot captures an object graph (objects, their own properties, the
//! root) together with the module table the namespace merger resolves
//! against. Documents are validated against the bundled JSON Schema first,
//! then semantically: ids must be unique, every reference must resolve, and
//! property names must be unique per object.

use super::{Getter, Heap, ObjectId, PropertyDescriptor, Slot, Value};
use crate::namespace::ModuleTable;
use anyhow::{Context, Result, anyhow, bail};
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Version marker every snapshot document must carry.
pub const GRAPH_SCHEMA_VERSION: &str = "apiscan_graph_v1";

const GRAPH_SCHEMA: &str = include_str!("../../schema/graph_snapshot.schema.json");

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub schema_version: String,
    pub root: String,
    pub objects: Vec<ObjectSpec>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub modules: BTreeMap<String, ModuleSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub id: String,
    #[serde(default)]
    pub callable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prototype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertySpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub name: String,
    #[serde(flatten)]
    pub slot: SlotSpec,
    #[serde(default = "default_true")]
    pub enumerable: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default = "default_true")]
    pub configurable: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotSpec {
    Value(ValueSpec),
    Get(GetterSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSpec {
    Undefined,
    Null,
    Ref(String),
    Primitive(JsonValue),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetterSpec {
    Returns(ValueSpec),
    Throws(String),
    Revoked,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub object: String,
    #[serde(default = "default_true")]
    pub configurable: bool,
}

fn default_true() -> bool {
    true
}

/// A snapshot materialized into a heap.
#[derive(Clone, Debug)]
pub struct LoadedGraph {
    pub heap: Heap,
    pub root: ObjectId,
    pub modules: ModuleTable,
}

impl LoadedGraph {
    pub fn root_value(&self) -> Value {
        Value::Object(self.root)
    }

    /// Serialize the current heap state back into a snapshot document.
    pub fn to_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_heap(&self.heap, self.root, &self.modules)
    }
}

/// Parse, validate and materialize a snapshot document from disk.
pub fn load_graph_from_path(path: &Path) -> Result<LoadedGraph> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading graph snapshot {}", path.display()))?;
    let document: JsonValue = serde_json::from_str(&data)
        .with_context(|| format!("parsing graph snapshot {}", path.display()))?;
    GraphSnapshot::from_document(document)
        .and_then(|snapshot| snapshot.materialize())
        .with_context(|| format!("loading graph snapshot {}", path.display()))
}

impl GraphSnapshot {
    /// Validate a raw JSON document against the bundled schema and decode it.
    pub fn from_document(document: JsonValue) -> Result<Self> {
        validate_document(&document)?;
        let snapshot: GraphSnapshot =
            serde_json::from_value(document).context("decoding graph snapshot")?;
        if snapshot.schema_version != GRAPH_SCHEMA_VERSION {
            bail!(
                "unsupported graph snapshot version '{}', expected {}",
                snapshot.schema_version,
                GRAPH_SCHEMA_VERSION
            );
        }
        Ok(snapshot)
    }

    /// Build a heap from this document.
    pub fn materialize(&self) -> Result<LoadedGraph> {
        let mut heap = Heap::new();
        let mut ids: BTreeMap<&str, ObjectId> = BTreeMap::new();
        for spec in &self.objects {
            if ids.contains_key(spec.id.as_str()) {
                bail!("duplicate object id '{}'", spec.id);
            }
            ids.insert(spec.id.as_str(), heap.alloc(spec.id.as_str(), spec.callable));
        }

        for spec in &self.objects {
            let id = ids[spec.id.as_str()];
            if let Some(proto) = &spec.prototype {
                heap.set_prototype(id, Some(lookup(&ids, proto, &spec.id)?));
            }
            if let Some(reason) = &spec.opaque {
                heap.set_opaque(id, reason.as_str());
            }

            let mut names: BTreeSet<&str> = BTreeSet::new();
            for prop in &spec.properties {
                if !names.insert(prop.name.as_str()) {
                    bail!(
                        "object '{}' defines property '{}' more than once",
                        spec.id,
                        prop.name
                    );
                }
                let slot = match &prop.slot {
                    SlotSpec::Value(value) => Slot::Data {
                        value: resolve_value(&ids, value, &spec.id)?,
                        writable: prop.writable,
                    },
                    SlotSpec::Get(GetterSpec::Returns(value)) => {
                        Slot::Accessor(Getter::Returns(resolve_value(&ids, value, &spec.id)?))
                    }
                    SlotSpec::Get(GetterSpec::Throws(message)) => {
                        Slot::Accessor(Getter::Throws(message.clone()))
                    }
                    SlotSpec::Get(GetterSpec::Revoked) => Slot::Accessor(Getter::Revoked),
                };
                let descriptor = PropertyDescriptor {
                    slot,
                    enumerable: prop.enumerable,
                    configurable: prop.configurable,
                };
                heap.define_property(id, &prop.name, descriptor)?;
            }
        }

        let root = ids
            .get(self.root.as_str())
            .copied()
            .ok_or_else(|| anyhow!("root object '{}' is not defined", self.root))?;

        let mut modules = ModuleTable::new();
        for (name, module) in &self.modules {
            let object = ids.get(module.object.as_str()).copied().ok_or_else(|| {
                anyhow!(
                    "module '{}' references unknown object '{}'",
                    name,
                    module.object
                )
            })?;
            modules.insert(name.as_str(), object, module.configurable);
        }

        Ok(LoadedGraph {
            heap,
            root,
            modules,
        })
    }

    /// Capture `heap` as a document. Unique labels become object ids as-is;
    /// empty or repeated labels get the arena index appended, plus a counter
    /// when that still clashes with another id.
    pub fn from_heap(heap: &Heap, root: ObjectId, modules: &ModuleTable) -> Self {
        let labels = object_ids(heap);

        let objects = heap
            .ids()
            .filter_map(|id| heap.object(id).map(|obj| (id, obj)))
            .map(|(id, obj)| ObjectSpec {
                id: labels[id.index()].clone(),
                callable: obj.callable,
                prototype: obj.prototype.map(|p| labels[p.index()].clone()),
                opaque: obj.opaque.clone(),
                properties: obj
                    .properties()
                    .iter()
                    .map(|prop| {
                        let (slot, writable) = match &prop.slot {
                            Slot::Data { value, writable } => {
                                (SlotSpec::Value(value_spec(value, &labels)), *writable)
                            }
                            Slot::Accessor(Getter::Returns(value)) => (
                                SlotSpec::Get(GetterSpec::Returns(value_spec(value, &labels))),
                                true,
                            ),
                            Slot::Accessor(Getter::Throws(message)) => {
                                (SlotSpec::Get(GetterSpec::Throws(message.clone())), true)
                            }
                            Slot::Accessor(Getter::Revoked) => {
                                (SlotSpec::Get(GetterSpec::Revoked), true)
                            }
                        };
                        PropertySpec {
                            name: prop.name.clone(),
                            slot,
                            enumerable: prop.enumerable,
                            writable,
                            configurable: prop.configurable,
                        }
                    })
                    .collect(),
            })
            .collect();

        let modules = modules
            .iter()
            .filter_map(|(name, ns)| {
                ns.value.as_object().map(|obj| {
                    (
                        name.to_string(),
                        ModuleSpec {
                            object: labels[obj.index()].clone(),
                            configurable: ns.configurable,
                        },
                    )
                })
            })
            .collect();

        Self {
            schema_version: GRAPH_SCHEMA_VERSION.to_string(),
            root: labels[root.index()].clone(),
            objects,
            modules,
        }
    }
}

fn object_ids(heap: &Heap) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for id in heap.ids() {
        *counts.entry(heap.label(id).unwrap_or_default()).or_default() += 1;
    }
    let keeps_label = |label: &str| !label.is_empty() && counts[label] == 1;

    let mut taken: BTreeSet<String> = heap
        .ids()
        .filter_map(|id| heap.label(id))
        .filter(|label| keeps_label(label))
        .map(str::to_string)
        .collect();

    heap.ids()
        .map(|id| {
            let label = heap.label(id).unwrap_or_default();
            if keeps_label(label) {
                return label.to_string();
            }
            let base = format!("{label}@{}", id.index());
            let mut candidate = base.clone();
            let mut attempt = 0;
            while taken.contains(&candidate) {
                attempt += 1;
                candidate = format!("{base}.{attempt}");
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

fn lookup(ids: &BTreeMap<&str, ObjectId>, target: &str, owner: &str) -> Result<ObjectId> {
    ids.get(target)
        .copied()
        .ok_or_else(|| anyhow!("object '{owner}' references unknown object '{target}'"))
}

fn resolve_value(ids: &BTreeMap<&str, ObjectId>, spec: &ValueSpec, owner: &str) -> Result<Value> {
    Ok(match spec {
        ValueSpec::Undefined => Value::Undefined,
        ValueSpec::Null => Value::Null,
        ValueSpec::Ref(target) => Value::Object(lookup(ids, target, owner)?),
        ValueSpec::Primitive(raw) => Value::Primitive(raw.clone()),
    })
}

fn value_spec(value: &Value, labels: &[String]) -> ValueSpec {
    match value {
        Value::Undefined => ValueSpec::Undefined,
        Value::Null => ValueSpec::Null,
        Value::Primitive(raw) => ValueSpec::Primitive(raw.clone()),
        Value::Object(id) => ValueSpec::Ref(labels[id.index()].clone()),
    }
}

fn validate_document(document: &JsonValue) -> Result<()> {
    let schema: JsonValue =
        serde_json::from_str(GRAPH_SCHEMA).context("parsing bundled graph snapshot schema")?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|err| anyhow!("compiling bundled graph snapshot schema: {err}"))?;
    if let Err(errors) = compiled.validate(document) {
        let details = errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("\n");
        bail!("graph snapshot failed schema validation:\n{details}");
    }
    Ok(())
}
