//! Breadth-first discovery of callables.
//!
//! The walk starts at a root reference and follows own properties in FIFO
//! order. Each object identity is enqueued at most once: the visited set is
//! updated at enqueue time, so siblings sharing a child only enqueue it once
//! and cycles terminate. Every fault raised while reading a node or property
//! is absorbed and counted; nothing is surfaced to the caller.

use crate::graph::{ObjectModel, Value};
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Property names never followed: call-stack accessors that recurse forever.
pub const DEFAULT_EXCLUDED_PROPERTIES: &[&str] = &["caller", "callee", "arguments"];

/// Names occupied by the fuzz driver's own control objects.
pub const DEFAULT_RESERVED_NAMES: &[&str] = &["caf", "CAFFuzzer"];

/// One discovered callable. `handle` stays in-process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogEntry<H> {
    pub id: usize,
    pub name: String,
    pub handle: H,
}

/// Which filter rejected a property name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExclusionReason {
    Property,
    Reserved,
}

/// The two name filters. They are checked independently and both apply at
/// every depth.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Exclusions {
    properties: BTreeSet<String>,
    reserved: BTreeSet<String>,
}

impl Exclusions {
    pub fn new<P, R>(properties: P, reserved: R) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            properties: properties.into_iter().map(Into::into).collect(),
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// No filtering at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Why `name` must not be followed, or `None` when it may be read.
    /// Property exclusions take precedence over reserved names.
    pub fn check(&self, name: &str) -> Option<ExclusionReason> {
        if self.properties.contains(name) {
            Some(ExclusionReason::Property)
        } else if self.reserved.contains(name) {
            Some(ExclusionReason::Reserved)
        } else {
            None
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }

    pub fn reserved(&self) -> impl Iterator<Item = &str> {
        self.reserved.iter().map(String::as_str)
    }
}

/// Built-in exclusions: call-stack accessors plus the driver's names.
pub fn default_exclusions() -> Exclusions {
    Exclusions::new(
        DEFAULT_EXCLUDED_PROPERTIES.iter().copied(),
        DEFAULT_RESERVED_NAMES.iter().copied(),
    )
}

/// Counters describing one walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub objects_visited: usize,
    pub properties_excluded: usize,
    pub faults_absorbed: usize,
    pub absent_skipped: usize,
    pub already_visited: usize,
}

/// Result of a walk: the ordered catalog plus its counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Discovery<H> {
    pub entries: Vec<CatalogEntry<H>>,
    pub stats: WalkStats,
}

/// Single-use BFS engine over an `ObjectModel`.
pub struct Walker<'a, M: ObjectModel + ?Sized> {
    model: &'a M,
    exclusions: &'a Exclusions,
    visited: HashSet<M::Ref>,
    queue: VecDeque<(String, M::Ref)>,
    entries: Vec<CatalogEntry<M::Ref>>,
    stats: WalkStats,
}

impl<'a, M: ObjectModel + ?Sized> Walker<'a, M> {
    pub fn new(model: &'a M, root: &Value<M::Ref>, exclusions: &'a Exclusions) -> Self {
        let mut walker = Self {
            model,
            exclusions,
            visited: HashSet::new(),
            queue: VecDeque::new(),
            entries: Vec::new(),
            stats: WalkStats::default(),
        };
        match root.as_object() {
            Some(obj) => {
                walker.visited.insert(obj);
                walker.queue.push_back((String::new(), obj));
            }
            None if root.is_absent() => walker.stats.absent_skipped += 1,
            None => {}
        }
        walker
    }

    pub fn run(mut self) -> Discovery<M::Ref> {
        while let Some((path, obj)) = self.queue.pop_front() {
            self.visit(path, obj);
        }
        tracing::info!(
            callables = self.entries.len(),
            objects = self.stats.objects_visited,
            excluded = self.stats.properties_excluded,
            faults = self.stats.faults_absorbed,
            "discovery finished"
        );
        Discovery {
            entries: self.entries,
            stats: self.stats,
        }
    }

    fn visit(&mut self, path: String, obj: M::Ref) {
        self.stats.objects_visited += 1;

        if self.model.is_callable(obj) {
            self.entries.push(CatalogEntry {
                id: self.entries.len(),
                name: path.clone(),
                handle: obj,
            });
        }

        let names = match self.model.own_property_names(obj) {
            Ok(names) => names,
            Err(fault) => {
                tracing::debug!(path = %path, %fault, "skipping children of opaque object");
                self.stats.faults_absorbed += 1;
                return;
            }
        };

        for name in names {
            if let Some(reason) = self.exclusions.check(&name) {
                tracing::trace!(path = %path, name = %name, ?reason, "excluded property");
                self.stats.properties_excluded += 1;
                continue;
            }

            let child = match self.model.read_property(obj, &name) {
                Ok(value) => value,
                Err(fault) => {
                    tracing::debug!(path = %path, name = %name, %fault, "skipping faulting property");
                    self.stats.faults_absorbed += 1;
                    continue;
                }
            };

            let child = match child {
                Value::Object(child) => child,
                Value::Undefined | Value::Null => {
                    self.stats.absent_skipped += 1;
                    continue;
                }
                // Leaves: never callable, no children.
                Value::Primitive(_) => continue,
            };

            if !self.visited.insert(child) {
                self.stats.already_visited += 1;
                continue;
            }
            self.queue.push_back((child_path(&path, &name), child));
        }
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

/// Walk `root` and return every reachable callable in BFS order.
pub fn discover<M>(
    model: &M,
    root: &Value<M::Ref>,
    exclusions: &Exclusions,
) -> Vec<CatalogEntry<M::Ref>>
where
    M: ObjectModel + ?Sized,
{
    Walker::new(model, root, exclusions).run().entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Getter, Heap, ObjectId, PropertyDescriptor};

    fn names<H>(entries: &[CatalogEntry<H>]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn nested_callables_get_dotted_paths() {
        // root = { a: function(){}, b: { c: function(){} } }
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let a = heap.alloc("a", true);
        let b = heap.alloc("b", false);
        let c = heap.alloc("c", true);
        heap.set(root, "a", Value::Object(a)).unwrap();
        heap.set(root, "b", Value::Object(b)).unwrap();
        heap.set(b, "c", Value::Object(c)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(
            entries,
            vec![
                CatalogEntry {
                    id: 0,
                    name: "a".to_string(),
                    handle: a
                },
                CatalogEntry {
                    id: 1,
                    name: "b.c".to_string(),
                    handle: c
                },
            ]
        );
    }

    #[test]
    fn self_reference_terminates_without_entries() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        heap.set(root, "self", Value::Object(root)).unwrap();

        let discovery = Walker::new(&heap, &Value::Object(root), &Exclusions::none()).run();
        assert!(discovery.entries.is_empty());
        assert_eq!(discovery.stats.objects_visited, 1);
        assert_eq!(discovery.stats.already_visited, 1);
    }

    #[test]
    fn long_cycle_visits_each_object_once() {
        let mut heap = Heap::new();
        let ring: Vec<ObjectId> = (0..5).map(|i| heap.alloc(format!("n{i}"), true)).collect();
        for (i, id) in ring.iter().enumerate() {
            let next = ring[(i + 1) % ring.len()];
            heap.set(*id, "next", Value::Object(next)).unwrap();
        }

        let entries = discover(&heap, &Value::Object(ring[0]), &Exclusions::none());
        assert_eq!(
            names(&entries),
            vec!["", "next", "next.next", "next.next.next", "next.next.next.next"]
        );
    }

    #[test]
    fn throwing_getter_is_skipped_but_siblings_survive() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let before = heap.alloc("before", true);
        let after = heap.alloc("after", true);
        heap.set(root, "before", Value::Object(before)).unwrap();
        heap.define_property(
            root,
            "bad",
            PropertyDescriptor::accessor(Getter::Throws("nope".into())),
        )
        .unwrap();
        heap.define_property(root, "revoked", PropertyDescriptor::accessor(Getter::Revoked))
            .unwrap();
        heap.set(root, "after", Value::Object(after)).unwrap();

        let discovery = Walker::new(&heap, &Value::Object(root), &Exclusions::none()).run();
        assert_eq!(names(&discovery.entries), vec!["before", "after"]);
        assert_eq!(discovery.stats.faults_absorbed, 2);
    }

    #[test]
    fn getter_returning_object_is_followed() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let lazy = heap.alloc("lazy", true);
        heap.define_property(
            root,
            "lazy",
            PropertyDescriptor::accessor(Getter::Returns(Value::Object(lazy))),
        )
        .unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec!["lazy"]);
    }

    #[test]
    fn shared_child_gets_one_entry_at_shallowest_path() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let deep = heap.alloc("deep", false);
        let shared = heap.alloc("shared", true);
        heap.set(root, "deep", Value::Object(deep)).unwrap();
        heap.set(deep, "alias", Value::Object(shared)).unwrap();
        heap.set(root, "direct", Value::Object(shared)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec!["direct"]);
        assert_eq!(entries[0].handle, shared);
    }

    #[test]
    fn siblings_pointing_at_one_child_enqueue_it_once() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let shared = heap.alloc("shared", true);
        heap.set(root, "x", Value::Object(shared)).unwrap();
        heap.set(root, "y", Value::Object(shared)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec!["x"]);
    }

    #[test]
    fn ids_are_dense_and_follow_depth() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let ns = heap.alloc("ns", true);
        let leaf = heap.alloc("leaf", true);
        let top = heap.alloc("top", true);
        heap.set(root, "ns", Value::Object(ns)).unwrap();
        heap.set(ns, "leaf", Value::Object(leaf)).unwrap();
        heap.set(root, "top", Value::Object(top)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec!["ns", "top", "ns.leaf"]);
        let ids: Vec<usize> = entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, (0..entries.len()).collect::<Vec<_>>());
        let depths: Vec<usize> = entries.iter().map(|e| e.name.split('.').count()).collect();
        assert!(depths.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn callable_parents_are_still_expanded() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let ctor = heap.alloc("Buffer", true);
        let from = heap.alloc("from", true);
        heap.set(root, "Buffer", Value::Object(ctor)).unwrap();
        heap.set(ctor, "from", Value::Object(from)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec!["Buffer", "Buffer.from"]);
    }

    #[test]
    fn callable_root_is_recorded_with_empty_name() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", true);

        let entries = discover(&heap, &Value::Object(root), &Exclusions::none());
        assert_eq!(names(&entries), vec![""]);
    }

    #[test]
    fn excluded_names_are_never_expanded_at_any_depth() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let func = heap.alloc("func", true);
        let stack = heap.alloc("stack", true);
        let driver = heap.alloc("driver", false);
        let hook = heap.alloc("hook", true);
        heap.set(root, "func", Value::Object(func)).unwrap();
        heap.set(func, "caller", Value::Object(stack)).unwrap();
        heap.set(root, "caf", Value::Object(driver)).unwrap();
        heap.set(driver, "hook", Value::Object(hook)).unwrap();

        let discovery = Walker::new(&heap, &Value::Object(root), &default_exclusions()).run();
        assert_eq!(names(&discovery.entries), vec!["func"]);
        assert_eq!(discovery.stats.properties_excluded, 2);
    }

    #[test]
    fn excluded_object_is_still_reachable_through_an_alias() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let target = heap.alloc("target", true);
        heap.set(root, "arguments", Value::Object(target)).unwrap();
        heap.set(root, "alias", Value::Object(target)).unwrap();

        let entries = discover(&heap, &Value::Object(root), &default_exclusions());
        assert_eq!(names(&entries), vec!["alias"]);
    }

    #[test]
    fn absent_and_primitive_values_are_dropped() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        heap.set(root, "u", Value::Undefined).unwrap();
        heap.set(root, "n", Value::Null).unwrap();
        heap.set(root, "s", Value::Primitive("text".into())).unwrap();

        let discovery = Walker::new(&heap, &Value::Object(root), &Exclusions::none()).run();
        assert!(discovery.entries.is_empty());
        assert_eq!(discovery.stats.absent_skipped, 2);
        assert_eq!(discovery.stats.objects_visited, 1);
    }

    #[test]
    fn absent_root_yields_empty_catalog() {
        let heap = Heap::new();
        assert!(discover(&heap, &Value::Undefined, &Exclusions::none()).is_empty());
        assert!(discover(&heap, &Value::Null, &Exclusions::none()).is_empty());
    }

    #[test]
    fn opaque_callable_is_recorded_without_children() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let proxy = heap.alloc("proxy", true);
        let sibling = heap.alloc("sibling", true);
        heap.set(root, "proxy", Value::Object(proxy)).unwrap();
        heap.set(root, "sibling", Value::Object(sibling)).unwrap();
        heap.set(proxy, "hidden", Value::Object(sibling)).unwrap();
        heap.set_opaque(proxy, "ownKeys trap threw");

        let discovery = Walker::new(&heap, &Value::Object(root), &Exclusions::none()).run();
        assert_eq!(names(&discovery.entries), vec!["proxy", "sibling"]);
        assert_eq!(discovery.stats.faults_absorbed, 1);
    }

    #[test]
    fn excluded_getter_is_never_invoked() {
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        let func = heap.alloc("func", true);
        heap.set(root, "func", Value::Object(func)).unwrap();
        heap.define_property(
            func,
            "caller",
            PropertyDescriptor::accessor(Getter::Throws("strict mode".into())),
        )
        .unwrap();

        let discovery = Walker::new(&heap, &Value::Object(root), &default_exclusions()).run();
        assert_eq!(names(&discovery.entries), vec!["func"]);
        assert_eq!(discovery.stats.properties_excluded, 1);
        assert_eq!(discovery.stats.faults_absorbed, 0);
    }

    #[test]
    fn very_wide_object_is_walked_in_definition_order() {
        const WIDTH: usize = 100_000;
        let mut heap = Heap::new();
        let root = heap.alloc("root", false);
        for i in 0..WIDTH {
            let func = heap.alloc(format!("f{i}"), true);
            heap.set(root, &format!("f{i}"), Value::Object(func)).unwrap();
        }

        let discovery = Walker::new(&heap, &Value::Object(root), &Exclusions::none()).run();
        assert_eq!(discovery.entries.len(), WIDTH);
        assert_eq!(discovery.stats.objects_visited, WIDTH + 1);
        assert_eq!(discovery.entries[WIDTH - 1].name, format!("f{}", WIDTH - 1));
    }

    #[test]
    fn inherited_properties_are_not_walked() {
        let mut heap = Heap::new();
        let proto = heap.alloc("proto", false);
        let method = heap.alloc("method", true);
        heap.set(proto, "method", Value::Object(method)).unwrap();
        let root = heap.alloc("root", false);
        heap.set_prototype(root, Some(proto));

        assert!(discover(&heap, &Value::Object(root), &Exclusions::none()).is_empty());
    }
}
