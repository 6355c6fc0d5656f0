//! Wildcard-capable path trie.
//!
//! Maps registered [`Path`]s (which may contain [`Element::Wildcard`]) to
//! values. Lookup cost is proportional to path length; `visit` against a
//! trie with both a wildcard and a concrete branch at every level visits
//! O(2^n) nodes, which is the price of the matching semantics, not an
//! implementation artifact. Not thread-safe; callers serialize mutations.

use std::fmt;

use crate::key::Element;
use crate::keymap::KeyMap;
use crate::path::Path;

/// Child fan-out above which a node switches from a linear vector to a
/// hashed index.
const SMALL_CHILDREN_MAX: usize = 8;

enum Children<V> {
    Small(Vec<(Element, Node<V>)>),
    Hashed(KeyMap<Node<V>>),
}

impl<V> Default for Children<V> {
    fn default() -> Children<V> {
        Children::Small(Vec::new())
    }
}

impl<V> Children<V> {
    fn get(&self, el: &Element) -> Option<&Node<V>> {
        match self {
            Children::Small(vec) => vec.iter().find(|(k, _)| k == el).map(|(_, n)| n),
            Children::Hashed(map) => map.get(el),
        }
    }

    fn get_mut(&mut self, el: &Element) -> Option<&mut Node<V>> {
        match self {
            Children::Small(vec) => vec.iter_mut().find(|(k, _)| k == el).map(|(_, n)| n),
            Children::Hashed(map) => map.get_mut(el),
        }
    }

    fn get_or_insert(&mut self, el: &Element) -> &mut Node<V> {
        if let Children::Small(vec) = self {
            if vec.len() >= SMALL_CHILDREN_MAX && !vec.iter().any(|(k, _)| k == el) {
                let hashed: KeyMap<Node<V>> = std::mem::take(vec).into_iter().collect();
                *self = Children::Hashed(hashed);
            }
        }
        match self {
            Children::Small(vec) => {
                if let Some(idx) = vec.iter().position(|(k, _)| k == el) {
                    &mut vec[idx].1
                } else {
                    let idx = vec.len();
                    vec.push((el.clone(), Node::default()));
                    &mut vec[idx].1
                }
            }
            Children::Hashed(map) => map.entry(el.clone()),
        }
    }

    fn remove(&mut self, el: &Element) -> bool {
        match self {
            Children::Small(vec) => match vec.iter().position(|(k, _)| k == el) {
                Some(idx) => {
                    vec.remove(idx);
                    true
                }
                None => false,
            },
            Children::Hashed(map) => map.delete(el).is_some(),
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&Element, &Node<V>)> + '_> {
        match self {
            Children::Small(vec) => Box::new(vec.iter().map(|(k, n)| (k, n))),
            Children::Hashed(map) => Box::new(map.iter()),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Children::Small(vec) => vec.is_empty(),
            Children::Hashed(map) => map.is_empty(),
        }
    }
}

struct Node<V> {
    value: Option<V>,
    wildcard: Option<Box<Node<V>>>,
    children: Children<V>,
}

impl<V> Default for Node<V> {
    fn default() -> Node<V> {
        Node {
            value: None,
            wildcard: None,
            children: Children::default(),
        }
    }
}

impl<V> Node<V> {
    fn is_unused(&self) -> bool {
        self.value.is_none() && self.wildcard.is_none() && self.children.is_empty()
    }
}

/// A mapping from registered paths to values. See the module docs for
/// matching semantics.
pub struct PathTrie<V> {
    root: Node<V>,
    len: usize,
}

impl<V> Default for PathTrie<V> {
    fn default() -> PathTrie<V> {
        PathTrie::new()
    }
}

impl<V> PathTrie<V> {
    pub fn new() -> PathTrie<V> {
        PathTrie {
            root: Node::default(),
            len: 0,
        }
    }

    /// Number of registered paths.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.root.is_unused()
    }

    /// Inserts or replaces the value at exactly `path`. Returns `true`
    /// iff no prior value existed there.
    pub fn set(&mut self, path: &Path, value: V) -> bool {
        let mut node = &mut self.root;
        for el in path.iter() {
            node = match el {
                Element::Wildcard => node.wildcard.get_or_insert_with(Box::default).as_mut(),
                el => node.children.get_or_insert(el),
            };
        }
        let inserted = node.value.is_none();
        node.value = Some(value);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    /// Exact lookup: wildcard elements in `path` descend the wildcard
    /// slot, everything else the concrete child for that element.
    pub fn get(&self, path: &Path) -> Option<&V> {
        let mut node = &self.root;
        for el in path.iter() {
            node = match el {
                Element::Wildcard => node.wildcard.as_deref()?,
                el => node.children.get(el)?,
            };
        }
        node.value.as_ref()
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut V> {
        let mut node = &mut self.root;
        for el in path.iter() {
            node = match el {
                Element::Wildcard => node.wildcard.as_deref_mut()?,
                el => node.children.get_mut(el)?,
            };
        }
        node.value.as_mut()
    }

    /// Removes the value at exactly `path`, pruning any ancestors left
    /// with no value, no wildcard child, and no concrete children. The
    /// root node itself is never removed. Returns `true` iff a value was
    /// present.
    pub fn delete(&mut self, path: &Path) -> bool {
        let (deleted, _) = Self::delete_in(&mut self.root, path.as_slice());
        if deleted {
            self.len -= 1;
        }
        deleted
    }

    fn delete_in(node: &mut Node<V>, elements: &[Element]) -> (bool, bool) {
        let Some((first, rest)) = elements.split_first() else {
            let deleted = node.value.take().is_some();
            return (deleted, node.is_unused());
        };
        let deleted = match first {
            Element::Wildcard => match node.wildcard.as_deref_mut() {
                Some(child) => {
                    let (deleted, empty) = Self::delete_in(child, rest);
                    if empty {
                        node.wildcard = None;
                    }
                    deleted
                }
                None => false,
            },
            el => match node.children.get_mut(el) {
                Some(child) => {
                    let (deleted, empty) = Self::delete_in(child, rest);
                    if empty {
                        node.children.remove(el);
                    }
                    deleted
                }
                None => false,
            },
        };
        (deleted, node.is_unused())
    }

    /// Calls `f` with the value of every registered path that matches the
    /// concrete path `path`: same length, and elementwise either equal or
    /// registered as a wildcard. The first error short-circuits the walk
    /// and is returned verbatim.
    pub fn visit<E>(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        Self::visit_in(&self.root, path.as_slice(), f)
    }

    fn visit_in<E>(
        node: &Node<V>,
        elements: &[Element],
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        let Some((first, rest)) = elements.split_first() else {
            if let Some(v) = &node.value {
                f(v)?;
            }
            return Ok(());
        };
        if let Some(wild) = &node.wildcard {
            Self::visit_in(wild, rest, f)?;
        }
        if let Some(child) = node.children.get(first) {
            Self::visit_in(child, rest, f)?;
        }
        Ok(())
    }

    /// Like [`PathTrie::visit`], but also calls `f` for every registered
    /// path that matches a strict prefix of `path` (including the root).
    pub fn visit_prefixes<E>(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        Self::visit_prefixes_in(&self.root, path.as_slice(), f)
    }

    fn visit_prefixes_in<E>(
        node: &Node<V>,
        elements: &[Element],
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        if let Some(v) = &node.value {
            f(v)?;
        }
        let Some((first, rest)) = elements.split_first() else {
            return Ok(());
        };
        if let Some(wild) = &node.wildcard {
            Self::visit_prefixes_in(wild, rest, f)?;
        }
        if let Some(child) = node.children.get(first) {
            Self::visit_prefixes_in(child, rest, f)?;
        }
        Ok(())
    }

    /// Calls `f` with the value of every registered path of length at
    /// least `|path|` whose first `|path|` elements are matched by
    /// `path`. Unlike [`PathTrie::visit`], the wildcard here is honored
    /// on the query side: a wildcard element in `path` matches every
    /// branch at that depth, while a concrete element matches only the
    /// identical registered element.
    pub fn visit_prefixed<E>(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        Self::visit_prefixed_in(&self.root, path.as_slice(), f)
    }

    fn visit_prefixed_in<E>(
        node: &Node<V>,
        elements: &[Element],
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        let Some((first, rest)) = elements.split_first() else {
            return Self::visit_subtree_in(node, f);
        };
        match first {
            Element::Wildcard => {
                if let Some(wild) = &node.wildcard {
                    Self::visit_prefixed_in(wild, rest, f)?;
                }
                for (_, child) in node.children.iter() {
                    Self::visit_prefixed_in(child, rest, f)?;
                }
            }
            el => {
                if let Some(child) = node.children.get(el) {
                    Self::visit_prefixed_in(child, rest, f)?;
                }
            }
        }
        Ok(())
    }

    fn visit_subtree_in<E>(
        node: &Node<V>,
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        if let Some(v) = &node.value {
            f(v)?;
        }
        if let Some(wild) = &node.wildcard {
            Self::visit_subtree_in(wild, f)?;
        }
        for (_, child) in node.children.iter() {
            Self::visit_subtree_in(child, f)?;
        }
        Ok(())
    }

    /// Calls `f` with every value registered exactly one level below a
    /// node matched by `path` (under [`PathTrie::visit`] matching).
    pub fn visit_children<E>(
        &self,
        path: &Path,
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        Self::visit_children_in(&self.root, path.as_slice(), f)
    }

    fn visit_children_in<E>(
        node: &Node<V>,
        elements: &[Element],
        f: &mut dyn FnMut(&V) -> Result<(), E>,
    ) -> Result<(), E> {
        let Some((first, rest)) = elements.split_first() else {
            if let Some(wild) = &node.wildcard {
                if let Some(v) = &wild.value {
                    f(v)?;
                }
            }
            for (_, child) in node.children.iter() {
                if let Some(v) = &child.value {
                    f(v)?;
                }
            }
            return Ok(());
        };
        if let Some(wild) = &node.wildcard {
            Self::visit_children_in(wild, rest, f)?;
        }
        if let Some(child) = node.children.get(first) {
            Self::visit_children_in(child, rest, f)?;
        }
        Ok(())
    }

    /// Returns the longest registered prefix of `path` and its value.
    /// Only concrete children participate: registered wildcards are not
    /// prefixes of anything here.
    pub fn longest_prefix(&self, path: &Path) -> Option<(Path, &V)> {
        let mut best = self.root.value.as_ref().map(|v| (0, v));
        let mut node = &self.root;
        for (depth, el) in path.iter().enumerate() {
            match node.children.get(el) {
                Some(child) => {
                    node = child;
                    if let Some(v) = &node.value {
                        best = Some((depth + 1, v));
                    }
                }
                None => break,
            }
        }
        best.map(|(depth, v)| (Path::from_elements(path[..depth].to_vec()), v))
    }

    /// All registered (path, value) pairs, in unspecified order.
    pub fn flatten(&self) -> Vec<(Path, &V)> {
        let mut out = Vec::with_capacity(self.len);
        let mut prefix = Vec::new();
        Self::flatten_in(&self.root, &mut prefix, &mut out);
        out
    }

    fn flatten_in<'a>(
        node: &'a Node<V>,
        prefix: &mut Vec<Element>,
        out: &mut Vec<(Path, &'a V)>,
    ) {
        if let Some(v) = &node.value {
            out.push((Path::from_elements(prefix.clone()), v));
        }
        if let Some(wild) = &node.wildcard {
            prefix.push(Element::Wildcard);
            Self::flatten_in(wild, prefix, out);
            prefix.pop();
        }
        for (el, child) in node.children.iter() {
            prefix.push(el.clone());
            Self::flatten_in(child, prefix, out);
            prefix.pop();
        }
    }
}

/// Deterministic serialization: entries sorted by path string form.
impl<V: fmt::Display> fmt::Display for PathTrie<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<(String, &V)> = self
            .flatten()
            .into_iter()
            .map(|(p, v)| (p.to_string(), v))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        write!(f, "{{")?;
        for (i, (p, v)) in entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}: {v}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc() -> Element {
        Element::Wildcard
    }

    fn s(name: &str) -> Element {
        Element::from(name)
    }

    fn path(elements: Vec<Element>) -> Path {
        Path::from_elements(elements)
    }

    /// All eight wildcard/concrete combinations over three levels match a
    /// fully concrete query.
    #[test]
    fn visit_matches_every_wildcard_combination() {
        let mut trie = PathTrie::new();
        let patterns: [(Vec<Element>, i64); 8] = [
            (vec![s("foo"), s("bar"), s("baz")], 1),
            (vec![wc(), s("bar"), s("baz")], 2),
            (vec![wc(), wc(), s("baz")], 3),
            (vec![wc(), wc(), wc()], 4),
            (vec![s("foo"), wc(), wc()], 5),
            (vec![s("foo"), s("bar"), wc()], 6),
            (vec![s("foo"), wc(), s("baz")], 7),
            (vec![wc(), s("bar"), wc()], 8),
        ];
        for (p, v) in patterns {
            assert!(trie.set(&path(p), v));
        }
        let query = Path::from_strings(["foo", "bar", "baz"]);
        let mut got = Vec::new();
        trie.visit::<()>(&query, &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn visit_requires_equal_length() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["a", "b"]), 1);
        trie.set(&Path::from_strings(["a"]), 2);
        let mut got = Vec::new();
        trie.visit::<()>(&Path::from_strings(["a"]), &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        assert_eq!(got, vec![2]);
    }

    #[test]
    fn set_then_get_then_delete_roundtrip() {
        let mut trie = PathTrie::new();
        let p = Path::from_strings(["x", "y"]);
        assert!(trie.set(&p, 10));
        assert!(!trie.set(&p, 11));
        assert_eq!(trie.get(&p), Some(&11));
        assert!(trie.delete(&p));
        assert_eq!(trie.get(&p), None);
        assert!(!trie.delete(&p));
        assert!(trie.is_empty());
    }

    #[test]
    fn delete_prunes_only_unused_ancestors() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&Path::from_strings(["a", "b", "c"]), 2);
        assert!(trie.delete(&Path::from_strings(["a", "b", "c"])));
        // /a survives, /a/b was pruned.
        assert_eq!(trie.get(&Path::from_strings(["a"])), Some(&1));
        assert!(!trie.is_empty());
        assert!(trie.delete(&Path::from_strings(["a"])));
        assert!(trie.is_empty());
    }

    #[test]
    fn wildcard_patterns_are_distinct_registrations() {
        let mut trie = PathTrie::new();
        let concrete = Path::from_strings(["intf", "eth0"]);
        let pattern = path(vec![s("intf"), wc()]);
        assert!(trie.set(&concrete, 1));
        assert!(trie.set(&pattern, 2));
        assert_eq!(trie.get(&concrete), Some(&1));
        assert_eq!(trie.get(&pattern), Some(&2));
        assert!(trie.delete(&pattern));
        assert_eq!(trie.get(&concrete), Some(&1));
    }

    #[test]
    fn numeric_width_elements_do_not_match_each_other() {
        let mut trie = PathTrie::new();
        trie.set(&path(vec![Element::I32(5)]), 1);
        assert_eq!(trie.get(&path(vec![Element::I64(5)])), None);
        assert_eq!(trie.get(&path(vec![Element::I32(5)])), Some(&1));
    }

    #[test]
    fn visit_prefixes_includes_root_and_wildcard_ancestors() {
        let mut trie = PathTrie::new();
        trie.set(&Path::root(), 0);
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&path(vec![wc()]), 2);
        trie.set(&Path::from_strings(["a", "b"]), 3);
        trie.set(&Path::from_strings(["a", "b", "c"]), 4);
        trie.set(&Path::from_strings(["z"]), 5);
        let mut got = Vec::new();
        trie.visit_prefixes::<()>(&Path::from_strings(["a", "b"]), &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3]);
    }

    #[test]
    fn visit_prefixed_enumerates_subtrees() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&Path::from_strings(["a", "b"]), 2);
        trie.set(&path(vec![s("a"), wc()]), 3);
        trie.set(&path(vec![wc(), s("b")]), 4);
        trie.set(&Path::from_strings(["z", "b"]), 5);

        // Concrete query element selects only the identical branch:
        // /*/b is not under /a here.
        let mut got = Vec::new();
        trie.visit_prefixed::<()>(&Path::from_strings(["a"]), &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3]);

        // A wildcard query element fans out to every branch.
        let mut got = Vec::new();
        trie.visit_prefixed::<()>(&path(vec![wc()]), &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn visit_children_reports_next_level_only() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["a", "b"]), 1);
        trie.set(&path(vec![s("a"), wc()]), 2);
        trie.set(&Path::from_strings(["a", "c"]), 3);
        trie.set(&Path::from_strings(["a", "b", "d"]), 4);
        trie.set(&Path::from_strings(["a"]), 5);
        let mut got = Vec::new();
        trie.visit_children::<()>(&Path::from_strings(["a"]), &mut |v| {
            got.push(*v);
            Ok(())
        })
        .unwrap();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn longest_prefix_is_concrete_only() {
        let mut trie = PathTrie::new();
        trie.set(&Path::root(), 0);
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&Path::from_strings(["a", "b"]), 2);
        trie.set(&Path::from_strings(["a", "b", "c", "d"]), 3);
        trie.set(&Path::from_strings(["a", "b", "c", "d", "e"]), 4);

        let (p, v) = trie
            .longest_prefix(&Path::from_strings(["a", "b", "c"]))
            .expect("prefix should exist");
        assert_eq!(p.to_string(), "/a/b");
        assert_eq!(*v, 2);

        let (p, v) = trie
            .longest_prefix(&Path::from_strings(["x"]))
            .expect("root should match");
        assert_eq!(p, Path::root());
        assert_eq!(*v, 0);

        let empty: PathTrie<i64> = PathTrie::new();
        assert!(empty.longest_prefix(&Path::from_strings(["a"])).is_none());

        // Registered wildcards do not participate.
        let mut wild = PathTrie::new();
        wild.set(&path(vec![wc()]), 9);
        assert!(wild.longest_prefix(&Path::from_strings(["a"])).is_none());
    }

    #[test]
    fn visitor_errors_short_circuit() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&path(vec![wc()]), 2);
        let mut calls = 0;
        let err = trie.visit(&Path::from_strings(["a"]), &mut |_| {
            calls += 1;
            Err("stop")
        });
        assert_eq!(err, Err("stop"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn wide_fanout_promotes_to_hashed_children() {
        let mut trie = PathTrie::new();
        for i in 0..64i64 {
            assert!(trie.set(&path(vec![Element::I64(i), s("leaf")]), i));
        }
        assert_eq!(trie.len(), 64);
        for i in 0..64i64 {
            assert_eq!(trie.get(&path(vec![Element::I64(i), s("leaf")])), Some(&i));
        }
        for i in 0..64i64 {
            assert!(trie.delete(&path(vec![Element::I64(i), s("leaf")])));
        }
        assert!(trie.is_empty());
    }

    #[test]
    fn display_is_sorted_and_stable() {
        let mut trie = PathTrie::new();
        trie.set(&Path::from_strings(["b"]), 2);
        trie.set(&Path::from_strings(["a"]), 1);
        trie.set(&path(vec![s("a"), wc()]), 3);
        assert_eq!(trie.to_string(), "{/a: 1, /a/*: 3, /b: 2}");
    }

    #[test]
    fn set_and_delete_restore_emptiness() {
        let mut trie = PathTrie::new();
        assert!(trie.is_empty());
        let p = path(vec![s("a"), wc(), s("c")]);
        trie.set(&p, 7);
        assert!(!trie.is_empty());
        trie.delete(&p);
        assert!(trie.is_empty());
        assert_eq!(trie.len(), 0);
    }
}
