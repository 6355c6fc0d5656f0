//! Associative container keyed by [`Element`].

use rustc_hash::FxHashMap;

use crate::key::Element;

/// A map from [`Element`] to `V`.
///
/// Every element variant is usable as a key, including composite maps and
/// user-supplied [`crate::CustomKey`] variants; identity follows element
/// equality, not spelling or insertion order. Not thread-safe; callers
/// serialize mutations.
#[derive(Debug, Clone, Default)]
pub struct KeyMap<V> {
    inner: FxHashMap<Element, V>,
}

impl<V> KeyMap<V> {
    pub fn new() -> KeyMap<V> {
        KeyMap {
            inner: FxHashMap::default(),
        }
    }

    /// Inserts or replaces. Returns `true` iff no prior value existed for
    /// the key.
    pub fn set(&mut self, key: Element, value: V) -> bool {
        self.inner.insert(key, value).is_none()
    }

    pub fn get(&self, key: &Element) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &Element) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn entry(&mut self, key: Element) -> &mut V
    where
        V: Default,
    {
        self.inner.entry(key).or_default()
    }

    /// Removes the entry, returning its value if one existed.
    pub fn delete(&mut self, key: &Element) -> Option<V> {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Element, &V)> {
        self.inner.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Element, &mut V)> {
        self.inner.iter_mut()
    }

    /// Keeps only the entries for which `keep` returns `true`. This is
    /// the supported way to drop entries while walking the map.
    pub fn retain(&mut self, keep: impl FnMut(&Element, &mut V) -> bool) {
        self.inner.retain(keep);
    }
}

impl<V> FromIterator<(Element, V)> for KeyMap<V> {
    fn from_iter<I: IntoIterator<Item = (Element, V)>>(iter: I) -> KeyMap<V> {
        KeyMap {
            inner: iter.into_iter().collect(),
        }
    }
}
