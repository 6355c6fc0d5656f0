//! Typed, hashable path elements.
//!
//! [`Element`] is a closed tagged union. Two elements are equal only when
//! their variants match: `I32(5)` and `I64(5)` are distinct keys. Float
//! variants compare and hash by bit pattern, so NaN keys behave like any
//! other value. Map-valued elements hash with an order-independent
//! reducer, so insertion and iteration order never affect identity.

use serde::{Serialize, Serializer};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;

use crate::path::Path;

/// Seed folded into every element hash fed to [`crate::KeyMap`] and the
/// trie's hashed child index.
pub(crate) const CONTAINER_SEED: u64 = 0x7261_7468_6b65_7973;

/// A user-supplied key variant. Implementations provide their own hash
/// and equality; everything else about the element machinery applies
/// unchanged.
pub trait CustomKey: fmt::Debug + fmt::Display + Send + Sync {
    /// A hash consistent with [`CustomKey::eq_key`]: equal keys must
    /// return equal hashes.
    fn hash_key(&self) -> u64;
    /// Equality against another custom key. Implementations downcast via
    /// [`CustomKey::as_any`] and return `false` on a type mismatch.
    fn eq_key(&self, other: &dyn CustomKey) -> bool;
    fn as_any(&self) -> &dyn Any;
}

/// One element of a [`Path`].
#[derive(Debug, Clone)]
pub enum Element {
    Nil,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Composite map element. Equality is by entry multiset.
    Map(BTreeMap<String, Element>),
    /// Composite slice element. Equality is elementwise and ordered.
    Slice(Vec<Element>),
    /// An element that is itself a reference to another path.
    Pointer(Path),
    /// Matches any single element at its depth in a registered path.
    /// Equal only to itself, never to a user value.
    Wildcard,
    Custom(Arc<dyn CustomKey>),
}

impl Element {
    /// Stable string form for use as a map key in external systems.
    /// String elements pass through verbatim; everything else uses the
    /// canonical display form.
    pub fn key_str(&self) -> String {
        match self {
            Element::Str(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Hash under an explicit 64-bit seed. For any seed,
    /// `a == b` implies `a.hash_seeded(seed) == b.hash_seeded(seed)`.
    pub fn hash_seeded(&self, seed: u64) -> u64 {
        let mut h = FxHasher::default();
        h.write_u64(seed);
        self.fold(&mut h, seed);
        h.finish()
    }

    fn fold(&self, h: &mut FxHasher, seed: u64) {
        match self {
            Element::Nil => h.write_u8(0),
            Element::Bool(b) => {
                h.write_u8(1);
                h.write_u8(*b as u8);
            }
            Element::I8(v) => {
                h.write_u8(2);
                h.write_i8(*v);
            }
            Element::I16(v) => {
                h.write_u8(3);
                h.write_i16(*v);
            }
            Element::I32(v) => {
                h.write_u8(4);
                h.write_i32(*v);
            }
            Element::I64(v) => {
                h.write_u8(5);
                h.write_i64(*v);
            }
            Element::U8(v) => {
                h.write_u8(6);
                h.write_u8(*v);
            }
            Element::U16(v) => {
                h.write_u8(7);
                h.write_u16(*v);
            }
            Element::U32(v) => {
                h.write_u8(8);
                h.write_u32(*v);
            }
            Element::U64(v) => {
                h.write_u8(9);
                h.write_u64(*v);
            }
            Element::F32(v) => {
                h.write_u8(10);
                h.write_u32(v.to_bits());
            }
            Element::F64(v) => {
                h.write_u8(11);
                h.write_u64(v.to_bits());
            }
            Element::Str(s) => {
                h.write_u8(12);
                h.write(s.as_bytes());
                h.write_u8(0xff);
            }
            Element::Bytes(b) => {
                h.write_u8(13);
                h.write(b);
                h.write_u8(0xff);
            }
            Element::Map(m) => {
                // Order-independent reducer: per-entry hashes combine by
                // wrapping sum, so two maps with the same entry multiset
                // hash identically regardless of iteration order.
                h.write_u8(14);
                let mut sum = 0u64;
                for (k, v) in m {
                    let mut eh = FxHasher::default();
                    eh.write_u64(seed);
                    eh.write(k.as_bytes());
                    eh.write_u64(v.hash_seeded(seed));
                    sum = sum.wrapping_add(eh.finish());
                }
                h.write_u64(sum);
                h.write_usize(m.len());
            }
            Element::Slice(s) => {
                h.write_u8(15);
                for v in s {
                    h.write_u64(v.hash_seeded(seed));
                }
                h.write_usize(s.len());
            }
            Element::Pointer(p) => {
                h.write_u8(16);
                for el in p.iter() {
                    h.write_u64(el.hash_seeded(seed));
                }
                h.write_usize(p.len());
            }
            Element::Wildcard => h.write_u8(17),
            Element::Custom(c) => {
                h.write_u8(18);
                h.write_u64(c.hash_key());
            }
        }
    }

    /// Canonical JSON form.
    pub fn to_json_value(&self) -> serde_json::Value {
        use serde_json::{Map, Number, Value, json};
        match self {
            Element::Nil => Value::Null,
            Element::Bool(b) => Value::Bool(*b),
            Element::I8(v) => json!(*v),
            Element::I16(v) => json!(*v),
            Element::I32(v) => json!(*v),
            Element::I64(v) => json!(*v),
            Element::U8(v) => json!(*v),
            Element::U16(v) => json!(*v),
            Element::U32(v) => json!(*v),
            Element::U64(v) => json!(*v),
            Element::F32(v) => Number::from_f64(f64::from(*v))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Element::F64(v) => Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Element::Str(s) => Value::String(s.clone()),
            Element::Bytes(b) => Value::Array(b.iter().map(|&x| json!(x)).collect()),
            Element::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect::<Map<_, _>>(),
            ),
            Element::Slice(s) => Value::Array(s.iter().map(Element::to_json_value).collect()),
            Element::Pointer(p) => json!({ "_ptr": p.to_string() }),
            Element::Wildcard => json!({ "_wildcard": {} }),
            Element::Custom(c) => Value::String(c.to_string()),
        }
    }

    /// Inverse of [`Element::to_json_value`] for the value-level subset.
    /// Numbers map to the widest fitting variant (`I64`, `U64`, `F64`);
    /// the narrower widths have no JSON spelling of their own.
    pub fn from_json_value(value: &serde_json::Value) -> Element {
        use serde_json::Value;
        match value {
            Value::Null => Element::Nil,
            Value::Bool(b) => Element::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Element::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Element::U64(u)
                } else {
                    Element::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Element::Str(s.clone()),
            Value::Array(items) => {
                Element::Slice(items.iter().map(Element::from_json_value).collect())
            }
            Value::Object(m) => {
                if m.len() == 1 {
                    if let Some(Value::String(p)) = m.get("_ptr") {
                        return Element::Pointer(p.parse().unwrap_or_default());
                    }
                    if m.contains_key("_wildcard") {
                        return Element::Wildcard;
                    }
                }
                Element::Map(
                    m.iter()
                        .map(|(k, v)| (k.clone(), Element::from_json_value(v)))
                        .collect(),
                )
            }
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        match (self, other) {
            (Element::Nil, Element::Nil) => true,
            (Element::Bool(a), Element::Bool(b)) => a == b,
            (Element::I8(a), Element::I8(b)) => a == b,
            (Element::I16(a), Element::I16(b)) => a == b,
            (Element::I32(a), Element::I32(b)) => a == b,
            (Element::I64(a), Element::I64(b)) => a == b,
            (Element::U8(a), Element::U8(b)) => a == b,
            (Element::U16(a), Element::U16(b)) => a == b,
            (Element::U32(a), Element::U32(b)) => a == b,
            (Element::U64(a), Element::U64(b)) => a == b,
            (Element::F32(a), Element::F32(b)) => a.to_bits() == b.to_bits(),
            (Element::F64(a), Element::F64(b)) => a.to_bits() == b.to_bits(),
            (Element::Str(a), Element::Str(b)) => a == b,
            (Element::Bytes(a), Element::Bytes(b)) => a == b,
            (Element::Map(a), Element::Map(b)) => a == b,
            (Element::Slice(a), Element::Slice(b)) => a == b,
            (Element::Pointer(a), Element::Pointer(b)) => a == b,
            (Element::Wildcard, Element::Wildcard) => true,
            (Element::Custom(a), Element::Custom(b)) => a.eq_key(b.as_ref()),
            _ => false,
        }
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_seeded(CONTAINER_SEED));
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Element::Nil => write!(f, "null"),
            Element::Bool(b) => write!(f, "{b}"),
            Element::I8(v) => write!(f, "{v}"),
            Element::I16(v) => write!(f, "{v}"),
            Element::I32(v) => write!(f, "{v}"),
            Element::I64(v) => write!(f, "{v}"),
            Element::U8(v) => write!(f, "{v}"),
            Element::U16(v) => write!(f, "{v}"),
            Element::U32(v) => write!(f, "{v}"),
            Element::U64(v) => write!(f, "{v}"),
            Element::F32(v) => write!(f, "{v}"),
            Element::F64(v) => write!(f, "{v}"),
            Element::Str(s) => write!(f, "{s}"),
            Element::Bytes(b) => {
                write!(f, "0x")?;
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Element::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}:{v}")?;
                }
                write!(f, "}}")
            }
            Element::Slice(s) => {
                write!(f, "[")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Element::Pointer(p) => write!(f, "ptr({p})"),
            Element::Wildcard => write!(f, "*"),
            Element::Custom(c) => write!(f, "{c}"),
        }
    }
}

impl Serialize for Element {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json_value().serialize(serializer)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Element {
        Element::Str(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Element {
        Element::Str(value)
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Element {
        Element::Bool(value)
    }
}

impl From<i32> for Element {
    fn from(value: i32) -> Element {
        Element::I32(value)
    }
}

impl From<i64> for Element {
    fn from(value: i64) -> Element {
        Element::I64(value)
    }
}

impl From<u32> for Element {
    fn from(value: u32) -> Element {
        Element::U32(value)
    }
}

impl From<u64> for Element {
    fn from(value: u64) -> Element {
        Element::U64(value)
    }
}

impl From<f64> for Element {
    fn from(value: f64) -> Element {
        Element::F64(value)
    }
}

impl From<Vec<u8>> for Element {
    fn from(value: Vec<u8>) -> Element {
        Element::Bytes(value)
    }
}

impl From<Path> for Element {
    fn from(value: Path) -> Element {
        Element::Pointer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, Element)]) -> Element {
        Element::Map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn numeric_widths_are_distinct_keys() {
        assert_ne!(Element::I32(5), Element::I64(5));
        assert_ne!(Element::U8(5), Element::U16(5));
        assert_ne!(Element::I64(5), Element::U64(5));
        assert_eq!(Element::I64(5), Element::I64(5));
    }

    #[test]
    fn wildcard_equals_only_itself() {
        assert_eq!(Element::Wildcard, Element::Wildcard);
        assert_ne!(Element::Wildcard, Element::Str("*".to_string()));
        assert_ne!(Element::Wildcard, Element::Nil);
    }

    #[test]
    fn float_identity_is_bitwise() {
        assert_eq!(Element::F64(f64::NAN), Element::F64(f64::NAN));
        assert_ne!(Element::F64(0.0), Element::F64(-0.0));
        assert_eq!(
            Element::F64(f64::NAN).hash_seeded(3),
            Element::F64(f64::NAN).hash_seeded(3)
        );
    }

    #[test]
    fn map_identity_ignores_entry_order() {
        let a = map(&[("x", Element::I64(1)), ("y", Element::Str("v".into()))]);
        let b = map(&[("y", Element::Str("v".into())), ("x", Element::I64(1))]);
        assert_eq!(a, b);
        for seed in [0u64, 1, 0xdead_beef] {
            assert_eq!(a.hash_seeded(seed), b.hash_seeded(seed));
        }
    }

    #[test]
    fn equal_elements_hash_equal_for_any_seed() {
        let pairs = [
            (Element::Nil, Element::Nil),
            (Element::Str("eth0".into()), Element::Str("eth0".into())),
            (Element::Bytes(vec![1, 2, 3]), Element::Bytes(vec![1, 2, 3])),
            (
                Element::Slice(vec![Element::Bool(true), Element::U64(9)]),
                Element::Slice(vec![Element::Bool(true), Element::U64(9)]),
            ),
        ];
        for (a, b) in pairs {
            assert_eq!(a, b);
            for seed in [0u64, 7, u64::MAX] {
                assert_eq!(a.hash_seeded(seed), b.hash_seeded(seed));
            }
        }
    }

    #[test]
    fn key_str_passes_strings_through() {
        assert_eq!(Element::Str("intf".into()).key_str(), "intf");
        assert_eq!(Element::I64(-3).key_str(), "-3");
        assert_eq!(Element::Bytes(vec![0xab, 0x01]).key_str(), "0xab01");
        assert_eq!(Element::Wildcard.key_str(), "*");
    }

    #[test]
    fn json_value_roundtrip() {
        let el = map(&[
            ("counters", Element::Slice(vec![Element::I64(1), Element::I64(2)])),
            ("name", Element::Str("Ethernet1".into())),
            ("up", Element::Bool(true)),
        ]);
        let round = Element::from_json_value(&el.to_json_value());
        assert_eq!(el, round);
    }

    #[test]
    fn wildcard_and_pointer_json_forms_are_tagged() {
        let w = Element::Wildcard.to_json_value();
        assert_eq!(w, serde_json::json!({ "_wildcard": {} }));
        assert_eq!(Element::from_json_value(&w), Element::Wildcard);

        let p = Element::Pointer("/a/b".parse().unwrap());
        let v = p.to_json_value();
        assert_eq!(v, serde_json::json!({ "_ptr": "/a/b" }));
        assert_eq!(Element::from_json_value(&v), p);
    }

    #[derive(Debug)]
    struct DevId(u32);

    impl fmt::Display for DevId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "dev-{}", self.0)
        }
    }

    impl CustomKey for DevId {
        fn hash_key(&self) -> u64 {
            u64::from(self.0)
        }

        fn eq_key(&self, other: &dyn CustomKey) -> bool {
            other
                .as_any()
                .downcast_ref::<DevId>()
                .is_some_and(|o| o.0 == self.0)
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn custom_keys_use_user_equality() {
        let a = Element::Custom(Arc::new(DevId(7)));
        let b = Element::Custom(Arc::new(DevId(7)));
        let c = Element::Custom(Arc::new(DevId(8)));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.hash_seeded(11), b.hash_seeded(11));
        assert_eq!(a.to_string(), "dev-7");
    }
}
