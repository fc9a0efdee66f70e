//! Structural Equality
//!
//! Nodes only propagate when a write actually changes their value. "Changes"
//! is decided by [`StructuralEq`], a deep, non-reference equality:
//!
//! - absent values (`None`) compare equal to each other
//! - `NaN` compares equal to `NaN`
//! - sequences compare element-wise, maps by key set and per-key value
//! - shared pointers compare by identity first, then by contents
//!
//! The trait is implemented for the usual primitives and containers. Domain
//! types whose `PartialEq` is already structural can opt in with
//! [`impl_structural_eq!`](crate::impl_structural_eq).

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use indexmap::IndexMap;

/// Deep structural equality used to gate node updates.
pub trait StructuralEq {
    /// Returns true if `self` and `other` are structurally equal.
    fn structural_eq(&self, other: &Self) -> bool;
}

/// Compare two values with [`StructuralEq`].
pub fn equal<T: StructuralEq + ?Sized>(a: &T, b: &T) -> bool {
    a.structural_eq(b)
}

/// Implement [`StructuralEq`] for types whose `PartialEq` is already
/// structural.
///
/// ```rust,ignore
/// #[derive(Clone, PartialEq)]
/// struct Point { x: i32, y: i32 }
///
/// arbor_core::impl_structural_eq!(Point);
/// ```
#[macro_export]
macro_rules! impl_structural_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::reactive::StructuralEq for $ty {
                fn structural_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

impl_structural_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    String,
    str,
    &'static str,
    std::time::Duration,
    std::time::SystemTime,
);

impl StructuralEq for f32 {
    fn structural_eq(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }
}

impl StructuralEq for f64 {
    fn structural_eq(&self, other: &Self) -> bool {
        (self.is_nan() && other.is_nan()) || self == other
    }
}

impl<T: StructuralEq> StructuralEq for Option<T> {
    fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.structural_eq(b),
            _ => false,
        }
    }
}

impl<T: StructuralEq> StructuralEq for [T] {
    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.structural_eq(b))
    }
}

impl<T: StructuralEq, const N: usize> StructuralEq for [T; N] {
    fn structural_eq(&self, other: &Self) -> bool {
        self[..].structural_eq(&other[..])
    }
}

impl<T: StructuralEq> StructuralEq for Vec<T> {
    fn structural_eq(&self, other: &Self) -> bool {
        self[..].structural_eq(&other[..])
    }
}

impl<T: StructuralEq + ?Sized> StructuralEq for Box<T> {
    fn structural_eq(&self, other: &Self) -> bool {
        (**self).structural_eq(&**other)
    }
}

impl<T: StructuralEq + ?Sized> StructuralEq for Arc<T> {
    fn structural_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other) || (**self).structural_eq(&**other)
    }
}

impl<K, V, S> StructuralEq for HashMap<K, V, S>
where
    K: Eq + Hash,
    V: StructuralEq,
    S: BuildHasher,
{
    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|w| v.structural_eq(w)))
    }
}

impl<K, V, S> StructuralEq for IndexMap<K, V, S>
where
    K: Eq + Hash,
    V: StructuralEq,
    S: BuildHasher,
{
    fn structural_eq(&self, other: &Self) -> bool {
        // Key order is not part of the comparison, only the key set.
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|w| v.structural_eq(w)))
    }
}

impl<K: Ord, V: StructuralEq> StructuralEq for BTreeMap<K, V> {
    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|w| v.structural_eq(w)))
    }
}

macro_rules! tuple_structural_eq {
    ($(($($name:ident : $idx:tt),+))+) => {
        $(
            impl<$($name: StructuralEq),+> StructuralEq for ($($name,)+) {
                fn structural_eq(&self, other: &Self) -> bool {
                    $(self.$idx.structural_eq(&other.$idx))&&+
                }
            }
        )+
    };
}

tuple_structural_eq! {
    (A: 0)
    (A: 0, B: 1)
    (A: 0, B: 1, C: 2)
    (A: 0, B: 1, C: 2, D: 3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_are_equal() {
        assert!(equal(&None::<i32>, &None));
        assert!(!equal(&None, &Some(0)));
    }

    #[test]
    fn nan_equals_nan() {
        assert!(equal(&f64::NAN, &f64::NAN));
        assert!(equal(&f32::NAN, &f32::NAN));
        assert!(!equal(&f64::NAN, &1.0));
        assert!(equal(&Some(f64::NAN), &Some(f64::NAN)));
    }

    #[test]
    fn sequences_compare_element_wise() {
        assert!(equal(&vec![1.0, f64::NAN], &vec![1.0, f64::NAN]));
        assert!(!equal(&vec![1, 2], &vec![1, 2, 3]));
        assert!(equal(&[1, 2, 3], &[1, 2, 3]));
    }

    #[test]
    fn maps_ignore_insertion_order() {
        let mut a = IndexMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let mut b = IndexMap::new();
        b.insert("y", 2);
        b.insert("x", 1);
        assert!(equal(&a, &b));

        b.insert("z", 3);
        assert!(!equal(&a, &b));
    }

    #[test]
    fn arcs_compare_by_contents() {
        let a = Arc::new(vec![1, 2]);
        let b = Arc::new(vec![1, 2]);
        assert!(equal(&a, &a.clone()));
        assert!(equal(&a, &b));
    }

    #[test]
    fn tuples_compare_component_wise() {
        assert!(equal(&(1, "a".to_string()), &(1, "a".to_string())));
        assert!(!equal(&(1, 2.0, true), &(1, 2.0, false)));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    crate::impl_structural_eq!(Point);

    #[test]
    fn macro_opts_in_domain_types() {
        assert!(equal(&Point { x: 1, y: 2 }, &Point { x: 1, y: 2 }));
        assert!(!equal(&Point { x: 1, y: 2 }, &Point { x: 2, y: 1 }));
    }
}
