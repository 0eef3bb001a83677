//! Handles: stable integer ids for the elements of a triangle soup and of
//! the connectivity rebuilt from it.
//!
//! Every polygon, triangle, corner and boundary edge gets a handle when it is
//! created. Handles are created sequentially by the arena owning the element
//! and are never reused, so a handle doubles as an index into a
//! [`DenseMap`][crate::map::DenseMap]. Two corners with the exact same
//! position are still two different corners: identity is always the handle,
//! never the geometric value.

use std::{fmt, hash::Hash};

use optional::{Noned, OptEq};
use static_assertions::assert_eq_size;


/// The integer type used for all handles.
///
/// This is `u32` by default and `u64` if the `large-handle` feature is
/// enabled. Meshes with more than 2³² − 1 corners are rare, but they exist.
#[cfg(not(feature = "large-handle"))]
#[allow(non_camel_case_types)]
pub type hsize = u32;

#[cfg(feature = "large-handle")]
#[allow(non_camel_case_types)]
pub type hsize = u64;


/// Types that represent the identity of one element.
///
/// The maximum index (`hsize::max_value()`) is reserved as "none" value, see
/// the `optional::Noned` impls of the handle types.
pub trait Handle: 'static + Copy + fmt::Debug + Eq + Ord + Hash {
    /// Creates a handle from the given index.
    fn new(idx: hsize) -> Self;

    /// Returns the index of this handle.
    fn idx(&self) -> hsize;

    /// Helper method to create a handle from a `usize`.
    ///
    /// Panics if `raw` is too large to fit into `hsize`.
    #[inline(always)]
    fn from_usize(raw: usize) -> Self {
        assert!(
            raw < hsize::max_value() as usize,
            "handle index {} does not fit into `hsize`",
            raw,
        );
        Self::new(raw as hsize)
    }

    /// Helper method to get the index as `usize`.
    #[inline(always)]
    fn to_usize(&self) -> usize {
        self.idx() as usize
    }
}

macro_rules! make_handle_type {
    ($(#[$attr:meta])* $name:ident = $short:expr;) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(hsize);

        impl Handle for $name {
            #[inline(always)]
            fn new(idx: hsize) -> Self {
                $name(idx)
            }

            #[inline(always)]
            fn idx(&self) -> hsize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}{}", $short, self.0)
            }
        }

        impl Noned for $name {
            fn is_none(&self) -> bool {
                self.0 == hsize::max_value()
            }
            fn get_none() -> Self {
                $name(hsize::max_value())
            }
        }

        impl OptEq for $name {
            fn opt_eq(&self, other: &Self) -> bool {
                self == other
            }
        }
    };
}

make_handle_type! {
    /// A handle referring to one polygon (n-gon face) of the input.
    PolygonHandle = "P";
}
make_handle_type! {
    /// A handle referring to one triangle of the input.
    TriangleHandle = "T";
}
make_handle_type! {
    /// A handle referring to one triangle corner of the input.
    CornerHandle = "C";
}
make_handle_type! {
    /// A handle referring to one directed boundary edge of a polygon.
    EdgeHandle = "E";
}

assert_eq_size!(PolygonHandle, hsize);
assert_eq_size!(TriangleHandle, hsize);
assert_eq_size!(CornerHandle, hsize);
assert_eq_size!(EdgeHandle, hsize);


#[cfg(test)]
mod tests {
    use optional::Optioned;
    use super::*;

    #[test]
    fn debug_output() {
        assert_eq!(format!("{:?}", PolygonHandle::new(3)), "P3");
        assert_eq!(format!("{:?}", CornerHandle::from_usize(17)), "C17");
        assert_eq!(format!("{:?}", EdgeHandle::new(0)), "E0");
    }

    #[test]
    fn optioned_handles() {
        let none = Optioned::<PolygonHandle>::none();
        assert!(none.is_none());

        let some = Optioned::some(PolygonHandle::new(5));
        assert_eq!(some.into_option(), Some(PolygonHandle::new(5)));
    }

    #[test]
    #[should_panic]
    fn from_usize_overflow() {
        CornerHandle::from_usize(hsize::max_value() as usize);
    }
}
