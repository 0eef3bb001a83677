//! Helpers for the unit tests: ring comparison and small triangle soups.

use std::fmt::Debug;

use cgmath::{Point2, Point3};

use crate::{
    handle::PolygonHandle,
    store::{Corner, GeometryStore, UvSet},
};


/// Macro version of `cmp_rotated` with a nicer error message.
macro_rules! assert_rotated_eq {
    ($lhs:expr, $rhs:expr) => {{
        let lhs = $lhs;
        let rhs = $rhs;
        if let Err(rotated) = crate::test_utils::cmp_rotated(&lhs, &rhs) {
            panic!(
                "assert_rotated_eq failed:\n\
                    |  left: {:?} ({})\n\
                    | right: {:?} ({})\n",
                lhs,
                stringify!($lhs),
                rotated,
                stringify!($rhs),
            );
        }
    }};
}

/// Checks whether `actual` equals `expected` when both are treated as rings:
/// `[a, b, c]`, `[b, c, a]` and `[c, a, b]` are all equal.
///
/// On mismatch, `expected` is returned rotated to line up with `actual` as
/// good as possible, which makes the error message easier to read.
pub(crate) fn cmp_rotated<T: Debug + PartialEq + Clone>(
    actual: &[T],
    expected: &[T],
) -> Result<(), Vec<T>> {
    let mut rotated = expected.to_vec();
    if actual.len() != expected.len() {
        return Err(rotated);
    }

    if !actual.is_empty() {
        let pos = match actual.iter().position(|e| e == &expected[0]) {
            Some(pos) => pos,
            None => return Err(rotated),
        };
        rotated.rotate_right(pos);

        if actual != &rotated[..] {
            return Err(rotated);
        }
    }

    Ok(())
}

pub(crate) fn corner(x: f64, y: f64, z: f64) -> Corner {
    Corner::at(Point3::new(x, y, z))
}

pub(crate) fn uv_corner(x: f64, y: f64, z: f64, u: f64, v: f64) -> Corner {
    corner(x, y, z).with_uv(UvSet(0), Point2::new(u, v))
}

/// The two triangles of a quad given by its corners in winding order, split
/// along the diagonal from the first to the third corner.
pub(crate) fn quad_triangles(pts: [[f64; 3]; 4]) -> Vec<[Corner; 3]> {
    let c = |i: usize| corner(pts[i][0], pts[i][1], pts[i][2]);
    vec![[c(0), c(1), c(2)], [c(0), c(2), c(3)]]
}

/// Adds a `w` × `h` grid of unit quads in the xy-plane, row by row, all
/// wound counter-clockwise.
pub(crate) fn grid(store: &mut GeometryStore, w: usize, h: usize) -> Vec<PolygonHandle> {
    let mut out = Vec::with_capacity(w * h);
    for y in 0..h {
        for x in 0..w {
            let (x, y) = (x as f64, y as f64);
            out.push(store.add_polygon(quad_triangles([
                [x, y, 0.0],
                [x + 1.0, y, 0.0],
                [x + 1.0, y + 1.0, 0.0],
                [x, y + 1.0, 0.0],
            ])));
        }
    }
    out
}

/// Adds the six faces of the unit cube, wound counter-clockwise when seen
/// from outside.
pub(crate) fn cube(store: &mut GeometryStore) -> Vec<PolygonHandle> {
    let faces = [
        [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
        [[0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [1.0, 1.0, 1.0], [0.0, 1.0, 1.0]],
        [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0]],
        [[0.0, 1.0, 0.0], [0.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, 0.0]],
        [[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 1.0], [0.0, 1.0, 0.0]],
        [[1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [1.0, 1.0, 1.0], [1.0, 0.0, 1.0]],
    ];
    faces.iter().map(|&f| store.add_polygon(quad_triangles(f))).collect()
}

/// Adds three quads sharing the edge (0,0,0) -- (1,0,0): two of them form a
/// flat, consistently wound strip and the third one sticks out as a fin.
pub(crate) fn fin(store: &mut GeometryStore) -> [PolygonHandle; 3] {
    [
        store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0],
        ])),
        store.add_polygon(quad_triangles([
            [1.0, 0.0, 0.0], [0.0, 0.0, 0.0], [0.0, -1.0, 0.0], [1.0, -1.0, 0.0],
        ])),
        store.add_polygon(quad_triangles([
            [0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0, 1.0], [0.0, 0.0, 1.0],
        ])),
    ]
}


#[test]
fn cmp_rotated_rings() {
    assert!(cmp_rotated::<u8>(&[], &[]).is_ok());
    assert!(cmp_rotated(&[1, 2, 3], &[1, 2, 3]).is_ok());
    assert!(cmp_rotated(&[1, 2, 3], &[2, 3, 1]).is_ok());
    assert!(cmp_rotated(&[1, 2, 3], &[3, 1, 2]).is_ok());

    assert_eq!(cmp_rotated(&[1, 2, 3], &[3, 2, 1]), Err(vec![2, 1, 3]));
    assert!(cmp_rotated(&[1, 2, 3], &[1, 2]).is_err());
    assert!(cmp_rotated(&[1, 2, 3], &[4, 5, 6]).is_err());
}
