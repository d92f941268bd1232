// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.

//! Immutable polygon outline with containment and overlap tests

use super::Location;
use crate::error::{Error, Result};

/// Closed polygon; edges run from each vertex to the next, wrapping around.
#[derive(Debug, Clone, PartialEq)]
pub struct Outline {
    vertices: Vec<Location>,
}

impl Outline {
    pub const MIN_VERTICES: usize = 3;

    pub fn new<I, L>(vertices: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Location>,
    {
        let vertices: Vec<Location> = vertices.into_iter().map(Into::into).collect();
        if vertices.len() < Self::MIN_VERTICES {
            return Err(Error::TooFewVertices(vertices.len()));
        }
        Ok(Self { vertices })
    }

    pub fn vertices(&self) -> &[Location] {
        &self.vertices
    }

    fn edges(&self) -> impl Iterator<Item = (Location, Location)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Winding-number containment test.
    ///
    /// Points on an edge that crosses the point's horizontal line count as
    /// inside, so most boundary points are included.
    pub fn is_location_inside(&self, point: &Location) -> bool {
        let mut winding = 0i32;

        for (v1, v2) in self.edges() {
            if v1.y <= point.y {
                if v2.y > point.y && is_left(&v1, &v2, point) > 0.0 {
                    winding += 1;
                }
            } else if v2.y <= point.y && is_left(&v1, &v2, point) < 0.0 {
                winding -= 1;
            }
        }

        winding != 0
    }

    /// True if any vertex of either outline lies inside the other, or any
    /// pair of edges properly crosses. Touching or collinear edges do not
    /// count as a crossing.
    pub fn overlaps(&self, other: &Outline) -> bool {
        if self.vertices.iter().any(|v| other.is_location_inside(v)) {
            return true;
        }
        if other.vertices.iter().any(|v| self.is_location_inside(v)) {
            return true;
        }

        self.edges().any(|(a1, a2)| {
            other
                .edges()
                .any(|(b1, b2)| segments_cross(&a1, &a2, &b1, &b2))
        })
    }

    /// Whether this outline lies entirely within `other`.
    ///
    /// Not implemented: always answers `false` until the intended
    /// containment rule is settled.
    pub fn is_within(&self, _other: &Outline) -> bool {
        false
    }
}

/// Twice the signed area of the triangle (a, b, p); positive when `p` is
/// left of the directed line a -> b.
fn is_left(a: &Location, b: &Location, p: &Location) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)
}

fn opposite_signs(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}

fn segments_cross(a1: &Location, a2: &Location, b1: &Location, b2: &Location) -> bool {
    let d1 = is_left(b1, b2, a1);
    let d2 = is_left(b1, b2, a2);
    let d3 = is_left(a1, a2, b1);
    let d4 = is_left(a1, a2, b2);

    opposite_signs(d1, d2) && opposite_signs(d3, d4)
}
