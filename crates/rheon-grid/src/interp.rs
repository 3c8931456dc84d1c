//! Averaging between staggering locations.
//!
//! All helpers take storage positions and read ghost values where the
//! stencil reaches past the interior, so ghosts must be refreshed first.

use crate::field::Field;
use crate::location::centered_axis;
use crate::range::{step_down, step_up, Position};

/// Center value averaged onto the face normal to `axis` at `p`.
#[inline]
pub fn center_to_face(center: &Field, axis: usize, p: Position) -> f64 {
    0.5 * (center.at(step_down(p, axis)) + center.at(p))
}

/// Face values normal to `axis` averaged onto the center at `p`.
#[inline]
pub fn face_to_center(face: &Field, axis: usize, p: Position) -> f64 {
    0.5 * (face.at(p) + face.at(step_up(p, axis)))
}

/// Mean of the four cell centers surrounding edge `(a, b)` at `p`.
#[inline]
pub fn center_to_edge(center: &Field, pair: (usize, usize), p: Position) -> f64 {
    let (a, b) = pair;
    let pa = step_down(p, a);
    0.25 * (center.at(p) + center.at(pa) + center.at(step_down(p, b)) + center.at(step_down(pa, b)))
}

/// Mean of the four edges `(a, b)` surrounding the center at `p`.
#[inline]
pub fn edge_to_center(edge: &Field, pair: (usize, usize), p: Position) -> f64 {
    let (a, b) = pair;
    let pa = step_up(p, a);
    0.25 * (edge.at(p) + edge.at(pa) + edge.at(step_up(p, b)) + edge.at(step_up(pa, b)))
}

/// Mean of `f(edge) * g(edge)` over the four edges surrounding the center at `p`.
#[inline]
pub fn edge_product_to_center(f: &Field, g: &Field, pair: (usize, usize), p: Position) -> f64 {
    let (a, b) = pair;
    let pa = step_up(p, a);
    let corners = [p, pa, step_up(p, b), step_up(pa, b)];
    0.25 * corners.iter().map(|&q| f.at(q) * g.at(q)).sum::<f64>()
}

/// Vertex value interpolated onto edge `(a, b)` at `p`.
///
/// In 2-D the edge is the vertex. In 3-D the edge is centered along
/// the third axis and takes the mean of the two vertices bracketing it.
#[inline]
pub fn vertex_to_edge(vertex: &Field, ndim: usize, pair: (usize, usize), p: Position) -> f64 {
    if ndim == 2 {
        vertex.at(p)
    } else {
        let c = centered_axis(pair);
        0.5 * (vertex.at(p) + vertex.at(step_up(p, c)))
    }
}
