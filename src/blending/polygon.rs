//! Simple polygons in surface parameter space.

use glam::DVec2;
use serde::Serialize;

const AREA_EPS: f64 = 1e-14;

fn cross(a: DVec2, b: DVec2) -> f64 {
    a.perp_dot(b)
}

/// Closed polygon, vertices in order without repeating the first one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Polygon {
    pub points: Vec<DVec2>,
}

impl Polygon {
    pub fn new(points: Vec<DVec2>) -> Self {
        Self { points }
    }

    /// Shoelace area, positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut sum = 0.0;
        for i in 0..n {
            sum += cross(self.points[i], self.points[(i + 1) % n]);
        }
        sum * 0.5
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    pub fn is_empty(&self) -> bool {
        self.points.len() < 3 || self.area() <= AREA_EPS
    }

    /// Same polygon with counter-clockwise winding.
    pub fn into_ccw(mut self) -> Self {
        if self.signed_area() < 0.0 {
            self.points.reverse();
        }
        self
    }

    /// Even-odd point-in-polygon test.
    pub fn contains(&self, p: DVec2) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[j];
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> Option<(DVec2, DVec2)> {
        let first = *self.points.first()?;
        Some(
            self.points
                .iter()
                .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
        )
    }

    pub fn bounds_overlap(&self, other: &Polygon) -> bool {
        match (self.bounds(), other.bounds()) {
            (Some((a_lo, a_hi)), Some((b_lo, b_hi))) => {
                a_lo.x <= b_hi.x && b_lo.x <= a_hi.x && a_lo.y <= b_hi.y && b_lo.y <= a_hi.y
            }
            _ => false,
        }
    }

    /// Area centroid, falls back to the vertex mean for degenerate polygons.
    pub fn centroid(&self) -> Option<DVec2> {
        let n = self.points.len();
        if n == 0 {
            return None;
        }
        let area = self.signed_area();
        if area.abs() <= AREA_EPS {
            let sum = self.points.iter().fold(DVec2::ZERO, |acc, p| acc + *p);
            return Some(sum / n as f64);
        }
        let mut c = DVec2::ZERO;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            c += (a + b) * cross(a, b);
        }
        Some(c / (6.0 * area))
    }

    /// Sutherland-Hodgman clip against a convex counter-clockwise polygon.
    ///
    /// The subject may be concave. Its clipped area is exact, though concave
    /// subjects can keep zero-width connecting edges.
    pub fn clip_convex(&self, clip: &Polygon) -> Polygon {
        let mut output = self.points.clone();
        let m = clip.points.len();
        for i in 0..m {
            if output.is_empty() {
                break;
            }
            let a = clip.points[i];
            let b = clip.points[(i + 1) % m];
            let edge = b - a;
            let inside = |p: DVec2| cross(edge, p - a) >= 0.0;

            let input = std::mem::take(&mut output);
            let mut prev = input[input.len() - 1];
            for &current in &input {
                let current_in = inside(current);
                let prev_in = inside(prev);
                if current_in {
                    if !prev_in {
                        output.push(line_intersection(prev, current, a, b));
                    }
                    output.push(current);
                } else if prev_in {
                    output.push(line_intersection(prev, current, a, b));
                }
                prev = current;
            }
        }
        Polygon::new(output)
    }

    /// Ear-clipping triangulation of a simple polygon.
    pub fn triangulate(&self) -> Vec<[DVec2; 3]> {
        let polygon = self.clone().into_ccw();
        let mut remaining: Vec<DVec2> = polygon.points;
        let mut triangles = Vec::with_capacity(remaining.len().saturating_sub(2));

        while remaining.len() > 3 {
            let n = remaining.len();
            let ear = (0..n).find(|&i| is_ear(&remaining, i));
            // No clean ear left (numerically degenerate input): cut the
            // flattest convex corner so the loop always terminates
            let index = ear.unwrap_or_else(|| flattest_corner(&remaining));
            let prev = remaining[(index + n - 1) % n];
            let next = remaining[(index + 1) % n];
            let tri = [prev, remaining[index], next];
            if cross(tri[1] - tri[0], tri[2] - tri[0]).abs() > AREA_EPS {
                triangles.push(tri);
            }
            remaining.remove(index);
        }
        if remaining.len() == 3
            && cross(remaining[1] - remaining[0], remaining[2] - remaining[0]).abs() > AREA_EPS
        {
            triangles.push([remaining[0], remaining[1], remaining[2]]);
        }
        triangles
    }
}

fn line_intersection(p0: DVec2, p1: DVec2, a: DVec2, b: DVec2) -> DVec2 {
    let d = p1 - p0;
    let e = b - a;
    let denom = cross(d, e);
    if denom.abs() < f64::EPSILON {
        return p1;
    }
    let t = cross(a - p0, e) / denom;
    p0 + d * t
}

fn is_ear(points: &[DVec2], i: usize) -> bool {
    let n = points.len();
    let a = points[(i + n - 1) % n];
    let b = points[i];
    let c = points[(i + 1) % n];
    if cross(b - a, c - b) <= AREA_EPS {
        return false;
    }
    points.iter().enumerate().all(|(j, p)| {
        if j == i || j == (i + n - 1) % n || j == (i + 1) % n {
            return true;
        }
        !point_in_triangle(*p, a, b, c)
    })
}

fn flattest_corner(points: &[DVec2]) -> usize {
    let n = points.len();
    (0..n)
        .min_by(|&i, &j| {
            let turn = |k: usize| {
                let a = points[(k + n - 1) % n];
                let b = points[k];
                let c = points[(k + 1) % n];
                cross(b - a, c - b).abs()
            };
            turn(i).total_cmp(&turn(j))
        })
        .unwrap_or(0)
}

fn point_in_triangle(p: DVec2, a: DVec2, b: DVec2, c: DVec2) -> bool {
    let d1 = cross(b - a, p - a);
    let d2 = cross(c - b, p - b);
    let d3 = cross(a - c, p - c);
    d1 >= 0.0 && d2 >= 0.0 && d3 >= 0.0
}

/// Intersection of two simple polygons as a set of pieces.
///
/// `clip` is triangulated and `subject` is clipped against each triangle, so
/// the pieces tile the intersection without overlapping.
pub fn intersect_polygons(subject: &Polygon, clip: &Polygon) -> Vec<Polygon> {
    if subject.is_empty() || clip.is_empty() || !subject.bounds_overlap(clip) {
        return Vec::new();
    }
    clip.triangulate()
        .into_iter()
        .map(|tri| subject.clip_convex(&Polygon::new(tri.to_vec())))
        .filter(|piece| !piece.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, size: f64) -> Polygon {
        Polygon::new(vec![
            DVec2::new(x0, y0),
            DVec2::new(x0 + size, y0),
            DVec2::new(x0 + size, y0 + size),
            DVec2::new(x0, y0 + size),
        ])
    }

    fn total_area(pieces: &[Polygon]) -> f64 {
        pieces.iter().map(Polygon::area).sum()
    }

    #[test]
    fn test_area_and_winding() {
        let sq = square(0.0, 0.0, 2.0);
        assert_eq!(sq.signed_area(), 4.0);
        let cw = Polygon::new(sq.points.iter().rev().copied().collect());
        assert_eq!(cw.signed_area(), -4.0);
        assert_eq!(cw.into_ccw().signed_area(), 4.0);
    }

    #[test]
    fn test_contains() {
        let sq = square(0.0, 0.0, 1.0);
        assert!(sq.contains(DVec2::new(0.5, 0.5)));
        assert!(!sq.contains(DVec2::new(1.5, 0.5)));
    }

    #[test]
    fn test_square_intersection() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let pieces = intersect_polygons(&a, &b);
        assert!((total_area(&pieces) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_intersection_is_symmetric() {
        // Concave L-shape against a square
        let l_shape = Polygon::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(3.0, 0.0),
            DVec2::new(3.0, 1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(1.0, 3.0),
            DVec2::new(0.0, 3.0),
        ]);
        let sq = square(0.5, 0.5, 2.0);
        let ab = total_area(&intersect_polygons(&l_shape, &sq));
        let ba = total_area(&intersect_polygons(&sq, &l_shape));
        // L-shape inside [0.5,2.5]²: 2x0.5 strip + 0.5x1.5 strip
        assert!((ab - 1.75).abs() < 1e-12);
        assert!((ab - ba).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_polygons() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        assert!(intersect_polygons(&a, &b).is_empty());
    }

    #[test]
    fn test_triangulation_covers_area() {
        let l_shape = Polygon::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(2.0, 0.0),
            DVec2::new(2.0, 1.0),
            DVec2::new(1.0, 1.0),
            DVec2::new(1.0, 2.0),
            DVec2::new(0.0, 2.0),
        ]);
        let triangles = l_shape.triangulate();
        assert_eq!(triangles.len(), 4);
        let area: f64 = triangles
            .iter()
            .map(|t| Polygon::new(t.to_vec()).area())
            .sum();
        assert!((area - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_centroid() {
        let c = square(1.0, 1.0, 2.0).centroid().unwrap();
        assert!(c.abs_diff_eq(DVec2::new(2.0, 2.0), 1e-12));
    }
}
