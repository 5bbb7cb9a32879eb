use bsp::types::{BoxF, Plane, Vec3};
use cgmath::{InnerSpace, Zero};

/// Half-size of the square produced for an unbounded plane.
pub const MAX_WORLD_COORD: f64 = 1_048_576.0;
pub const ON_EPSILON: f64 = 0.1;
pub const CLIP_EPSILON: f64 = 0.1;
/// Edges shorter than this don't count toward a winding being "real".
pub const EDGE_LENGTH: f64 = 0.2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Side {
    Front,
    Back,
    On,
    Cross,
}

/// A convex polygon, clockwise when viewed from the front of its plane.
#[derive(Clone, Debug, PartialEq)]
pub struct Winding {
    pub points: Vec<Vec3>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PointSide {
    Front,
    Back,
    On,
}

fn safe_normalize(v: Vec3) -> Vec3 {
    let len = v.magnitude();
    if len < 1e-12 {
        Vec3::zero()
    } else {
        v / len
    }
}

impl Winding {
    pub fn new(points: Vec<Vec3>) -> Winding {
        Winding { points }
    }

    /// A huge square lying on the plane.
    pub fn base_for_plane(normal: Vec3, dist: f64) -> Winding {
        let ax = normal.x.abs();
        let ay = normal.y.abs();
        let az = normal.z.abs();

        let mut vup = if az >= ax && az >= ay {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 0.0, 1.0)
        };

        let v = vup.dot(normal);
        vup = safe_normalize(vup - normal * v);

        let org = normal * dist;
        let vright = vup.cross(normal) * MAX_WORLD_COORD;
        let vup = vup * MAX_WORLD_COORD;

        Winding {
            points: vec![
                org - vright + vup,
                org + vright + vup,
                org + vright - vup,
                org - vright - vup,
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn area(&self) -> f64 {
        let mut total = 0.0;
        for i in 2..self.points.len() {
            let d1 = self.points[i - 1] - self.points[0];
            let d2 = self.points[i] - self.points[0];
            total += 0.5 * d1.cross(d2).magnitude();
        }
        total
    }

    pub fn bounds(&self) -> BoxF {
        BoxF::from_vertices(&self.points)
    }

    pub fn center(&self) -> Vec3 {
        if self.points.is_empty() {
            return Vec3::zero();
        }
        let sum = self.points.iter().fold(Vec3::zero(), |acc, p| acc + *p);
        sum / self.points.len() as f64
    }

    /// The plane the winding lies on, or None for a degenerate polygon.
    pub fn plane(&self) -> Option<Plane> {
        if self.points.len() < 3 {
            return None;
        }
        let v1 = self.points[0] - self.points[1];
        let v2 = self.points[2] - self.points[1];
        let normal = v1.cross(v2);
        if normal.magnitude() < 1e-9 {
            return None;
        }
        let normal = normal.normalize();
        Some(Plane::new(normal, self.points[0].dot(normal)))
    }

    pub fn reversed(&self) -> Winding {
        Winding {
            points: self.points.iter().rev().cloned().collect(),
        }
    }

    fn classify(&self, normal: Vec3, dist: f64, epsilon: f64) -> (Vec<f64>, Vec<PointSide>, [usize; 3]) {
        let mut dists = Vec::with_capacity(self.points.len());
        let mut sides = Vec::with_capacity(self.points.len());
        let mut counts = [0usize; 3];
        for p in &self.points {
            let d = p.dot(normal) - dist;
            let side = if d > epsilon {
                counts[0] += 1;
                PointSide::Front
            } else if d < -epsilon {
                counts[1] += 1;
                PointSide::Back
            } else {
                counts[2] += 1;
                PointSide::On
            };
            dists.push(d);
            sides.push(side);
        }
        (dists, sides, counts)
    }

    pub fn on_plane_side(&self, normal: Vec3, dist: f64, epsilon: f64) -> Side {
        let (_, _, counts) = self.classify(normal, dist, epsilon);
        match (counts[0] > 0, counts[1] > 0) {
            (true, true) => Side::Cross,
            (true, false) => Side::Front,
            (false, true) => Side::Back,
            (false, false) => Side::On,
        }
    }

    /// Split by a plane into (front, back). A winding lying on the plane is
    /// copied to both sides. Pieces with fewer than three points are None.
    pub fn split(&self, normal: Vec3, dist: f64, epsilon: f64) -> (Option<Winding>, Option<Winding>) {
        let (dists, sides, counts) = self.classify(normal, dist, epsilon);

        if counts[0] == 0 && counts[1] == 0 {
            return (Some(self.clone()), Some(self.clone()));
        }
        if counts[0] == 0 {
            return (None, Some(self.clone()));
        }
        if counts[1] == 0 {
            return (Some(self.clone()), None);
        }

        let n = self.points.len();
        let mut front = Vec::with_capacity(n + 4);
        let mut back = Vec::with_capacity(n + 4);

        for i in 0..n {
            let p1 = self.points[i];

            match sides[i] {
                PointSide::On => {
                    front.push(p1);
                    back.push(p1);
                    continue;
                }
                PointSide::Front => front.push(p1),
                PointSide::Back => back.push(p1),
            }

            let j = (i + 1) % n;
            if sides[j] == PointSide::On || sides[j] == sides[i] {
                continue;
            }

            let p2 = self.points[j];
            let t = dists[i] / (dists[i] - dists[j]);
            let mut mid = Vec3::zero();
            for k in 0..3 {
                // Axial planes land exactly on the plane
                if normal[k] == 1.0 {
                    mid[k] = dist;
                } else if normal[k] == -1.0 {
                    mid[k] = -dist;
                } else {
                    mid[k] = p1[k] + t * (p2[k] - p1[k]);
                }
            }
            front.push(mid);
            back.push(mid);
        }

        let front = if front.len() >= 3 {
            Some(Winding::new(front))
        } else {
            None
        };
        let back = if back.len() >= 3 {
            Some(Winding::new(back))
        } else {
            None
        };
        (front, back)
    }

    /// Keep only the part on one side of a plane. A winding on the plane is kept.
    pub fn clip(&self, normal: Vec3, dist: f64, epsilon: f64, keep_front: bool) -> Option<Winding> {
        let (front, back) = self.split(normal, dist, epsilon);
        if keep_front {
            front
        } else {
            back
        }
    }

    /// Clip by every plane keeping the back side, as when carving a brush face.
    pub fn chop_by_planes<'a, I>(self, planes: I, epsilon: f64) -> Option<Winding>
    where
        I: IntoIterator<Item = &'a Plane>,
    {
        let mut w = self;
        for plane in planes {
            w = w.clip(plane.normal, plane.dist, epsilon, false)?;
        }
        Some(w)
    }

    /// True when fewer than three edges are long enough to matter.
    pub fn is_tiny(&self) -> bool {
        let n = self.points.len();
        let mut edges = 0;
        for i in 0..n {
            let j = (i + 1) % n;
            if (self.points[j] - self.points[i]).magnitude() > EDGE_LENGTH {
                edges += 1;
                if edges == 3 {
                    return false;
                }
            }
        }
        true
    }

    pub fn remove_colinear_points(&self) -> Winding {
        let n = self.points.len();
        let mut points = Vec::with_capacity(n);
        for i in 0..n {
            let prev = self.points[(i + n - 1) % n];
            let next = self.points[(i + 1) % n];
            let v1 = safe_normalize(self.points[i] - prev);
            let v2 = safe_normalize(next - self.points[i]);
            if v1.dot(v2) < 0.999 {
                points.push(self.points[i]);
            }
        }
        Winding { points }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    pub fn square(size: f64, z: f64) -> Winding {
        // Clockwise from above
        Winding::new(vec![
            Vec3::new(size, size, z),
            Vec3::new(size, 0.0, z),
            Vec3::new(0.0, 0.0, z),
            Vec3::new(0.0, size, z),
        ])
    }

    #[test]
    fn base_winding_lies_on_plane() {
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let w = Winding::base_for_plane(normal, 32.0);
        assert_eq!(w.len(), 4);
        for p in &w.points {
            assert!(approx_eq(p.z, 32.0));
        }
        let plane = w.plane().unwrap();
        assert!(approx_eq(plane.normal.z, 1.0));
        assert!(approx_eq(plane.dist, 32.0));

        let slanted = Vec3::new(1.0, 1.0, 0.0).normalize();
        let w = Winding::base_for_plane(slanted, 10.0);
        let plane = w.plane().unwrap();
        assert!((plane.normal - slanted).magnitude() < 1e-9);
        assert!((plane.dist - 10.0).abs() < 1e-6);
    }

    #[test]
    fn split_square_in_half() {
        let w = square(64.0, 0.0);
        let (front, back) = w.split(Vec3::new(1.0, 0.0, 0.0), 32.0, ON_EPSILON);
        let front = front.unwrap();
        let back = back.unwrap();
        assert!(approx_eq(front.area(), 32.0 * 64.0));
        assert!(approx_eq(back.area(), 32.0 * 64.0));
        assert!(front.points.iter().all(|p| p.x >= 32.0));
        assert!(back.points.iter().all(|p| p.x <= 32.0));
    }

    #[test]
    fn split_keeps_whole_side() {
        let w = square(64.0, 0.0);
        let (front, back) = w.split(Vec3::new(1.0, 0.0, 0.0), -10.0, ON_EPSILON);
        assert_eq!(front, Some(w.clone()));
        assert!(back.is_none());
        assert_eq!(w.on_plane_side(Vec3::new(1.0, 0.0, 0.0), 100.0, ON_EPSILON), Side::Back);
        assert_eq!(w.on_plane_side(Vec3::new(1.0, 0.0, 0.0), 32.0, ON_EPSILON), Side::Cross);
    }

    #[test]
    fn on_plane_winding_goes_to_both_sides() {
        let w = square(64.0, 16.0);
        let (front, back) = w.split(Vec3::new(0.0, 0.0, 1.0), 16.0, ON_EPSILON);
        assert!(front.is_some() && back.is_some());
        assert_eq!(w.on_plane_side(Vec3::new(0.0, 0.0, 1.0), 16.0, ON_EPSILON), Side::On);
    }

    #[test]
    fn clip_base_winding_to_box() {
        let planes = [
            Plane::new(Vec3::new(1.0, 0.0, 0.0), 64.0),
            Plane::new(Vec3::new(-1.0, 0.0, 0.0), 0.0),
            Plane::new(Vec3::new(0.0, 1.0, 0.0), 64.0),
            Plane::new(Vec3::new(0.0, -1.0, 0.0), 0.0),
        ];
        let w = Winding::base_for_plane(Vec3::new(0.0, 0.0, 1.0), 64.0)
            .chop_by_planes(planes.iter(), CLIP_EPSILON)
            .unwrap();
        assert_eq!(w.len(), 4);
        assert!(approx_eq(w.area(), 64.0 * 64.0));
        let b = w.bounds();
        assert!(approx_eq(b.min.x, 0.0) && approx_eq(b.max.y, 64.0));
    }

    #[test]
    fn colinear_points_are_removed() {
        let w = Winding::new(vec![
            Vec3::new(64.0, 64.0, 0.0),
            Vec3::new(64.0, 32.0, 0.0),
            Vec3::new(64.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 64.0, 0.0),
        ]);
        let cleaned = w.remove_colinear_points();
        assert_eq!(cleaned.len(), 4);
        assert!(!cleaned.points.contains(&Vec3::new(64.0, 32.0, 0.0)));
    }

    #[test]
    fn slivers_are_tiny() {
        let sliver = Winding::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.1, 0.0, 0.0),
            Vec3::new(0.1, 0.1, 0.0),
        ]);
        assert!(sliver.is_tiny());
        assert!(!square(1.0, 0.0).is_tiny());
    }
}
