use std::collections::HashMap;

use bsp::types::{Plane, Vec3};
use cgmath::InnerSpace;
use log::trace;

/// Axial snapping and the sign of near-zero components.
pub const NORMAL_EPSILON: f64 = 0.00001;
/// Per-component tolerance when matching a normal against a stored plane.
pub const NORMAL_MATCH_EPSILON: f64 = 0.001;
pub const DIST_EPSILON: f64 = 0.01;

pub const PLANE_X: u32 = 0;
pub const PLANE_Y: u32 = 1;
pub const PLANE_Z: u32 = 2;
pub const PLANE_ANYX: u32 = 3;
pub const PLANE_ANYY: u32 = 4;
pub const PLANE_ANYZ: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompilePlane {
    pub normal: Vec3,
    pub dist: f64,
    pub plane_type: u32,
    pub index: usize,
}

impl CompilePlane {
    pub fn plane(&self) -> Plane {
        Plane::new(self.normal, self.dist)
    }

    pub fn is_axial(&self) -> bool {
        self.plane_type < PLANE_ANYX
    }

    pub fn distance_to(&self, point: &Vec3) -> f64 {
        self.normal.dot(*point) - self.dist
    }
}

// Distance bucket, one DIST_EPSILON wide.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
struct DistKey(i64);

impl DistKey {
    fn from_dist(dist: f64) -> DistKey {
        DistKey((dist / DIST_EPSILON).round() as i64)
    }
}

/// Deduplicated planes for one compile. Planes are stored in opposite facing
/// pairs: `n` and `n ^ 1` are the same surface, and the even index holds the
/// canonical orientation.
#[derive(Debug, Clone, Default)]
pub struct PlaneSet {
    planes: Vec<CompilePlane>,
    buckets: HashMap<DistKey, Vec<usize>>,
}

pub fn plane_type_for_normal(normal: &Vec3) -> u32 {
    if normal.x == 1.0 || normal.x == -1.0 {
        return PLANE_X;
    }
    if normal.y == 1.0 || normal.y == -1.0 {
        return PLANE_Y;
    }
    if normal.z == 1.0 || normal.z == -1.0 {
        return PLANE_Z;
    }

    let ax = normal.x.abs();
    let ay = normal.y.abs();
    let az = normal.z.abs();
    if ax >= ay && ax >= az {
        PLANE_ANYX
    } else if ay >= ax && ay >= az {
        PLANE_ANYY
    } else {
        PLANE_ANYZ
    }
}

/// Plane through three points, with the normal facing the side the points
/// wind clockwise from. None when the points are collinear.
pub fn plane_from_points(a: Vec3, b: Vec3, c: Vec3) -> Option<(Vec3, f64)> {
    let normal = (a - b).cross(c - b);
    let len = normal.magnitude();
    if !len.is_finite() || len < 1e-6 {
        return None;
    }
    let normal = normal / len;
    Some((normal, a.dot(normal)))
}

fn snap_plane(normal: Vec3, dist: f64) -> (Vec3, f64) {
    let mut normal = normal;
    for i in 0..3 {
        if (normal[i] - 1.0).abs() < NORMAL_EPSILON {
            normal = Vec3::new(0.0, 0.0, 0.0);
            normal[i] = 1.0;
            break;
        }
        if (normal[i] + 1.0).abs() < NORMAL_EPSILON {
            normal = Vec3::new(0.0, 0.0, 0.0);
            normal[i] = -1.0;
            break;
        }
    }

    let rounded = dist.round();
    let dist = if (dist - rounded).abs() < DIST_EPSILON {
        rounded
    } else {
        dist
    };
    (normal, dist)
}

// First component that isn't ~zero must be positive.
fn is_canonical(normal: &Vec3) -> bool {
    for i in 0..3 {
        if normal[i] > NORMAL_EPSILON {
            return true;
        }
        if normal[i] < -NORMAL_EPSILON {
            return false;
        }
    }
    true
}

impl PlaneSet {
    pub fn new() -> PlaneSet {
        PlaneSet {
            planes: vec![],
            buckets: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.planes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planes.is_empty()
    }

    pub fn get(&self, index: usize) -> &CompilePlane {
        &self.planes[index]
    }

    pub fn planes(&self) -> &[CompilePlane] {
        &self.planes
    }

    fn plane_equal(plane: &CompilePlane, normal: &Vec3, dist: f64) -> bool {
        (plane.normal.x - normal.x).abs() < NORMAL_MATCH_EPSILON
            && (plane.normal.y - normal.y).abs() < NORMAL_MATCH_EPSILON
            && (plane.normal.z - normal.z).abs() < NORMAL_MATCH_EPSILON
            && (plane.dist - dist).abs() < DIST_EPSILON
    }

    /// Look up a plane without adding it.
    pub fn find(&self, normal: Vec3, dist: f64) -> Option<usize> {
        let len = normal.magnitude();
        if !len.is_finite() || len < 1e-9 {
            return None;
        }
        let (normal, dist) = snap_plane(normal / len, dist / len);
        let canonical = is_canonical(&normal);
        let (cn, cd) = if canonical {
            (normal, dist)
        } else {
            (-normal, -dist)
        };

        let key = DistKey::from_dist(cd);
        for probe in [key.0 - 1, key.0, key.0 + 1].iter() {
            if let Some(candidates) = self.buckets.get(&DistKey(*probe)) {
                for &index in candidates {
                    if Self::plane_equal(&self.planes[index], &cn, cd) {
                        return Some(if canonical { index } else { index ^ 1 });
                    }
                }
            }
        }
        None
    }

    /// Index of the plane with this orientation, adding the pair if needed.
    /// A zero length normal is not a plane.
    pub fn find_or_add(&mut self, normal: Vec3, dist: f64) -> Option<usize> {
        if let Some(index) = self.find(normal, dist) {
            return Some(index);
        }

        let len = normal.magnitude();
        if !len.is_finite() || len < 1e-9 {
            return None;
        }
        let (normal, dist) = snap_plane(normal / len, dist / len);
        let canonical = is_canonical(&normal);
        let (cn, cd) = if canonical {
            (normal, dist)
        } else {
            (-normal, -dist)
        };

        let index = self.planes.len();
        let plane_type = plane_type_for_normal(&cn);
        self.planes.push(CompilePlane {
            normal: cn,
            dist: cd,
            plane_type,
            index,
        });
        self.planes.push(CompilePlane {
            normal: -cn,
            dist: -cd,
            plane_type,
            index: index + 1,
        });
        self.buckets
            .entry(DistKey::from_dist(cd))
            .or_insert_with(Vec::new)
            .push(index);
        trace!("New plane {} ({:?}, {})", index, cn, cd);

        Some(if canonical { index } else { index + 1 })
    }

    pub fn add_points(&mut self, a: Vec3, b: Vec3, c: Vec3) -> Option<usize> {
        let (normal, dist) = plane_from_points(a, b, c)?;
        self.find_or_add(normal, dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_stored_together() {
        let mut set = PlaneSet::new();
        let up = set.find_or_add(Vec3::new(0.0, 0.0, 1.0), 64.0).unwrap();
        let down = set.find_or_add(Vec3::new(0.0, 0.0, -1.0), -64.0).unwrap();
        assert_eq!(up, 0);
        assert_eq!(down, 1);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(down).normal, Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(set.get(up).plane_type, PLANE_Z);
    }

    #[test]
    fn jittered_planes_share_an_index() {
        let mut set = PlaneSet::new();
        let a = set.find_or_add(Vec3::new(0.0, 0.0, 1.0), 64.0).unwrap();
        let b = set
            .find_or_add(Vec3::new(0.000001, 0.0, 0.9999999), 64.004)
            .unwrap();
        let c = set.find_or_add(Vec3::new(0.0, 0.0, 1.0), 64.5).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn slanted_jitter_shares_an_index() {
        let mut set = PlaneSet::new();
        let a = set.find_or_add(Vec3::new(1.0, 1.0, 0.0).normalize(), 100.0).unwrap();
        let b = set.find_or_add(Vec3::new(1.0, 1.0005, 0.0).normalize(), 100.0).unwrap();
        let flipped = set.find_or_add(-Vec3::new(1.0005, 1.0, 0.0).normalize(), -100.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(flipped, a ^ 1);
        assert_eq!(set.len(), 2);

        // A clearly different slope is its own pair
        let c = set.find_or_add(Vec3::new(1.0, 1.01, 0.0).normalize(), 100.0).unwrap();
        assert_ne!(c >> 1, a >> 1);
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn bucket_edges_are_probed() {
        let mut set = PlaneSet::new();
        let n = Vec3::new(1.0, 1.0, 0.0).normalize();
        let a = set.find_or_add(n, 10.3049).unwrap();
        let b = set.find_or_add(n, 10.3051).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn point_order_is_canonicalized() {
        let p0 = Vec3::new(0.0, 0.0, 16.0);
        let p1 = Vec3::new(64.0, 0.0, 16.0);
        let p2 = Vec3::new(64.0, 64.0, 16.0);

        let mut set = PlaneSet::new();
        let a = set.add_points(p0, p1, p2).unwrap();
        let b = set.add_points(p1, p2, p0).unwrap();
        let c = set.add_points(p2, p0, p1).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);

        // Opposite winding is the opposite facing plane of the same pair
        let d = set.add_points(p2, p1, p0).unwrap();
        assert_eq!(d, a ^ 1);
        assert_eq!(set.len(), 2);

        let (normal, dist) = plane_from_points(p1, p2, p0).unwrap();
        assert_eq!(set.get(a).normal, normal);
        assert_eq!(set.get(a).dist, dist);
    }

    #[test]
    fn collinear_points_have_no_plane() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(1.0, 1.0, 1.0);
        let c = Vec3::new(2.0, 2.0, 2.0);
        assert!(plane_from_points(a, b, c).is_none());
        let mut set = PlaneSet::new();
        assert!(set.add_points(a, b, c).is_none());
        assert!(set.find_or_add(Vec3::new(0.0, 0.0, 0.0), 4.0).is_none());
        assert!(set.is_empty());
    }

    #[test]
    fn non_axial_types_follow_major_axis() {
        assert_eq!(plane_type_for_normal(&Vec3::new(0.8, 0.6, 0.0)), PLANE_ANYX);
        assert_eq!(plane_type_for_normal(&Vec3::new(0.0, -0.6, 0.8)), PLANE_ANYZ);
        assert_eq!(plane_type_for_normal(&Vec3::new(0.0, -1.0, 0.0)), PLANE_Y);
    }
}
