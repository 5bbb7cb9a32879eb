use crate::io::{Readable, Version, Writable};
use bytes::{Buf, BufMut};
use cgmath::{InnerSpace, Vector3};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::string::FromUtf8Error;

/// Compile-time geometry runs in double precision.
pub type Vec3 = Vector3<f64>;

/// Serialized points are single precision.
pub type Point3F = Vector3<f32>;

pub const TEXTURE_NAME_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxF {
    pub min: Vec3,
    pub max: Vec3,
}

/// A plane in `dot(normal, p) - dist` form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub dist: f64,
}

pub type BspResult<T> = Result<T, BspError>;

#[derive(Debug, Clone, PartialEq)]
pub struct BspError {
    pub message: String,
}

impl BoxF {
    /// An inverted box that any union will overwrite.
    pub fn empty() -> BoxF {
        BoxF {
            min: Vec3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Vec3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn new(min: Vec3, max: Vec3) -> BoxF {
        BoxF { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) / 2.0
    }

    pub fn extent(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn union(&self, other: &BoxF) -> BoxF {
        BoxF {
            min: Vec3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn union_point(&self, other: &Vec3) -> BoxF {
        BoxF {
            min: Vec3::new(
                self.min.x.min(other.x),
                self.min.y.min(other.y),
                self.min.z.min(other.z),
            ),
            max: Vec3::new(
                self.max.x.max(other.x),
                self.max.y.max(other.y),
                self.max.z.max(other.z),
            ),
        }
    }

    pub fn contains(&self, point: &Vec3) -> bool {
        point.x >= self.min.x
            && point.y >= self.min.y
            && point.z >= self.min.z
            && point.x <= self.max.x
            && point.y <= self.max.y
            && point.z <= self.max.z
    }

    /// True when the boxes overlap by more than `epsilon` on every axis.
    pub fn intersects(&self, other: &BoxF, epsilon: f64) -> bool {
        self.min.x < other.max.x - epsilon
            && self.max.x > other.min.x + epsilon
            && self.min.y < other.max.y - epsilon
            && self.max.y > other.min.y + epsilon
            && self.min.z < other.max.z - epsilon
            && self.max.z > other.min.z + epsilon
    }

    pub fn expand(&self, amount: f64) -> BoxF {
        let pad = Vec3::new(amount, amount, amount);
        BoxF {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    pub fn from_vertices(vertices: &[Vec3]) -> Self {
        vertices
            .iter()
            .fold(BoxF::empty(), |b, vertex| b.union_point(vertex))
    }
}

impl Plane {
    pub fn new(normal: Vec3, dist: f64) -> Plane {
        Plane { normal, dist }
    }

    pub fn distance_to(&self, point: &Vec3) -> f64 {
        self.normal.dot(*point) - self.dist
    }

    pub fn flipped(&self) -> Plane {
        Plane {
            normal: -self.normal,
            dist: -self.dist,
        }
    }
}

impl From<&'static str> for BspError {
    fn from(message: &'static str) -> Self {
        BspError {
            message: message.into(),
        }
    }
}

impl From<String> for BspError {
    fn from(message: String) -> Self {
        BspError { message }
    }
}

impl From<FromUtf8Error> for BspError {
    fn from(err: FromUtf8Error) -> Self {
        BspError {
            message: format!("UTF-8 Error: {}", err),
        }
    }
}

impl Display for BspError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "BSP error: {}", self.message)
    }
}

impl Error for BspError {}

impl Readable<Point3F> for Point3F {
    fn read(from: &mut dyn Buf, version: &mut Version) -> BspResult<Self> {
        Ok(Point3F {
            x: f32::read(from, version)?,
            y: f32::read(from, version)?,
            z: f32::read(from, version)?,
        })
    }
}

impl Writable<Point3F> for Point3F {
    fn write(&self, to: &mut dyn BufMut, version: &Version) -> BspResult<()> {
        self.x.write(to, version)?;
        self.y.write(to, version)?;
        self.z.write(to, version)?;
        Ok(())
    }
}

pub fn to_point3f(v: &Vec3) -> Point3F {
    Point3F::new(v.x as f32, v.y as f32, v.z as f32)
}
