//! Geometry primitives for camera and splat math
//!
//! Matrices are stored row-major and act on column vectors:
//! `m[row][col]`, `p' = M * p`.

use std::ops::{Add, AddAssign, Mul, Neg, Sub};

/// 3D vector / point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const UNIT_Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn from_slice(s: &[f32]) -> Self {
        Self::new(s[0], s[1], s[2])
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction; zero stays zero
    pub fn normalize(self) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            return Vec3::ZERO;
        }
        self * (1.0 / len)
    }

    /// Linear interpolation
    pub fn lerp(self, other: Vec3, t: f32) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    #[inline]
    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    #[inline]
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    #[inline]
    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    #[inline]
    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    #[inline]
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Homogeneous 4D vector
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec4 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Vec4 {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_point(p: Vec3) -> Self {
        Self::new(p.x, p.y, p.z, 1.0)
    }

    /// Perspective divide
    pub fn to_ndc(self) -> Vec3 {
        Vec3::new(self.x / self.w, self.y / self.w, self.z / self.w)
    }
}

/// 3x3 rotation matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3(pub [[f32; 3]; 3]);

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Rotation from Euler angles in radians, applied X then Y then Z
    /// (`R = Rz * Ry * Rx`).
    pub fn from_euler_xyz(x: f32, y: f32, z: f32) -> Self {
        let (sx, cx) = x.sin_cos();
        let (sy, cy) = y.sin_cos();
        let (sz, cz) = z.sin_cos();

        let rx = Mat3([[1.0, 0.0, 0.0], [0.0, cx, -sx], [0.0, sx, cx]]);
        let ry = Mat3([[cy, 0.0, sy], [0.0, 1.0, 0.0], [-sy, 0.0, cy]]);
        let rz = Mat3([[cz, -sz, 0.0], [sz, cz, 0.0], [0.0, 0.0, 1.0]]);

        rz.mul_mat(&ry).mul_mat(&rx)
    }

    pub fn mul_mat(&self, rhs: &Mat3) -> Mat3 {
        let mut out = [[0.0f32; 3]; 3];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.0[r][k] * rhs.0[k][c]).sum();
            }
        }
        Mat3(out)
    }

    pub fn mul_vec(&self, v: Vec3) -> Vec3 {
        let m = &self.0;
        Vec3::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
        )
    }
}

/// 4x4 homogeneous transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4(pub [[f32; 4]; 4]);

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0],
    ]);

    /// Embed a rotation into a homogeneous transform
    pub fn from_rotation(r: &Mat3) -> Self {
        let mut m = Self::IDENTITY;
        for (row, src) in m.0.iter_mut().zip(r.0.iter()) {
            row[..3].copy_from_slice(src);
        }
        m
    }

    /// Right-handed look-at view matrix.
    ///
    /// The rotation block holds the camera basis (right, up, -forward) and the
    /// translation is the eye position expressed in that basis, negated.
    ///
    /// When `world_up` is parallel to the view direction another world axis
    /// stands in for it. An eye sitting on its target looks down -Z.
    pub fn look_at(eye: Vec3, target: Vec3, world_up: Vec3) -> Self {
        let mut forward = (target - eye).normalize();
        if forward == Vec3::ZERO {
            forward = Vec3::new(0.0, 0.0, -1.0);
        }
        let mut right = forward.cross(world_up).normalize();
        if right == Vec3::ZERO {
            let fallback = if forward.z.abs() < 0.9 {
                Vec3::new(0.0, 0.0, -1.0)
            } else {
                Vec3::new(1.0, 0.0, 0.0)
            };
            right = forward.cross(fallback).normalize();
        }
        let up = right.cross(forward);

        Mat4([
            [right.x, right.y, right.z, -right.dot(eye)],
            [up.x, up.y, up.z, -up.dot(eye)],
            [-forward.x, -forward.y, -forward.z, forward.dot(eye)],
            [0.0, 0.0, 0.0, 1.0],
        ])
    }

    /// OpenGL-style perspective projection (clip z in [-w, w])
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let f = 1.0 / (fov_y / 2.0).tan();
        let mut m = [[0.0f32; 4]; 4];
        m[0][0] = f / aspect;
        m[1][1] = f;
        m[2][2] = -(far + near) / (far - near);
        m[2][3] = -2.0 * far * near / (far - near);
        m[3][2] = -1.0;
        Mat4(m)
    }

    pub fn mul_mat(&self, rhs: &Mat4) -> Mat4 {
        let mut out = [[0.0f32; 4]; 4];
        for (r, row) in out.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = (0..4).map(|k| self.0[r][k] * rhs.0[k][c]).sum();
            }
        }
        Mat4(out)
    }

    pub fn mul_vec4(&self, v: Vec4) -> Vec4 {
        let m = &self.0;
        Vec4::new(
            m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z + m[0][3] * v.w,
            m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z + m[1][3] * v.w,
            m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z + m[2][3] * v.w,
            m[3][0] * v.x + m[3][1] * v.y + m[3][2] * v.z + m[3][3] * v.w,
        )
    }

    /// Transform a point (w = 1)
    #[inline]
    pub fn transform_point(&self, p: Vec3) -> Vec4 {
        self.mul_vec4(Vec4::from_point(p))
    }
}

/// Spatial displacement applied to splat positions.
///
/// Either one offset shared by every point or one offset per point.
#[derive(Debug, Clone, PartialEq)]
pub enum Offset {
    Uniform(Vec3),
    PerPoint(Vec<Vec3>),
}

impl Offset {
    pub fn zero() -> Self {
        Offset::Uniform(Vec3::ZERO)
    }

    /// Offset for point `index`, `None` when a per-point field is too short
    #[inline]
    pub fn at(&self, index: usize) -> Option<Vec3> {
        match self {
            Offset::Uniform(v) => Some(*v),
            Offset::PerPoint(field) => field.get(index).copied(),
        }
    }

    /// Number of points the offset covers, `None` for uniform offsets
    pub fn point_count(&self) -> Option<usize> {
        match self {
            Offset::Uniform(_) => None,
            Offset::PerPoint(field) => Some(field.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_cross_and_normalize() {
        let x = Vec3::new(1.0, 0.0, 0.0);
        let y = Vec3::UNIT_Y;
        assert_eq!(x.cross(y), Vec3::new(0.0, 0.0, 1.0));
        assert!(approx(Vec3::new(3.0, 4.0, 0.0).normalize().length(), 1.0));
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_look_at_maps_target_onto_negative_z() {
        let eye = Vec3::new(2.0, 0.0, 0.0);
        let view = Mat4::look_at(eye, Vec3::ZERO, Vec3::UNIT_Y);

        let origin = view.transform_point(Vec3::ZERO);
        assert!(approx(origin.x, 0.0));
        assert!(approx(origin.y, 0.0));
        assert!(approx(origin.z, -2.0));

        let cam = view.transform_point(eye);
        assert!(approx(cam.x, 0.0) && approx(cam.y, 0.0) && approx(cam.z, 0.0));
    }

    fn assert_orthonormal(view: &Mat4) {
        let rows: Vec<Vec3> = (0..3).map(|r| Vec3::new(view.0[r][0], view.0[r][1], view.0[r][2])).collect();
        for (i, a) in rows.iter().enumerate() {
            assert!(a.is_finite());
            assert!(approx(a.length(), 1.0));
            for b in &rows[i + 1..] {
                assert!(approx(a.dot(*b), 0.0));
            }
        }
    }

    #[test]
    fn test_look_at_straight_down_the_up_axis() {
        let eye = Vec3::new(0.0, 3.0, 0.0);
        let view = Mat4::look_at(eye, Vec3::ZERO, Vec3::UNIT_Y);
        assert_orthonormal(&view);

        let origin = view.transform_point(Vec3::ZERO);
        assert!(approx(origin.x, 0.0) && approx(origin.y, 0.0));
        assert!(approx(origin.z, -3.0));

        let below = Mat4::look_at(Vec3::new(0.0, -1.0, 0.0), Vec3::ZERO, Vec3::UNIT_Y);
        assert_orthonormal(&below);
    }

    #[test]
    fn test_look_at_degenerate_inputs_stay_finite() {
        assert_orthonormal(&Mat4::look_at(Vec3::ZERO, Vec3::ZERO, Vec3::UNIT_Y));
        assert_orthonormal(&Mat4::look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::ZERO));
        assert_orthonormal(&Mat4::look_at(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn test_perspective_entries() {
        let fov = 45f32.to_radians();
        let p = Mat4::perspective(fov, 640.0 / 480.0, 0.1, 1000.0);
        let t = (fov / 2.0).tan();
        assert!(approx(p.0[0][0], 1.0 / ((640.0 / 480.0) * t)));
        assert!(approx(p.0[1][1], 1.0 / t));
        assert!(approx(p.0[2][2], -(1000.0 + 0.1) / (1000.0 - 0.1)));
        assert!(approx(p.0[2][3], -2.0 * 1000.0 * 0.1 / (1000.0 - 0.1)));
        assert_eq!(p.0[3][2], -1.0);
        assert_eq!(p.0[3][3], 0.0);
    }

    #[test]
    fn test_perspective_near_far_map_to_ndc_bounds() {
        let p = Mat4::perspective(1.0, 1.0, 0.5, 10.0);
        let near = p.transform_point(Vec3::new(0.0, 0.0, -0.5)).to_ndc();
        let far = p.transform_point(Vec3::new(0.0, 0.0, -10.0)).to_ndc();
        assert!((near.z + 1.0).abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_offset_lookup() {
        let uniform = Offset::Uniform(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(uniform.at(1000), Some(Vec3::UNIT_Y));
        assert_eq!(uniform.point_count(), None);

        let field = Offset::PerPoint(vec![Vec3::ZERO, Vec3::UNIT_Y]);
        assert_eq!(field.at(1), Some(Vec3::UNIT_Y));
        assert_eq!(field.at(2), None);
        assert_eq!(field.point_count(), Some(2));
    }

    #[test]
    fn test_euler_rotation() {
        let r = Mat3::from_euler_xyz(0.0, 0.0, std::f32::consts::FRAC_PI_2);
        let v = r.mul_vec(Vec3::new(1.0, 0.0, 0.0));
        assert!(approx(v.x, 0.0) && approx(v.y, 1.0) && approx(v.z, 0.0));

        let identity = Mat3::from_euler_xyz(0.0, 0.0, 0.0);
        assert_eq!(identity, Mat3::IDENTITY);
        let m = Mat4::from_rotation(&r);
        assert_eq!(m.0[3], [0.0, 0.0, 0.0, 1.0]);
    }
}
