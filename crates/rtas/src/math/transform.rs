use glam::{Affine3A, Mat3, Quat, Vec3, Vec3A};

use super::float::FloatAsExt;

/// Affine local-to-world transform stored as 3 basis vectors and a translation
///
/// A point `p` is mapped to `p.x * vx + p.y * vy + p.z * vz + p`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub vx: Vec3,
    pub vy: Vec3,
    pub vz: Vec3,
    pub p: Vec3,
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: Self = Self {
        vx: Vec3::X,
        vy: Vec3::Y,
        vz: Vec3::Z,
        p: Vec3::ZERO,
    };

    pub fn from_translation(p: Vec3) -> Self {
        Self { p, ..Self::IDENTITY }
    }

    pub fn from_rotation_translation(rot: Quat, p: Vec3) -> Self {
        let m = Mat3::from_quat(rot);
        Self {
            vx: m.x_axis,
            vy: m.y_axis,
            vz: m.z_axis,
            p,
        }
    }

    pub fn to_affine(&self) -> Affine3A {
        Affine3A::from_cols(
            Vec3A::from(self.vx),
            Vec3A::from(self.vy),
            Vec3A::from(self.vz),
            Vec3A::from(self.p),
        )
    }

    pub fn from_affine(a: &Affine3A) -> Self {
        Self {
            vx: a.matrix3.x_axis.into(),
            vy: a.matrix3.y_axis.into(),
            vz: a.matrix3.z_axis.into(),
            p: a.translation.into(),
        }
    }

    /// Returns None if the linear part is singular or not finite
    pub fn inverse(&self) -> Option<Self> {
        let m = Mat3::from_cols(self.vx, self.vy, self.vz);
        m.determinant().into_finite()?.into_non_zero(0.0)?;

        let inv = m.inverse();
        let inv = Self {
            vx: inv.x_axis,
            vy: inv.y_axis,
            vz: inv.z_axis,
            p: -(inv * self.p),
        };
        inv.is_finite().then_some(inv)
    }

    pub fn is_finite(&self) -> bool {
        self.vx.is_finite() && self.vy.is_finite() && self.vz.is_finite() && self.p.is_finite()
    }

    pub fn transform_point(&self, v: Vec3) -> Vec3 {
        self.transform_vector(v) + self.p
    }

    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        v.x * self.vx + v.y * self.vy + v.z * self.vz
    }

    /// Row-major 3x4 matrix, as stored in the accel buffer
    pub fn to_row_major(&self) -> [f32; 12] {
        [
            self.vx.x, self.vy.x, self.vz.x, self.p.x, //
            self.vx.y, self.vy.y, self.vz.y, self.p.y, //
            self.vx.z, self.vy.z, self.vz.z, self.p.z,
        ]
    }

    pub fn from_row_major(m: &[f32; 12]) -> Self {
        Self {
            vx: Vec3::new(m[0], m[4], m[8]),
            vy: Vec3::new(m[1], m[5], m[9]),
            vz: Vec3::new(m[2], m[6], m[10]),
            p: Vec3::new(m[3], m[7], m[11]),
        }
    }
}
