//! SPH smoothing kernels.
//!
//! Every kernel has compact support `h`: both the weight and the gradient are
//! exactly zero for `|r| > h`. The solver holds two kernels at once (one for
//! density-like sums, one for constraint gradients), and the pair is chosen at
//! runtime, so the family is exposed both as the [`SmoothingKernel`] trait and
//! as the closed [`Kernel`] variant that dispatches over it.

use std::f32::consts::PI;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Distances below this are treated as coincident particles.
const COINCIDENT_EPS: f32 = 1.0e-12;

/// A radially symmetric smoothing kernel with compact support.
pub trait SmoothingKernel {
    /// Support radius `h`.
    fn support_radius(&self) -> f32;

    /// Kernel value `W(r)` for the offset `r = p_i - p_j`.
    fn weight(&self, r: Vec3) -> f32;

    /// Gradient `grad W(r)` with respect to `p_i`.
    fn gradient(&self, r: Vec3) -> Vec3;

    /// Self-contribution `W(0)`.
    fn self_weight(&self) -> f32 {
        self.weight(Vec3::ZERO)
    }
}

// ---------------------------------------------------------------------------
// Poly6
// ---------------------------------------------------------------------------

/// Poly6 kernel (Mueller et al. 2003).
///
/// ```text
/// W(r, h)      =  315 / (64 pi h^9) * (h^2 - |r|^2)^3
/// grad W(r, h) = -945 / (32 pi h^9) * (h^2 - |r|^2)^2 * r
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poly6 {
    h: f32,
    h2: f32,
    weight_coeff: f32,
    gradient_coeff: f32,
}

impl Poly6 {
    /// Create a Poly6 kernel with support radius `h`.
    pub fn new(h: f32) -> Self {
        let h9 = h.powi(9);
        Self {
            h,
            h2: h * h,
            weight_coeff: 315.0 / (64.0 * PI * h9),
            gradient_coeff: -945.0 / (32.0 * PI * h9),
        }
    }
}

impl SmoothingKernel for Poly6 {
    fn support_radius(&self) -> f32 {
        self.h
    }

    #[inline]
    fn weight(&self, r: Vec3) -> f32 {
        let r2 = r.length_squared();
        if r2 > self.h2 {
            return 0.0;
        }
        let d = self.h2 - r2;
        self.weight_coeff * d * d * d
    }

    #[inline]
    fn gradient(&self, r: Vec3) -> Vec3 {
        let r2 = r.length_squared();
        if r2 > self.h2 {
            return Vec3::ZERO;
        }
        let d = self.h2 - r2;
        r * (self.gradient_coeff * d * d)
    }
}

// ---------------------------------------------------------------------------
// Spiky
// ---------------------------------------------------------------------------

/// Spiky kernel (Desbrun & Gascuel 1996).
///
/// ```text
/// W(r, h)      =  15 / (pi h^6) * (h - |r|)^3
/// grad W(r, h) = -45 / (pi h^6) * (h - |r|)^2 * r / |r|
/// ```
///
/// The gradient does not vanish at the origin. For coincident particles it
/// falls back to the +x direction so the result stays finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spiky {
    h: f32,
    h2: f32,
    weight_coeff: f32,
    gradient_coeff: f32,
}

impl Spiky {
    /// Create a Spiky kernel with support radius `h`.
    pub fn new(h: f32) -> Self {
        let h6 = h.powi(6);
        Self {
            h,
            h2: h * h,
            weight_coeff: 15.0 / (PI * h6),
            gradient_coeff: -45.0 / (PI * h6),
        }
    }
}

impl SmoothingKernel for Spiky {
    fn support_radius(&self) -> f32 {
        self.h
    }

    #[inline]
    fn weight(&self, r: Vec3) -> f32 {
        let r2 = r.length_squared();
        if r2 > self.h2 {
            return 0.0;
        }
        let d = self.h - r2.sqrt();
        self.weight_coeff * d * d * d
    }

    #[inline]
    fn gradient(&self, r: Vec3) -> Vec3 {
        let r2 = r.length_squared();
        if r2 > self.h2 {
            return Vec3::ZERO;
        }
        let len = r2.sqrt();
        let dir = if len < COINCIDENT_EPS { Vec3::X } else { r / len };
        let d = self.h - len;
        dir * (self.gradient_coeff * d * d)
    }
}

// ---------------------------------------------------------------------------
// Cubic spline
// ---------------------------------------------------------------------------

/// Cubic B-spline kernel with support `h` (Monaghan 1992, rescaled to `q = |r|/h`).
///
/// ```text
/// k = 8 / (pi h^3)
/// W = k (6q^3 - 6q^2 + 1)   for q <= 1/2
/// W = 2k (1 - q)^3          for q <= 1
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSpline {
    h: f32,
    inv_h: f32,
    k: f32,
    l: f32,
}

impl CubicSpline {
    /// Create a cubic spline kernel with support radius `h`.
    pub fn new(h: f32) -> Self {
        let h3 = h * h * h;
        Self {
            h,
            inv_h: 1.0 / h,
            k: 8.0 / (PI * h3),
            l: 48.0 / (PI * h3),
        }
    }
}

impl SmoothingKernel for CubicSpline {
    fn support_radius(&self) -> f32 {
        self.h
    }

    #[inline]
    fn weight(&self, r: Vec3) -> f32 {
        let q = r.length() * self.inv_h;
        if q > 1.0 {
            0.0
        } else if q <= 0.5 {
            let q2 = q * q;
            self.k * (6.0 * q2 * q - 6.0 * q2 + 1.0)
        } else {
            let t = 1.0 - q;
            2.0 * self.k * t * t * t
        }
    }

    #[inline]
    fn gradient(&self, r: Vec3) -> Vec3 {
        let len = r.length();
        let q = len * self.inv_h;
        if q > 1.0 || len < COINCIDENT_EPS {
            return Vec3::ZERO;
        }
        // d q / d r_i
        let grad_q = r * (self.inv_h / len);
        if q <= 0.5 {
            grad_q * (self.l * q * (3.0 * q - 2.0))
        } else {
            let t = 1.0 - q;
            grad_q * (-self.l * t * t)
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime selection
// ---------------------------------------------------------------------------

/// Which member of the kernel family to use. This is the configuration-level
/// choice; [`Kernel::new`] turns it into an evaluable kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KernelKind {
    /// [`Poly6`]
    #[default]
    Poly6,
    /// [`Spiky`]
    Spiky,
    /// [`CubicSpline`]
    CubicSpline,
}

impl KernelKind {
    /// All selectable kernels, in menu order.
    pub const ALL: [KernelKind; 3] = [KernelKind::Poly6, KernelKind::Spiky, KernelKind::CubicSpline];

    /// Display label.
    pub fn label(self) -> &'static str {
        match self {
            KernelKind::Poly6 => "Poly6",
            KernelKind::Spiky => "Spiky",
            KernelKind::CubicSpline => "Cubic",
        }
    }
}

/// A kernel chosen at runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Kernel {
    /// Poly6 kernel.
    Poly6(Poly6),
    /// Spiky kernel.
    Spiky(Spiky),
    /// Cubic spline kernel.
    CubicSpline(CubicSpline),
}

impl Kernel {
    /// Build the kernel `kind` with support radius `h`.
    pub fn new(kind: KernelKind, h: f32) -> Self {
        match kind {
            KernelKind::Poly6 => Kernel::Poly6(Poly6::new(h)),
            KernelKind::Spiky => Kernel::Spiky(Spiky::new(h)),
            KernelKind::CubicSpline => Kernel::CubicSpline(CubicSpline::new(h)),
        }
    }

    /// Which kernel this is.
    pub fn kind(&self) -> KernelKind {
        match self {
            Kernel::Poly6(_) => KernelKind::Poly6,
            Kernel::Spiky(_) => KernelKind::Spiky,
            Kernel::CubicSpline(_) => KernelKind::CubicSpline,
        }
    }
}

impl SmoothingKernel for Kernel {
    fn support_radius(&self) -> f32 {
        match self {
            Kernel::Poly6(k) => k.support_radius(),
            Kernel::Spiky(k) => k.support_radius(),
            Kernel::CubicSpline(k) => k.support_radius(),
        }
    }

    #[inline]
    fn weight(&self, r: Vec3) -> f32 {
        match self {
            Kernel::Poly6(k) => k.weight(r),
            Kernel::Spiky(k) => k.weight(r),
            Kernel::CubicSpline(k) => k.weight(r),
        }
    }

    #[inline]
    fn gradient(&self, r: Vec3) -> Vec3 {
        match self {
            Kernel::Poly6(k) => k.gradient(r),
            Kernel::Spiky(k) => k.gradient(r),
            Kernel::CubicSpline(k) => k.gradient(r),
        }
    }
}
