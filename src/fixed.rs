/*
 * This source code is licensed under the Business Source License 1.1.
 * See LICENSE in the root directory for full details.
 */

//! Deterministic fixed-point arithmetic.
//!
//! Every stored and compared quantity in the engine is a [`Fixed`]: a signed
//! 64-bit mantissa with an implied scale of 10⁹. Two observers replaying the
//! same snapshot on different machines obtain bit-identical results because
//! nothing here touches native floating point.
//!
//! # Rounding rule
//!
//! Products and quotients are formed in 128-bit and truncated toward zero.
//! Narrowing back to 64 bits saturates at `i64::MIN` / `i64::MAX`.
//!
//! # Transcendentals
//!
//! `sin`/`cos` use range reduction to `[0, π/2]` followed by a Taylor series,
//! `atan2` reduces to `|z| ≤ tan(π/8)`, `exp` splits off powers of two and
//! `ln` uses the `atanh` series on a mantissa in `[1, 2)`. Absolute error is a
//! few units in the last place (≈1e-9) over the ranges the engine uses.

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Raw scale factor shared by all fixed-point values (10⁹).
const S: i64 = 1_000_000_000;
const S128: i128 = S as i128;

// ─── Fixed ──────────────────────────────────────────────────────────────────

/// A fixed-point real number with nine decimal places.
///
/// The mantissa is exposed through [`Fixed::raw`] and [`Fixed::from_raw`] so
/// that snapshots persist integers only.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Fixed(i64);

impl Fixed {
    /// Scale factor of the mantissa.
    pub const SCALE: i64 = S;
    /// 0.0
    pub const ZERO: Fixed = Fixed(0);
    /// 1.0
    pub const ONE: Fixed = Fixed(S);
    /// 0.5
    pub const HALF: Fixed = Fixed(S / 2);
    /// Largest representable value.
    pub const MAX: Fixed = Fixed(i64::MAX);

    /// π
    pub const PI: Fixed = Fixed(3_141_592_654);
    /// 2π, the period every phase is wrapped into.
    pub const TWO_PI: Fixed = Fixed(6_283_185_307);
    /// π/2
    pub const FRAC_PI_2: Fixed = Fixed(1_570_796_327);
    /// π/4, the default drift limit.
    pub const FRAC_PI_4: Fixed = Fixed(785_398_163);
    /// φ, the golden ratio.
    pub const PHI: Fixed = Fixed(1_618_033_989);
    /// φ²
    pub const PHI_SQUARED: Fixed = Fixed(2_618_033_989);
    /// φ⁻¹ = φ − 1
    pub const PHI_INVERSE: Fixed = Fixed(618_033_989);
    /// φ⁴, the golden coherence-depth target.
    pub const PHI_FOURTH: Fixed = Fixed(6_854_101_966);
    /// ln 2
    pub const LN_2: Fixed = Fixed(693_147_181);

    /// tan(π/8), the pivot for the `atan` argument reduction.
    const TAN_PI_8: i64 = 414_213_562;

    /// Wrap a raw mantissa.
    pub const fn from_raw(raw: i64) -> Self {
        Fixed(raw)
    }

    /// The raw mantissa (value × 10⁹).
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Construct from an integer, saturating on overflow.
    pub const fn from_int(n: i64) -> Self {
        Fixed(n.saturating_mul(S))
    }

    /// Construct `num / den`. Returns zero when `den == 0`.
    pub const fn from_ratio(num: i64, den: i64) -> Self {
        if den == 0 {
            return Fixed::ZERO;
        }
        Fixed(saturate(num as i128 * S128 / den as i128))
    }

    /// Convert from `f64` at an API edge, rounding half away from zero.
    pub fn from_f64(v: f64) -> Self {
        let scaled = v * S as f64;
        // `as` saturates on out-of-range and maps NaN to zero.
        if scaled >= 0.0 {
            Fixed((scaled + 0.5) as i64)
        } else {
            Fixed((scaled - 0.5) as i64)
        }
    }

    /// Convert to `f64` for display or foreign interfaces.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / S as f64
    }

    /// Absolute value (saturating at `i64::MAX`).
    pub const fn abs(self) -> Self {
        Fixed(self.0.saturating_abs())
    }

    /// `true` when the value is strictly negative.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `true` when the value is strictly positive.
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Clamp into the unit interval `[0, 1]`.
    pub fn clamp_unit(self) -> Self {
        self.clamp(Fixed::ZERO, Fixed::ONE)
    }

    /// Checked division. `None` when `rhs` is zero.
    pub fn checked_div(self, rhs: Fixed) -> Option<Fixed> {
        if rhs.0 == 0 {
            return None;
        }
        Some(Fixed(saturate(self.0 as i128 * S128 / rhs.0 as i128)))
    }

    /// Divide by a plain integer. `None` when `n == 0`.
    pub fn div_int(self, n: i64) -> Option<Fixed> {
        if n == 0 {
            return None;
        }
        Some(Fixed(self.0 / n))
    }

    /// Multiply a token amount by this factor, truncating toward zero.
    ///
    /// Negative factors yield zero; the result saturates at `u64::MAX`.
    pub fn scale_amount(self, amount: u64) -> u64 {
        if self.0 <= 0 {
            return 0;
        }
        let v = amount as u128 * self.0 as u128 / S as u128;
        if v > u64::MAX as u128 {
            u64::MAX
        } else {
            v as u64
        }
    }

    /// Square root by integer Newton iteration. Non-positive input yields 0.
    pub fn sqrt(self) -> Fixed {
        if self.0 <= 0 {
            return Fixed::ZERO;
        }
        Fixed(isqrt(self.0 as u128 * S as u128) as i64)
    }

    // ── Angles ─────────────────────────────────────────────────────────────

    /// Wrap an angle into `[0, 2π)`.
    pub fn wrap_phase(self) -> Fixed {
        Fixed(self.0.rem_euclid(Self::TWO_PI.0))
    }

    /// Signed difference `self − other` wrapped into `(−π, π]`.
    pub fn phase_difference(self, other: Fixed) -> Fixed {
        let d = (self.0 - other.0).rem_euclid(Self::TWO_PI.0);
        if d > Self::PI.0 {
            Fixed(d - Self::TWO_PI.0)
        } else {
            Fixed(d)
        }
    }

    /// Unsigned angular distance between two phases, in `[0, π]`.
    pub fn angular_distance(self, other: Fixed) -> Fixed {
        self.phase_difference(other).abs()
    }

    /// Cosine of an angle in radians.
    pub fn cos(self) -> Fixed {
        let (a, flip) = reduce_quadrant(self.0);
        // cos is even, so only the magnitude matters.
        let c = cos_series(a.abs());
        Fixed(if flip { -c } else { c })
    }

    /// Sine of an angle in radians.
    pub fn sin(self) -> Fixed {
        let r = self.phase_difference(Fixed::ZERO).0;
        let negative = r < 0;
        let mut a = r.abs();
        if a > Self::FRAC_PI_2.0 {
            a = Self::PI.0 - a;
        }
        let s = sin_series(a);
        Fixed(if negative { -s } else { s })
    }

    /// Four-quadrant arctangent of `y / x`, in `(−π, π]`.
    ///
    /// `atan2(0, 0)` is defined as 0.
    pub fn atan2(y: Fixed, x: Fixed) -> Fixed {
        if x.0 == 0 && y.0 == 0 {
            return Fixed::ZERO;
        }
        if y.abs() <= x.abs() {
            let z = saturate(y.0 as i128 * S128 / x.0 as i128);
            let base = atan_unit(z);
            if x.0 > 0 {
                Fixed(base)
            } else if y.0 >= 0 {
                Fixed(base + Self::PI.0)
            } else {
                Fixed(base - Self::PI.0)
            }
        } else {
            let z = saturate(x.0 as i128 * S128 / y.0 as i128);
            let base = atan_unit(z);
            if y.0 > 0 {
                Fixed(Self::FRAC_PI_2.0 - base)
            } else {
                Fixed(-Self::FRAC_PI_2.0 - base)
            }
        }
    }

    // ── Exponentials ───────────────────────────────────────────────────────

    /// eˣ. Saturates above x ≈ 22 and flushes to zero below x ≈ −21.
    pub fn exp(self) -> Fixed {
        if self.0 > 22 * S {
            return Fixed::MAX;
        }
        if self.0 < -21 * S {
            return Fixed::ZERO;
        }
        let k = self.0.div_euclid(Self::LN_2.0);
        let r = (self.0 - k * Self::LN_2.0) as i128; // r ∈ [0, ln 2)

        let mut term = S128;
        let mut sum = S128;
        for n in 1..=20i128 {
            term = term * r / (n * S128);
            if term == 0 {
                break;
            }
            sum += term;
        }

        if k >= 0 {
            Fixed(saturate(sum << k))
        } else {
            Fixed(saturate(sum >> (-k)))
        }
    }

    /// Natural logarithm. `None` for non-positive input.
    pub fn ln(self) -> Option<Fixed> {
        if self.0 <= 0 {
            return None;
        }
        let mut m = self.0 as i128;
        let mut k: i64 = 0;
        while m >= 2 * S128 {
            m >>= 1;
            k += 1;
        }
        while m < S128 {
            m <<= 1;
            k -= 1;
        }
        // ln(m) = 2·atanh(t), t = (m − 1)/(m + 1) ∈ [0, 1/3)
        let t = (m - S128) * S128 / (m + S128);
        let t2 = t * t / S128;
        let mut power = t;
        let mut sum: i128 = 0;
        for n in 0..14i128 {
            sum += power / (2 * n + 1);
            power = power * t2 / S128;
            if power == 0 {
                break;
            }
        }
        Some(Fixed(saturate(2 * sum + k as i128 * Self::LN_2.0 as i128)))
    }

    /// `self ^ exponent` for a non-negative base.
    ///
    /// `0 ^ e` is 0 for positive `e` and 1 for `e == 0`. Negative bases and
    /// `0 ^ negative` return `None`.
    pub fn pow(self, exponent: Fixed) -> Option<Fixed> {
        if exponent.0 == 0 {
            return Some(Fixed::ONE);
        }
        if self.0 == 0 {
            return if exponent.0 > 0 { Some(Fixed::ZERO) } else { None };
        }
        let ln = self.ln()?;
        Some((ln * exponent).exp())
    }
}

// ─── Operators ──────────────────────────────────────────────────────────────

impl Add for Fixed {
    type Output = Fixed;
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    fn neg(self) -> Fixed {
        Fixed(self.0.saturating_neg())
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed(saturate(self.0 as i128 * rhs.0 as i128 / S128))
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let mag = self.0.unsigned_abs();
        write!(f, "{}{}.{:09}", sign, mag / S as u64, mag % S as u64)
    }
}

// ─── Internal helpers ───────────────────────────────────────────────────────

const fn saturate(v: i128) -> i64 {
    if v > i64::MAX as i128 {
        i64::MAX
    } else if v < i64::MIN as i128 {
        i64::MIN
    } else {
        v as i64
    }
}

/// Integer square root (floor) by Newton iteration from an upper bound.
fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let bits = 128 - n.leading_zeros();
    let mut x: u128 = 1 << ((bits + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Reduce an angle to `[−π/2, π/2]` for cosine, reporting whether the
/// reflection through π flipped the sign.
fn reduce_quadrant(raw: i64) -> (i64, bool) {
    let r = Fixed(raw).phase_difference(Fixed::ZERO).0;
    let a = r.abs();
    if a > Fixed::FRAC_PI_2.0 {
        (Fixed::PI.0 - a, true)
    } else {
        (a, false)
    }
}

/// cos(a) for a ∈ [0, π/2].
fn cos_series(a: i64) -> i64 {
    let a = a as i128;
    let a2 = a * a / S128;
    let mut term = S128;
    let mut sum = S128;
    for k in 1..=10i128 {
        term = -term * a2 / (S128 * (2 * k - 1) * (2 * k));
        if term == 0 {
            break;
        }
        sum += term;
    }
    saturate(sum.clamp(-S128, S128))
}

/// sin(a) for a ∈ [0, π/2].
fn sin_series(a: i64) -> i64 {
    let a = a as i128;
    let a2 = a * a / S128;
    let mut term = a;
    let mut sum = a;
    for k in 1..=10i128 {
        term = -term * a2 / (S128 * (2 * k) * (2 * k + 1));
        if term == 0 {
            break;
        }
        sum += term;
    }
    saturate(sum.clamp(-S128, S128))
}

/// atan(z) for |z| ≤ 1 (raw mantissa in, raw mantissa out).
fn atan_unit(z: i64) -> i64 {
    let negative = z < 0;
    let mut z = z.abs() as i128;
    let mut offset: i128 = 0;
    if z > Fixed::TAN_PI_8 as i128 {
        // atan(z) = π/4 + atan((z − 1)/(z + 1))
        z = (z - S128) * S128 / (z + S128);
        offset = Fixed::FRAC_PI_4.0 as i128;
    }
    let z2 = z * z / S128;
    let mut power = z;
    let mut sum: i128 = 0;
    for n in 0..16i128 {
        let term = power / (2 * n + 1);
        if n % 2 == 0 {
            sum += term;
        } else {
            sum -= term;
        }
        power = power * z2 / S128;
        if power == 0 {
            break;
        }
    }
    let v = saturate(sum + offset);
    if negative {
        -v
    } else {
        v
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
