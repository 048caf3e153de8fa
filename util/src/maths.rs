//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Clamp a value between min and max.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Sign of a value where zero counts as positive.
///
/// This is the convention used when restoring a sign onto a magnitude, e.g. applying a minimum
/// speed to a zero command.
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value < T::zero() { -T::one() } else { T::one() }
}

/// Normalise an angle in degrees into the range `(-180, 180]`.
pub fn limit_angle_deg<T>(angle: T) -> T
where
    T: Float
{
    let half_turn = T::from(180.0).unwrap_or_else(T::zero);
    let turn = half_turn + half_turn;

    let a = rem_euclid(angle + half_turn, turn) - half_turn;

    if a <= -half_turn { a + turn } else { a }
}

/// Normalise an angle in radians into the range `(-pi, pi]`.
pub fn limit_angle_rad<T>(angle: T) -> T
where
    T: Float
{
    let pi = T::from(std::f64::consts::PI).unwrap_or_else(T::zero);
    let tau = pi + pi;

    let a = rem_euclid(angle + pi, tau) - pi;

    if a <= -pi { a + tau } else { a }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_limit_angle_deg() {
        assert_eq!(limit_angle_deg(0f64), 0f64);
        assert_eq!(limit_angle_deg(180f64), 180f64);
        assert_eq!(limit_angle_deg(-180f64), 180f64);
        assert_eq!(limit_angle_deg(190f64), -170f64);
        assert_eq!(limit_angle_deg(-190f64), 170f64);
        assert_eq!(limit_angle_deg(720f64 + 45f64), 45f64);
    }

    #[test]
    fn test_limit_angle_rad() {
        const PI: f64 = std::f64::consts::PI;

        assert!((limit_angle_rad(3.0 * PI) - PI).abs() < 1e-12);
        assert!((limit_angle_rad(-PI / 2.0) + PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sign_and_clamp() {
        assert_eq!(sign(0f64), 1f64);
        assert_eq!(sign(-3f64), -1f64);
        assert_eq!(clamp(5f64, -1f64, 1f64), 1f64);
        assert_eq!(clamp(-5f64, -1f64, 1f64), -1f64);
        assert_eq!(clamp(0.5f64, -1f64, 1f64), 0.5f64);
    }
}
