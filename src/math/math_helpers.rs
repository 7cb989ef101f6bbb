use crate::error::MathError;
use alloy_primitives::U256;

const U256_TWO: U256 = U256::from_limbs([2, 0, 0, 0]);
const U256_THREE: U256 = U256::from_limbs([3, 0, 0, 0]);

/// Rounding direction for [`mul_div_with`].
///
/// Token amounts paid out round `Down`; currency charged rounds `Up`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Computes `floor(a * b / denominator)` with a full 512-bit intermediate
/// product, returning a `MathError` on overflow or division by zero.
pub fn mul_div(a: U256, b: U256, mut denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    // 512-bit product split into [prod1 prod0]
    let mm = a.mul_mod(b, U256::MAX);
    let mut prod0 = a.wrapping_mul(b);
    let (mut prod1, borrow) = mm.overflowing_sub(prod0);
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    if prod1.is_zero() {
        return Ok(prod0 / denominator);
    }

    if denominator <= prod1 {
        return Err(MathError::Overflow);
    }

    let remainder = a.mul_mod(b, denominator);
    let (reduced, borrow) = prod0.overflowing_sub(remainder);
    prod0 = reduced;
    if borrow {
        prod1 = prod1.wrapping_sub(U256::ONE);
    }

    // Factor powers of two out of the denominator.
    let twos = denominator & denominator.wrapping_neg();
    denominator /= twos;
    prod0 /= twos;

    let flip = (twos.wrapping_neg() / twos).wrapping_add(U256::ONE);
    prod0 |= prod1.wrapping_mul(flip);

    // Modular inverse of the odd denominator, Newton-Raphson to 256 bits.
    let mut inv = U256_THREE.wrapping_mul(denominator) ^ U256_TWO;
    for _ in 0..6 {
        inv = inv.wrapping_mul(U256_TWO.wrapping_sub(denominator.wrapping_mul(inv)));
    }

    Ok(prod0.wrapping_mul(inv))
}

/// Like [`mul_div`], but rounds up when the division leaves a remainder.
pub fn mul_div_rounding_up(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    let result = mul_div(a, b, denominator)?;

    if a.mul_mod(b, denominator).is_zero() {
        return Ok(result);
    }
    result.checked_add(U256::ONE).ok_or(MathError::Overflow)
}

/// Dispatches to [`mul_div`] or [`mul_div_rounding_up`].
#[inline]
pub fn mul_div_with(
    a: U256,
    b: U256,
    denominator: U256,
    rounding: Rounding,
) -> Result<U256, MathError> {
    match rounding {
        Rounding::Down => mul_div(a, b, denominator),
        Rounding::Up => mul_div_rounding_up(a, b, denominator),
    }
}

/// Divides `a` by `b`, rounding up on a non-zero remainder.
pub fn div_rounding_up(a: U256, b: U256) -> Result<U256, MathError> {
    if b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let (quotient, remainder) = a.div_rem(b);
    if remainder.is_zero() {
        Ok(quotient)
    } else {
        Ok(quotient + U256::ONE)
    }
}

/// Narrows a `U256` into a `u128`, failing instead of truncating.
#[inline]
pub fn to_u128(value: U256) -> Result<u128, MathError> {
    u128::try_from(value).map_err(|_| MathError::Overflow)
}
