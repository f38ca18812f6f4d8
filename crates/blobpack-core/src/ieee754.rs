//! Portable IEEE-754 packing.
//!
//! Floats travel as plain integers so that the byte order conversion is the
//! same as for every other scalar. The packers below build the bit pattern
//! arithmetically from the value instead of reinterpreting host memory, so
//! they produce the same wire form on any host float representation.

/// Exponent width of a single precision float
const EXPBITS_32: u32 = 8;
/// Exponent width of a double precision float
const EXPBITS_64: u32 = 11;

/// Pack `value` into a `bits` wide IEEE-754 pattern with `expbits` exponent
/// bits. Values beyond the exponent range become infinity, values below the
/// subnormal range become (signed) zero.
pub fn pack754(value: f64, bits: u32, expbits: u32) -> u64 {
    let sigbits = bits - expbits - 1;
    let bias = (1i64 << (expbits - 1)) - 1;
    let exp_max = (1u64 << expbits) - 1;
    let sign_bit = u64::from(value.is_sign_negative()) << (bits - 1);

    if value.is_nan() {
        return (exp_max << sigbits) | (1u64 << (sigbits - 1));
    }
    if value.is_infinite() {
        return sign_bit | (exp_max << sigbits);
    }
    if value == 0.0 {
        return sign_bit;
    }

    // normalize into [1.0, 2.0)
    let mut fnorm = value.abs();
    let mut shift: i64 = 0;
    while fnorm >= 2.0 {
        fnorm /= 2.0;
        shift += 1;
    }
    while fnorm < 1.0 {
        fnorm *= 2.0;
        shift -= 1;
    }

    let mut exp = shift + bias;
    if exp <= 0 {
        // subnormal; a carry into the exponent field yields the smallest normal
        let significand = ldexp(fnorm, exp - 1 + i64::from(sigbits)).round() as u64;
        return sign_bit | significand;
    }

    let mut significand = ldexp(fnorm - 1.0, i64::from(sigbits)).round() as u64;
    if significand == 1u64 << sigbits {
        significand = 0;
        exp += 1;
    }
    if exp as u64 >= exp_max {
        return sign_bit | (exp_max << sigbits);
    }

    sign_bit | ((exp as u64) << sigbits) | significand
}

/// Inverse of [`pack754`]
pub fn unpack754(word: u64, bits: u32, expbits: u32) -> f64 {
    let sigbits = bits - expbits - 1;
    let bias = (1i64 << (expbits - 1)) - 1;
    let exp_max = (1u64 << expbits) - 1;

    let negative = (word >> (bits - 1)) & 1 == 1;
    let exp = (word >> sigbits) & exp_max;
    let significand = word & ((1u64 << sigbits) - 1);

    let magnitude = if exp == exp_max {
        if significand == 0 {
            f64::INFINITY
        } else {
            f64::NAN
        }
    } else if exp == 0 {
        ldexp(
            ldexp(significand as f64, -i64::from(sigbits)),
            1 - bias,
        )
    } else {
        ldexp(
            ldexp(significand as f64, -i64::from(sigbits)) + 1.0,
            exp as i64 - bias,
        )
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Pack a single precision float
pub fn pack754_32(value: f32) -> u32 {
    pack754(f64::from(value), 32, EXPBITS_32) as u32
}

/// Pack a double precision float
pub fn pack754_64(value: f64) -> u64 {
    pack754(value, 64, EXPBITS_64)
}

/// Unpack a single precision float
pub fn unpack754_32(word: u32) -> f32 {
    unpack754(u64::from(word), 32, EXPBITS_32) as f32
}

/// Unpack a double precision float
pub fn unpack754_64(word: u64) -> f64 {
    unpack754(word, 64, EXPBITS_64)
}

/// `x * 2^e` by repeated doubling/halving; exact whenever the result is
/// representable
fn ldexp(mut x: f64, mut e: i64) -> f64 {
    while e > 0 {
        x *= 2.0;
        e -= 1;
    }
    while e < 0 {
        x /= 2.0;
        e += 1;
    }
    x
}
