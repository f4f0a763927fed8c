//! Bit manipulation and number <-> string conversions.

/// Sign-extend the low `width` bits of `value`.
pub fn sign_extend(value: u32, width: u32) -> i32 {
    let shift = 32 - width;
    ((value << shift) as i32) >> shift
}

pub fn sign_extend_16(value: i32) -> i32 {
    value as i16 as i32
}

pub fn bit(value: i32, n: u32) -> bool {
    (value >> n) & 1 == 1
}

pub fn set_bit(value: i32, n: u32) -> i32 {
    value | (1 << n)
}

pub fn clear_bit(value: i32, n: u32) -> i32 {
    value & !(1 << n)
}

pub fn hi_half(value: i32) -> i32 {
    (value >> 16) & 0xFFFF
}

pub fn lo_half(value: i32) -> i32 {
    value & 0xFFFF
}

/// Byte `n` of `value`, where byte 0 is the least significant.
pub fn get_byte(value: i32, n: u32) -> i32 {
    (value >> (n * 8)) & 0xFF
}

pub fn set_byte(value: i32, n: u32, byte: i32) -> i32 {
    let shift = n * 8;
    (value & !(0xFF << shift)) | ((byte & 0xFF) << shift)
}

pub fn to_hex_string(value: i32) -> String {
    format!("0x{:08x}", value as u32)
}

pub fn to_bin_string(value: i32, width: u32) -> String {
    let width = width.min(32) as usize;
    let full = format!("{:032b}", value as u32);
    full[32 - width..].to_string()
}

/// Parses an integer literal the way the assembler accepts them.
///
/// Accepts an optional sign, decimal digits, `0x` hex, `0b` binary and `0o`
/// octal. Hex literals of exactly eight digits are read as a 32-bit two's
/// complement pattern, so `0xFFFFFFFF` is -1.
pub fn parse_int(s: &str) -> Option<i32> {
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match body.get(..2) {
        Some("0x") | Some("0X") => (16, &body[2..]),
        Some("0b") | Some("0B") => (2, &body[2..]),
        Some("0o") | Some("0O") => (8, &body[2..]),
        _ => (10, body),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    if radix == 10 {
        let magnitude = digits.parse::<i64>().ok()?;
        let value = if negative { -magnitude } else { magnitude };
        return i32::try_from(value).ok();
    }
    let pattern = u32::from_str_radix(digits, radix).ok()? as i32;
    Some(if negative { pattern.wrapping_neg() } else { pattern })
}

pub fn is_int(s: &str) -> bool {
    parse_int(s).is_some()
}

/// Splits a double into (high word, low word) of its IEEE-754 image.
pub fn double_to_words(value: f64) -> (i32, i32) {
    let raw = value.to_bits();
    ((raw >> 32) as i32, raw as u32 as i32)
}

pub fn words_to_double(high: i32, low: i32) -> f64 {
    f64::from_bits(((high as u32 as u64) << 32) | (low as u32 as u64))
}
