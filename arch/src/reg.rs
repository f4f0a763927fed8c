use bimap::BiMap;
use num_enum::{FromPrimitive, IntoPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Reg {
    #[default]
    ZERO,
    AT,
    V0,
    V1,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    T8,
    T9,
    K0,
    K1,
    GP,
    SP,
    FP,
    RA,
}

impl Reg {
    /// `$t0` style names.
    pub fn parse_name(s: &str) -> Option<Self> {
        let name = s.strip_prefix('$')?;
        if name.chars().next()?.is_ascii_digit() {
            return None;
        }
        name.parse::<Self>().ok()
    }

    /// `$8` style names.
    pub fn parse_number(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('$')?;
        if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        match digits.parse::<u8>() {
            Ok(n) if n < 32 => Some(Self::from(n)),
            _ => None,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::parse_name(s).or_else(|| Self::parse_number(s))
    }

    pub fn num(self) -> usize {
        u8::from(self) as usize
    }

    pub fn name(self) -> String {
        format!("${}", self)
    }
}

/// `$f0` .. `$f31`.
pub fn parse_fp_register(s: &str) -> Option<u8> {
    let digits = s.strip_prefix("$f")?;
    if digits.is_empty() || digits.len() > 2 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u8>().ok().filter(|n| *n < 32)
}

pub mod cop0 {
    pub const VADDR: usize = 8;
    pub const STATUS: usize = 12;
    pub const CAUSE: usize = 13;
    pub const EPC: usize = 14;

    /// Status register bits.
    pub const STATUS_IE: u32 = 0;
    pub const STATUS_EXL: u32 = 1;
    pub const STATUS_DEFAULT: i32 = 0x0000_FF11;
}

static COP0_NAMES: Lazy<BiMap<&'static str, usize>> = Lazy::new(|| {
    let mut names = BiMap::new();
    names.insert("vaddr", cop0::VADDR);
    names.insert("status", cop0::STATUS);
    names.insert("cause", cop0::CAUSE);
    names.insert("epc", cop0::EPC);
    names
});

pub fn cop0_name(number: usize) -> Option<&'static str> {
    COP0_NAMES.get_by_right(&number).copied()
}

pub fn cop0_number(name: &str) -> Option<usize> {
    COP0_NAMES.get_by_left(name).copied()
}

#[test]
fn test() {
    assert_eq!(Reg::parse("$t0"), Some(Reg::T0));
    assert_eq!(Reg::parse("$8"), Some(Reg::T0));
    assert_eq!(Reg::parse("$31"), Some(Reg::RA));
    assert_eq!(Reg::parse("$32"), None);
    assert_eq!(Reg::parse("$hoge"), None);
    assert_eq!(Reg::parse("t0"), None);
    assert_eq!(Reg::ZERO.name(), "$zero");
    assert_eq!(parse_fp_register("$f12"), Some(12));
    assert_eq!(parse_fp_register("$f32"), None);
    assert_eq!(cop0_name(14), Some("epc"));
    assert_eq!(cop0_number("status"), Some(12));
}
