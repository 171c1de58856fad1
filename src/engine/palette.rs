use std::fmt;

use serde::{Serialize, Serializer};

const PALETTE: [Rgb; 54] = [
    Rgb::new(0xF4, 0x43, 0x36),
    Rgb::new(0xE9, 0x1E, 0x63),
    Rgb::new(0x9C, 0x27, 0xB0),
    Rgb::new(0x67, 0x3A, 0xB7),
    Rgb::new(0x3F, 0x51, 0xB5),
    Rgb::new(0x21, 0x96, 0xF3),
    Rgb::new(0x03, 0xA9, 0xF4),
    Rgb::new(0x00, 0xBC, 0xD4),
    Rgb::new(0x00, 0x96, 0x88),
    Rgb::new(0x4C, 0xAF, 0x50),
    Rgb::new(0x8B, 0xC3, 0x4A),
    Rgb::new(0xCD, 0xDC, 0x39),
    Rgb::new(0xFF, 0xEB, 0x3B),
    Rgb::new(0xFF, 0xC1, 0x07),
    Rgb::new(0xFF, 0x98, 0x00),
    Rgb::new(0xFF, 0x57, 0x22),
    Rgb::new(0x79, 0x55, 0x48),
    Rgb::new(0x60, 0x7D, 0x8B),
    Rgb::new(0xD3, 0x2F, 0x2F),
    Rgb::new(0xC2, 0x18, 0x5B),
    Rgb::new(0x7B, 0x1F, 0xA2),
    Rgb::new(0x51, 0x2D, 0xA8),
    Rgb::new(0x30, 0x3F, 0x9F),
    Rgb::new(0x19, 0x76, 0xD2),
    Rgb::new(0x02, 0x88, 0xD1),
    Rgb::new(0x00, 0x97, 0xA7),
    Rgb::new(0x00, 0x79, 0x6B),
    Rgb::new(0x38, 0x8E, 0x3C),
    Rgb::new(0x68, 0x9F, 0x38),
    Rgb::new(0xAF, 0xB4, 0x2B),
    Rgb::new(0xFB, 0xC0, 0x2D),
    Rgb::new(0xFF, 0xA0, 0x00),
    Rgb::new(0xF5, 0x7C, 0x00),
    Rgb::new(0xE6, 0x4A, 0x19),
    Rgb::new(0x5D, 0x40, 0x37),
    Rgb::new(0x45, 0x5A, 0x64),
    Rgb::new(0xEF, 0x53, 0x50),
    Rgb::new(0xEC, 0x40, 0x7A),
    Rgb::new(0xAB, 0x47, 0xBC),
    Rgb::new(0x7E, 0x57, 0xC2),
    Rgb::new(0x5C, 0x6B, 0xC0),
    Rgb::new(0x42, 0xA5, 0xF5),
    Rgb::new(0x29, 0xB6, 0xF6),
    Rgb::new(0x26, 0xC6, 0xDA),
    Rgb::new(0x26, 0xA6, 0x9A),
    Rgb::new(0x66, 0xBB, 0x6A),
    Rgb::new(0x9C, 0xCC, 0x65),
    Rgb::new(0xD4, 0xE1, 0x57),
    Rgb::new(0xFF, 0xEE, 0x58),
    Rgb::new(0xFF, 0xCA, 0x28),
    Rgb::new(0xFF, 0xA7, 0x26),
    Rgb::new(0xFF, 0x70, 0x43),
    Rgb::new(0x8D, 0x6E, 0x63),
    Rgb::new(0x78, 0x90, 0x9C),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Picks a palette entry from a string key. The same key always maps to
/// the same color, across runs and platforms.
///
/// Each step shifts the 32-bit truncation of the running hash but subtracts
/// the untruncated value, so the hash is carried in an `i64`.
pub fn color_for_key(key: &str) -> Rgb {
    let hash = key.encode_utf16().fold(0i64, |hash, unit| {
        let shifted = i64::from((hash as i32).wrapping_shl(5));
        i64::from(unit) + shifted - hash
    });
    PALETTE[(hash.unsigned_abs() % PALETTE.len() as u64) as usize]
}
