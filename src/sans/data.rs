//! Base types and byte-cursor primitives for data record fields.
//!
//! Every field in a data record is an array of one base type. Each base type
//! reserves one bit pattern as its 'invalid' marker value; fields holding it
//! carry no data.

use std::borrow::Cow;

/// Byte order of multi-byte values, fixed per definition record.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Interpret the architecture byte of a definition record.
    pub fn from_architecture(architecture: u8) -> Self {
        if architecture == 0 {
            Self::Little
        } else {
            Self::Big
        }
    }
}

/// Read an unsigned integer of `width` bytes from the front of `r`.
///
/// The caller checks that `r` holds at least `width` bytes. `width` must be
/// one of 1, 2, 4, or 8.
pub fn read_uint(r: &[u8], width: usize, endianness: Endianness) -> u64 {
    debug_assert!(matches!(width, 1 | 2 | 4 | 8), "unsupported width {width}");
    debug_assert!(r.len() >= width);

    let width = width.min(8).min(r.len());
    let mut b = [0; 8];

    match endianness {
        Endianness::Little => {
            b[..width].copy_from_slice(&r[..width]);
            u64::from_le_bytes(b)
        }
        Endianness::Big => {
            b[8 - width..].copy_from_slice(&r[..width]);
            u64::from_be_bytes(b)
        }
    }
}

/// Read a two's complement signed integer of `width` bytes from the front of
/// `r`, under the same contract as [`read_uint`].
pub fn read_sint(r: &[u8], width: usize, endianness: Endianness) -> i64 {
    let shift = 64 - 8 * width.clamp(1, 8) as u32;
    ((read_uint(r, width, endianness) << shift) as i64) >> shift
}

/// A primitive wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseType {
    Enum,
    SInt8,
    UInt8,
    SInt16,
    UInt16,
    SInt32,
    UInt32,
    /// A null-terminated UTF-8 string.
    String,
    Float32,
    Float64,
    UInt8Z,
    UInt16Z,
    UInt32Z,
    Byte,
    SInt64,
    UInt64,
    UInt64Z,
}

impl BaseType {
    /// All base types, ordered by base type number.
    pub const ALL: [Self; 17] = [
        Self::Enum,
        Self::SInt8,
        Self::UInt8,
        Self::SInt16,
        Self::UInt16,
        Self::SInt32,
        Self::UInt32,
        Self::String,
        Self::Float32,
        Self::Float64,
        Self::UInt8Z,
        Self::UInt16Z,
        Self::UInt32Z,
        Self::Byte,
        Self::SInt64,
        Self::UInt64,
        Self::UInt64Z,
    ];

    /// Look up a base type from the code in a definition record.
    ///
    /// The endian-capable flag (bit 7) is ignored. Returns `None` for codes
    /// newer than this decoder, including any with reserved bits set.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get((code & 0x7F) as usize).copied()
    }

    /// The canonical code, as written by producers.
    pub fn code(self) -> u8 {
        let number = Self::ALL.iter().position(|b| *b == self).unwrap_or(0) as u8;

        if self.size() > 1 { number | 0x80 } else { number }
    }

    /// Size of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            Self::Enum | Self::SInt8 | Self::UInt8 | Self::String => 1,
            Self::UInt8Z | Self::Byte => 1,
            Self::SInt16 | Self::UInt16 | Self::UInt16Z => 2,
            Self::SInt32 | Self::UInt32 | Self::UInt32Z | Self::Float32 => 4,
            Self::SInt64 | Self::UInt64 | Self::UInt64Z | Self::Float64 => 8,
        }
    }

    /// The raw bit pattern marking an element as invalid.
    pub const fn invalid(self) -> u64 {
        match self {
            Self::Enum | Self::UInt8 | Self::Byte => 0xFF,
            Self::SInt8 => 0x7F,
            Self::SInt16 => 0x7FFF,
            Self::UInt16 => 0xFFFF,
            Self::SInt32 => 0x7FFF_FFFF,
            Self::UInt32 | Self::Float32 => 0xFFFF_FFFF,
            Self::SInt64 => 0x7FFF_FFFF_FFFF_FFFF,
            Self::UInt64 | Self::Float64 => u64::MAX,
            Self::String | Self::UInt8Z | Self::UInt16Z | Self::UInt32Z | Self::UInt64Z => 0,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Self::SInt8 | Self::SInt16 | Self::SInt32 | Self::SInt64
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Decode the first element of a field.
    ///
    /// Strings are decoded in full, up to their terminator. Returns `None` if
    /// the element holds the invalid marker value, or equals `extra_invalid`
    /// (a second marker some fields reserve).
    ///
    /// The caller checks that `r` holds at least one element.
    pub fn decode(
        self,
        r: &[u8],
        endianness: Endianness,
        extra_invalid: Option<u64>,
    ) -> Option<Value<'_>> {
        if self == Self::String {
            let end = r.iter().position(|b| *b == 0).unwrap_or(r.len());
            return (end != 0).then(|| Value::Str(String::from_utf8_lossy(&r[..end])));
        }

        let size = self.size();
        let raw = read_uint(r, size, endianness);

        if raw == self.invalid() || Some(raw) == extra_invalid {
            return None;
        }

        Some(match self {
            Self::Float32 => Value::Float(f32::from_bits(raw as u32) as f64),
            Self::Float64 => Value::Float(f64::from_bits(raw)),
            _ if self.is_signed() => Value::Signed(read_sint(r, size, endianness)),
            _ => Value::Unsigned(raw),
        })
    }
}

/// A decoded, valid field element.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Str(Cow<'a, str>),
}

impl Value<'_> {
    /// The value as an unsigned integer, truncating floats and clamping
    /// negative integers to zero.
    pub fn as_u64(&self) -> u64 {
        match self {
            Self::Unsigned(v) => *v,
            Self::Signed(v) => (*v).max(0) as u64,
            Self::Float(v) => *v as u64,
            Self::Str(_) => 0,
        }
    }

    pub fn as_u32(&self) -> u32 {
        self.as_u64().min(u32::MAX as u64) as u32
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Unsigned(v) => (*v).min(i64::MAX as u64) as i64,
            Self::Signed(v) => *v,
            Self::Float(v) => *v as i64,
            Self::Str(_) => 0,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Unsigned(v) => *v as f64,
            Self::Signed(v) => *v as f64,
            Self::Float(v) => *v,
            Self::Str(_) => 0.0,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}
