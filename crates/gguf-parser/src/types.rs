//! GGUF format types and constants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GGUFError;

//  Magic

/// Magic tag, read from the first four bytes as a little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFMagic(pub u32);

impl GGUFMagic {
    /// Legacy unversioned ggml files.
    pub const GGML: Self = Self(0x6767_6d6c);
    /// Legacy ggmf files.
    pub const GGMF: Self = Self(0x6767_6d66);
    /// Legacy ggjt files (mmap-able ggml).
    pub const GGJT: Self = Self(0x6767_6a74);
    /// `GGUF` stored little-endian.
    pub const GGUF_LE: Self = Self(0x4655_4747);
    /// `GGUF` stored big-endian.
    pub const GGUF_BE: Self = Self(0x4747_5546);

    pub fn is_legacy(self) -> bool {
        self == Self::GGML || self == Self::GGMF || self == Self::GGJT
    }
}

impl fmt::Display for GGUFMagic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::GGML => "GGML",
            Self::GGMF => "GGMF",
            Self::GGJT => "GGJT",
            Self::GGUF_LE => "GGUF",
            Self::GGUF_BE => "GGUF (big-endian)",
            _ => return write!(f, "0x{:08X}", self.0),
        };
        f.write_str(name)
    }
}

//  Version

pub const GGUF_VERSION_V1: u32 = 1;
pub const GGUF_VERSION_V2: u32 = 2;
pub const GGUF_VERSION_V3: u32 = 3;

/// Alignment assumed when `general.alignment` is absent.
pub const GGUF_DEFAULT_ALIGNMENT: u32 = 32;

//  Value type tag

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum GGUFValueType {
    Uint8 = 0,
    Int8 = 1,
    Uint16 = 2,
    Int16 = 3,
    Uint32 = 4,
    Int32 = 5,
    Float32 = 6,
    Bool = 7,
    String = 8,
    Array = 9,
    Uint64 = 10,
    Int64 = 11,
    Float64 = 12,
}

impl GGUFValueType {
    /// Encoded width of a fixed-width value, `None` for strings and arrays.
    pub fn fixed_size(self) -> Option<u64> {
        match self {
            Self::Uint8 | Self::Int8 | Self::Bool => Some(1),
            Self::Uint16 | Self::Int16 => Some(2),
            Self::Uint32 | Self::Int32 | Self::Float32 => Some(4),
            Self::Uint64 | Self::Int64 | Self::Float64 => Some(8),
            Self::String | Self::Array => None,
        }
    }
}

impl TryFrom<u32> for GGUFValueType {
    type Error = GGUFError;
    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Self::Uint8),
            1 => Ok(Self::Int8),
            2 => Ok(Self::Uint16),
            3 => Ok(Self::Int16),
            4 => Ok(Self::Uint32),
            5 => Ok(Self::Int32),
            6 => Ok(Self::Float32),
            7 => Ok(Self::Bool),
            8 => Ok(Self::String),
            9 => Ok(Self::Array),
            10 => Ok(Self::Uint64),
            11 => Ok(Self::Int64),
            12 => Ok(Self::Float64),
            _ => Err(GGUFError::InvalidValueType(v)),
        }
    }
}

//  Tensor element type

/// ggml tensor element type.
///
/// `Q4_2` and `Q4_3` were removed from ggml; their tags stay reserved and
/// carry no [`GGMLTypeTrait`].
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum GGMLType {
    F32 = 0,
    F16 = 1,
    Q4_0 = 2,
    Q4_1 = 3,
    Q4_2 = 4,
    Q4_3 = 5,
    Q5_0 = 6,
    Q5_1 = 7,
    Q8_0 = 8,
    Q8_1 = 9,
    Q2_K = 10,
    Q3_K = 11,
    Q4_K = 12,
    Q5_K = 13,
    Q6_K = 14,
    Q8_K = 15,
    IQ2_XXS = 16,
    IQ2_XS = 17,
    IQ3_XXS = 18,
    IQ1_S = 19,
    IQ4_NL = 20,
    IQ3_S = 21,
    IQ2_S = 22,
    IQ4_XS = 23,
    I8 = 24,
    I16 = 25,
    I32 = 26,
    I64 = 27,
    F64 = 28,
    IQ1_M = 29,
    BF16 = 30,
}

/// Storage block layout of a [`GGMLType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GGMLTypeTrait {
    /// Elements per block.
    pub block_size: u64,
    /// Bytes per block.
    pub type_size: u64,
}

impl GGMLTypeTrait {
    const fn new(block_size: u64, type_size: u64) -> Self {
        Self {
            block_size,
            type_size,
        }
    }

    /// Dense types store one element per block.
    pub fn is_quantized(&self) -> bool {
        self.block_size != 1
    }
}

impl GGMLType {
    pub fn trait_(self) -> Option<GGMLTypeTrait> {
        let tt = match self {
            Self::F32 => GGMLTypeTrait::new(1, 4),
            Self::F16 => GGMLTypeTrait::new(1, 2),
            Self::Q4_0 => GGMLTypeTrait::new(32, 18),
            Self::Q4_1 => GGMLTypeTrait::new(32, 20),
            Self::Q4_2 | Self::Q4_3 => return None,
            Self::Q5_0 => GGMLTypeTrait::new(32, 22),
            Self::Q5_1 => GGMLTypeTrait::new(32, 24),
            Self::Q8_0 => GGMLTypeTrait::new(32, 34),
            Self::Q8_1 => GGMLTypeTrait::new(32, 36),
            Self::Q2_K => GGMLTypeTrait::new(256, 84),
            Self::Q3_K => GGMLTypeTrait::new(256, 110),
            Self::Q4_K => GGMLTypeTrait::new(256, 144),
            Self::Q5_K => GGMLTypeTrait::new(256, 176),
            Self::Q6_K => GGMLTypeTrait::new(256, 210),
            Self::Q8_K => GGMLTypeTrait::new(256, 292),
            Self::IQ2_XXS => GGMLTypeTrait::new(256, 66),
            Self::IQ2_XS => GGMLTypeTrait::new(256, 74),
            Self::IQ3_XXS => GGMLTypeTrait::new(256, 98),
            Self::IQ1_S => GGMLTypeTrait::new(256, 50),
            Self::IQ4_NL => GGMLTypeTrait::new(32, 18),
            Self::IQ3_S => GGMLTypeTrait::new(256, 110),
            Self::IQ2_S => GGMLTypeTrait::new(256, 82),
            Self::IQ4_XS => GGMLTypeTrait::new(256, 136),
            Self::I8 => GGMLTypeTrait::new(1, 1),
            Self::I16 => GGMLTypeTrait::new(1, 2),
            Self::I32 => GGMLTypeTrait::new(1, 4),
            Self::I64 => GGMLTypeTrait::new(1, 8),
            Self::F64 => GGMLTypeTrait::new(1, 8),
            Self::IQ1_M => GGMLTypeTrait::new(256, 56),
            Self::BF16 => GGMLTypeTrait::new(1, 2),
        };
        Some(tt)
    }
}

impl TryFrom<u32> for GGMLType {
    type Error = GGUFError;
    fn try_from(v: u32) -> Result<Self, Self::Error> {
        Ok(match v {
            0 => Self::F32,
            1 => Self::F16,
            2 => Self::Q4_0,
            3 => Self::Q4_1,
            4 => Self::Q4_2,
            5 => Self::Q4_3,
            6 => Self::Q5_0,
            7 => Self::Q5_1,
            8 => Self::Q8_0,
            9 => Self::Q8_1,
            10 => Self::Q2_K,
            11 => Self::Q3_K,
            12 => Self::Q4_K,
            13 => Self::Q5_K,
            14 => Self::Q6_K,
            15 => Self::Q8_K,
            16 => Self::IQ2_XXS,
            17 => Self::IQ2_XS,
            18 => Self::IQ3_XXS,
            19 => Self::IQ1_S,
            20 => Self::IQ4_NL,
            21 => Self::IQ3_S,
            22 => Self::IQ2_S,
            23 => Self::IQ4_XS,
            24 => Self::I8,
            25 => Self::I16,
            26 => Self::I32,
            27 => Self::I64,
            28 => Self::F64,
            29 => Self::IQ1_M,
            30 => Self::BF16,
            _ => return Err(GGUFError::InvalidTensorType(v)),
        })
    }
}

impl fmt::Display for GGMLType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

//  File type

/// Dominant tensor type of a file, as stored in `general.file_type`.
///
/// Several tags double as legacy K-quant preset names; [`fmt::Display`]
/// prints both, e.g. `IQ2_XXS/Q4_K_M`.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum GGUFFileType {
    AllF32 = 0,
    MostlyF16 = 1,
    MostlyQ4_0 = 2,
    MostlyQ4_1 = 3,
    /// Mostly Q4_1, with `token_embd.weight` and `output.weight` in F16.
    MostlyQ4_1_F16 = 4,
    MostlyQ4_2 = 5,
    MostlyQ4_3 = 6,
    MostlyQ8_0 = 7,
    MostlyQ5_0 = 8,
    MostlyQ5_1 = 9,
    MostlyQ2_K = 10,
    MostlyQ3_K = 11,
    MostlyQ4_K = 12,
    MostlyQ5_K = 13,
    MostlyQ6_K = 14,
    MostlyIQ2_XXS = 15,
    MostlyIQ2_XS = 16,
    MostlyIQ3_XXS = 17,
    MostlyIQ1_S = 18,
    MostlyIQ4_NL = 19,
    MostlyIQ3_S = 20,
    MostlyIQ2_S = 21,
    MostlyIQ4_XS = 22,
    MostlyIQ1_M = 23,
    MostlyBF16 = 24,
    /// Not declared and not inferable.
    Unknown = 25,
}

impl GGUFFileType {
    /// Resolve a declared tag; out-of-range values yield `None`.
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::AllF32,
            1 => Self::MostlyF16,
            2 => Self::MostlyQ4_0,
            3 => Self::MostlyQ4_1,
            4 => Self::MostlyQ4_1_F16,
            5 => Self::MostlyQ4_2,
            6 => Self::MostlyQ4_3,
            7 => Self::MostlyQ8_0,
            8 => Self::MostlyQ5_0,
            9 => Self::MostlyQ5_1,
            10 => Self::MostlyQ2_K,
            11 => Self::MostlyQ3_K,
            12 => Self::MostlyQ4_K,
            13 => Self::MostlyQ5_K,
            14 => Self::MostlyQ6_K,
            15 => Self::MostlyIQ2_XXS,
            16 => Self::MostlyIQ2_XS,
            17 => Self::MostlyIQ3_XXS,
            18 => Self::MostlyIQ1_S,
            19 => Self::MostlyIQ4_NL,
            20 => Self::MostlyIQ3_S,
            21 => Self::MostlyIQ2_S,
            22 => Self::MostlyIQ4_XS,
            23 => Self::MostlyIQ1_M,
            24 => Self::MostlyBF16,
            _ => return None,
        })
    }

    /// Element type this file type is named after.
    ///
    /// `Q4_1_F16` and `Unknown` have no single element type.
    pub fn ggml_type(self) -> Option<GGMLType> {
        Some(match self {
            Self::AllF32 => GGMLType::F32,
            Self::MostlyF16 => GGMLType::F16,
            Self::MostlyQ4_0 => GGMLType::Q4_0,
            Self::MostlyQ4_1 => GGMLType::Q4_1,
            Self::MostlyQ4_2 => GGMLType::Q4_2,
            Self::MostlyQ4_3 => GGMLType::Q4_3,
            Self::MostlyQ8_0 => GGMLType::Q8_0,
            Self::MostlyQ5_0 => GGMLType::Q5_0,
            Self::MostlyQ5_1 => GGMLType::Q5_1,
            Self::MostlyQ2_K => GGMLType::Q2_K,
            Self::MostlyQ3_K => GGMLType::Q3_K,
            Self::MostlyQ4_K => GGMLType::Q4_K,
            Self::MostlyQ5_K => GGMLType::Q5_K,
            Self::MostlyQ6_K => GGMLType::Q6_K,
            Self::MostlyIQ2_XXS => GGMLType::IQ2_XXS,
            Self::MostlyIQ2_XS => GGMLType::IQ2_XS,
            Self::MostlyIQ3_XXS => GGMLType::IQ3_XXS,
            Self::MostlyIQ1_S => GGMLType::IQ1_S,
            Self::MostlyIQ4_NL => GGMLType::IQ4_NL,
            Self::MostlyIQ3_S => GGMLType::IQ3_S,
            Self::MostlyIQ2_S => GGMLType::IQ2_S,
            Self::MostlyIQ4_XS => GGMLType::IQ4_XS,
            Self::MostlyIQ1_M => GGMLType::IQ1_M,
            Self::MostlyBF16 => GGMLType::BF16,
            Self::MostlyQ4_1_F16 | Self::Unknown => return None,
        })
    }

    /// Short human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::AllF32 => "F32",
            Self::MostlyF16 => "F16",
            Self::MostlyQ4_0 => "Q4_0",
            Self::MostlyQ4_1 => "Q4_1",
            Self::MostlyQ4_1_F16 => "Q4_1_F16",
            Self::MostlyQ4_2 => "Q4_2",
            Self::MostlyQ4_3 => "Q4_3",
            Self::MostlyQ8_0 => "Q8_0",
            Self::MostlyQ5_0 => "Q5_0",
            Self::MostlyQ5_1 => "Q5_1",
            Self::MostlyQ2_K => "Q2_K",
            Self::MostlyQ3_K => "Q3_K/Q3_K_S",
            Self::MostlyQ4_K => "Q4_K/Q3_K_M",
            Self::MostlyQ5_K => "Q5_K/Q3_K_L",
            Self::MostlyQ6_K => "Q6_K/Q4_K_S",
            Self::MostlyIQ2_XXS => "IQ2_XXS/Q4_K_M",
            Self::MostlyIQ2_XS => "IQ2_XS/Q5_K_S",
            Self::MostlyIQ3_XXS => "IQ3_XXS/Q5_K_M",
            Self::MostlyIQ1_S => "IQ1_S/Q6_K",
            Self::MostlyIQ4_NL => "IQ4_NL",
            Self::MostlyIQ3_S => "IQ3_S",
            Self::MostlyIQ2_S => "IQ2_S",
            Self::MostlyIQ4_XS => "IQ4_XS",
            Self::MostlyIQ1_M => "IQ1_M",
            Self::MostlyBF16 => "BF16",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GGUFFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
