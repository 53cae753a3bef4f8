//! Metadata values and key-value lookups.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{GGUFError, Result};
use crate::types::GGUFValueType;

//  Values

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GGUFValue {
    Uint8(u8),
    Int8(i8),
    Uint16(u16),
    Int16(i16),
    Uint32(u32),
    Int32(i32),
    Float32(f32),
    Bool(bool),
    String(String),
    Array(GGUFArrayValue),
    Uint64(u64),
    Int64(i64),
    Float64(f64),
}

/// Array-typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFArrayValue {
    /// Type of every item.
    pub item_type: GGUFValueType,
    /// Declared number of items.
    pub len: u64,
    /// Decoded items; empty when the array was skipped.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<GGUFValue>,
    /// Absolute offset of the array's item-type tag.
    pub start_offset: u64,
    /// Size in bytes of the item payload (after the length field).
    pub size: u64,
}

impl GGUFValue {
    pub fn value_type(&self) -> GGUFValueType {
        match self {
            Self::Uint8(_) => GGUFValueType::Uint8,
            Self::Int8(_) => GGUFValueType::Int8,
            Self::Uint16(_) => GGUFValueType::Uint16,
            Self::Int16(_) => GGUFValueType::Int16,
            Self::Uint32(_) => GGUFValueType::Uint32,
            Self::Int32(_) => GGUFValueType::Int32,
            Self::Float32(_) => GGUFValueType::Float32,
            Self::Bool(_) => GGUFValueType::Bool,
            Self::String(_) => GGUFValueType::String,
            Self::Array(_) => GGUFValueType::Array,
            Self::Uint64(_) => GGUFValueType::Uint64,
            Self::Int64(_) => GGUFValueType::Int64,
            Self::Float64(_) => GGUFValueType::Float64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Cast any integer or float value to `T`.
    pub fn as_numeric<T: NumCast>(&self) -> Result<T> {
        T::from_value(self).ok_or_else(|| GGUFError::NotNumeric(self.value_type()))
    }
}

//  Numeric casts

/// Numeric primitive a metadata value can be cast into with `as` semantics.
pub trait NumCast: Copy {
    fn from_value(value: &GGUFValue) -> Option<Self>;
}

macro_rules! impl_num_cast {
    ($($t:ty),* $(,)?) => {
        $(
            impl NumCast for $t {
                fn from_value(value: &GGUFValue) -> Option<Self> {
                    Some(match *value {
                        GGUFValue::Uint8(v) => v as $t,
                        GGUFValue::Int8(v) => v as $t,
                        GGUFValue::Uint16(v) => v as $t,
                        GGUFValue::Int16(v) => v as $t,
                        GGUFValue::Uint32(v) => v as $t,
                        GGUFValue::Int32(v) => v as $t,
                        GGUFValue::Float32(v) => v as $t,
                        GGUFValue::Uint64(v) => v as $t,
                        GGUFValue::Int64(v) => v as $t,
                        GGUFValue::Float64(v) => v as $t,
                        _ => return None,
                    })
                }
            }
        )*
    };
}

impl_num_cast!(u8, i8, u16, i16, u32, i32, u64, i64, usize, isize, f32, f64);

//  Typed accessors

fn mismatch(expected: GGUFValueType, value: &GGUFValue) -> GGUFError {
    GGUFError::TypeMismatch {
        expected,
        actual: value.value_type(),
    }
}

macro_rules! scalar_accessors {
    ($($name:ident => $variant:ident: $t:ty),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<$t> {
                match &self.value {
                    GGUFValue::$variant(v) => Ok(*v),
                    other => Err(mismatch(GGUFValueType::$variant, other)),
                }
            }
        )*
    };
}

macro_rules! array_accessors {
    ($($name:ident => $variant:ident: $t:ty),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<Vec<$t>> {
                self.expect_item_type(GGUFValueType::$variant)?;
                self.items
                    .iter()
                    .map(|item| match item {
                        GGUFValue::$variant(v) => Ok(v.clone()),
                        other => Err(mismatch(GGUFValueType::$variant, other)),
                    })
                    .collect()
            }
        )*
    };
}

impl GGUFArrayValue {
    fn expect_item_type(&self, expected: GGUFValueType) -> Result<()> {
        if self.item_type != expected {
            return Err(GGUFError::TypeMismatch {
                expected,
                actual: self.item_type,
            });
        }
        Ok(())
    }

    /// Whether items were decoded or only sized.
    pub fn is_materialized(&self) -> bool {
        self.len == 0 || !self.items.is_empty()
    }

    array_accessors! {
        values_u8 => Uint8: u8,
        values_i8 => Int8: i8,
        values_u16 => Uint16: u16,
        values_i16 => Int16: i16,
        values_u32 => Uint32: u32,
        values_i32 => Int32: i32,
        values_f32 => Float32: f32,
        values_bool => Bool: bool,
        values_string => String: String,
        values_array => Array: GGUFArrayValue,
        values_u64 => Uint64: u64,
        values_i64 => Int64: i64,
        values_f64 => Float64: f64,
    }

    /// Cast every item of a numeric array to `T`.
    pub fn values_numeric<T: NumCast>(&self) -> Result<Vec<T>> {
        self.items.iter().map(GGUFValue::as_numeric).collect()
    }
}

//  Metadata KV

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFMetadataKV {
    pub key: String,
    pub value_type: GGUFValueType,
    pub value: GGUFValue,
}

impl GGUFMetadataKV {
    scalar_accessors! {
        value_u8 => Uint8: u8,
        value_i8 => Int8: i8,
        value_u16 => Uint16: u16,
        value_i16 => Int16: i16,
        value_u32 => Uint32: u32,
        value_i32 => Int32: i32,
        value_f32 => Float32: f32,
        value_bool => Bool: bool,
        value_u64 => Uint64: u64,
        value_i64 => Int64: i64,
        value_f64 => Float64: f64,
    }

    pub fn value_string(&self) -> Result<&str> {
        match &self.value {
            GGUFValue::String(s) => Ok(s),
            other => Err(mismatch(GGUFValueType::String, other)),
        }
    }

    pub fn value_array(&self) -> Result<&GGUFArrayValue> {
        match &self.value {
            GGUFValue::Array(a) => Ok(a),
            other => Err(mismatch(GGUFValueType::Array, other)),
        }
    }

    /// Cast an integer or float value to `T`.
    pub fn value_numeric<T: NumCast>(&self) -> Result<T> {
        self.value.as_numeric()
    }
}

/// Ordered metadata list. Keys are not deduplicated; lookups return the
/// first match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFMetadataKVs(pub Vec<GGUFMetadataKV>);

impl Deref for GGUFMetadataKVs {
    type Target = [GGUFMetadataKV];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl GGUFMetadataKVs {
    pub fn get(&self, key: &str) -> Option<&GGUFMetadataKV> {
        self.0.iter().find(|kv| kv.key == key)
    }

    /// Entries whose key matches `pattern`.
    pub fn search(&self, pattern: &Regex) -> Vec<&GGUFMetadataKV> {
        self.0.iter().filter(|kv| pattern.is_match(&kv.key)).collect()
    }

    /// Look up several keys in one pass.
    ///
    /// Returns the entries found, keyed by key, and how many of `keys` were
    /// found.
    pub fn index<'a>(&'a self, keys: &[&str]) -> (HashMap<&'a str, &'a GGUFMetadataKV>, usize) {
        let wanted: HashSet<&str> = keys.iter().copied().collect();
        let mut found = HashMap::with_capacity(wanted.len());
        for kv in &self.0 {
            if found.len() == wanted.len() {
                break;
            }
            if wanted.contains(kv.key.as_str()) {
                found.entry(kv.key.as_str()).or_insert(kv);
            }
        }
        let n = found.len();
        (found, n)
    }
}
