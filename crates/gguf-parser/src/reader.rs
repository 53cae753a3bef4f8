//! Binary reading primitives, metadata values and tensor infos.
//!
//! Every length-bearing field (string and array lengths, header counts,
//! tensor dimensions) is a `u32` in version 1 files and a `u64` from
//! version 2 on.

use std::io::{self, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt};
use crate::tensor::GGUFTensorInfo;
use crate::types::*;
use crate::value::{GGUFArrayValue, GGUFMetadataKV, GGUFValue};

/// Byte order of every multi-byte field after the magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    Little,
    Big,
}

/// Cursor over a seekable GGUF byte source.
pub struct GGUFReader<R> {
    inner: R,
    version: u32,
    order: ByteOrder,
    skip_large_metadata: bool,
    /// Total source length; seeks past it are short reads.
    len: Option<u64>,
}

macro_rules! read_primitive {
    ($($name:ident => $t:ty, $what:literal);* $(;)?) => {
        $(
            pub fn $name(&mut self) -> Result<$t> {
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                self.inner.read_exact(&mut buf).context($what)?;
                Ok(match self.order {
                    ByteOrder::Little => <$t>::from_le_bytes(buf),
                    ByteOrder::Big => <$t>::from_be_bytes(buf),
                })
            }
        )*
    };
}

impl<R: Read + Seek> GGUFReader<R> {
    pub fn new(inner: R, order: ByteOrder, version: u32) -> Self {
        Self {
            inner,
            version,
            order,
            skip_large_metadata: false,
            len: None,
        }
    }

    /// Bound skips by the source length so truncation is caught even when
    /// nothing is read.
    pub fn source_len(mut self, len: u64) -> Self {
        self.len = Some(len);
        self
    }

    /// Seek past array items instead of decoding them.
    pub fn skip_large_metadata(mut self, skip: bool) -> Self {
        self.skip_large_metadata = skip;
        self
    }

    pub(crate) fn set_byte_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub(crate) fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.order
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    //  Primitives

    read_primitive! {
        read_u8 => u8, "read u8";
        read_i8 => i8, "read i8";
        read_u16 => u16, "read u16";
        read_i16 => i16, "read i16";
        read_u32 => u32, "read u32";
        read_i32 => i32, "read i32";
        read_u64 => u64, "read u64";
        read_i64 => i64, "read i64";
        read_f32 => f32, "read f32";
        read_f64 => f64, "read f64";
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let v = self.read_u8().context("read bool")?;
        Ok(v != 0)
    }

    /// Read a count or length field, 4 bytes wide before version 2.
    pub fn read_count(&mut self) -> Result<u64> {
        if self.version <= GGUF_VERSION_V1 {
            Ok(u64::from(self.read_u32()?))
        } else {
            self.read_u64()
        }
    }

    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_count().context("read string length")?;
        let mut buf = Vec::with_capacity(len.min(4096) as usize);
        self.inner
            .by_ref()
            .take(len)
            .read_to_end(&mut buf)
            .context("read string")?;
        if (buf.len() as u64) < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof)).context("read string");
        }
        Ok(String::from_utf8_lossy(&buf).trim().to_string())
    }

    /// Seek past a string without allocating it.
    pub fn skip_string(&mut self) -> Result<()> {
        let len = self.read_count().context("read string length")?;
        self.skip(len).context("seek string")
    }

    /// Absolute position of the cursor.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.inner.stream_position()?)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        if let Some(len) = self.len {
            let pos = self.inner.stream_position()?;
            if pos.checked_add(n).is_none_or(|end| end > len) {
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
            }
        }
        let n = i64::try_from(n)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "seek distance overflows"))?;
        self.inner.seek(SeekFrom::Current(n))?;
        Ok(())
    }

    //  Metadata values

    pub fn read_value(&mut self, vtype: GGUFValueType) -> Result<GGUFValue> {
        Ok(match vtype {
            GGUFValueType::Uint8 => GGUFValue::Uint8(self.read_u8()?),
            GGUFValueType::Int8 => GGUFValue::Int8(self.read_i8()?),
            GGUFValueType::Uint16 => GGUFValue::Uint16(self.read_u16()?),
            GGUFValueType::Int16 => GGUFValue::Int16(self.read_i16()?),
            GGUFValueType::Uint32 => GGUFValue::Uint32(self.read_u32()?),
            GGUFValueType::Int32 => GGUFValue::Int32(self.read_i32()?),
            GGUFValueType::Float32 => GGUFValue::Float32(self.read_f32()?),
            GGUFValueType::Bool => GGUFValue::Bool(self.read_bool()?),
            GGUFValueType::String => GGUFValue::String(self.read_string()?),
            GGUFValueType::Array => GGUFValue::Array(self.read_array()?),
            GGUFValueType::Uint64 => GGUFValue::Uint64(self.read_u64()?),
            GGUFValueType::Int64 => GGUFValue::Int64(self.read_i64()?),
            GGUFValueType::Float64 => GGUFValue::Float64(self.read_f64()?),
        })
    }

    pub fn read_array(&mut self) -> Result<GGUFArrayValue> {
        let start_offset = self.position().context("read array start")?;

        let raw = self.read_u32().context("read array item type")?;
        let item_type = GGUFValueType::try_from(raw).context("read array item type")?;
        let len = self.read_count().context("read array length")?;

        let item_start = self.position().context("seek array item start")?;

        let mut items = Vec::new();
        if self.skip_large_metadata {
            self.skip_array_items(item_type, len)?;
        } else {
            items.reserve(len.min(1024) as usize);
            for i in 0..len {
                let item = self
                    .read_value(item_type)
                    .with_context(|| format!("read array item {i}"))?;
                items.push(item);
            }
        }

        let item_end = self.position().context("seek array item end")?;

        Ok(GGUFArrayValue {
            item_type,
            len,
            items,
            start_offset,
            size: item_end - item_start,
        })
    }

    fn skip_array_items(&mut self, item_type: GGUFValueType, len: u64) -> Result<()> {
        match item_type.fixed_size() {
            Some(width) => {
                let span = len.checked_mul(width).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidData, "array span overflows")
                })?;
                self.skip(span).context("seek array end")
            }
            None if item_type == GGUFValueType::String => {
                for i in 0..len {
                    self.skip_string()
                        .with_context(|| format!("seek array[string] {i}"))?;
                }
                Ok(())
            }
            None => {
                for i in 0..len {
                    self.read_array()
                        .with_context(|| format!("seek array[array] {i}"))?;
                }
                Ok(())
            }
        }
    }

    pub fn read_kv(&mut self) -> Result<GGUFMetadataKV> {
        let key = self.read_string().context("read key")?;

        let raw = self.read_u32().context("read value type")?;
        let value_type = GGUFValueType::try_from(raw).context("read value type")?;

        let value = self
            .read_value(value_type)
            .with_context(|| format!("read {key} value"))?;

        Ok(GGUFMetadataKV {
            key,
            value_type,
            value,
        })
    }

    //  Tensor infos

    pub fn read_tensor_info(&mut self) -> Result<GGUFTensorInfo> {
        let start_offset = self.position().context("seek tensor info start")?;

        let name = self.read_string().context("read name")?;
        let n_dimensions = self.read_u32().context("read n dimensions")?;

        let mut dimensions = Vec::with_capacity(n_dimensions.min(8) as usize);
        for i in 0..n_dimensions {
            let dim = self
                .read_count()
                .with_context(|| format!("read dimension {i}"))?;
            dimensions.push(dim);
        }

        let raw = self.read_u32().context("read type")?;
        let ggml_type = GGMLType::try_from(raw).context("read type")?;

        let offset = self.read_u64().context("read offset")?;

        Ok(GGUFTensorInfo {
            name,
            n_dimensions,
            dimensions,
            ggml_type,
            offset,
            start_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use proptest::prelude::*;

    use super::*;
    use crate::error::GGUFError;
    use crate::testutil::Builder;

    fn reader(b: &Builder) -> GGUFReader<Cursor<Vec<u8>>> {
        GGUFReader::new(Cursor::new(b.bytes().to_vec()), b.order(), b.version())
            .source_len(b.len() as u64)
    }

    #[test]
    fn test_byte_order() {
        let mut le = Builder::new(3);
        le.u32(0x0102_0304).u16(0xABCD).f64(1.25);
        let mut r = reader(&le);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_u16().unwrap(), 0xABCD);
        assert_eq!(r.read_f64().unwrap(), 1.25);

        let mut be = Builder::big_endian(3);
        be.u32(0x0102_0304).u16(0xABCD).f64(1.25);
        assert_eq!(&be.bytes()[..4], &[1, 2, 3, 4]);
        let mut r = reader(&be);
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_u16().unwrap(), 0xABCD);
        assert_eq!(r.read_f64().unwrap(), 1.25);
    }

    #[test]
    fn test_count_width_follows_version() {
        let mut v1 = Builder::new(1);
        v1.string("abc");
        assert_eq!(v1.bytes().len(), 4 + 3);
        assert_eq!(reader(&v1).read_string().unwrap(), "abc");

        let mut v2 = Builder::new(2);
        v2.string("abc");
        assert_eq!(v2.bytes().len(), 8 + 3);
        assert_eq!(reader(&v2).read_string().unwrap(), "abc");
    }

    #[test]
    fn test_string_is_trimmed() {
        let mut b = Builder::new(3);
        b.string("  padded name\n");
        assert_eq!(reader(&b).read_string().unwrap(), "padded name");
    }

    #[test]
    fn test_short_string_is_eof() {
        let mut b = Builder::new(3);
        b.u64(10).raw(b"abc");
        let err = reader(&b).read_string().unwrap_err();
        assert!(err.is_eof());
        assert_eq!(err.to_string(), "read string");
    }

    #[test]
    fn test_skip_string() {
        let mut b = Builder::new(3);
        b.string("skipped").u8(42);
        let mut r = reader(&b);
        r.skip_string().unwrap();
        assert_eq!(r.read_u8().unwrap(), 42);
    }

    #[test]
    fn test_bool_nonzero_is_true() {
        let mut b = Builder::new(3);
        b.u8(0).u8(1).u8(7);
        let mut r = reader(&b);
        assert!(!r.read_bool().unwrap());
        assert!(r.read_bool().unwrap());
        assert!(r.read_bool().unwrap());
    }

    fn array_fixture() -> Builder {
        let mut b = Builder::new(3);
        b.u32(0xFFFF_FFFF); // leading noise so offsets are non-zero
        // array of 3 strings
        b.u32(GGUFValueType::String as u32).u64(3);
        b.string("a").string("bc").string("def");
        // array of 2 arrays of u16
        b.u32(GGUFValueType::Array as u32).u64(2);
        b.u32(GGUFValueType::Uint16 as u32).u64(2).u16(1).u16(2);
        b.u32(GGUFValueType::Uint16 as u32).u64(1).u16(3);
        // array of 4 f32
        b.u32(GGUFValueType::Float32 as u32).u64(4);
        b.f32(0.0).f32(1.0).f32(2.0).f32(3.0);
        b.u8(0xAA);
        b
    }

    fn read_fixture(skip: bool) -> (Vec<GGUFArrayValue>, u8) {
        let b = array_fixture();
        let mut r = reader(&b).skip_large_metadata(skip);
        r.read_u32().unwrap();
        let arrays = (0..3).map(|_| r.read_array().unwrap()).collect();
        (arrays, r.read_u8().unwrap())
    }

    #[test]
    fn test_array_materialized() {
        let (arrays, tail) = read_fixture(false);
        assert_eq!(tail, 0xAA);

        assert_eq!(arrays[0].start_offset, 4);
        assert_eq!(arrays[0].values_string().unwrap(), vec!["a", "bc", "def"]);
        assert_eq!(arrays[0].size, 3 * 8 + 6);

        let nested = arrays[1].values_array().unwrap();
        assert_eq!(nested.len(), 2);
        assert_eq!(nested[0].values_u16().unwrap(), vec![1, 2]);
        assert_eq!(nested[1].values_u16().unwrap(), vec![3]);

        assert_eq!(arrays[2].values_f32().unwrap(), vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(arrays[2].size, 16);
    }

    #[test]
    fn test_array_skip_matches_materialized_spans() {
        let (full, full_tail) = read_fixture(false);
        let (skipped, skipped_tail) = read_fixture(true);
        assert_eq!(full_tail, skipped_tail);
        for (a, b) in full.iter().zip(&skipped) {
            assert_eq!(a.item_type, b.item_type);
            assert_eq!(a.len, b.len);
            assert_eq!(a.start_offset, b.start_offset);
            assert_eq!(a.size, b.size);
            assert!(b.items.is_empty());
        }
    }

    #[test]
    fn test_truncated_array_fails_in_both_modes() {
        let mut b = Builder::new(3);
        b.u32(GGUFValueType::Float32 as u32).u64(1_000_000);
        b.f32(1.0).f32(2.0).f32(3.0);

        for skip in [false, true] {
            let err = reader(&b).skip_large_metadata(skip).read_array().unwrap_err();
            assert!(err.is_eof(), "skip={skip}: {err}");
        }

        // Strings are skipped one by one; the second runs off the end.
        let mut b = Builder::new(3);
        b.u32(GGUFValueType::String as u32).u64(2);
        b.string("ab").u64(50).raw(b"short");
        let err = reader(&b).skip_large_metadata(true).read_array().unwrap_err();
        assert_eq!(err.to_string(), "seek array[string] 1");
        assert!(err.is_eof());
    }

    #[test]
    fn test_skip_string_past_end() {
        let mut b = Builder::new(3);
        b.u64(8).raw(b"abcd");
        let err = reader(&b).skip_string().unwrap_err();
        assert_eq!(err.to_string(), "seek string");
        assert!(err.is_eof());

        // Ending exactly at the source end is fine.
        let mut b = Builder::new(3);
        b.u64(4).raw(b"abcd");
        let mut r = reader(&b);
        r.skip_string().unwrap();
        assert_eq!(r.position().unwrap(), 12);
    }

    #[test]
    fn test_invalid_array_item_type() {
        let mut b = Builder::new(3);
        b.u32(13).u64(0);
        let err = reader(&b).read_array().unwrap_err();
        assert!(matches!(err.root_cause(), GGUFError::InvalidValueType(13)));
    }

    #[test]
    fn test_read_kv() {
        let mut b = Builder::new(3);
        b.string("general.name").u32(GGUFValueType::String as u32).string("tiny");
        let kv = reader(&b).read_kv().unwrap();
        assert_eq!(kv.key, "general.name");
        assert_eq!(kv.value_type, GGUFValueType::String);
        assert_eq!(kv.value_string().unwrap(), "tiny");
    }

    #[test]
    fn test_read_kv_invalid_value_type() {
        let mut b = Builder::new(3);
        b.string("k").u32(42);
        let err = reader(&b).read_kv().unwrap_err();
        assert_eq!(err.to_string(), "read value type");
        assert!(matches!(err.root_cause(), GGUFError::InvalidValueType(42)));
    }

    #[test]
    fn test_read_tensor_info() {
        let mut b = Builder::new(1);
        b.u32(0);
        b.tensor("blk.0.attn_q.weight", &[4096, 4096], GGMLType::Q4_K, 128);
        let mut r = reader(&b);
        r.read_u32().unwrap();
        let ti = r.read_tensor_info().unwrap();
        assert_eq!(ti.name, "blk.0.attn_q.weight");
        assert_eq!(ti.n_dimensions, 2);
        assert_eq!(ti.dimensions, vec![4096, 4096]);
        assert_eq!(ti.ggml_type, GGMLType::Q4_K);
        assert_eq!(ti.offset, 128);
        assert_eq!(ti.start_offset, 4);
    }

    #[test]
    fn test_read_tensor_info_invalid_type() {
        let mut b = Builder::new(3);
        b.string("t").u32(1).u64(4).u32(31).u64(0);
        let err = reader(&b).read_tensor_info().unwrap_err();
        assert_eq!(err.to_string(), "read type");
        assert!(matches!(err.root_cause(), GGUFError::InvalidTensorType(31)));
    }

    proptest! {
        /// Skipping an array lands on the same byte as decoding it.
        #[test]
        fn skip_lands_where_decode_does(
            words in prop::collection::vec("[ -~]{0,16}", 0..12),
            shorts in prop::collection::vec(any::<u16>(), 0..32),
            version in 1u32..4,
            big in any::<bool>(),
        ) {
            let mut b = if big { Builder::big_endian(version) } else { Builder::new(version) };
            b.u32(GGUFValueType::String as u32).count(words.len() as u64);
            for w in &words {
                b.string(w);
            }
            b.u32(GGUFValueType::Uint16 as u32).count(shorts.len() as u64);
            for &v in &shorts {
                b.u16(v);
            }
            b.u8(0x5A);

            let mut spans = Vec::new();
            for skip in [false, true] {
                let mut r = reader(&b).skip_large_metadata(skip);
                let strings = r.read_array().unwrap();
                let numbers = r.read_array().unwrap();
                prop_assert_eq!(r.read_u8().unwrap(), 0x5A);
                if !skip {
                    prop_assert_eq!(numbers.values_u16().unwrap(), shorts.clone());
                }
                spans.push((strings.size, numbers.start_offset, numbers.size));
            }
            prop_assert_eq!(spans[0], spans[1]);
        }
    }
}
