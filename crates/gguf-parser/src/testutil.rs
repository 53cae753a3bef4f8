//! Byte-level builder for synthetic GGUF inputs.

use crate::reader::ByteOrder;
use crate::types::{GGMLType, GGUFMagic, GGUFValueType};

pub(crate) struct Builder {
    buf: Vec<u8>,
    order: ByteOrder,
    version: u32,
}

macro_rules! write_primitive {
    ($($name:ident => $t:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $t) -> &mut Self {
                match self.order {
                    ByteOrder::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
                    ByteOrder::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
                }
                self
            }
        )*
    };
}

impl Builder {
    pub fn new(version: u32) -> Self {
        Self {
            buf: Vec::new(),
            order: ByteOrder::Little,
            version,
        }
    }

    pub fn big_endian(version: u32) -> Self {
        Self {
            order: ByteOrder::Big,
            ..Self::new(version)
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    write_primitive! {
        u8 => u8,
        u16 => u16,
        u32 => u32,
        u64 => u64,
        i32 => i32,
        f32 => f32,
        f64 => f64,
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Count or length field in the version's width.
    pub fn count(&mut self, v: u64) -> &mut Self {
        if self.version <= 1 {
            self.u32(v as u32)
        } else {
            self.u64(v)
        }
    }

    pub fn string(&mut self, s: &str) -> &mut Self {
        self.count(s.len() as u64);
        self.raw(s.as_bytes())
    }

    /// Magic, version and both counts.
    pub fn header(&mut self, tensors: u64, kvs: u64) -> &mut Self {
        let magic = match self.order {
            ByteOrder::Little => GGUFMagic::GGUF_LE,
            ByteOrder::Big => GGUFMagic::GGUF_BE,
        };
        self.raw(&magic.0.to_le_bytes());
        self.u32(self.version);
        self.count(tensors);
        self.count(kvs)
    }

    pub fn kv_u32(&mut self, key: &str, v: u32) -> &mut Self {
        self.string(key);
        self.u32(GGUFValueType::Uint32 as u32);
        self.u32(v)
    }

    pub fn kv_string(&mut self, key: &str, v: &str) -> &mut Self {
        self.string(key);
        self.u32(GGUFValueType::String as u32);
        self.string(v)
    }

    pub fn tensor(&mut self, name: &str, dims: &[u64], ty: GGMLType, offset: u64) -> &mut Self {
        self.string(name);
        self.u32(dims.len() as u32);
        for &d in dims {
            self.count(d);
        }
        self.u32(ty as u32);
        self.u64(offset)
    }

    /// Zero-fill up to the next multiple of `align`.
    pub fn pad_to(&mut self, align: usize) -> &mut Self {
        let aligned = self.buf.len().div_ceil(align) * align;
        self.buf.resize(aligned, 0);
        self
    }
}
