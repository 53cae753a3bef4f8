//! Pure-Rust GGUF file format parser.
//!
//! Decodes the header, metadata and tensor descriptors of a `.gguf` file
//! and derives sizes from them, without reading the tensor payload:
//!
//! * [`parse_gguf_file`] / [`parse_gguf`] produce a [`GGUFFile`] with the
//!   padding, tensor-data offset, model size, parameter count and
//!   bits-per-weight.
//! * [`GGUFFile::layers`] regroups tensors per layer (`blk.N`,
//!   `encoder`/`decoder`).
//! * [`GGUFFile::model`] collects the `general.*` keys, inferring the file
//!   type from the tensor types when it is not declared.
//!
//! Both byte orders and versions 1 to 3 are handled; legacy GGML, GGMF and
//! GGJT files are rejected.

pub mod error;
pub mod file;
pub mod layers;
pub mod model;
pub mod reader;
pub mod tensor;
pub mod types;
pub mod value;

#[cfg(test)]
mod testutil;

pub use error::{GGUFError, Result, ResultExt};
pub use file::{
    GGUFBitsPerWeightScalar, GGUFBytesScalar, GGUFFile, GGUFHeader, GGUFParametersScalar,
    GGUFReadOptions, parse_gguf, parse_gguf_file, parse_gguf_from_reader,
};
pub use layers::{GGUFLayerNode, GGUFLayerTensorInfos, GGUFNamedTensorInfos};
pub use model::GGUFModelMetadata;
pub use reader::{ByteOrder, GGUFReader};
pub use tensor::{GGUFTensorInfo, GGUFTensorInfoQuery, GGUFTensorInfos};
pub use types::{
    GGMLType, GGMLTypeTrait, GGUFFileType, GGUFMagic, GGUFValueType, GGUF_DEFAULT_ALIGNMENT,
};
pub use value::{GGUFArrayValue, GGUFMetadataKV, GGUFMetadataKVs, GGUFValue, NumCast};
