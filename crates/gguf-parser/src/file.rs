//! Whole-file decoding: header, metadata, tensor infos and size summary.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GGUFError, Result, ResultExt};
use crate::layers::GGUFLayerTensorInfos;
use crate::reader::{ByteOrder, GGUFReader};
use crate::tensor::{GGUFTensorInfoQuery, GGUFTensorInfos};
use crate::types::*;
use crate::value::GGUFMetadataKVs;

//  Options

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GGUFReadOptions {
    /// Size metadata arrays without decoding their items.
    #[serde(default)]
    pub skip_large_metadata: bool,
    /// Memory-map local files instead of buffered reads.
    #[serde(default)]
    pub mmap: bool,
}

//  Decoded structures

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFHeader {
    pub magic: GGUFMagic,
    pub version: u32,
    pub tensor_count: u64,
    pub metadata_kv_count: u64,
    pub metadata_kv: GGUFMetadataKVs,
}

/// A decoded GGUF file, minus the tensor payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GGUFFile {
    pub header: GGUFHeader,
    pub tensor_infos: GGUFTensorInfos,
    /// Zero bytes between the last tensor info and the tensor data.
    pub padding: u64,
    /// Absolute offset of the tensor data.
    pub tensor_data_start_offset: u64,
    pub model_size: GGUFBytesScalar,
    pub model_parameters: GGUFParametersScalar,
    pub model_bits_per_weight: GGUFBitsPerWeightScalar,
}

impl GGUFFile {
    /// Tensors regrouped by layer, minus the top-level groups in `ignores`.
    pub fn layers(&self, ignores: &[&str]) -> GGUFLayerTensorInfos<'_> {
        let layers = GGUFLayerTensorInfos::from_tensors(&self.tensor_infos);
        if ignores.is_empty() {
            return layers;
        }
        let (_, kept, _) = layers.cut(ignores);
        kept
    }
}

//  Scalars

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFBytesScalar(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFParametersScalar(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFBitsPerWeightScalar(pub f64);

impl fmt::Display for GGUFBytesScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB", "PiB"];
        if self.0 < 1024 {
            return write!(f, "{} B", self.0);
        }
        let mut size = self.0 as f64 / 1024.0;
        for &unit in &UNITS[..UNITS.len() - 1] {
            if size < 1024.0 {
                return write!(f, "{size:.1} {unit}");
            }
            size /= 1024.0;
        }
        write!(f, "{size:.1} PiB")
    }
}

impl fmt::Display for GGUFParametersScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SCALES: &[(f64, &str)] = &[(1e15, "Q"), (1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K")];
        let n = self.0 as f64;
        for &(scale, suffix) in SCALES {
            if n >= scale {
                let v = format!("{:.1}", n / scale);
                let v = v.strip_suffix(".0").unwrap_or(&v);
                return write!(f, "{v} {suffix}");
            }
        }
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for GGUFBitsPerWeightScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0.0 {
            return f.write_str("0 bpw");
        }
        write!(f, "{:.2} bpw", self.0)
    }
}

//  Decoding

/// Decode a GGUF file from a local path.
///
/// The file (or its mapping, with [`GGUFReadOptions::mmap`]) is released
/// before returning.
pub fn parse_gguf_file(path: &Path, options: &GGUFReadOptions) -> Result<GGUFFile> {
    let file = File::open(path).with_context(|| format!("open file {}", path.display()))?;
    let len = file.metadata().context("stat file")?.len();

    let gf = if options.mmap {
        // SAFETY: the mapping is read-only and dropped before we return.
        let mmap = unsafe { Mmap::map(&file) }.context("mmap file")?;
        parse_gguf(Cursor::new(&mmap[..]), len, options)?
    } else {
        parse_gguf(BufReader::new(file), len, options)?
    };

    debug!(path = %path.display(), tensors = gf.tensor_infos.len(), "parsed GGUF file");
    Ok(gf)
}

/// Decode from a seekable source, measuring its length first.
pub fn parse_gguf_from_reader<R: Read + Seek>(
    mut source: R,
    options: &GGUFReadOptions,
) -> Result<GGUFFile> {
    let len = source.seek(SeekFrom::End(0)).context("seek source end")?;
    source.rewind().context("seek source start")?;
    parse_gguf(source, len, options)
}

/// Decode from a seekable source of `len` bytes, positioned at its start.
pub fn parse_gguf<R: Read + Seek>(
    source: R,
    len: u64,
    options: &GGUFReadOptions,
) -> Result<GGUFFile> {
    let mut rd = GGUFReader::new(source, ByteOrder::Little, GGUF_VERSION_V1)
        .skip_large_metadata(options.skip_large_metadata)
        .source_len(len);

    //  Magic
    let magic = GGUFMagic(rd.read_u32().context("read magic")?);
    match magic {
        GGUFMagic::GGUF_LE => {}
        GGUFMagic::GGUF_BE => rd.set_byte_order(ByteOrder::Big),
        m if m.is_legacy() => return Err(GGUFError::UnsupportedFormat(m)),
        m => return Err(GGUFError::InvalidMagic(m.0)),
    }

    //  Version
    let version = rd.read_u32().context("read version")?;
    if version > GGUF_VERSION_V3 {
        debug!(version, "newer GGUF version, decoding with v3 layout");
    }
    rd.set_version(version);

    //  Counts
    let tensor_count = rd.read_count().context("read tensor count")?;
    let metadata_kv_count = rd.read_count().context("read metadata kv count")?;
    debug!(
        %magic,
        version,
        tensor_count,
        metadata_kv_count,
        "read GGUF header"
    );

    //  Metadata KVs
    let mut kvs = Vec::with_capacity(metadata_kv_count.min(1024) as usize);
    for i in 0..metadata_kv_count {
        let kv = rd
            .read_kv()
            .with_context(|| format!("read metadata kv {i}"))?;
        kvs.push(kv);
    }
    let metadata_kv = GGUFMetadataKVs(kvs);

    //  Tensor infos
    let mut tis = Vec::with_capacity(tensor_count.min(4096) as usize);
    for i in 0..tensor_count {
        let ti = rd
            .read_tensor_info()
            .with_context(|| format!("read tensor info {i}"))?;
        tis.push(ti);
    }
    let tensor_infos = GGUFTensorInfos(tis);

    //  Padding
    let padding_start = rd.position().context("seek padding start")?;
    let alignment = alignment_of(&metadata_kv)?;
    let padding = padding_for(padding_start, alignment);
    let tensor_data_start_offset = padding_start + padding;

    //  Summary
    let model_size = GGUFBytesScalar(len.saturating_sub(tensor_data_start_offset));
    let model_parameters = GGUFParametersScalar(tensor_infos.elements());
    let model_bits_per_weight = if model_parameters.0 != 0 {
        GGUFBitsPerWeightScalar(model_size.0 as f64 * 8.0 / model_parameters.0 as f64)
    } else {
        GGUFBitsPerWeightScalar::default()
    };

    debug!(
        padding,
        tensor_data_start_offset,
        model_size = model_size.0,
        model_parameters = model_parameters.0,
        "decoded GGUF"
    );

    Ok(GGUFFile {
        header: GGUFHeader {
            magic,
            version,
            tensor_count,
            metadata_kv_count,
            metadata_kv,
        },
        tensor_infos,
        padding,
        tensor_data_start_offset,
        model_size,
        model_parameters,
        model_bits_per_weight,
    })
}

/// `general.alignment`, or the default when absent or zero.
pub(crate) fn alignment_of(kvs: &GGUFMetadataKVs) -> Result<u32> {
    let Some(kv) = kvs.get("general.alignment") else {
        return Ok(GGUF_DEFAULT_ALIGNMENT);
    };
    let alignment: u32 = kv.value_numeric().context("read general.alignment")?;
    if alignment == 0 {
        warn!("general.alignment is 0, using {GGUF_DEFAULT_ALIGNMENT}");
        return Ok(GGUF_DEFAULT_ALIGNMENT);
    }
    Ok(alignment)
}

/// Bytes needed to move `offset` up to a multiple of `alignment`.
fn padding_for(offset: u64, alignment: u32) -> u64 {
    let a = u64::from(alignment);
    (a - offset % a) % a
}
