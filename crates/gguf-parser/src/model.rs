//! `general.*` model metadata and file-type inference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultExt};
use crate::file::{GGUFBitsPerWeightScalar, GGUFBytesScalar, GGUFFile, GGUFParametersScalar};
use crate::tensor::GGUFTensorInfos;
use crate::types::{GGMLType, GGUFFileType, GGUFMagic, GGUF_DEFAULT_ALIGNMENT, GGUF_VERSION_V3};

const ARCHITECTURE_KEY: &str = "general.architecture";
const QUANTIZATION_KEY: &str = "general.quantization_version";
const ALIGNMENT_KEY: &str = "general.alignment";
const NAME_KEY: &str = "general.name";
const AUTHOR_KEY: &str = "general.author";
const URL_KEY: &str = "general.url";
const DESCRIPTION_KEY: &str = "general.description";
const LICENSE_KEY: &str = "general.license";
const FILE_TYPE_KEY: &str = "general.file_type";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GGUFModelMetadata {
    pub architecture: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub quantization_version: u32,
    pub alignment: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub license: String,
    /// Declared file type, or the one inferred from the tensor types.
    pub file_type: GGUFFileType,

    pub little_endian: bool,
    pub size: GGUFBytesScalar,
    pub parameters: GGUFParametersScalar,
    pub bits_per_weight: GGUFBitsPerWeightScalar,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl GGUFFile {
    /// Collect the `general.*` keys and the size summary.
    ///
    /// Missing keys leave their field empty. A key present with the wrong
    /// value type is an error.
    pub fn model(&self) -> Result<GGUFModelMetadata> {
        let (m, _) = self.header.metadata_kv.index(&[
            ARCHITECTURE_KEY,
            QUANTIZATION_KEY,
            ALIGNMENT_KEY,
            NAME_KEY,
            AUTHOR_KEY,
            URL_KEY,
            DESCRIPTION_KEY,
            LICENSE_KEY,
            FILE_TYPE_KEY,
        ]);

        let string = |key: &str| -> Result<String> {
            match m.get(key) {
                Some(kv) => Ok(kv.value_string().with_context(|| format!("read {key}"))?.to_string()),
                None => Ok(String::new()),
            }
        };
        let number = |key: &str| -> Result<Option<u32>> {
            m.get(key)
                .map(|kv| kv.value_numeric::<u32>().with_context(|| format!("read {key}")))
                .transpose()
        };

        let alignment = match number(ALIGNMENT_KEY)? {
            Some(0) | None => GGUF_DEFAULT_ALIGNMENT,
            Some(a) => a,
        };
        let file_type = match number(FILE_TYPE_KEY)?.and_then(GGUFFileType::from_u32) {
            Some(ft) => ft,
            None => guess_file_type(&self.tensor_infos),
        };

        Ok(GGUFModelMetadata {
            architecture: string(ARCHITECTURE_KEY)?,
            quantization_version: number(QUANTIZATION_KEY)?.unwrap_or_default(),
            alignment,
            name: string(NAME_KEY)?,
            author: string(AUTHOR_KEY)?,
            url: string(URL_KEY)?,
            description: string(DESCRIPTION_KEY)?,
            license: string(LICENSE_KEY)?,
            file_type,
            little_endian: self.header.version < GGUF_VERSION_V3
                || self.header.magic == GGUFMagic::GGUF_LE,
            size: self.model_size,
            parameters: self.model_parameters,
            bits_per_weight: self.model_bits_per_weight,
        })
    }
}

/// Majority vote over the element types of the `blk*` tensors.
fn guess_file_type(tensors: &GGUFTensorInfos) -> GGUFFileType {
    let mut counts: HashMap<GGMLType, usize> = HashMap::new();
    for ti in tensors.iter().filter(|ti| ti.name.starts_with("blk")) {
        *counts.entry(ti.ggml_type).or_default() += 1;
    }
    if counts.is_empty() {
        return GGUFFileType::Unknown;
    }

    let mut ranked: Vec<(GGMLType, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let ts: Vec<GGMLType> = ranked.into_iter().map(|(t, _)| t).collect();

    // Q6_K in second or third place marks the *_K_M presets.
    let q6k_runner_up = ts.iter().skip(1).take(2).any(|&t| t == GGMLType::Q6_K);

    match ts[0] {
        GGMLType::F32 => GGUFFileType::AllF32,
        GGMLType::F16 => GGUFFileType::MostlyF16,
        GGMLType::Q4_0 => GGUFFileType::MostlyQ4_0,
        GGMLType::Q4_1 => GGUFFileType::MostlyQ4_1,
        GGMLType::Q4_2 => GGUFFileType::MostlyQ4_2,
        GGMLType::Q4_3 => GGUFFileType::MostlyQ4_3,
        GGMLType::Q5_0 => GGUFFileType::MostlyQ5_0,
        GGMLType::Q5_1 => GGUFFileType::MostlyQ5_1,
        GGMLType::Q8_0 => GGUFFileType::MostlyQ8_0,
        GGMLType::Q2_K => GGUFFileType::MostlyQ2_K,
        GGMLType::Q3_K => match ts.get(1) {
            Some(GGMLType::Q4_K) => GGUFFileType::MostlyQ4_K,
            Some(GGMLType::Q5_K) => GGUFFileType::MostlyQ5_K,
            _ => GGUFFileType::MostlyQ3_K,
        },
        GGMLType::Q4_K if q6k_runner_up => GGUFFileType::MostlyIQ2_XXS,
        GGMLType::Q4_K => GGUFFileType::MostlyQ6_K,
        GGMLType::Q5_K if q6k_runner_up => GGUFFileType::MostlyIQ3_XXS,
        GGMLType::Q5_K => GGUFFileType::MostlyIQ2_XS,
        GGMLType::Q6_K => GGUFFileType::MostlyIQ1_S,
        GGMLType::IQ2_XXS => GGUFFileType::MostlyIQ2_XXS,
        GGMLType::IQ2_XS => GGUFFileType::MostlyIQ2_XS,
        GGMLType::IQ3_XXS => GGUFFileType::MostlyIQ3_XXS,
        GGMLType::IQ1_S => GGUFFileType::MostlyIQ1_S,
        GGMLType::IQ4_NL => GGUFFileType::MostlyIQ4_NL,
        GGMLType::IQ3_S => GGUFFileType::MostlyIQ3_S,
        GGMLType::IQ2_S => GGUFFileType::MostlyIQ2_S,
        GGMLType::IQ4_XS => GGUFFileType::MostlyIQ4_XS,
        GGMLType::IQ1_M => GGUFFileType::MostlyIQ1_M,
        GGMLType::BF16 => GGUFFileType::MostlyBF16,
        GGMLType::Q8_1
        | GGMLType::Q8_K
        | GGMLType::I8
        | GGMLType::I16
        | GGMLType::I32
        | GGMLType::I64
        | GGMLType::F64 => GGUFFileType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::error::GGUFError;
    use crate::file::{GGUFReadOptions, parse_gguf_from_reader};
    use crate::tensor::GGUFTensorInfo;
    use crate::testutil::Builder;
    use crate::types::GGUFValueType;

    fn tensors(spec: &[(&str, GGMLType, usize)]) -> GGUFTensorInfos {
        let mut list = Vec::new();
        for &(prefix, ggml_type, n) in spec {
            for i in 0..n {
                list.push(GGUFTensorInfo {
                    name: format!("{prefix}.{i}.weight"),
                    n_dimensions: 1,
                    dimensions: vec![256],
                    ggml_type,
                    offset: 0,
                    start_offset: 0,
                });
            }
        }
        GGUFTensorInfos(list)
    }

    #[test]
    fn test_guess_empty_and_non_block() {
        assert_eq!(guess_file_type(&tensors(&[])), GGUFFileType::Unknown);
        assert_eq!(
            guess_file_type(&tensors(&[("token_embd", GGMLType::Q4_0, 3)])),
            GGUFFileType::Unknown
        );
    }

    #[test]
    fn test_guess_plain_majority() {
        let ts = tensors(&[("blk", GGMLType::Q8_0, 5), ("blk", GGMLType::F32, 2)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyQ8_0);

        let ts = tensors(&[("blk", GGMLType::F32, 1), ("output", GGMLType::Q6_K, 9)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::AllF32);

        let ts = tensors(&[("blk", GGMLType::I8, 4)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::Unknown);
    }

    #[test]
    fn test_guess_q4_k_presets() {
        // 80/20 Q4_K/Q6_K is the Q4_K_M preset.
        let ts = tensors(&[("blk", GGMLType::Q4_K, 8), ("blk", GGMLType::Q6_K, 2)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyIQ2_XXS);

        let ts = tensors(&[
            ("blk", GGMLType::Q4_K, 8),
            ("blk", GGMLType::F32, 4),
            ("blk", GGMLType::Q6_K, 2),
        ]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyIQ2_XXS);

        let ts = tensors(&[("blk", GGMLType::Q4_K, 8), ("blk", GGMLType::F32, 4)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyQ6_K);
    }

    #[test]
    fn test_guess_q5_k_presets() {
        let ts = tensors(&[("blk", GGMLType::Q5_K, 8), ("blk", GGMLType::Q6_K, 2)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyIQ3_XXS);

        let ts = tensors(&[("blk", GGMLType::Q5_K, 8)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyIQ2_XS);
    }

    #[test]
    fn test_guess_q3_k_presets() {
        let ts = tensors(&[("blk", GGMLType::Q3_K, 8), ("blk", GGMLType::Q4_K, 2)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyQ4_K);

        let ts = tensors(&[("blk", GGMLType::Q3_K, 8), ("blk", GGMLType::Q5_K, 2)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyQ5_K);

        // A single type must not index past the ranking.
        let ts = tensors(&[("blk", GGMLType::Q3_K, 8)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyQ3_K);
    }

    #[test]
    fn test_guess_q6_k_and_ties() {
        let ts = tensors(&[("blk", GGMLType::Q6_K, 3)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyIQ1_S);

        // Equal counts: lower tag wins.
        let ts = tensors(&[("blk", GGMLType::Q8_0, 3), ("blk", GGMLType::F16, 3)]);
        assert_eq!(guess_file_type(&ts), GGUFFileType::MostlyF16);
    }

    fn kv_u64(b: &mut Builder, key: &str, v: u64) {
        b.string(key).u32(GGUFValueType::Uint64 as u32).u64(v);
    }

    #[test]
    fn test_model_from_metadata() {
        let mut b = Builder::new(3);
        b.header(1, 5)
            .kv_string("general.architecture", "llama")
            .kv_string("general.name", "tiny")
            .kv_u32("general.file_type", 7)
            .kv_u32("general.quantization_version", 2);
        kv_u64(&mut b, "general.alignment", 64);
        b.tensor("blk.0.w", &[32], GGMLType::Q8_0, 0);
        b.pad_to(64).raw(&[0u8; 34]);

        let gf = parse_gguf_from_reader(Cursor::new(b.into_bytes()), &GGUFReadOptions::default())
            .unwrap();
        let m = gf.model().unwrap();
        assert_eq!(m.architecture, "llama");
        assert_eq!(m.name, "tiny");
        assert_eq!(m.author, "");
        assert_eq!(m.quantization_version, 2);
        assert_eq!(m.alignment, 64);
        assert_eq!(m.file_type, GGUFFileType::MostlyQ8_0);
        assert!(m.little_endian);
        assert_eq!(m.size.0, 34);
        assert_eq!(m.parameters.0, 32);
        assert_eq!(m.bits_per_weight.0, 34.0 * 8.0 / 32.0);
    }

    #[test]
    fn test_model_infers_missing_file_type() {
        let mut b = Builder::big_endian(3);
        b.header(3, 1)
            .kv_u32("general.file_type", 99)
            .tensor("blk.0.a", &[256], GGMLType::Q4_K, 0)
            .tensor("blk.0.b", &[256], GGMLType::Q4_K, 144)
            .tensor("blk.0.c", &[256], GGMLType::Q6_K, 288);

        let gf = parse_gguf_from_reader(Cursor::new(b.into_bytes()), &GGUFReadOptions::default())
            .unwrap();
        let m = gf.model().unwrap();
        assert_eq!(m.file_type, GGUFFileType::MostlyIQ2_XXS);
        assert_eq!(m.alignment, GGUF_DEFAULT_ALIGNMENT);
        assert!(!m.little_endian);
        assert_eq!(m.size.0, 0);
        assert_eq!(m.bits_per_weight.0, 0.0);
    }

    #[test]
    fn test_model_rejects_mistyped_key() {
        let mut b = Builder::new(3);
        b.header(0, 1).kv_u32("general.name", 1);
        let gf = parse_gguf_from_reader(Cursor::new(b.into_bytes()), &GGUFReadOptions::default())
            .unwrap();
        let err = gf.model().unwrap_err();
        assert_eq!(err.to_string(), "read general.name");
        assert!(matches!(
            err.root_cause(),
            GGUFError::TypeMismatch {
                expected: GGUFValueType::String,
                actual: GGUFValueType::Uint32,
            }
        ));
    }

    #[test]
    fn test_old_versions_are_little_endian() {
        let mut b = Builder::big_endian(2);
        b.header(0, 0);
        let gf = parse_gguf_from_reader(Cursor::new(b.into_bytes()), &GGUFReadOptions::default())
            .unwrap();
        assert!(gf.model().unwrap().little_endian);
    }
}
