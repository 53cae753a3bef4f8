//! Tensor descriptors and their size arithmetic.

use std::collections::{HashMap, HashSet};
use std::ops::{ControlFlow, Deref};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::GGMLType;

/// One tensor descriptor; the payload itself is never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GGUFTensorInfo {
    pub name: String,
    pub n_dimensions: u32,
    /// Dimension sizes, innermost first.
    pub dimensions: Vec<u64>,
    pub ggml_type: GGMLType,
    /// Payload offset relative to the start of tensor data.
    pub offset: u64,
    /// Absolute offset at which this descriptor was decoded.
    pub start_offset: u64,
}

impl GGUFTensorInfo {
    /// Number of elements (parameters); 0 for a dimensionless tensor.
    pub fn elements(&self) -> u64 {
        if self.n_dimensions == 0 {
            return 0;
        }
        self.dimensions
            .iter()
            .fold(1u64, |acc, &d| acc.saturating_mul(d))
    }

    /// Storage size in bytes, following ggml's strided layout generalized
    /// to block-quantized types.
    ///
    /// # Panics
    ///
    /// Panics if the tensor type has no storage trait (the removed
    /// `Q4_2`/`Q4_3` types).
    pub fn bytes(&self) -> u64 {
        if self.n_dimensions == 0 {
            return 0;
        }
        let tt = match self.ggml_type.trait_() {
            Some(tt) => tt,
            None => panic!("tensor type {} has no storage trait", self.ggml_type),
        };

        let dims = &self.dimensions;
        if dims.contains(&0) {
            return 0;
        }

        // nb[0] is one block, nb[1] one row of blocks, then plain strides.
        let mut nb = Vec::with_capacity(dims.len().max(2));
        nb.push(tt.type_size);
        nb.push(tt.type_size.saturating_mul(dims[0] / tt.block_size));
        for i in 2..dims.len() {
            nb.push(nb[i - 1].saturating_mul(dims[i - 1]));
        }

        let (mut total, rest) = if tt.block_size == 1 {
            (tt.type_size, 0)
        } else {
            (dims[0].saturating_mul(nb[0]) / tt.block_size, 1)
        };
        for i in rest..dims.len() {
            total = total.saturating_add((dims[i] - 1).saturating_mul(nb[i]));
        }
        total
    }
}

/// Common queries over one tensor, a flat list, or a layer tree.
pub trait GGUFTensorInfoQuery {
    /// Calls `f` on every tensor in order until it breaks.
    fn visit<'a>(
        &'a self,
        f: &mut dyn FnMut(&'a GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()>;

    /// First tensor named `name`.
    fn get<'a>(&'a self, name: &str) -> Option<&'a GGUFTensorInfo> {
        let mut found = None;
        let _ = self.visit(&mut |ti| {
            if ti.name == name {
                found = Some(ti);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        found
    }

    /// Tensors whose name matches `pattern`.
    fn search<'a>(&'a self, pattern: &Regex) -> Vec<&'a GGUFTensorInfo> {
        let mut found = Vec::new();
        let _ = self.visit(&mut |ti| {
            if pattern.is_match(&ti.name) {
                found.push(ti);
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Tensors with any of `names`, and how many of `names` were found.
    fn index<'a>(&'a self, names: &[&str]) -> (HashMap<&'a str, &'a GGUFTensorInfo>, usize) {
        let wanted: HashSet<&str> = names.iter().copied().collect();
        let mut found: HashMap<&'a str, &'a GGUFTensorInfo> = HashMap::with_capacity(wanted.len());
        if !wanted.is_empty() {
            let _ = self.visit(&mut |ti| {
                if wanted.contains(ti.name.as_str()) {
                    found.entry(ti.name.as_str()).or_insert(ti);
                }
                if found.len() == wanted.len() {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            });
        }
        let n = found.len();
        (found, n)
    }

    fn elements(&self) -> u64 {
        let mut total = 0u64;
        let _ = self.visit(&mut |ti| {
            total = total.saturating_add(ti.elements());
            ControlFlow::Continue(())
        });
        total
    }

    fn bytes(&self) -> u64 {
        let mut total = 0u64;
        let _ = self.visit(&mut |ti| {
            total = total.saturating_add(ti.bytes());
            ControlFlow::Continue(())
        });
        total
    }

    /// Number of tensors.
    fn count(&self) -> u64 {
        let mut n = 0u64;
        let _ = self.visit(&mut |_| {
            n += 1;
            ControlFlow::Continue(())
        });
        n
    }
}

impl GGUFTensorInfoQuery for GGUFTensorInfo {
    fn visit<'a>(
        &'a self,
        f: &mut dyn FnMut(&'a GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        f(self)
    }
}

/// Flat tensor list in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GGUFTensorInfos(pub Vec<GGUFTensorInfo>);

impl Deref for GGUFTensorInfos {
    type Target = [GGUFTensorInfo];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl GGUFTensorInfoQuery for GGUFTensorInfos {
    fn visit<'a>(
        &'a self,
        f: &mut dyn FnMut(&'a GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for ti in &self.0 {
            if f(ti).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
