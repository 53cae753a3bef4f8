//! Regrouping of the flat tensor list into per-layer namespaces.
//!
//! * `blk.N.*` tensors go under a `blk.N` branch.
//! * `encoder.block.N.*` / `decoder.block.N.*` tensors go under an
//!   `encoder` / `decoder` branch, then a `<ns>.block.N` sub-branch; other
//!   `encoder.*.*` / `decoder.*.*` tensors sit directly in the namespace.
//! * Everything else stays a top-level leaf.

use std::collections::{HashMap, HashSet};
use std::ops::{ControlFlow, Deref};

use serde::Serialize;

use crate::tensor::{GGUFTensorInfo, GGUFTensorInfoQuery, GGUFTensorInfos};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GGUFLayerNode<'a> {
    Leaf(&'a GGUFTensorInfo),
    Branch(GGUFNamedTensorInfos<'a>),
}

/// A named namespace of related tensors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GGUFNamedTensorInfos<'a> {
    pub name: String,
    pub items: GGUFLayerTensorInfos<'a>,
}

/// Ordered sibling list of layer nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GGUFLayerTensorInfos<'a>(pub Vec<GGUFLayerNode<'a>>);

impl GGUFLayerNode<'_> {
    /// Branch name, or the tensor name for a leaf.
    pub fn name(&self) -> &str {
        match self {
            Self::Leaf(ti) => &ti.name,
            Self::Branch(b) => &b.name,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }
}

impl<'a> Deref for GGUFLayerTensorInfos<'a> {
    type Target = [GGUFLayerNode<'a>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a> GGUFLayerTensorInfos<'a> {
    /// Group `tensors` by their dotted name prefixes.
    pub fn from_tensors(tensors: &'a GGUFTensorInfos) -> Self {
        let mut ret: Vec<GGUFLayerNode<'a>> = Vec::new();
        // Branch key -> index in its parent's item list.
        let mut top: HashMap<String, usize> = HashMap::new();
        let mut nested: HashMap<String, usize> = HashMap::new();

        for ti in tensors.iter() {
            let parts: Vec<&str> = ti.name.split('.').collect();
            match parts.as_slice() {
                ["blk", n, ..] => {
                    let idx = branch_index(&mut ret, &mut top, format!("blk.{n}"));
                    branch_items(&mut ret[idx]).push(GGUFLayerNode::Leaf(ti));
                }
                [ns @ ("decoder" | "encoder"), sub, n, ..] => {
                    let idx = branch_index(&mut ret, &mut top, (*ns).to_string());
                    let parent = branch_items(&mut ret[idx]);
                    if *sub != "block" {
                        parent.push(GGUFLayerNode::Leaf(ti));
                        continue;
                    }
                    let sidx = branch_index(parent, &mut nested, format!("{ns}.block.{n}"));
                    branch_items(&mut parent[sidx]).push(GGUFLayerNode::Leaf(ti));
                }
                _ => ret.push(GGUFLayerNode::Leaf(ti)),
            }
        }

        Self(ret)
    }

    /// Split the top-level entries into those named in `names` and the
    /// rest. The flag reports whether anything matched.
    pub fn cut(self, names: &[&str]) -> (Self, Self, bool) {
        let wanted: HashSet<&str> = names.iter().copied().collect();
        let (before, after): (Vec<_>, Vec<_>) = self
            .0
            .into_iter()
            .partition(|node| wanted.contains(node.name()));
        let found = !before.is_empty();
        (Self(before), Self(after), found)
    }
}

fn branch_index<'a>(
    nodes: &mut Vec<GGUFLayerNode<'a>>,
    index: &mut HashMap<String, usize>,
    key: String,
) -> usize {
    if let Some(&i) = index.get(&key) {
        return i;
    }
    nodes.push(GGUFLayerNode::Branch(GGUFNamedTensorInfos {
        name: key.clone(),
        items: GGUFLayerTensorInfos::default(),
    }));
    let i = nodes.len() - 1;
    index.insert(key, i);
    i
}

fn branch_items<'n, 'a>(node: &'n mut GGUFLayerNode<'a>) -> &'n mut Vec<GGUFLayerNode<'a>> {
    match node {
        GGUFLayerNode::Branch(b) => &mut b.items.0,
        GGUFLayerNode::Leaf(ti) => unreachable!("branch index points at tensor {}", ti.name),
    }
}

//  Queries

impl GGUFTensorInfoQuery for GGUFLayerNode<'_> {
    fn visit<'s>(
        &'s self,
        f: &mut dyn FnMut(&'s GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        match self {
            Self::Leaf(ti) => f(ti),
            Self::Branch(b) => b.visit(f),
        }
    }
}

impl GGUFTensorInfoQuery for GGUFNamedTensorInfos<'_> {
    fn visit<'s>(
        &'s self,
        f: &mut dyn FnMut(&'s GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        self.items.visit(f)
    }
}

impl GGUFTensorInfoQuery for GGUFLayerTensorInfos<'_> {
    fn visit<'s>(
        &'s self,
        f: &mut dyn FnMut(&'s GGUFTensorInfo) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        for node in &self.0 {
            if node.visit(f).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }
}
