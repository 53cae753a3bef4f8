use std::ops::ControlFlow;

use anyhow::Context;
use gguf_parser::{GGUFBytesScalar, GGUFParametersScalar, GGUFTensorInfo, GGUFTensorInfoQuery};
use regex::Regex;

use crate::cli::{GlobalArgs, TensorsArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: TensorsArgs) -> anyhow::Result<()> {
    let filter = args
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid --filter")?;

    let cfg = AppConfig::load_or_default()?;
    let gf = super::decode(args.file, global.read_options(&cfg)).await?;

    let tensors: Vec<&GGUFTensorInfo> = match &filter {
        Some(re) => gf.tensor_infos.search(re),
        None => gf.tensor_infos.iter().collect(),
    };

    if tensors.is_empty() {
        println!("No tensors matched.");
        return Ok(());
    }

    println!(
        "{:<48} {:<8} {:<24} {:>14} {:>12}",
        "Name", "Type", "Shape", "Elements", "Size"
    );
    println!("{}", "-".repeat(110));
    let (mut elements, mut bytes) = (0u64, 0u64);
    for &ti in &tensors {
        let size = storage_bytes(ti);
        elements = elements.saturating_add(ti.elements());
        bytes = bytes.saturating_add(size.unwrap_or(0));
        println!(
            "{:<48} {:<8} {:<24} {:>14} {:>12}",
            ti.name,
            ti.ggml_type.to_string(),
            shape(ti),
            ti.elements(),
            size_label(size)
        );
    }
    println!(
        "\n{} tensor(s), {} parameters, {}.",
        tensors.len(),
        GGUFParametersScalar(elements),
        GGUFBytesScalar(bytes)
    );
    Ok(())
}

/// Total bytes, or `None` if any tensor has a type without a storage layout.
pub(crate) fn storage_bytes<Q: GGUFTensorInfoQuery + ?Sized>(q: &Q) -> Option<u64> {
    let mut total = 0u64;
    let flow = q.visit(&mut |ti| match ti.ggml_type.trait_() {
        Some(_) => {
            total = total.saturating_add(ti.bytes());
            ControlFlow::Continue(())
        }
        None => ControlFlow::Break(()),
    });
    flow.is_continue().then_some(total)
}

pub(crate) fn size_label(bytes: Option<u64>) -> String {
    bytes.map_or_else(|| "-".into(), |b| GGUFBytesScalar(b).to_string())
}

pub(crate) fn shape(ti: &GGUFTensorInfo) -> String {
    let dims: Vec<String> = ti.dimensions.iter().map(u64::to_string).collect();
    format!("[{}]", dims.join(", "))
}
