use gguf_parser::{GGUFLayerNode, GGUFLayerTensorInfos, GGUFTensorInfoQuery};

use crate::cli::tensors::{size_label, storage_bytes};
use crate::cli::{GlobalArgs, LayersArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: LayersArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    let gf = super::decode(args.file, global.read_options(&cfg)).await?;

    let ignores = if args.ignores.is_empty() {
        &cfg.ignore_layers
    } else {
        &args.ignores
    };
    let ignores: Vec<&str> = ignores.iter().map(String::as_str).collect();
    let layers = gf.layers(&ignores);

    println!("{:<52} {:>8} {:>14} {:>12}", "Layer", "Tensors", "Elements", "Size");
    println!("{}", "-".repeat(89));
    for line in render(&layers) {
        println!("{line}");
    }
    println!(
        "\n{} top-level entries, {} tensor(s), {}.",
        layers.len(),
        layers.count(),
        size_label(storage_bytes(&layers))
    );
    Ok(())
}

/// Indented rows, branches before their children.
fn render(layers: &GGUFLayerTensorInfos<'_>) -> Vec<String> {
    let mut out = Vec::new();
    walk(layers, 0, &mut out);
    out
}

fn walk(nodes: &GGUFLayerTensorInfos<'_>, depth: usize, out: &mut Vec<String>) {
    for node in nodes.iter() {
        let label = format!("{}{}", "  ".repeat(depth), node.name());
        out.push(format!(
            "{:<52} {:>8} {:>14} {:>12}",
            label,
            node.count(),
            node.elements(),
            size_label(storage_bytes(node))
        ));
        if let GGUFLayerNode::Branch(b) = node {
            walk(&b.items, depth + 1, out);
        }
    }
}
