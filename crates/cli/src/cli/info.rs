use gguf_parser::{ByteOrder, GGUFFile, GGUFModelMetadata, GGUFValue};

use crate::cli::{GlobalArgs, InfoArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: InfoArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    let gf = super::decode(args.file.clone(), global.read_options(&cfg)).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&gf)?);
        return Ok(());
    }

    let model = gf.model()?;
    let order = byte_order(&model);

    println!("File:          {}", args.file.display());
    println!("Version:       {} ({:?} endian)", gf.header.version, order);
    println!("Architecture:  {}", or_dash(&model.architecture));
    println!("Name:          {}", or_dash(&model.name));
    if !model.author.is_empty() {
        println!("Author:        {}", model.author);
    }
    if !model.license.is_empty() {
        println!("License:       {}", model.license);
    }
    println!("File type:     {}", model.file_type);
    println!("Alignment:     {}", model.alignment);
    println!("Tensors:       {}", gf.header.tensor_count);
    println!("Data offset:   {} (padding {})", gf.tensor_data_start_offset, gf.padding);
    println!("Size:          {}", model.size);
    println!("Parameters:    {}", model.parameters);
    println!("BPW:           {}", model.bits_per_weight);

    println!();
    print_metadata(&gf);
    Ok(())
}

fn print_metadata(gf: &GGUFFile) {
    println!("{:<48} {:<10} {}", "Key", "Type", "Value");
    println!("{}", "-".repeat(80));
    for kv in gf.header.metadata_kv.iter() {
        println!(
            "{:<48} {:<10} {}",
            kv.key,
            format!("{:?}", kv.value_type),
            render_value(&kv.value)
        );
    }
    println!("\n{} metadata entries.", gf.header.metadata_kv_count);
}

fn byte_order(model: &GGUFModelMetadata) -> ByteOrder {
    if model.little_endian {
        ByteOrder::Little
    } else {
        ByteOrder::Big
    }
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

/// One-line rendering; arrays only show their item type and length.
fn render_value(value: &GGUFValue) -> String {
    const MAX_LEN: usize = 60;
    let s = match value {
        GGUFValue::Uint8(v) => v.to_string(),
        GGUFValue::Int8(v) => v.to_string(),
        GGUFValue::Uint16(v) => v.to_string(),
        GGUFValue::Int16(v) => v.to_string(),
        GGUFValue::Uint32(v) => v.to_string(),
        GGUFValue::Int32(v) => v.to_string(),
        GGUFValue::Float32(v) => v.to_string(),
        GGUFValue::Bool(v) => v.to_string(),
        GGUFValue::String(v) => format!("{v:?}"),
        GGUFValue::Array(a) => return format!("[{:?}; {}]", a.item_type, a.len),
        GGUFValue::Uint64(v) => v.to_string(),
        GGUFValue::Int64(v) => v.to_string(),
        GGUFValue::Float64(v) => v.to_string(),
    };
    if s.chars().count() > MAX_LEN {
        let cut: String = s.chars().take(MAX_LEN).collect();
        return format!("{cut}...");
    }
    s
}
