use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use fieldcam::{
    config::FieldcamConfig,
    index::CaptureIndex,
    inventory::{self, Inventory, RecordSlot, RecordStatus},
};
use tracing::info;

/// Inspect the captures persisted on a storage medium.
#[derive(Parser, Debug)]
#[command(name = "captool")]
#[command(about = "List fieldcam captures and flag incomplete image/descriptor pairs")]
struct Args {
    /// Directory holding the captures (defaults to storage.mount_point in config)
    #[arg(short, long)]
    mount: Option<PathBuf>,

    /// Path to fieldcam configuration file
    #[arg(short = 'c', long, default_value = "fieldcam.toml")]
    config: PathBuf,

    /// Emit the inventory as JSON
    #[arg(long)]
    json: bool,

    /// Dump the descriptor values stored for this index
    #[arg(long, value_name = "INDEX")]
    descriptor: Option<u32>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mount = match args.mount.clone() {
        Some(mount) => mount,
        None => {
            let config = FieldcamConfig::load_from_file(&args.config)
                .with_context(|| format!("Failed to load {}", args.config.display()))?;
            PathBuf::from(config.storage.mount_point)
        }
    };

    info!("Scanning {}", mount.display());
    let inventory = inventory::scan(&mount)
        .await
        .with_context(|| format!("Failed to scan {}", mount.display()))?;

    if let Some(raw) = args.descriptor {
        let index = CaptureIndex::new(raw).ok_or_else(|| anyhow!("Index {} out of range", raw))?;
        let record = inventory
            .find(RecordSlot::Indexed(index))
            .ok_or_else(|| anyhow!("No capture with index {}", index))?;
        let path = record
            .descriptor_path
            .as_ref()
            .ok_or_else(|| anyhow!("Capture {} has no descriptor (incomplete)", index))?;
        let descriptor = inventory::read_descriptor(path).await?;

        if args.json {
            println!("{}", serde_json::to_string_pretty(descriptor.values())?);
        } else {
            let values: Vec<String> = descriptor.values().iter().map(i32::to_string).collect();
            println!("{}", values.join(" "));
        }
        return Ok(());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
    } else {
        print!("{}", render_table(&inventory));
    }

    Ok(())
}

fn render_table(inventory: &Inventory) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:>8}  {:<10}  {:>10}  {:>10}", "INDEX", "STATUS", "IMAGE", "DESC LEN");

    for record in &inventory.records {
        let slot = match record.slot {
            RecordSlot::Indexed(index) => index.to_string(),
            RecordSlot::Single => "single".to_string(),
        };
        let status = match record.status {
            RecordStatus::Complete => "complete",
            RecordStatus::Incomplete => "incomplete",
            RecordStatus::Orphaned => "orphaned",
        };
        let image = record
            .image_bytes
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string());
        let descriptor = record
            .descriptor_len()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "{:>8}  {:<10}  {:>10}  {:>10}", slot, status, image, descriptor);
    }

    let _ = writeln!(
        out,
        "{} complete, {} incomplete, {} orphaned, {} unrelated file(s) in {}",
        inventory.count(RecordStatus::Complete),
        inventory.count(RecordStatus::Incomplete),
        inventory.count(RecordStatus::Orphaned),
        inventory.unrelated_files,
        inventory.mount_point.display()
    );
    if let Some(highest) = inventory.highest_complete() {
        let _ = writeln!(out, "Highest complete index: {}", highest);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldcam::descriptor::Descriptor;
    use tempfile::TempDir;

    #[tokio::test]
    async fn render_table_flags_incomplete_capture() -> Result<()> {
        let temp_dir = TempDir::new().context("Failed to create temp dir")?;
        let dir = temp_dir.path();
        std::fs::write(dir.join("file_0.jpg"), [0u8; 16])?;
        std::fs::write(
            dir.join("descriptor_0.bin"),
            Descriptor::from_values(vec![1, 2]).to_bytes(),
        )?;
        std::fs::write(dir.join("file_1.jpg"), [0u8; 16])?;

        let inventory = inventory::scan(dir).await?;
        let table = render_table(&inventory);

        assert!(table.contains("complete"));
        assert!(table.contains("incomplete"));
        assert!(table.contains("1 complete, 1 incomplete, 0 orphaned"));
        assert!(table.contains("Highest complete index: 0"));
        Ok(())
    }
}
