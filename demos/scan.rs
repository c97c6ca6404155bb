//! Listen for Tuya bulbs on the local network and update a snapshot file.
//!
//! Bulbs already in the snapshot keep their key and name; newly heard bulbs
//! are added without a key and cannot be commanded until one is filled in.
//!
//! Run with: cargo run --example scan -- --snapshot snapshot.json

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tuya_lights_rs::{BroadcastScanner, DescriptorSource, NetworkScanner, SnapshotFile};

#[derive(Parser)]
#[command(name = "tuya-scan")]
#[command(about = "Scan for Tuya bulbs and list the snapshot", long_about = None)]
struct Cli {
    /// Snapshot file to create or update
    #[arg(short, long, default_value = SnapshotFile::DEFAULT_FILE_NAME)]
    snapshot: PathBuf,

    /// UDP port the bulbs broadcast on
    #[arg(short, long, default_value_t = BroadcastScanner::DEFAULT_PORT)]
    port: u16,

    /// Seconds to listen for
    #[arg(short, long, default_value_t = 10)]
    window: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("Listening for {}s on port {}...", cli.window, cli.port);
    let scanner = BroadcastScanner::new(&cli.snapshot)
        .with_port(cli.port)
        .with_listen_window(Duration::from_secs(cli.window));
    scanner.scan().await?;

    let devices = SnapshotFile::new(&cli.snapshot).read()?;
    if devices.is_empty() {
        println!("No bulbs found.");
        return Ok(());
    }

    println!("{} bulb(s) in {}:", devices.len(), cli.snapshot.display());
    for device in &devices {
        let key = if device.has_key() { "key set" } else { "no key" };
        println!(
            "  - {} ({}) at {}, v{}, {}",
            device.display_name, device.id, device.address, device.protocol_version, key
        );
    }
    Ok(())
}
