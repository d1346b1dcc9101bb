//! entropyscan - find packed and encrypted ELF files and processes.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    entropyscan_cli::run().await
}
