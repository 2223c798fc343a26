//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use savr_core::Pipeline;

pub async fn cmd_serve(
    pipeline: Pipeline,
    host: &str,
    port: u16,
    static_dir: Option<&Path>,
) -> Result<()> {
    println!("🚀 Starting Savr web server...");
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = static_dir {
        println!("   Static files: {}", dir.display());
    }
    println!();
    println!("   ⚠️  No authentication - do not expose to an untrusted network");
    println!("   Press Ctrl+C to stop");

    let static_dir_str = static_dir
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;

    let config = savr_server::ServerConfig::from_env();
    savr_server::serve(pipeline, host, port, static_dir_str, config).await
}
