use anyhow::Result;
use clap::Parser;
use pdk_pipeline::cli::{run, Cli};

fn main() -> Result<()> {
    // A local `.env` may set BRANCH; clap reads it while parsing `synth`.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    tracing::debug!("pdk-pipeline arguments parsed");
    let result = run(cli);
    if let Err(e) = &result {
        tracing::error!(error = %e, "pdk-pipeline aborted; no pipeline artifacts written");
    }
    result
}
