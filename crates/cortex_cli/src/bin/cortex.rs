use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ops = cortex_cli::Cortex::parse();
    cortex_trace::init_fmt(ops.structured)?;

    if !ops.run().await? {
        std::process::exit(1);
    }
    Ok(())
}
