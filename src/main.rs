#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rapidsteno::run().await {
        eprintln!("rapidsteno fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
