#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rapidsteno::run_worker().await {
        eprintln!("rapidsteno-worker fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
