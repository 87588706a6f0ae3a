#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = examlink::run().await {
        eprintln!("examlink fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
