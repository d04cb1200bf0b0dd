#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = taskreview_rust::run().await {
        eprintln!("taskreview-rust fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
