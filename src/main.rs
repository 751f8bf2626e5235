#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = homework_grading::run().await {
        eprintln!("homework-grading fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
