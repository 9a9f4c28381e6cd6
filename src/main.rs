#[tokio::main]
async fn main() {
    if let Err(error) = workflowgo_lib::run().await {
        eprintln!("workflowgo failed: {error}");
        std::process::exit(1);
    }
}
