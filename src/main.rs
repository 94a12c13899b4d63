use solana_wallet_tracker::supervisor;

#[tokio::main]
async fn main() {
    if let Err(e) = supervisor::run().await {
        eprintln!("fatal: {e}");
        std::process::exit(1);
    }
}
