#[tokio::main]
async fn main() {
    if let Err(e) = clinic_ledger::run().await {
        eprintln!("{}: {e}", clinic_ledger::config::APP_NAME);
        std::process::exit(1);
    }
}
