use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() {
    // A missing .env is fine; profiles can come from the real environment.
    dotenvy::dotenv().ok();
    init_tracing();

    let code = xpanel::cli::run().await;
    std::process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
