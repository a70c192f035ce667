use seo_audit_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("seo audit error: {err}");
        std::process::exit(1);
    }
}
