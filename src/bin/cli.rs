use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = rustls::crypto::ring::default_provider().install_default();
    fb_extra::cli::run().await?;
    Ok(())
}
