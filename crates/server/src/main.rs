#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

use tracing::info;

use kapi_server::{init_tracing, serve, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let telemetry = init_tracing("kapi-server")?;
    info!(
        service = telemetry.service_name(),
        filter = telemetry.filter(),
        "telemetri başlatıldı"
    );
    let config = ServerConfig::from_env()?;
    info!(
        new_reg = config.paths().new_reg(),
        terms = config.terms_url().is_some(),
        "yapılandırma yüklendi"
    );
    serve(config).await?;
    drop(telemetry);
    Ok(())
}
