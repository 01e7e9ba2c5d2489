mod config;
mod handlers;
mod state;

use std::net::SocketAddr;

use tokio::net::TcpListener;

use config::Config;
use state::Services;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    tracing::info!("starting matcher service");

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let addr: SocketAddr = config.socket_addr_string().parse()?;

    let services = Services::build(config).await;
    let app = handlers::create_router(services);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
