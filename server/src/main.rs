use clap::Parser;
use restgate_server::{logging, Config, ServerError};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = Config::parse();
    logging::init(config.log_json);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    restgate_server::run(listener, &config).await
}
