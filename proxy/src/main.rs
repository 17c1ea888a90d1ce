use args::Args;
use clap::Parser;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::loader::load(args.config.as_ref())?;

    if let Some(listen_address) = args.listen_address {
        config.server.listen_address = listen_address;
    }
    if let Some(log_level) = args.log_level.clone() {
        config.server.log_level = log_level;
    }

    let log_filter = config.server.log_level.clone();
    let listen_address = config.server.listen_address;

    server::serve(server::ServeConfig {
        listen_address,
        config,
        log_filter,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
