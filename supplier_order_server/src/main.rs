use dotenvy::dotenv;
use log::info;
use supplier_order_engine::adapters::AdapterRegistry;
use supplier_order_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    if handle_command_line_args() {
        return;
    }
    let config = ServerConfig::from_env_or_default();

    info!("🚀️ Starting server on {}:{}", config.host, config.port);
    // Supplier integrations register their adapter factories here.
    let adapters = AdapterRegistry::new();
    match run_server(config, adapters).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
