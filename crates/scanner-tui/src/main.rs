mod action;
mod app;
mod app_state;
mod clip_controller;
mod clip_session;
mod component;
mod components;
mod continuity;
mod date_controller;
mod pagination;
mod player;
mod registry;
mod session;
mod theme;
mod timer;
mod widgets;

#[cfg(test)]
mod test_support;

use scanner_proto::api::ApiClient;
use scanner_proto::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = scanner_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("scanner.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise debug for app code with HTTP internals quieted.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("scanner log: {}", log_path.display());
    tracing::info!("scanner starting…");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {:#}", e);
            Config::default()
        }
    };
    let backend = ApiClient::from_config(&config)?;
    if backend.is_demo() {
        tracing::info!("demo mode: serving fixture data");
    } else {
        tracing::info!(
            "backend {} source {}",
            config.api.host,
            config.api.source_id
        );
    }

    let (app, channels) = app::App::new(&config, backend);
    app.run(channels).await
}
