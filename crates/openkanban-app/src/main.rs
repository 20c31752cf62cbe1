use anyhow::Result;

mod app;
mod executor;
mod terminal;

#[tokio::main]
async fn main() -> Result<()> {
    let config = openkanban_config::load_from_env()?;
    let validation = config.validate();
    if validation.has_warnings() {
        eprintln!("Configuration warnings:\n{}", validation.format_warnings());
    }
    if let Some(error) = validation.into_startup_error() {
        eprintln!("{error}");
        std::process::exit(1);
    }

    let data_dir = openkanban_config::default_data_dir()?;
    app::init_tracing(&data_dir)?;

    app::run(config, data_dir).await
}
