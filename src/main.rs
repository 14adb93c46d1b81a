use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = civic_insights::config::Settings::from_env()?;
    civic_insights::logging::init(&settings.log_level, settings.log_format);

    civic_insights::app::run(settings).await
}
