use anyhow::Result;

use resultbot::config::Settings;
use resultbot::srcli;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let settings = Settings::from_env()?;
    srcli::run_console(settings).await
}
