use anyhow::Result;
use tokio::io::{stdin, BufReader};

use taqeem_worker::utils::logging;
use taqeem_worker::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    logging::init(&config.log_filter);

    App::initialize(config).await?.run(BufReader::new(stdin())).await
}
