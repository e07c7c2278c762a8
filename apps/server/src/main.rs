use anyhow::Context;
use std::path::PathBuf;
use vain_logger::{LogFormat, Logger, parse_level, parse_rotation};
use vain_server::{Server, load_config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = load_config(path.as_deref()).context("Critical: Configuration is malformed")?;

    let log = &cfg.log;
    let builder = Logger::builder()
        .name(env!("CARGO_BIN_NAME"))
        .level(parse_level(&log.level)?)
        .format(log.format.parse::<LogFormat>()?);
    let _log = match &log.dir {
        Some(dir) => builder.directory(dir).rotation(parse_rotation(&log.rotation)?).init()?,
        None => builder.init()?,
    };

    Server::builder().config(cfg).build().await?.run().await
}
