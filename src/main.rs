mod binmgr;
mod cidr;
mod classify;
mod cli;
mod curve;
mod decay;
mod encode;
mod error;
mod fsutil;
mod logsource;
mod mapper;
mod mask;
mod pipeline;
mod raster;
mod render;
mod residue;
mod timefmt;

use clap::Parser;
use log::LevelFilter;

use crate::cli::Opt;
use crate::error::HoneyplotError;
use crate::pipeline::{Pipeline, PipelineConfig};

fn level_filter_for(debug: u8) -> LevelFilter {
    match debug {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2..=4 => LevelFilter::Info,
        5..=7 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run() -> Result<(), HoneyplotError> {
    let opt = Opt::parse();
    env_logger::Builder::new()
        .filter_level(level_filter_for(opt.debug))
        .init();

    let config = PipelineConfig::try_from(&opt)?;
    let mut pipeline = Pipeline::new(config);
    let video = pipeline.run()?;

    match video {
        Some(path) => log::info!("wrote {}", path.display()),
        None => log::info!("frames written, no video encoded"),
    }
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        log::error!("{err}");
        std::process::exit(1);
    }
}
