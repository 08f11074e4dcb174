//! `fob-serve`: serve a build output directory with hot module replacement.

use clap::Parser;
use fob_dev_server::{cli, error, serve};
use miette::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    fob_hmr::logger::init_logger(args.verbose, args.quiet, args.no_color);

    serve::execute(args).await.map_err(error::to_miette)
}
