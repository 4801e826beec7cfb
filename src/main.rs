use clap::Parser;
use flow_viewer::config::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    flow_viewer::flow::run(cli.into())
}
