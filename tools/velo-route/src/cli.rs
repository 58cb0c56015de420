//! CLI: loader selection, preprocessing, persistence, serving

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use velo_routing::{io, Contractor, EdgeStore, Graph};

use crate::server;

#[derive(Parser, Debug)]
#[command(name = "velo-route")]
#[command(about = "Multi-criteria route planner for bicycle networks", long_about = None)]
pub struct Cli {
    /// Load a graph from the single-file text format
    #[arg(long, value_name = "PATH")]
    pub text: Option<PathBuf>,

    /// Load a contracted hierarchy from a directory (graph, ch_graph,
    /// node_labels, skips)
    #[arg(long, value_name = "DIR")]
    pub multi: Option<PathBuf>,

    /// Load a binary graph dump
    #[arg(long, value_name = "PATH")]
    pub bin: Option<PathBuf>,

    /// Run contraction-hierarchy preprocessing
    #[arg(long)]
    pub contract: bool,

    /// Contract until at most this percentage of nodes remains uncontracted
    #[arg(long, value_name = "PERCENT", default_value_t = 3, requires = "contract")]
    pub rest: u32,

    /// Write the graph as a binary dump after loading/contracting
    #[arg(long, value_name = "PATH")]
    pub write: Option<PathBuf>,

    /// Start the HTTP query server on this port
    #[arg(long, value_name = "PORT")]
    pub serve: Option<u16>,

    /// Log per-round contraction statistics
    #[arg(long)]
    pub statistics: bool,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let (mut graph, mut store) = self.load()?;

        if self.contract {
            let start = Instant::now();
            let mut contractor = Contractor::new(self.statistics);
            graph = contractor.contract_completely(&mut store, &graph, self.rest);
            info!(
                elapsed_s = start.elapsed().as_secs(),
                nodes = graph.node_count(),
                edges = graph.edge_count(),
                "contraction finished"
            );
        }

        if let Some(path) = &self.write {
            io::write_binary_graph(path, &graph, &store)?;
        }

        if let Some(port) = self.serve {
            server::run_server(graph, store, port).await?;
        }

        Ok(())
    }

    fn load(&self) -> Result<(Graph, EdgeStore)> {
        match (&self.text, &self.multi, &self.bin) {
            (Some(path), None, None) => Ok(io::read_text_graph(path)?),
            (None, Some(dir), None) => Ok(io::read_multi_file_graph(dir)?),
            (None, None, Some(path)) => Ok(io::read_binary_graph(path)?),
            _ => anyhow::bail!("select exactly one of --text, --multi, --bin"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_contract_invocation() {
        let cli = Cli::try_parse_from([
            "velo-route",
            "--text",
            "graph.txt",
            "--contract",
            "--rest",
            "5",
            "--write",
            "graph.bin",
            "--statistics",
        ])
        .unwrap();
        assert!(cli.contract);
        assert_eq!(cli.rest, 5);
        assert!(cli.statistics);
        assert_eq!(cli.write.as_deref(), Some(std::path::Path::new("graph.bin")));
    }

    #[test]
    fn rest_defaults_to_single_digit_percent() {
        let cli = Cli::try_parse_from(["velo-route", "--bin", "graph.bin", "--contract"]).unwrap();
        assert_eq!(cli.rest, 3);
    }

    #[test]
    fn rejects_missing_loader() {
        let cli = Cli::try_parse_from(["velo-route", "--contract"]).unwrap();
        assert!(cli.load().is_err());
    }

    #[test]
    fn rejects_two_loaders() {
        let cli =
            Cli::try_parse_from(["velo-route", "--text", "a", "--bin", "b"]).unwrap();
        assert!(cli.load().is_err());
    }
}
