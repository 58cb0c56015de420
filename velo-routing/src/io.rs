//! Graph loading and persistence
//!
//! Three sources: a single text file, a multi-file hierarchy directory
//! (`graph`, `ch_graph`, `node_labels`, `skips`), and a binary dump that
//! round-trips a fully contracted graph. All validation failures are fatal
//! and carry file/line context.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::info;
use velo_common::{GraphError, Result};

use crate::cost::Cost;
use crate::graph::{Edge, EdgeId, EdgeStore, Graph, Node};

struct LineReader<R> {
    reader: R,
    path: PathBuf,
    line: usize,
    buffer: String,
}

impl<R: BufRead> LineReader<R> {
    fn new(reader: R, path: &Path) -> Self {
        LineReader { reader, path: path.to_path_buf(), line: 0, buffer: String::new() }
    }

    /// The next non-comment line, or an error when the file ends early.
    fn next_line(&mut self) -> Result<&str> {
        loop {
            self.buffer.clear();
            let read = self.reader.read_line(&mut self.buffer)?;
            self.line += 1;
            if read == 0 {
                return Err(GraphError::Parse {
                    file: self.path.clone(),
                    line: self.line,
                    message: "unexpected end of file".into(),
                });
            }
            if !self.buffer.starts_with('#') && !self.buffer.trim().is_empty() {
                return Ok(self.buffer.trim_end());
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> GraphError {
        GraphError::Parse { file: self.path.clone(), line: self.line, message: message.into() }
    }

    fn parse<T: FromStr>(&self, field: Option<&str>, what: &str) -> Result<T> {
        field
            .ok_or_else(|| self.error(format!("missing field: {what}")))?
            .parse()
            .map_err(|_| self.error(format!("malformed field: {what}")))
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let line = self.next_line()?.to_string();
        self.parse(line.split_whitespace().next(), what)
    }
}

fn parse_node<R: BufRead>(reader: &mut LineReader<R>) -> Result<Node> {
    let line = reader.next_line()?.to_string();
    let mut fields = line.split_whitespace();
    Ok(Node {
        id: reader.parse(fields.next(), "node id")?,
        osm_id: reader.parse(fields.next(), "osm id")?,
        lat: reader.parse(fields.next(), "latitude")?,
        lng: reader.parse(fields.next(), "longitude")?,
        height: reader.parse(fields.next(), "elevation")?,
        level: reader.parse(fields.next(), "level")?,
    })
}

struct EdgeLine {
    source: u32,
    dest: u32,
    cost: Cost,
    skip: Option<(EdgeId, EdgeId)>,
}

fn parse_edge_fields<R: BufRead>(
    reader: &LineReader<R>,
    fields: &mut std::str::SplitWhitespace,
    with_skips: bool,
) -> Result<EdgeLine> {
    let source: u32 = reader.parse(fields.next(), "source id")?;
    let dest: u32 = reader.parse(fields.next(), "destination id")?;
    let length: f64 = reader.parse(fields.next(), "length")?;
    let height: f64 = reader.parse(fields.next(), "elevation gain")?;
    let unsuitability: f64 = reader.parse(fields.next(), "unsuitability")?;

    for value in [length, height, unsuitability] {
        if value < 0.0 {
            return Err(GraphError::NegativeCost {
                file: reader.path.clone(),
                line: reader.line,
                value,
            });
        }
    }
    if source == dest {
        return Err(GraphError::LoopEdge { node: source });
    }

    let skip = if with_skips {
        let skip_a: i64 = reader.parse(fields.next(), "first child edge")?;
        let skip_b: i64 = reader.parse(fields.next(), "second child edge")?;
        if skip_a >= 0 && skip_b >= 0 {
            Some((skip_a as EdgeId, skip_b as EdgeId))
        } else {
            None
        }
    } else {
        None
    };

    Ok(EdgeLine { source, dest, cost: Cost::new(length, height, unsuitability), skip })
}

/// Loads a graph from the single-file text format: `#` comments, node and
/// edge counts, node lines, edge lines with optional shortcut children.
pub fn read_text_graph(path: &Path) -> Result<(Graph, EdgeStore)> {
    let start = Instant::now();
    let file = File::open(path)?;
    let mut reader = LineReader::new(BufReader::new(file), path);

    let node_count = reader.count("node count")?;
    let edge_count = reader.count("edge count")?;

    let mut nodes = Vec::with_capacity(node_count);
    let mut known_ids = rustc_hash::FxHashSet::default();
    for _ in 0..node_count {
        let node = parse_node(&mut reader)?;
        known_ids.insert(node.id);
        nodes.push(node);
    }

    let mut store = EdgeStore::new();
    let mut edge_ids = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let line = reader.next_line()?.to_string();
        let mut fields = line.split_whitespace();
        let edge = parse_edge_fields(&reader, &mut fields, true)?;
        if !known_ids.contains(&edge.source) || !known_ids.contains(&edge.dest) {
            return Err(reader.error("edge references an unknown node id"));
        }
        edge_ids.push(store.push(edge.source, edge.dest, edge.cost, edge.skip));
    }

    let graph = Graph::new(nodes, edge_ids, &store);
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded text graph"
    );
    Ok((graph, store))
}

/// Loads a contracted hierarchy from a directory holding `graph`,
/// `ch_graph`, `node_labels` and `skips`.
pub fn read_multi_file_graph(dir: &Path) -> Result<(Graph, EdgeStore)> {
    let start = Instant::now();
    let mut graph_file = LineReader::new(BufReader::new(File::open(dir.join("graph"))?), &dir.join("graph"));
    let mut ch_file =
        LineReader::new(BufReader::new(File::open(dir.join("ch_graph"))?), &dir.join("ch_graph"));
    let mut labels_file =
        LineReader::new(BufReader::new(File::open(dir.join("node_labels"))?), &dir.join("node_labels"));
    let mut skips_file = LineReader::new(BufReader::new(File::open(dir.join("skips"))?), &dir.join("skips"));

    let node_count = graph_file.count("node count")?;
    let node_count_ch = ch_file.count("node count")?;
    if node_count != node_count_ch {
        return Err(GraphError::NodeCountMismatch { graph: node_count, ch_graph: node_count_ch });
    }
    let _plain_edges = graph_file.count("edge count")?;
    let edge_count = ch_file.count("edge count")?;

    let mut nodes = Vec::with_capacity(node_count);
    let mut known_ids = rustc_hash::FxHashSet::default();
    for _ in 0..node_count {
        let mut node = parse_node(&mut graph_file)?;
        let label_line = labels_file.next_line()?.to_string();
        node.level = labels_file.parse(label_line.split_whitespace().next(), "node level")?;
        known_ids.insert(node.id);
        nodes.push(node);
    }

    let mut store = EdgeStore::new();
    let mut edge_ids = Vec::with_capacity(edge_count);
    for _ in 0..edge_count {
        let line = ch_file.next_line()?.to_string();
        let mut fields = line.split_whitespace();
        let mut edge = parse_edge_fields(&ch_file, &mut fields, false)?;
        if !known_ids.contains(&edge.source) || !known_ids.contains(&edge.dest) {
            return Err(ch_file.error("edge references an unknown node id"));
        }

        let skip_line = skips_file.next_line()?.to_string();
        let mut skip_fields = skip_line.split_whitespace();
        let skip_a: i64 = skips_file.parse(skip_fields.next(), "first child edge")?;
        let skip_b: i64 = skips_file.parse(skip_fields.next(), "second child edge")?;
        if skip_a >= 0 && skip_b >= 0 {
            edge.skip = Some((skip_a as EdgeId, skip_b as EdgeId));
        }

        edge_ids.push(store.push(edge.source, edge.dest, edge.cost, edge.skip));
    }

    let graph = Graph::new(nodes, edge_ids, &store);
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded multi-file hierarchy"
    );
    Ok((graph, store))
}

#[derive(Serialize, Deserialize)]
struct BinaryGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_ids: Vec<EdgeId>,
}

/// Dumps a graph and its edge table; sufficient to round-trip a fully
/// contracted hierarchy.
pub fn write_binary_graph(path: &Path, graph: &Graph, store: &EdgeStore) -> Result<()> {
    let file = File::create(path)?;
    let dump = BinaryGraph {
        nodes: graph.nodes().to_vec(),
        edges: store.edges().to_vec(),
        edge_ids: graph.edge_ids().to_vec(),
    };
    bincode::serialize_into(BufWriter::new(file), &dump)
        .map_err(|err| GraphError::BinaryFormat(err.to_string()))?;
    info!(path = %path.display(), "wrote binary graph");
    Ok(())
}

pub fn read_binary_graph(path: &Path) -> Result<(Graph, EdgeStore)> {
    let start = Instant::now();
    let file = File::open(path)?;
    let dump: BinaryGraph = bincode::deserialize_from(BufReader::new(file))
        .map_err(|err| GraphError::BinaryFormat(err.to_string()))?;

    let store = EdgeStore::from_edges(dump.edges);
    let known_ids: rustc_hash::FxHashSet<u32> = dump.nodes.iter().map(|node| node.id).collect();
    for &id in &dump.edge_ids {
        if id >= store.len() {
            return Err(GraphError::BinaryFormat(format!("edge id {id} out of range")));
        }
        let edge = store.get(id);
        if !known_ids.contains(&edge.source) || !known_ids.contains(&edge.dest) {
            return Err(GraphError::BinaryFormat(format!(
                "edge {id} references an unknown node id"
            )));
        }
    }
    let graph = Graph::new(dump.nodes, dump.edge_ids, &store);
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "loaded binary graph"
    );
    Ok((graph, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL_GRAPH: &str = "\
# sample graph
# generated by hand
3
3
0 100 48.7 9.1 310.0 0
1 101 48.8 9.2 320.0 0
2 102 48.9 9.3 330.0 0
0 1 2.5 1.0 3.0 -1 -1
1 2 1.5 0.0 2.0 -1 -1
0 2 4.0 1.0 5.0 0 1
";

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_text_graph_with_comments_and_skips() {
        let file = write_temp(SMALL_GRAPH);
        let (graph, store) = read_text_graph(file.path()).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 3);
        assert_eq!(store.get(2).skip, Some((0, 1)));
        assert_eq!(store.get(0).cost, Cost::new(2.5, 1.0, 3.0));
        let node = graph.node_by_id(1).unwrap();
        assert_eq!(node.osm_id, 101);
        assert!((node.lat - 48.8).abs() < 1e-12);
    }

    #[test]
    fn negative_cost_is_fatal_with_context() {
        let file = write_temp("1\n1\n0 100 48.7 9.1 310.0 0\n0 0 -2.0 0.0 0.0 -1 -1\n");
        match read_text_graph(file.path()) {
            Err(GraphError::NegativeCost { line, value, .. }) => {
                assert_eq!(line, 4);
                assert_eq!(value, -2.0);
            }
            other => panic!("expected NegativeCost, got {other:?}"),
        }
    }

    #[test]
    fn malformed_line_reports_position() {
        let file = write_temp("1\n0\n0 100 not-a-number 9.1 310.0 0\n");
        match read_text_graph(file.path()) {
            Err(GraphError::Parse { line, message, .. }) => {
                assert_eq!(line, 3);
                assert!(message.contains("latitude"));
            }
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_edge_is_rejected() {
        let file = write_temp("1\n1\n0 100 48.7 9.1 310.0 0\n0 0 1.0 0.0 0.0 -1 -1\n");
        match read_text_graph(file.path()) {
            Err(GraphError::LoopEdge { node }) => assert_eq!(node, 0),
            other => panic!("expected LoopEdge, got {other:?}"),
        }
    }

    #[test]
    fn binary_dump_round_trips() {
        let file = write_temp(SMALL_GRAPH);
        let (graph, store) = read_text_graph(file.path()).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let bin_path = dir.path().join("graph.bin");
        write_binary_graph(&bin_path, &graph, &store).unwrap();
        let (reloaded, restore) = read_binary_graph(&bin_path).unwrap();

        assert_eq!(reloaded.node_count(), graph.node_count());
        assert_eq!(reloaded.edge_count(), graph.edge_count());
        assert_eq!(restore.edges(), store.edges());
    }

    #[test]
    fn multi_file_node_count_mismatch_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("graph"), "1\n0\n0 100 48.7 9.1 310.0 0\n").unwrap();
        std::fs::write(dir.path().join("ch_graph"), "2\n0\n").unwrap();
        std::fs::write(dir.path().join("node_labels"), "1\n").unwrap();
        std::fs::write(dir.path().join("skips"), "").unwrap();
        match read_multi_file_graph(dir.path()) {
            Err(GraphError::NodeCountMismatch { graph, ch_graph }) => {
                assert_eq!((graph, ch_graph), (1, 2));
            }
            other => panic!("expected NodeCountMismatch, got {other:?}"),
        }
    }

    #[test]
    fn multi_file_hierarchy_loads_levels_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("graph"),
            "# ch export\n3\n2\n0 100 48.7 9.1 310.0 0\n1 101 48.8 9.2 320.0 0\n2 102 48.9 9.3 330.0 0\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("ch_graph"),
            "3\n3\n0 1 1.0 0.0 0.0\n1 2 1.0 0.0 0.0\n0 2 2.0 0.0 0.0\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("node_labels"), "2\n1\n3\n").unwrap();
        std::fs::write(dir.path().join("skips"), "-1 -1\n-1 -1\n0 1\n").unwrap();

        let (graph, store) = read_multi_file_graph(dir.path()).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.node_by_id(0).unwrap().level, 2);
        assert_eq!(graph.node_by_id(1).unwrap().level, 1);
        assert_eq!(store.get(2).skip, Some((0, 1)));
    }
}
