// Copyright 2025 IsoTailor Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Execution-trace parsing and dependency-graph construction.
//!
//! A trace file is line-oriented: each non-empty line describes one observed
//! transaction (the node) followed by the dependency edges it participates
//! in. Fields are separated by a primary delimiter, records inside a field
//! by a secondary delimiter:
//!
//! ```text
//! src,reads,writes[,latency,success]#dst,kind,table#dst,kind,table#...
//! ```
//!
//! Parsing is strict: any malformed numeric field aborts the parse with the
//! file and line that produced it.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Edge kind marking a read-write conflict.
pub const RW_CONFLICT: i64 = 2;
/// Edge kind marking a write-write conflict.
pub const WW_CONFLICT: i64 = 4;

/// The synthetic marker edge appended once per parsed line. The trace
/// producer emits it as a workload marker; it inflates the edge count but
/// never the conflict counters, and the trained models expect that
/// footprint, so it must not be dropped.
pub const MARKER_EDGE: Edge = Edge {
    src: 1,
    dst: 2,
    kind: 0,
    table: 1,
};

/// Errors raised while parsing a trace file.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: malformed trace record: {detail}")]
    Malformed {
        path: PathBuf,
        line: usize,
        detail: String,
    },
}

/// Which feature shape a graph is parsed into.
///
/// The projection must match what the consuming classifier expects: the
/// graph-net classifier reads per-node and per-edge features, the others
/// only the aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Keeps latency/success per node and the full typed edge list.
    Detailed,
    /// Collapses nodes to operation counts and keeps no edge list, only
    /// the aggregate conflict counters.
    Aggregate,
}

/// Trace file delimiters, independently configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceFormat {
    /// Separates the node field from the edge fields.
    pub field_delim: char,
    /// Separates values inside a node or edge field.
    pub record_delim: char,
}

impl Default for TraceFormat {
    fn default() -> Self {
        Self {
            field_delim: '#',
            record_delim: ',',
        }
    }
}

/// One observed transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub reads: u32,
    pub writes: u32,
    /// Only populated in the detailed projection.
    pub latency: f64,
    /// Only populated in the detailed projection.
    pub success: u8,
}

/// A directed dependency between two transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub src: u32,
    pub dst: u32,
    pub kind: i64,
    pub table: i64,
}

impl Edge {
    /// Feature vector `[kind, table]` fed to the graph-net backend.
    pub fn feature(&self) -> [f64; 2] {
        [self.kind as f64, self.table as f64]
    }
}

/// One parsed execution trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceGraph {
    pub projection: Projection,
    /// Nodes in trace order, one per non-empty line.
    pub nodes: Vec<Node>,
    /// Edges in encounter order, duplicates permitted (multigraph).
    /// Empty in the aggregate projection.
    pub edges: Vec<Edge>,
    /// Sum of read counts over all nodes.
    pub read_total: u64,
    /// Sum of write counts over all nodes.
    pub write_total: u64,
    /// Count of read-write conflict edges.
    pub rw_conflicts: u64,
    /// Count of write-write conflict edges.
    pub ww_conflicts: u64,
}

impl TraceGraph {
    /// Parse the trace file at `path`.
    pub fn parse(
        path: &Path,
        projection: Projection,
        format: &TraceFormat,
    ) -> Result<Self, TraceError> {
        let content = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut graph = TraceGraph {
            projection,
            nodes: Vec::new(),
            edges: Vec::new(),
            read_total: 0,
            write_total: 0,
            rw_conflicts: 0,
            ww_conflicts: 0,
        };

        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            graph.push_line(line, idx + 1, path, format)?;
        }

        Ok(graph)
    }

    fn push_line(
        &mut self,
        line: &str,
        line_no: usize,
        path: &Path,
        format: &TraceFormat,
    ) -> Result<(), TraceError> {
        let malformed = |detail: String| TraceError::Malformed {
            path: path.to_path_buf(),
            line: line_no,
            detail,
        };

        let mut fields = line.split(format.field_delim);
        let node_field = fields
            .next()
            .ok_or_else(|| malformed("missing node field".to_string()))?;

        let values: Vec<&str> = node_field.split(format.record_delim).collect();
        let required = match self.projection {
            Projection::Detailed => 5,
            Projection::Aggregate => 3,
        };
        if values.len() < required {
            return Err(malformed(format!(
                "node field has {} values, expected {required}",
                values.len()
            )));
        }

        let src: u32 = parse_value(values[0], "node id").map_err(&malformed)?;
        let reads: u32 = parse_value(values[1], "read count").map_err(&malformed)?;
        let writes: u32 = parse_value(values[2], "write count").map_err(&malformed)?;
        let (latency, success) = match self.projection {
            Projection::Detailed => (
                parse_value(values[3], "latency").map_err(&malformed)?,
                parse_value(values[4], "success flag").map_err(&malformed)?,
            ),
            // The aggregate projection collapses the node to an operation
            // count; trailing detail values are allowed but unused.
            Projection::Aggregate => (0.0, 0),
        };

        self.nodes.push(Node {
            reads,
            writes,
            latency,
            success,
        });
        self.read_total += u64::from(reads);
        self.write_total += u64::from(writes);

        for edge_field in fields {
            if edge_field.is_empty() {
                continue;
            }
            let values: Vec<&str> = edge_field.split(format.record_delim).collect();
            if values.len() < 3 {
                return Err(malformed(format!(
                    "edge field has {} values, expected 3",
                    values.len()
                )));
            }
            let dst: u32 = parse_value(values[0], "edge target").map_err(&malformed)?;
            let kind: i64 = parse_value(values[1], "edge kind").map_err(&malformed)?;
            let table: i64 = parse_value(values[2], "edge table").map_err(&malformed)?;

            if kind == RW_CONFLICT {
                self.rw_conflicts += 1;
            } else if kind == WW_CONFLICT {
                self.ww_conflicts += 1;
            }
            if self.projection == Projection::Detailed {
                self.edges.push(Edge {
                    src,
                    dst,
                    kind,
                    table,
                });
            }
        }

        // One marker edge per line, unconditionally.
        if self.projection == Projection::Detailed {
            self.edges.push(MARKER_EDGE);
        }

        Ok(())
    }

    /// Aggregate feature vector: `[reads, writes, rw, ww]`.
    pub fn aggregate_features(&self) -> [f64; 4] {
        [
            self.read_total as f64,
            self.write_total as f64,
            self.rw_conflicts as f64,
            self.ww_conflicts as f64,
        ]
    }

    /// Per-node feature rows `[reads, writes, latency, success]`.
    pub fn node_features(&self) -> Vec<[f64; 4]> {
        self.nodes
            .iter()
            .map(|n| {
                [
                    f64::from(n.reads),
                    f64::from(n.writes),
                    n.latency,
                    f64::from(n.success),
                ]
            })
            .collect()
    }
}

fn parse_value<T: std::str::FromStr>(raw: &str, what: &str) -> Result<T, String> {
    raw.trim()
        .parse()
        .map_err(|_| format!("invalid {what}: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_trace(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp trace");
        file.write_all(content.as_bytes()).expect("write trace");
        file
    }

    #[test]
    fn detailed_parse_counts_nodes_and_edges() {
        let file = write_trace(
            "1,3,2,0.5,1#4,2,7#5,4,3\n\
             2,1,0,1.5,0\n\
             \n\
             3,0,6,0.2,1#1,2,7\n",
        );
        let graph = TraceGraph::parse(
            file.path(),
            Projection::Detailed,
            &TraceFormat::default(),
        )
        .expect("parse");

        // One node per non-empty line.
        assert_eq!(graph.nodes.len(), 3);
        // Three real edges plus one marker edge per line.
        assert_eq!(graph.edges.len(), 3 + 3);
        assert_eq!(graph.read_total, 4);
        assert_eq!(graph.write_total, 8);
        assert_eq!(graph.rw_conflicts, 2);
        assert_eq!(graph.ww_conflicts, 1);

        assert_eq!(graph.edges[0], Edge { src: 1, dst: 4, kind: 2, table: 7 });
        assert_eq!(graph.edges[2], MARKER_EDGE);
        assert_eq!(graph.edges[graph.edges.len() - 1], MARKER_EDGE);
    }

    #[test]
    fn marker_edge_appended_even_without_real_edges() {
        let file = write_trace("9,1,1,0.1,1\n");
        let graph = TraceGraph::parse(
            file.path(),
            Projection::Detailed,
            &TraceFormat::default(),
        )
        .expect("parse");
        assert_eq!(graph.edges, vec![MARKER_EDGE]);
    }

    #[test]
    fn aggregate_parse_keeps_counters_only() {
        let file = write_trace("1,3,2#4,2,7#5,4,3\n2,5,1#3,2,1\n");
        let graph = TraceGraph::parse(
            file.path(),
            Projection::Aggregate,
            &TraceFormat::default(),
        )
        .expect("parse");

        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.edges.is_empty());
        assert_eq!(graph.aggregate_features(), [8.0, 3.0, 2.0, 1.0]);
    }

    #[test]
    fn aggregate_parse_tolerates_detailed_node_fields() {
        let file = write_trace("1,3,2,0.5,1\n");
        let graph = TraceGraph::parse(
            file.path(),
            Projection::Aggregate,
            &TraceFormat::default(),
        )
        .expect("parse");
        assert_eq!(graph.read_total, 3);
        assert_eq!(graph.write_total, 2);
    }

    #[test]
    fn malformed_numeric_field_names_file_and_line() {
        let file = write_trace("1,3,2,0.5,1\n2,oops,0,1.0,1\n");
        let err = TraceGraph::parse(
            file.path(),
            Projection::Detailed,
            &TraceFormat::default(),
        )
        .expect_err("must fail");
        match err {
            TraceError::Malformed { line, detail, .. } => {
                assert_eq!(line, 2);
                assert!(detail.contains("read count"), "detail: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn detailed_parse_rejects_short_node_field() {
        let file = write_trace("1,3,2\n");
        let err = TraceGraph::parse(
            file.path(),
            Projection::Detailed,
            &TraceFormat::default(),
        )
        .expect_err("must fail");
        assert!(matches!(err, TraceError::Malformed { line: 1, .. }));
    }

    #[test]
    fn empty_edge_fields_are_skipped() {
        let file = write_trace("1,2,2,0.5,1##4,2,7#\n");
        let graph = TraceGraph::parse(
            file.path(),
            Projection::Detailed,
            &TraceFormat::default(),
        )
        .expect("parse");
        assert_eq!(graph.edges.len(), 2); // one real edge + marker
    }

    #[test]
    fn custom_delimiters() {
        let file = write_trace("1|3|2|0.5|1;4|2|7\n");
        let format = TraceFormat {
            field_delim: ';',
            record_delim: '|',
        };
        let graph =
            TraceGraph::parse(file.path(), Projection::Detailed, &format).expect("parse");
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.edges.len(), 2);
    }
}
