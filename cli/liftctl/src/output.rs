//! Output formatting for operator-facing tables.

use colored::Colorize;
use nodelift_provision::NodeFact;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "HOST")]
    host: String,
    #[tabled(rename = "INNER IP")]
    inner_ip: String,
    #[tabled(rename = "INSTANCE")]
    instance: String,
}

/// Print the candidate pool before a run.
pub fn print_candidates(nodes: &[NodeFact]) {
    if nodes.is_empty() {
        println!("{}", "Candidate pool is empty.".dimmed());
        return;
    }

    let rows: Vec<NodeRow> = nodes
        .iter()
        .map(|n| NodeRow {
            host: n.host_name.clone(),
            inner_ip: n.inner_ip.clone(),
            instance: n.instance_id.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", Table::new(rows));
}
