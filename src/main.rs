use FlopScope::{Graph, GraphDef, report};
use anyhow::Context;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "assets/example_graph.json".to_string());

    println!("1. Loading graph document from {}...", path);
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read graph document: {}", path))?;
    let def = GraphDef::from_json(&json)?;

    println!("2. Building '{}' and propagating shapes...", def.name);
    let graph = Graph::from_def(&def)?;

    let rows = graph.summarize()?;
    report::render(&rows).printstd();

    let (flop, bytes_in, bytes_out) = report::totals(&rows);
    println!("Total: {} FLOP, {} bytes in, {} bytes out", flop, bytes_in, bytes_out);
    Ok(())
}
