//! Example: Build a snapshot from a base item and a change log
//!
//! This example replays a JSON change log against a news item and prints the
//! resulting XML, followed by the replay log on stderr.
//!
//! Usage: cargo run --example snapshot <base.xml> <changes.json>

use std::env;
use std::fs;
use std::io;

use newsml_codec::{ChangeRecord, SnapshotBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() != 3 {
        eprintln!("Usage: {} <base.xml> <changes.json>", args[0]);
        std::process::exit(1);
    }

    let base = fs::read_to_string(&args[1])?;
    let changes = ChangeRecord::parse_list(&fs::read_to_string(&args[2])?)?;

    eprintln!("Replaying {} changes...", changes.len());
    let snapshot = SnapshotBuilder::default().build_snapshot(Some(&base), &changes)?;

    println!("{}", snapshot.xml);
    snapshot.log.write_xml(&mut io::stderr())?;
    eprintln!("Digest: {}", snapshot.digest);

    Ok(())
}
