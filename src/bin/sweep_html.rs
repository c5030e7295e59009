//! CLI that reads HTML from stdin and prints detection and gathered assets as JSON.
//!
//! Usage: `sweep_html <page-url> < page.html`
//!
//! Logging goes to stderr and is controlled with `RUST_LOG`.

use rs_mediasweep::{detect_html, sweep_html, AssetRecord, DetectionReport, GatherStats};
use serde::Serialize;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct Output {
    url: String,
    detection: Option<DetectionReport>,
    records: Vec<AssetRecord>,
    stats: GatherStats,
    error: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let Some(url) = std::env::args().nth(1) else {
        eprintln!("usage: sweep_html <page-url> < page.html");
        std::process::exit(2);
    };

    let mut html = String::new();
    if io::stdin().read_to_string(&mut html).is_err() {
        eprintln!("Failed to read from stdin");
        std::process::exit(1);
    }

    let output = match detect_html(&url, &html).and_then(|report| Ok((report, sweep_html(&url, &html)?))) {
        Ok((report, gathered)) => Output {
            url,
            detection: Some(report),
            records: gathered.records,
            stats: gathered.stats,
            error: None,
        },
        Err(err) => {
            tracing::error!(error = %err, "sweep failed");
            Output {
                url,
                detection: None,
                records: Vec::new(),
                stats: GatherStats::default(),
                error: Some(err.to_string()),
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}
