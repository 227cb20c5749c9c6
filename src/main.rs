//! pdfsmith – template-to-PDF service and one-shot renderer.
//!
//! Usage:
//!   pdfsmith serve [--addr 127.0.0.1:8080] [--pool N]
//!   pdfsmith render <template.jsx> [output.pdf] [--data file.json]
//!            [--format A4|Letter|Legal] [--landscape] [--margin LEN]

use std::net::SocketAddr;
use std::{env, fs, path::PathBuf, process};

use pdfsmith::engine::EngineConfig;
use pdfsmith::options::{MarginOptions, PaperFormat, RenderOptions};
use pdfsmith::pipeline::{props_or_empty, Pipeline};
use pdfsmith::server;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(String::as_str);

    let code = match mode {
        Some("serve") => run_serve(&args[2..]).await,
        Some("render") => run_render(&args[2..]).await,
        Some("--help") | Some("-h") => {
            print_usage(&args[0]);
            0
        }
        Some(other) => {
            eprintln!("Unknown mode: {other}");
            print_usage(&args[0]);
            1
        }
        None => {
            print_usage(&args[0]);
            1
        }
    };
    process::exit(code);
}

async fn run_serve(args: &[String]) -> i32 {
    let mut addr = "127.0.0.1:8080".to_string();
    let mut engine = EngineConfig::default();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--addr" | "-a" => match iter.next() {
                Some(v) => addr = v.clone(),
                None => {
                    eprintln!("--addr needs a value");
                    return 1;
                }
            },
            "--pool" | "-p" => match iter.next().and_then(|v| v.parse().ok()) {
                Some(n) => engine.max_idle = n,
                None => {
                    eprintln!("--pool needs a number");
                    return 1;
                }
            },
            other => {
                eprintln!("Unknown flag: {other}");
                return 1;
            }
        }
    }

    let addr: SocketAddr = match addr.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Invalid --addr '{addr}': {e}");
            return 1;
        }
    };

    match server::serve(addr, engine).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Server error: {e}");
            1
        }
    }
}

async fn run_render(args: &[String]) -> i32 {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut data_path: Option<PathBuf> = None;
    let mut options = RenderOptions::default();
    let mut positional = 0usize;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--data" | "-d" => match iter.next() {
                Some(v) => data_path = Some(PathBuf::from(v)),
                None => {
                    eprintln!("--data needs a file path");
                    return 1;
                }
            },
            "--format" | "-f" => match iter.next().map(String::as_str) {
                Some("A4") => options.format = Some(PaperFormat::A4),
                Some("Letter") => options.format = Some(PaperFormat::Letter),
                Some("Legal") => options.format = Some(PaperFormat::Legal),
                other => {
                    eprintln!("--format must be A4, Letter, or Legal (got {other:?})");
                    return 1;
                }
            },
            "--landscape" | "-l" => options.landscape = Some(true),
            "--margin" | "-m" => match iter.next() {
                Some(v) => {
                    options.margin = Some(MarginOptions {
                        top: Some(v.clone()),
                        right: Some(v.clone()),
                        bottom: Some(v.clone()),
                        left: Some(v.clone()),
                    })
                }
                None => {
                    eprintln!("--margin needs a length (e.g. 0.5in)");
                    return 1;
                }
            },
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                return 1;
            }
            path => {
                if positional == 0 {
                    input = Some(PathBuf::from(path));
                } else if positional == 1 {
                    output = Some(PathBuf::from(path));
                } else {
                    eprintln!("Unexpected argument: {path}");
                    return 1;
                }
                positional += 1;
            }
        }
    }

    let input = match input {
        Some(p) => p,
        None => {
            eprintln!("Error: no template file specified.");
            return 1;
        }
    };

    // Default output: same stem as the template, with .pdf
    let output = output.unwrap_or_else(|| {
        let mut o = input.clone();
        o.set_extension("pdf");
        o
    });
    if let Some(name) = output.file_name().and_then(|n| n.to_str()) {
        options.file_name = Some(name.to_string());
    }

    let source = match fs::read_to_string(&input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading '{}': {e}", input.display());
            return 1;
        }
    };

    let data = match data_path {
        Some(path) => match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("Invalid JSON in '{}': {e}", path.display());
                    return 1;
                }
            },
            Err(e) => {
                eprintln!("Error reading '{}': {e}", path.display());
                return 1;
            }
        },
        None => serde_json::Value::Null,
    };
    let data = props_or_empty(data);

    let result = tokio::task::spawn_blocking(move || {
        let pipeline = Pipeline::new(EngineConfig::default());
        pipeline.render_dynamic(&source, &data, &options)
    })
    .await;

    let document = match result {
        Ok(Ok(document)) => document,
        Ok(Err(e)) => {
            eprintln!("Error rendering template: {e}");
            return 1;
        }
        Err(e) => {
            eprintln!("Render worker failed: {e}");
            return 1;
        }
    };

    if let Err(e) = fs::write(&output, &document.bytes) {
        eprintln!("Error writing '{}': {e}", output.display());
        return 1;
    }
    eprintln!(
        "Wrote '{}' ({} bytes)",
        output.display(),
        document.bytes.len()
    );
    0
}

fn print_usage(prog: &str) {
    eprintln!("pdfsmith – JSX template to PDF");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} serve [--addr 127.0.0.1:8080] [--pool N]");
    eprintln!("  {prog} render <template.jsx> [output.pdf] [--data file.json] [--format A4|Letter|Legal] [--landscape] [--margin LEN]");
    eprintln!();
    eprintln!("Modes:");
    eprintln!("  serve    Start the HTTP rendering service");
    eprintln!("  render   Render a template file straight to a PDF");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --addr, -a     Bind address for serve (default 127.0.0.1:8080)");
    eprintln!("  --pool, -p     Warm rendering engines retained between requests (default 2)");
    eprintln!("  --data, -d     JSON file bound to the template as props");
    eprintln!("  --format, -f   Paper format (default Letter)");
    eprintln!("  --landscape    Landscape orientation");
    eprintln!("  --margin, -m   Margin length for all four sides (default 0.5in)");
    eprintln!("  --help         Print this message");
}
