// ABOUTME: CLI for querying and transforming HTML fragments with treekit.
// ABOUTME: Reads markup from a file or stdin, applies the requested operations and prints the result.

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use serde_json::json;
use treekit_engine::Tree;
use treekit_filters::{SmartPunctuation, Widont};

/// Query and transform an HTML fragment.
///
/// Operations run in a fixed order: level, wrap, wrap-text, select chain,
/// positional narrowing, rename, set-attr, filters.
#[derive(Parser, Debug)]
#[command(name = "treekit")]
#[command(about = "Query and transform HTML fragments", long_about = None)]
struct Args {
    /// Input file. Use "-" (or omit) to read from stdin.
    input: Option<String>,

    /// Path fragment to append to the running query (repeatable).
    #[arg(long = "select", value_name = "QUERY")]
    selects: Vec<String>,

    /// Keep only the first node in scope.
    #[arg(long, conflicts_with_all = ["last", "nth"])]
    first: bool,

    /// Keep only the last node in scope.
    #[arg(long, conflicts_with = "nth")]
    last: bool,

    /// Keep only the N-th (1-based) node in scope.
    #[arg(long, value_name = "N")]
    nth: Option<usize>,

    /// Skip the first N nodes in scope.
    #[arg(long, value_name = "N")]
    offset: Option<usize>,

    /// Keep at most N nodes in scope (applied after --offset).
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Shift top-level headings so that h1 becomes hN.
    #[arg(long, value_name = "N")]
    level: Option<usize>,

    /// Wrap runs of top-level siblings, e.g. "section:h2:hr".
    #[arg(long, value_name = "TAG:FROM[:TO]")]
    wrap: Option<String>,

    /// Wrap occurrences of a text needle, e.g. "cat:em".
    #[arg(long = "wrap-text", value_name = "NEEDLE:TAG")]
    wrap_text: Option<String>,

    /// Match --wrap-text needles inside words too.
    #[arg(long)]
    any_substring: bool,

    /// Rename every selected element.
    #[arg(long, value_name = "TAG")]
    rename: Option<String>,

    /// Set an attribute on every selected element (repeatable).
    #[arg(long = "set-attr", value_name = "NAME=VALUE")]
    set_attrs: Vec<String>,

    /// Bind the last two words of each node in scope.
    #[arg(long)]
    widont: bool,

    /// Curl quotes and convert dashes and ellipses.
    #[arg(long)]
    smartypants: bool,

    /// Output representation.
    #[arg(long, value_enum, default_value_t = Format::Html)]
    output: Format,

    /// Serialize the whole body instead of the selection.
    #[arg(long, default_value_t = false)]
    clear: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Html,
    Content,
    Text,
    Json,
}

struct WrapSpec {
    tag: String,
    from: String,
    to: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<String> {
    let wrap = args.wrap.as_deref().map(parse_wrap).transpose()?;
    let wrap_text = args
        .wrap_text
        .as_deref()
        .map(|spec| split_pair(spec, ':', "--wrap-text", "NEEDLE:TAG"))
        .transpose()?;
    let set_attrs = args
        .set_attrs
        .iter()
        .map(|spec| split_pair(spec, '=', "--set-attr", "NAME=VALUE"))
        .collect::<Result<Vec<_>>>()?;

    let source = load_source(args.input.as_deref())?;
    let mut tree = Tree::new(source);
    for diagnostic in tree.diagnostics() {
        tracing::info!(%diagnostic, "parse diagnostic");
    }

    if let Some(n) = args.level {
        tree.level(n);
    }
    if let Some(wrap) = &wrap {
        tree.wrap(&wrap.tag, &wrap.from, wrap.to.as_deref(), &[]);
    }
    if let Some((needle, tag)) = &wrap_text {
        tree.wrap_text_with(needle, tag, &[], !args.any_substring);
    }

    for fragment in &args.selects {
        tree.select(fragment);
    }
    if let Some(offset) = args.offset {
        tree.offset(offset);
    }
    if let Some(limit) = args.limit {
        tree.limit(limit);
    }
    if let Some(n) = args.nth {
        tree.nth(n);
    }
    if args.first {
        tree.first();
    }
    if args.last {
        tree.last();
    }

    if let Some(tag) = &args.rename {
        tree.set_name(tag);
    }
    for (name, value) in &set_attrs {
        tree.set_attribute(name, value);
    }
    if args.widont {
        tree.widont(&Widont);
    }
    if args.smartypants {
        tree.filter(&SmartPunctuation);
    }

    let output = match args.output {
        Format::Html => tree.html(args.clear),
        Format::Content => tree.content(args.clear),
        Format::Text => tree.text(args.clear),
        Format::Json => {
            let diagnostics: Vec<String> = tree
                .diagnostics()
                .iter()
                .map(|diagnostic| diagnostic.message.clone())
                .collect();
            serde_json::to_string_pretty(&json!({
                "html": tree.html(args.clear),
                "text": tree.text(args.clear),
                "diagnostics": diagnostics,
            }))?
        }
    };
    Ok(output)
}

fn load_source(input: Option<&str>) -> Result<String> {
    match input {
        None | Some("-") => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {path}")),
    }
}

fn parse_wrap(spec: &str) -> Result<WrapSpec> {
    let mut parts = spec.split(':');
    let (Some(tag), Some(from)) = (parts.next(), parts.next()) else {
        bail!("--wrap expects TAG:FROM[:TO], got {spec:?}");
    };
    let to = parts.next();
    if tag.is_empty() || from.is_empty() || to == Some("") || parts.next().is_some() {
        bail!("--wrap expects TAG:FROM[:TO], got {spec:?}");
    }
    Ok(WrapSpec {
        tag: tag.to_string(),
        from: from.to_string(),
        to: to.map(str::to_string),
    })
}

fn split_pair(spec: &str, sep: char, flag: &str, shape: &str) -> Result<(String, String)> {
    match spec.split_once(sep) {
        Some((left, right)) if !left.is_empty() && !right.is_empty() => {
            Ok((left.to_string(), right.to_string()))
        }
        _ => bail!("{flag} expects {shape}, got {spec:?}"),
    }
}
