use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use leaf::identify::{Identification, Identifier};
use leaf::{remedy, CategoryScore, Config, MatchResult};

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "leaf-fingerprint")]
#[command(version, about = "Crop disease identifier using leaf color fingerprints", long_about = None)]
struct Cli {
    /// Leaf images to classify; prompts for paths when none are given
    #[arg(value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Dataset folder with one subfolder per category
    #[arg(short, long, value_name = "DIR")]
    dataset: Option<PathBuf>,

    /// Category to load, in scoring order; replaces the configured list
    #[arg(long = "category", value_name = "NAME")]
    categories: Vec<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Also show the N best categories with their distances
    #[arg(long, value_name = "N", default_value_t = 0)]
    top: usize,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    image: &'a Path,
    #[serde(flatten)]
    result: &'a MatchResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ranking: Vec<CategoryScore>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("ERROR: {}", e.user_message());
        std::process::exit(1);
    }
}

fn build_config(cli: &Cli) -> leaf::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(dataset) = &cli.dataset {
        config.dataset = dataset.clone();
    }
    if !cli.categories.is_empty() {
        config.categories = cli.categories.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Human-facing prompts and status lines. With `--json` they go to stderr so
/// stdout carries nothing but one result object per line.
fn status_writer(json: bool) -> Box<dyn Write> {
    if json {
        Box::new(io::stderr())
    } else {
        Box::new(io::stdout())
    }
}

fn run(cli: Cli) -> leaf::Result<()> {
    let config = build_config(&cli)?;
    if cli.dump_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut out = io::stdout();
    let mut status = status_writer(cli.json);

    writeln!(status, "=== Crop Disease Identifier ===")?;
    let identifier = Identifier::load(config)?;

    if !cli.images.is_empty() {
        for path in &cli.images {
            report(&identifier, path, &cli, &mut out, &mut *status)?;
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        write!(status, "\nEnter path to the leaf image (or type 'exit' to quit): ")?;
        status.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        let input = line.trim().trim_matches('"');
        if input.eq_ignore_ascii_case("exit") {
            break;
        }
        if input.is_empty() {
            continue;
        }
        report(&identifier, Path::new(input), &cli, &mut out, &mut *status)?;
        out.flush()?;
    }

    writeln!(status, "\nApplication closed.")?;
    Ok(())
}

fn report(
    identifier: &Identifier,
    path: &Path,
    cli: &Cli,
    out: &mut dyn Write,
    status: &mut dyn Write,
) -> leaf::Result<()> {
    if !path.exists() {
        writeln!(status, "File not found. Please check the path and try again.")?;
        return Ok(());
    }
    let image = match image::open(path) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!("Could not decode {}: {}", path.display(), e);
            writeln!(
                status,
                "Could not read the image. Ensure the file is a valid image format (jpg/png)."
            )?;
            return Ok(());
        }
    };

    let Identification {
        result,
        mut ranking,
    } = match identifier.identify(Some(&image))? {
        Some(found) => found,
        None => {
            writeln!(status, "The image has no pixels to analyse.")?;
            return Ok(());
        }
    };
    ranking.truncate(cli.top);

    if cli.json {
        let report = Report {
            image: path,
            result: &result,
            ranking,
        };
        writeln!(out, "{}", serde_json::to_string(&report)?)?;
        return Ok(());
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    writeln!(out, "\n--- Analysis Result ---")?;
    writeln!(out, "Input Image: {}", name)?;
    writeln!(out, "Predicted Disease: **{}**", result.label().to_uppercase())?;
    match &result {
        MatchResult::Matched { score, .. } => writeln!(
            out,
            "Similarity Score (Bhattacharyya Distance): {:.4} (Lower is Better)",
            score
        )?,
        MatchResult::Unknown => writeln!(out, "Similarity Score (Bhattacharyya Distance): n/a")?,
    }
    for (i, score) in ranking.iter().enumerate() {
        writeln!(
            out,
            "  {}. {:<12} {:.4} ({} samples)",
            i + 1,
            score.category.as_str(),
            score.distance,
            score.samples
        )?;
    }

    writeln!(out, "\n--- Suggested Action ---")?;
    for line in remedy::lines(&identifier.config().remedies, &result) {
        writeln!(out, "{}", line)?;
    }
    writeln!(out, "{}", "-".repeat(35))?;
    Ok(())
}
