use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use formpane_spec::{Manifest, ManifestIssue, generate_schema_json_pretty};

/// Validate Formpane panel manifests.
#[derive(Debug, Parser)]
#[command(name = "formpane-lint", version, about)]
struct Cli {
    /// Manifest file (.yaml, .yml or .json).
    #[arg(required_unless_present = "schema")]
    manifest: Option<PathBuf>,

    /// Print the manifest JSON Schema and exit.
    #[arg(long)]
    schema: bool,

    /// Print the normalized manifest as YAML when it validates.
    #[arg(long)]
    normalize: bool,

    /// Output format for reported issues.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    if cli.schema {
        println!("{}", generate_schema_json_pretty());
        return Ok(ExitCode::SUCCESS);
    }

    let path = cli
        .manifest
        .context("a manifest path is required unless --schema is given")?;
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let manifest = if is_json {
        Manifest::from_json_str(&text).with_context(|| format!("parsing {}", path.display()))?
    } else {
        Manifest::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))?
    };

    match manifest.validate() {
        Ok(()) => {
            if cli.normalize {
                print!("{}", manifest.normalized().to_yaml()?);
            } else {
                eprintln!("{}: ok", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            report(&path, err.issues(), cli.format)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn report(path: &std::path::Path, issues: &[ManifestIssue], format: Format) -> Result<()> {
    match format {
        Format::Text => {
            for issue in issues {
                println!("{}: {}", path.display(), issue);
            }
        }
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(issues)?);
        }
    }
    Ok(())
}
