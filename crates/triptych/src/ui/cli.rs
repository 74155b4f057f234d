//! Command-line front end.
//!
//! Thin wrapper over the application layer for scripted use and for poking
//! at a project without an editor attached. Every command works off the
//! effective layered configuration for the chosen root.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::app::classify::{classify, is_combined};
use crate::app::resolve::Resolver;
use crate::app::split::{ORIGIN_FILE, SplitEngine};
use crate::domain::model::FragmentKind;
use crate::infra::config::Config;

#[derive(Parser)]
#[command(author, version, about = "Component editor core: classify, resolve, split, and merge", long_about = None)]
pub struct Cli {
    /// Project root. Defaults to the enclosing repository root.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report how a path classifies: a fragment kind, a combined document,
    /// or unsupported.
    Classify { path: PathBuf },
    /// Resolve the member files of the component a path belongs to.
    Resolve { path: PathBuf },
    /// Decompose a combined document into fragment files.
    Split { path: PathBuf },
    /// Reassemble the combined document behind a materialized fragment.
    Merge { path: PathBuf },
    /// Print the effective configuration after all layers are applied.
    Config,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let root = match &cli.root {
        Some(root) => root.clone(),
        None => env::current_dir()?,
    };
    let config = Config::load_for_root(&root)?;

    match cli.command {
        Commands::Classify { path } => run_classify(&config, &path, cli.json),
        Commands::Resolve { path } => run_resolve(&config, &root, &path, cli.json),
        Commands::Split { path } => run_split(&config, &root, &path, cli.json),
        Commands::Merge { path } => run_merge(&config, &root, &path, cli.json),
        Commands::Config => run_config(&config, cli.json),
    }
}

#[derive(Serialize)]
struct ClassifyReport<'a> {
    path: &'a Path,
    kind: Option<&'static str>,
    combined: bool,
}

fn run_classify(config: &Config, path: &Path, json: bool) -> Result<()> {
    let kind = classify(config, path);
    let report = ClassifyReport {
        path,
        kind: kind.map(|k| k.name()),
        combined: is_combined(config, path),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    match (report.kind, report.combined) {
        (_, true) => println!("combined"),
        (Some(kind), _) => println!("{kind}"),
        (None, false) => println!("unsupported"),
    }
    Ok(())
}

#[derive(Serialize)]
struct ResolveReport {
    mode: &'static str,
    members: Vec<MemberReport>,
}

#[derive(Serialize)]
struct MemberReport {
    kind: &'static str,
    primary: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

fn run_resolve(config: &Config, root: &Path, path: &Path, json: bool) -> Result<()> {
    let resolver = Resolver::new(config, root);
    let mut engine = SplitEngine::new();
    let set = resolver
        .resolve(path, &mut engine)
        .with_context(|| format!("failed to resolve {}", path.display()))?;

    let mode = if set.split_mode {
        "split"
    } else if set.cross_mode {
        "cross"
    } else {
        "sibling"
    };
    let members: Vec<MemberReport> = FragmentKind::ALL
        .into_iter()
        .map(|kind| MemberReport {
            kind: kind.name(),
            primary: set.primary(kind).map(Path::to_path_buf),
            candidates: set.candidates.get(kind).clone(),
        })
        .collect();

    if json {
        let report = ResolveReport { mode, members };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    println!("mode: {mode}");
    for member in members {
        match member.primary {
            Some(primary) => println!("{}: {}", member.kind, primary.display()),
            None => println!("{}: (none)", member.kind),
        }
        for extra in member.candidates.iter().skip(1) {
            println!("  alternative: {}", extra.display());
        }
    }
    Ok(())
}

fn run_split(config: &Config, root: &Path, path: &Path, json: bool) -> Result<()> {
    if !is_combined(config, path) {
        return Err(anyhow!("{} is not a combined document", path.display()));
    }
    let mut engine = SplitEngine::new();
    let files = engine.split(config, root, path)?;

    if json {
        let report: Vec<MemberReport> = FragmentKind::ALL
            .into_iter()
            .map(|kind| MemberReport {
                kind: kind.name(),
                primary: Some(files.get(kind).clone()),
                candidates: vec![files.get(kind).clone()],
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    for (kind, file) in files.iter() {
        println!("{}: {}", kind.name(), file.display());
    }
    Ok(())
}

/// Merging from a cold start: the back-reference file next to the fragment
/// names the combined document, which is re-split to rebuild the
/// registration table before the merge runs. Re-splitting rewrites the
/// fragment files from the combined document, so every fragment file's
/// current content is snapshotted up front and restored before merging --
/// edits in fragments other than the one named must survive too.
fn run_merge(config: &Config, root: &Path, path: &Path, json: bool) -> Result<()> {
    let main = SplitEngine::recover_origin(path)
        .ok_or_else(|| anyhow!("{} is not a registered fragment", path.display()))?;
    let dir = path
        .parent()
        .ok_or_else(|| anyhow!("fragment {} has no parent directory", path.display()))?;

    let mut snapshots: Vec<(PathBuf, String)> = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("failed to read split directory {}", dir.display()))?
    {
        let entry = entry?;
        let file = entry.path();
        let name = file.file_name().and_then(|n| n.to_str());
        if entry.file_type()?.is_file() && name != Some(ORIGIN_FILE) {
            snapshots.push((file.clone(), fs::read_to_string(&file)?));
        }
    }

    let mut engine = SplitEngine::new();
    engine
        .split(config, root, &main)
        .with_context(|| format!("failed to re-register {}", main.display()))?;
    for (file, content) in &snapshots {
        fs::write(file, content)?;
    }
    let merged = engine.merge(path)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "merged": merged }))?
        );
        return Ok(());
    }
    println!("merged: {}", merged.display());
    Ok(())
}

fn run_config(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", toml::to_string_pretty(config)?);
    }
    Ok(())
}
