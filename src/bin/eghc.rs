// eghc - .egh component build CLI
//
// Usage:
//   eghc build <path>           Compile a single component or every
//                                component under a project root
//   eghc watch <path>           Compile then keep watching for changes
//   eghc bundle <path>          Partition route roots into chunks and
//                                write a manifest.json

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use egh_build_core::config::EghConfig;
use egh_build_core::BuildEngine;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "eghc")]
#[command(about = "Compiler and incremental build engine for .egh single-file components")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile one component or every component under a project root
    Build {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Compile then keep watching the project root for changes
    Watch {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Partition route roots into chunks and write manifest.json
    Bundle {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(short, long, value_name = "DIR", default_value = "./dist")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    egh_build_core::init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { path } => run_build(&path),
        Commands::Watch { path } => run_watch(&path),
        Commands::Bundle { path, output } => run_bundle(&path, &output),
    }
}

fn load_config(project_root: &Path) -> EghConfig {
    let config_path = project_root.join("egh.toml");
    match EghConfig::load_from_file(&config_path) {
        Ok(cfg) => cfg,
        Err(_) => EghConfig::default(),
    }
}

fn discover_components(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    let mut out = Vec::new();
    for entry in walkdir(root)? {
        if entry.extension().and_then(|e| e.to_str()) == Some("egh") {
            out.push(entry);
        }
    }
    Ok(out)
}

fn walkdir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            out.extend(walkdir(&path)?);
        } else {
            out.push(path);
        }
    }
    Ok(out)
}

fn project_root_for(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.to_path_buf()
    } else {
        path.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

fn run_build(path: &Path) -> Result<()> {
    let root = project_root_for(path);
    let config = load_config(&root);
    let engine = BuildEngine::new(&root, config)?;

    let components = discover_components(path)?;
    println!(
        "{} {} component(s) under {}",
        "Building".green().bold(),
        components.len(),
        path.display()
    );

    let mut error_count = 0;
    for component in &components {
        let result = engine.compile(component)?;
        let has_errors = result
            .diagnostics
            .iter()
            .any(|d| d.severity == egh_build_core::diagnostics::Severity::Error);
        if has_errors {
            error_count += 1;
        }
        for diag in &result.diagnostics {
            println!("{diag}");
        }
        if !has_errors {
            println!(
                "  {} {} ({} bytes)",
                "Compiled".green(),
                component.display(),
                result.module_bytes.len()
            );
        }
    }

    if error_count > 0 {
        anyhow::bail!("{error_count} component(s) failed to compile");
    }
    println!("{}", "Success!".green().bold());
    Ok(())
}

fn run_watch(path: &Path) -> Result<()> {
    let root = project_root_for(path);
    run_build(path)?;

    let config = load_config(&root);
    let engine = BuildEngine::new(&root, config)?;
    println!("{} {}", "Watching".cyan().bold(), root.display());

    let root_for_closure = root.clone();
    let _handles = engine.watch(&[root.clone()], move |batch| {
        println!(
            "{} epoch {} — {} file(s) affected under {}",
            "Rebuild".yellow().bold(),
            batch.epoch,
            batch.affected.len(),
            root_for_closure.display()
        );
        for path in &batch.affected {
            if let Ok(result) = engine.compile(path.as_path()) {
                for diag in &result.diagnostics {
                    println!("{diag}");
                }
            }
        }
    })?;

    println!("Press Ctrl+C to stop.");
    loop {
        std::thread::sleep(std::time::Duration::from_secs(3600));
    }
}

fn run_bundle(path: &Path, output: &Path) -> Result<()> {
    let root = project_root_for(path);
    let config = load_config(&root);
    let route_roots = config.build.route_roots.clone();
    let engine = BuildEngine::new(&root, config)?;

    let routes: Vec<(String, PathBuf)> = if route_roots.is_empty() {
        discover_components(path)?
            .into_iter()
            .map(|p| {
                let route = format!(
                    "/{}",
                    p.file_stem().and_then(|s| s.to_str()).unwrap_or("index")
                );
                (route, p)
            })
            .collect()
    } else {
        route_roots
            .into_iter()
            .map(|r| (r.clone(), root.join(&r)))
            .collect()
    };

    let manifest = engine.bundle(&routes)?;
    std::fs::create_dir_all(output)?;
    let manifest_json = serde_json::to_string_pretty(&manifest_to_json(&manifest))?;
    let manifest_path = output.join("manifest.json");
    std::fs::write(&manifest_path, &manifest_json)?;

    for chunk in &manifest.chunks {
        std::fs::write(output.join(format!("{}.js", chunk.id)), &*chunk.emitted_bytes)?;
    }

    println!(
        "{} {} chunk(s), {} route(s) -> {}",
        "Bundled".green().bold(),
        manifest.chunks.len(),
        manifest.routes.len(),
        manifest_path.display()
    );
    Ok(())
}

fn manifest_to_json(manifest: &egh_build_core::bundler::Manifest) -> serde_json::Value {
    serde_json::json!({
        "compilerVersion": manifest.compiler_version,
        "routes": manifest.routes.iter().map(|r| serde_json::json!({
            "path": r.path,
            "chunks": r.chunks,
        })).collect::<Vec<_>>(),
        "chunks": manifest.chunks.iter().map(|c| serde_json::json!({
            "id": c.id,
            "moduleMembers": c.module_members.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
            "externalRefs": c.external_refs,
            "sizeGzip": c.size_gzip,
            "integrity": c.integrity.to_hex(),
        })).collect::<Vec<_>>(),
    })
}
