//! CLI subcommands: init, validate, plan, tree.

use crate::core::parser::{self, PhaseFile};
use crate::core::planner::TargetPlan;
use crate::core::store::{Block, PlanNode};
use crate::core::{fingerprint, phase};
use clap::Subcommand;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter phase file
    Init {
        /// Directory to initialize (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Validate a phase file without scheduling it
    Validate {
        /// Path to phase.yaml
        #[arg(short, long, default_value = "phase.yaml")]
        file: PathBuf,
    },

    /// Schedule the phase body and show the linearized plan per target
    Plan {
        /// Path to phase.yaml
        #[arg(short, long, default_value = "phase.yaml")]
        file: PathBuf,

        /// Target specific node ("origin" for the controlling host)
        #[arg(short, long)]
        target: Option<String>,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the block tree as registered, before linearization
    Tree {
        /// Path to phase.yaml
        #[arg(short, long, default_value = "phase.yaml")]
        file: PathBuf,

        /// Target specific node ("origin" for the controlling host)
        #[arg(short, long)]
        target: Option<String>,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Plan { file, target, json } => cmd_plan(&file, target.as_deref(), json),
        Commands::Tree { file, target } => cmd_tree(&file, target.as_deref()),
    }
}

const STARTER: &str = r#"version: "1.0"
phase: configure
description: "Managed by phaseplan"

targets: [origin]

policy:
  missing_references: ignore

actions:
  install:
    flavor: aggregated
    params: [package]
    script: "apt-get install -y {{args.package}}"
  motd:
    flavor: bash
    params: [text]
    script: "echo '{{args.text}}' > /etc/motd"
    always_after: [install]

body:
  - call: motd
    args: ["hello"]
  - call: install
    args: [curl]
"#;

fn cmd_init(path: &Path) -> Result<(), String> {
    let phase_path = path.join("phase.yaml");
    if phase_path.exists() {
        return Err(format!("{} already exists", phase_path.display()));
    }
    std::fs::create_dir_all(path).map_err(|e| format!("cannot create {}: {}", path.display(), e))?;
    std::fs::write(&phase_path, STARTER)
        .map_err(|e| format!("cannot write {}: {}", phase_path.display(), e))?;

    println!("Initialized phaseplan project at {}", path.display());
    println!("  Created: {}", phase_path.display());
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let content = std::fs::read_to_string(file)
        .map_err(|e| format!("failed to read {}: {}", file.display(), e))?;
    let phase_file = parser::parse_phase(&content)?;
    let errors = parser::validate_phase(&phase_file);

    if errors.is_empty() {
        println!(
            "OK: {} ({} targets, {} actions, {} steps)",
            phase_file.phase,
            phase_file.targets.len(),
            phase_file.actions.len(),
            phase_file.body.len()
        );
        println!("  source: {}", fingerprint::hash_string(&content));
        Ok(())
    } else {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        Err(format!("{} validation error(s)", errors.len()))
    }
}

/// Parse and validate a phase file, returning errors if invalid.
fn parse_and_validate(file: &Path) -> Result<PhaseFile, String> {
    let phase_file = parser::parse_phase_file(file)?;
    let errors = parser::validate_phase(&phase_file);
    if errors.is_empty() {
        return Ok(phase_file);
    }
    for e in &errors {
        eprintln!("  ERROR: {}", e);
    }
    Err("validation failed".to_string())
}

fn check_target(phase_file: &PhaseFile, target: Option<&str>) -> Result<(), String> {
    match target {
        Some(t) if !phase_file.targets.iter().any(|x| x.to_string() == t) => {
            Err(format!("unknown target: {}", t))
        }
        _ => Ok(()),
    }
}

fn cmd_plan(file: &Path, target: Option<&str>, json: bool) -> Result<(), String> {
    let phase_file = parse_and_validate(file)?;
    check_target(&phase_file, target)?;
    let plans = phase::plan_phase(&phase_file, target).map_err(|e| e.to_string())?;

    if json {
        let out = serde_json::to_string_pretty(&plans)
            .map_err(|e| format!("JSON serialize error: {}", e))?;
        println!("{}", out);
        return Ok(());
    }
    print_plans(&phase_file, &plans)
}

/// Display linearized plans to stdout.
fn print_plans(phase_file: &PhaseFile, plans: &[TargetPlan]) -> Result<(), String> {
    println!("Planning: {} ({} targets)", phase_file.phase, plans.len());
    for plan in plans {
        println!();
        println!("{}:", plan.path.target);
        for (i, step) in plan.steps.iter().enumerate() {
            let scope = if step.scopes.iter().all(Vec::is_empty) {
                String::new()
            } else {
                format!(" scopes={}", format_scopes(&step.scopes))
            };
            println!(
                "  {:>3}. [{}] {} ({}, {}) x{}{}",
                i + 1,
                step.class,
                step.action,
                step.kind,
                step.location,
                step.arg_sets.len(),
                scope
            );
            let payload = step
                .render()
                .map_err(|e| format!("{}: cannot render {}: {}", plan.path, step.action, e))?;
            for line in payload.lines() {
                println!("       | {}", line);
            }
        }
        println!("  fingerprint: {}", plan.fingerprint);
    }
    Ok(())
}

/// Block paths as `root` or dotted child indices, comma-separated.
fn format_scopes(scopes: &[Vec<usize>]) -> String {
    scopes
        .iter()
        .map(|scope| {
            if scope.is_empty() {
                "root".to_string()
            } else {
                scope.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(".")
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

fn cmd_tree(file: &Path, target: Option<&str>) -> Result<(), String> {
    let phase_file = parse_and_validate(file)?;
    check_target(&phase_file, target)?;
    let phase_plan = phase::schedule_all(&phase_file, target).map_err(|e| e.to_string())?;

    for (path, root) in &phase_plan.blocks {
        println!("{} ({} actions):", path, root.action_count());
        print_block(root, 1);
    }
    Ok(())
}

fn print_block(block: &Block, depth: usize) {
    let indent = "  ".repeat(depth);
    for child in &block.children {
        match child {
            PlanNode::Action(a) => {
                let args: Vec<String> = a.args().iter().map(|v| v.to_string()).collect();
                println!("{}- {}({}) [{}]", indent, a.id(), args.join(", "), a.class());
            }
            PlanNode::Block(b) => {
                println!("{}+ block", indent);
                print_block(b, depth + 1);
            }
        }
    }
}
