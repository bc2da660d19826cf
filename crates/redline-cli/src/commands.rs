use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use uuid::Uuid;

use redline_diff::{BlockDiff, DiffKind, TokenChangeKind};
use redline_merge::{MergeOutcome, MergeReport};
use redline_sdk::{CoreEngine, DocumentCoreEngine, EngineConfig};
use redline_types::{Block, Document};
use redline_workflow::{legal_events, replay, WorkflowState, WorkflowStatus};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let format = cli.format;
    match cli.command {
        Command::Validate(args) => cmd_validate(args, format),
        Command::Diff(args) => cmd_diff(args, config, format),
        Command::Merge(args) => cmd_merge(args, config, format),
        Command::Rehash(args) => cmd_rehash(args),
        Command::Replay(args) => cmd_replay(args, format),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ingest a document file, reusing an already-loaded document with the
/// same id.
fn load_into(engine: &CoreEngine, path: &Path) -> anyhow::Result<Uuid> {
    let document: Document = read_json(path)?;
    if engine.document(document.id).is_ok() {
        return Ok(document.id);
    }
    engine
        .ingest(document)
        .with_context(|| format!("ingesting {}", path.display()))
}

fn label(block: &Block) -> String {
    let path = block.structural_path();
    if path.is_empty() {
        block.block_type().to_string()
    } else {
        format!("{} {}", block.block_type(), path)
    }
}

fn excerpt(text: &str) -> String {
    const MAX: usize = 72;
    match text.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn cmd_validate(args: ValidateArgs, format: OutputFormat) -> anyhow::Result<()> {
    let document: Document = read_json(&args.document)?;
    let report = document.validate();

    if format == OutputFormat::Json {
        let violations: Vec<serde_json::Value> = report
            .violations
            .iter()
            .map(|v| {
                serde_json::json!({
                    "block_id": v.block_id,
                    "kind": v.kind.to_string(),
                    "description": v.description,
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "document_id": document.id,
            "block_count": report.block_count,
            "valid": report.is_valid(),
            "violations": violations,
        }))?;
    } else if report.is_valid() {
        println!(
            "{} {} is valid ({} blocks, hash contract {})",
            "✓".green().bold(),
            document.name.bold(),
            report.block_count,
            document.hash_contract_version
        );
    } else {
        println!(
            "{} {}: {} violation(s)",
            "✗".red().bold(),
            document.name.bold(),
            report.violations.len()
        );
        for v in &report.violations {
            let id = v.block_id.map(|id| id.to_string()).unwrap_or_else(|| "-".into());
            println!("  {} {} {}", v.kind.to_string().yellow(), id.dimmed(), v.description);
        }
    }

    if !report.is_valid() {
        bail!("document failed validation");
    }
    Ok(())
}

fn cmd_diff(args: DiffArgs, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let engine = CoreEngine::new(config);
    let left = load_into(&engine, &args.left)?;
    let right = load_into(&engine, &args.right)?;
    let diff = engine.diff(left, right)?;

    if format == OutputFormat::Json {
        return print_json(diff.as_ref());
    }

    for entry in &diff.diffs {
        if entry.kind == DiffKind::Equal && !entry.moved && !args.all {
            continue;
        }
        print_block_diff(entry);
    }
    println!(
        "\n{} equal, {} inserted, {} deleted, {} modified ({} moved)",
        diff.equal_count,
        diff.inserted_count.to_string().green(),
        diff.deleted_count.to_string().red(),
        diff.modified_count.to_string().yellow(),
        diff.moved_count.to_string().cyan()
    );
    Ok(())
}

/// " (moved from 1.2)" for a pair whose path changed.
fn moved_note(entry: &BlockDiff) -> String {
    match (&entry.left_block, entry.moved) {
        (Some(left), true) => format!(" (moved from {})", left.structural_path()),
        _ => String::new(),
    }
}

fn print_block_diff(entry: &BlockDiff) {
    match entry.kind {
        DiffKind::Equal if entry.moved => {
            if let Some(b) = &entry.right_block {
                println!(
                    "{} {}{} {}",
                    "→".cyan().bold(),
                    label(b).cyan(),
                    moved_note(entry).cyan(),
                    excerpt(&b.display_text).dimmed()
                );
            }
        }
        DiffKind::Equal => {
            if let Some(b) = &entry.left_block {
                println!("  {} {}", label(b).dimmed(), excerpt(&b.display_text).dimmed());
            }
        }
        DiffKind::Inserted => {
            if let Some(b) = &entry.right_block {
                println!("{} {} {}", "+".green().bold(), label(b).green(), excerpt(&b.display_text));
            }
        }
        DiffKind::Deleted => {
            if let Some(b) = &entry.left_block {
                println!("{} {} {}", "-".red().bold(), label(b).red(), excerpt(&b.display_text));
            }
        }
        DiffKind::Modified => {
            let name = entry
                .right_block
                .as_ref()
                .or(entry.left_block.as_ref())
                .map(label)
                .unwrap_or_default();
            println!("{} {}{}", "~".yellow().bold(), name.yellow(), moved_note(entry));
            for change in &entry.token_changes {
                match change.kind {
                    TokenChangeKind::Equal => {}
                    TokenChangeKind::Inserted => {
                        println!("    {}", change.right_tokens.join(" ").green())
                    }
                    TokenChangeKind::Deleted => {
                        println!("    {}", change.left_tokens.join(" ").red().strikethrough())
                    }
                    TokenChangeKind::Substituted => println!(
                        "    {} → {}",
                        change.left_tokens.join(" ").red().strikethrough(),
                        change.right_tokens.join(" ").green()
                    ),
                }
            }
        }
    }
}

fn cmd_merge(args: MergeArgs, mut config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    if args.preserve_deletions {
        config.merge.preserve_deletions = true;
    }
    let engine = CoreEngine::new(config);
    let base = load_into(&engine, &args.base)?;
    let incoming = load_into(&engine, &args.incoming)?;
    let ancestor = args
        .ancestor
        .as_deref()
        .map(|p| load_into(&engine, p))
        .transpose()?;

    let report = engine.merge(base, incoming, ancestor)?;

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&report.merged)?;
        fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;
    }

    if format == OutputFormat::Json {
        return print_json(&report);
    }
    print_merge_summary(&report);
    if let Some(output) = &args.output {
        println!("Merged document written to {}", output.display().to_string().bold());
    }
    Ok(())
}

fn print_merge_summary(report: &MergeReport) {
    let s = &report.summary;
    let mode = if report.ancestor_document_id.is_some() { "three-way" } else { "two-way" };
    println!("Merge {} ({mode})", report.merge_id.to_string().yellow());
    println!(
        "  {} decisions: {} unchanged, {} auto-merged, {} conflicts",
        s.total_decisions,
        s.unchanged_count,
        s.auto_merged_count.to_string().green(),
        s.conflict_count.to_string().red()
    );

    for result in &report.results {
        let tag = match result.outcome {
            MergeOutcome::AcceptedBase => "base".cyan(),
            MergeOutcome::AcceptedIncoming => "incoming".cyan(),
            MergeOutcome::AutoMerged => continue,
            MergeOutcome::Conflict => "conflict".red().bold(),
        };
        let name = report.slots[result.slot]
            .representative()
            .map(label)
            .unwrap_or_default();
        println!("  [{tag}] {name}");
    }

    for conflict in report.outstanding() {
        println!("\n{} {} ({:?})", "Conflict".red().bold(), conflict.id, conflict.kind);
        println!("  base:     {}", conflict.base_text.as_deref().map(excerpt).unwrap_or_else(|| "(absent)".into()));
        println!("  incoming: {}", conflict.incoming_text.as_deref().map(excerpt).unwrap_or_else(|| "(absent)".into()));
        if let Some(text) = &conflict.ancestor_text {
            println!("  ancestor: {}", excerpt(text).dimmed());
        }
    }

    if s.outstanding_conflicts == 0 {
        println!("\n{} Merge is clean.", "✓".green().bold());
    } else {
        println!(
            "\n{} {} conflict(s) need resolution; they are left out of the merged tree.",
            "!".yellow().bold(),
            s.outstanding_conflicts
        );
    }
}

fn cmd_rehash(args: RehashArgs) -> anyhow::Result<()> {
    let mut document: Document = read_json(&args.document)?;
    let previous = document.hash_contract_version.clone();
    document.rehash();
    document.ensure_valid()?;
    let json = serde_json::to_string_pretty(&document)?;

    match &args.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} Rehashed {} blocks ({} → {})",
                "✓".green().bold(),
                document.block_count(),
                previous,
                document.hash_contract_version
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_replay(args: ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let stored: WorkflowState = read_json(&args.workflow)?;

    let mut initial = stored.clone();
    initial.status = WorkflowStatus::Pending;
    initial.approver_ids.clear();
    initial.event_history.clear();
    initial.version = 0;
    initial.updated_at = initial.created_at;

    let rebuilt = replay(initial, &stored.event_history)?;
    let consistent = rebuilt.status == stored.status
        && rebuilt.approver_ids == stored.approver_ids
        && rebuilt.version == stored.version;
    let next = legal_events(rebuilt.status);

    if format == OutputFormat::Json {
        print_json(&serde_json::json!({
            "workflow_id": rebuilt.id,
            "status": rebuilt.status,
            "version": rebuilt.version,
            "consistent": consistent,
            "legal_events": next,
        }))?;
    } else {
        for record in &rebuilt.event_history {
            println!(
                "{:>3} {} {} by {} ({} → {})",
                record.seq,
                record.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                record.event.to_string().bold(),
                record.actor.cyan(),
                record.from_status,
                record.to_status
            );
        }
        let names: Vec<String> = next.iter().map(ToString::to_string).collect();
        println!(
            "Status {} after {} event(s); next: {}",
            rebuilt.status.to_string().yellow().bold(),
            rebuilt.version,
            if names.is_empty() { "none".to_string() } else { names.join(", ") }
        );
    }

    if !consistent {
        bail!(
            "stored state ({}, version {}) does not match its history ({}, version {})",
            stored.status,
            stored.version,
            rebuilt.status,
            rebuilt.version
        );
    }
    Ok(())
}
