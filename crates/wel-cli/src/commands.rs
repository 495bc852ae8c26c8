use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use tracing::debug;
use wel_crypto::{canonicalize, EntryHasher};
use wel_ledger::{
    Ledger, LedgerConfig, LedgerReader, LedgerWriter, PayloadMergeReducer, ReplayEngine,
    StreamValidator, ValidationReport,
};
use wel_types::{EventDraft, LedgerEntry, RawValue};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    debug!(strict_contiguity = config.strict_contiguity, "resolved ledger config");
    match cli.command {
        Command::Verify(args) => cmd_verify(&args, cli.format),
        Command::Inspect(args) => cmd_inspect(&args, cli.format),
        Command::Canonicalize(args) => cmd_canonicalize(&args, cli.format),
        Command::Replay(args) => cmd_replay(&args, cli.format),
        Command::Append(args) => cmd_append(&args, config),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<LedgerConfig> {
    let config = match &cli.config {
        Some(path) => LedgerConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LedgerConfig::default(),
    };
    Ok(if cli.strict {
        config.with_strict_contiguity(true)
    } else {
        config
    })
}

fn read_entries(path: &Path) -> anyhow::Result<Vec<LedgerEntry>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of ledger entries", path.display()))
}

/// Group entries by world instance, keeping file order within each group.
fn group_by_world(entries: Vec<LedgerEntry>) -> BTreeMap<String, Vec<LedgerEntry>> {
    let mut grouped: BTreeMap<String, Vec<LedgerEntry>> = BTreeMap::new();
    for entry in entries {
        grouped
            .entry(entry.world_instance_id().to_owned())
            .or_default()
            .push(entry);
    }
    grouped
}

fn restore(path: &Path, config: LedgerConfig) -> anyhow::Result<Ledger> {
    let ledger = Ledger::new(config);
    ledger
        .restore(read_entries(path)?)
        .with_context(|| format!("restoring {}", path.display()))?;
    Ok(ledger)
}

fn verify_file(path: &Path) -> anyhow::Result<Vec<ValidationReport>> {
    Ok(group_by_world(read_entries(path)?)
        .iter()
        .map(|(world, entries)| StreamValidator::validate_entries(world, entries))
        .collect())
}

fn cmd_verify(args: &VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let reports = verify_file(&args.file)?;
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = reports
                .iter()
                .map(|r| {
                    json!({
                        "worldInstanceId": r.world_instance_id,
                        "valid": r.is_valid(),
                        "entries": r.entry_count,
                        "replayable": r.replayable_count,
                        "maxIndex": r.contiguity.max_index,
                        "gaps": r.contiguity.gaps.iter()
                            .map(|g| [*g.start(), *g.end()])
                            .collect::<Vec<_>>(),
                        "duplicates": r.contiguity.duplicates,
                        "violations": r.violations.iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            for r in &reports {
                if r.is_valid() {
                    println!(
                        "{} {}: {} entries, chain intact",
                        "✓".green().bold(),
                        r.world_instance_id.bold(),
                        r.entry_count
                    );
                    continue;
                }
                println!(
                    "{} {}: {} entries",
                    "✗".red().bold(),
                    r.world_instance_id.bold(),
                    r.entry_count
                );
                for gap in &r.contiguity.gaps {
                    println!("  {} missing {}..={}", "gap:".yellow(), gap.start(), gap.end());
                }
                for index in &r.contiguity.duplicates {
                    println!("  {} index {index}", "duplicate:".yellow());
                }
                for violation in &r.violations {
                    println!("  {} {violation}", "violation:".red());
                }
            }
        }
    }

    let broken = reports.iter().filter(|r| !r.is_valid()).count();
    if broken > 0 {
        bail!("{broken} of {} world instances failed verification", reports.len());
    }
    Ok(())
}

fn cmd_inspect(args: &InspectArgs, format: OutputFormat) -> anyhow::Result<()> {
    let entries: Vec<LedgerEntry> = read_entries(&args.file)?
        .into_iter()
        .filter(|e| args.world.as_deref().map_or(true, |w| e.world_instance_id() == w))
        .filter(|e| !args.replayable || e.is_replayable())
        .collect();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Text => {
            for (world, group) in group_by_world(entries) {
                println!("{} ({} entries)", world.bold(), group.len());
                for e in &group {
                    println!(
                        "  {:>4} {} {} {} by {} {}",
                        e.event_index().to_string().yellow(),
                        e.hash().short_hex().dimmed(),
                        e.mutation_class().as_str().cyan(),
                        e.event_type(),
                        e.actor_id(),
                        e.timestamp().to_string().dimmed()
                    );
                }
            }
        }
    }
    Ok(())
}

/// Canonical text of a JSON document and its domain-separated digest.
fn canonical_digest(path: &Path) -> anyhow::Result<(String, String)> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let canonical = canonicalize(&RawValue::from(json))?;
    let digest = EntryHasher::V1.hash(canonical.as_bytes());
    Ok((canonical, digest.to_hex()))
}

fn cmd_canonicalize(args: &CanonicalizeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (canonical, digest) = canonical_digest(&args.file)?;
    match format {
        OutputFormat::Json => {
            println!("{}", json!({ "canonical": canonical, "digest": digest }));
        }
        OutputFormat::Text => {
            println!("{canonical}");
            println!("{} {}", "digest:".dimmed(), digest.yellow());
        }
    }
    Ok(())
}

fn cmd_replay(args: &ReplayArgs, format: OutputFormat) -> anyhow::Result<()> {
    let ledger = restore(&args.file, LedgerConfig::default())?;

    if args.view {
        let entries = ledger.replayable_entries_for(&args.world)?;
        match format {
            OutputFormat::Json => {
                let view: Vec<&LedgerEntry> = entries.iter().map(|e| &**e).collect();
                println!("{}", serde_json::to_string_pretty(&view)?);
            }
            OutputFormat::Text => {
                for e in &entries {
                    println!("{e}");
                }
            }
        }
        return Ok(());
    }

    let result = ReplayEngine::replay(&ledger, &args.world, &mut PayloadMergeReducer)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "worldInstanceId": result.world_instance_id,
                "applied": result.applied,
                "skippedRejections": result.skipped_rejections,
                "lastIndex": result.last_index,
                "state": result.state,
            }))?
        ),
        OutputFormat::Text => {
            println!(
                "{} replayed {} entries of {} ({} rejections skipped)",
                "✓".green().bold(),
                result.applied,
                result.world_instance_id.bold(),
                result.skipped_rejections
            );
            for (key, value) in &result.state {
                println!("  {} = {}", key.cyan(), serde_json::Value::from(value));
            }
        }
    }
    Ok(())
}

fn append_file(args: &AppendArgs, config: LedgerConfig) -> anyhow::Result<Vec<LedgerEntry>> {
    let ledger = match &args.ledger {
        Some(path) => restore(path, config)?,
        None => Ledger::new(config),
    };

    let text = fs::read_to_string(&args.drafts)
        .with_context(|| format!("reading {}", args.drafts.display()))?;
    let drafts: Vec<EventDraft> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of drafts", args.drafts.display()))?;

    for (position, draft) in drafts.into_iter().enumerate() {
        let id = draft.id.clone().unwrap_or_default();
        ledger
            .append(draft)
            .with_context(|| format!("appending draft #{position} (id `{id}`)"))?;
    }
    Ok(ledger.export()?)
}

fn cmd_append(args: &AppendArgs, config: LedgerConfig) -> anyhow::Result<()> {
    let entries = append_file(args, config)?;
    let out = serde_json::to_string_pretty(&entries)?;
    match &args.output {
        Some(path) => {
            fs::write(path, out).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} wrote {} entries to {}",
                "✓".green().bold(),
                entries.len(),
                path.display()
            );
        }
        None => println!("{out}"),
    }
    Ok(())
}
