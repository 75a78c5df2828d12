use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use colored::Colorize;
use sarc_pipeline::{DriftReport, StageResult, Vault, VaultConfig};
use sarc_registry::{ConflictChoice, NameConflict};
use sarc_types::CompressionMethod;
use tracing::debug;

use crate::cli::*;
use crate::prompt::Prompter;

pub fn run_command<R: BufRead, W: Write>(
    cli: Cli,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let ctx = Session {
        root: cli.root,
        verbose: cli.verbose,
        format: cli.format,
    };
    match cli.command {
        Command::Init(_) => cmd_init(&ctx),
        Command::Ingest(args) => cmd_ingest(&ctx, args, prompter),
        Command::Egress(args) => cmd_egress(&ctx, args, prompter),
        Command::List(_) => cmd_list(&ctx),
        Command::Status(_) => cmd_status(&ctx),
        Command::Reconcile(args) => cmd_reconcile(&ctx, args, prompter),
        Command::Force(args) => cmd_force(&ctx, args),
    }
}

struct Session {
    root: PathBuf,
    verbose: bool,
    format: OutputFormat,
}

impl Session {
    fn config(&self) -> anyhow::Result<VaultConfig> {
        Ok(VaultConfig::load(&self.root)?)
    }

    fn open(&self) -> anyhow::Result<Vault> {
        debug!(root = %self.root.display(), "opening vault");
        let vault = Vault::open_local(self.config()?)
            .with_context(|| format!("cannot open vault at {}", self.root.display()))?;
        Ok(vault)
    }
}

fn cmd_init(ctx: &Session) -> anyhow::Result<()> {
    let config = ctx.config()?;
    config.layout.ensure()?;
    let path = ctx.root.join(VaultConfig::FILE_NAME);
    if !path.exists() {
        let text = config.to_toml().map_err(anyhow::Error::msg)?;
        fs::write(&path, text).with_context(|| format!("cannot write {}", path.display()))?;
    }
    println!(
        "{} Initialized vault in {}",
        "✓".green().bold(),
        ctx.root.display().to_string().bold()
    );
    println!("  Import: {}", config.layout.import_dir().display());
    println!("  Vault:  {}", config.layout.vault_dir().display());
    println!("  Out:    {}", config.layout.out_dir().display());
    println!("  Keys:   {}", config.layout.keys_dir().display());
    Ok(())
}

fn cmd_ingest<R: BufRead, W: Write>(
    ctx: &Session,
    args: IngestArgs,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let mut vault = ctx.open()?;

    let source = match &args.source {
        Some(source) => vault.locate_source(source),
        None => {
            let listing = vault.import_listing()?;
            if listing.is_empty() {
                bail!("nothing to ingest in {}", vault.layout().import_dir().display());
            }
            let labels: Vec<String> = listing.iter().map(|p| import_label(p)).collect();
            writeln!(prompter.output(), "{}", "Import:".bold())?;
            let index = prompter.pick("Choose a file or directory:", &labels)?;
            listing[index].clone()
        }
    };

    let method = match args.method {
        Some(method) => method,
        None => choose_method(prompter, vault.config().default_method)?,
    };

    let plan = vault.plan_ingest(&source, args.name.as_deref())?;
    print_drift(&plan.drift);
    let choice = match (plan.conflict(), args.on_conflict) {
        (None, _) => None,
        (Some(_), Some(policy)) => Some(ConflictChoice::from(policy)),
        (Some(conflict), None) => Some(ask_conflict(prompter, conflict)?),
    };

    let report = vault.ingest(plan, choice, method)?;
    let verb = if report.replaced { "Replaced" } else { "Vaulted" };
    println!(
        "{} {} {} ({}, {})",
        "✓".green().bold(),
        verb,
        report.name.yellow(),
        report.entry.describe(),
        report.entry.method.to_string().cyan()
    );
    println!("  Key: {}", report.key.to_string().dimmed());
    if ctx.verbose {
        print_stages(&report.stages);
    }
    Ok(())
}

fn cmd_egress<R: BufRead, W: Write>(
    ctx: &Session,
    args: EgressArgs,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let mut vault = ctx.open()?;
    let name = match args.name {
        Some(name) => name,
        None => {
            let entries = vault.list();
            if entries.is_empty() {
                bail!("the vault is empty");
            }
            let labels: Vec<String> = entries
                .iter()
                .map(|(name, entry)| format!("{name} ({})", entry.describe()))
                .collect();
            writeln!(prompter.output(), "{}", "Vault:".bold())?;
            let index = prompter.pick("Choose an entry:", &labels)?;
            entries[index].0.clone()
        }
    };

    let report = vault.egress(&name)?;
    println!(
        "{} Restored {} to {}",
        "✓".green().bold(),
        report.name.yellow(),
        report.output.display().to_string().bold()
    );
    if ctx.verbose {
        print_stages(&report.stages);
    }
    print_drift(&report.drift);
    Ok(())
}

fn cmd_list(ctx: &Session) -> anyhow::Result<()> {
    let vault = ctx.open()?;
    let entries = vault.list();
    if ctx.format == OutputFormat::Json {
        let map: BTreeMap<_, _> = entries.into_iter().collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("The vault is empty.");
    }
    for (i, (name, entry)) in entries.iter().enumerate() {
        println!(
            "{:>3}) {} ({}) {}",
            i + 1,
            name.yellow(),
            entry.describe(),
            entry.method.to_string().cyan()
        );
    }
    Ok(())
}

fn cmd_status(ctx: &Session) -> anyhow::Result<()> {
    let vault = ctx.open()?;
    let drift = vault.reconcile()?;
    if ctx.format == OutputFormat::Json {
        let status = serde_json::json!({
            "root": vault.layout().root(),
            "entries": vault.registry().len(),
            "drift": drift,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!(
        "Vault at {}: {} entries",
        vault.layout().root().display().to_string().bold(),
        vault.registry().len()
    );
    if drift.is_clean() {
        println!("{} Registry and vault agree.", "✓".green().bold());
    } else {
        print_drift(&drift);
    }
    Ok(())
}

fn cmd_reconcile<R: BufRead, W: Write>(
    ctx: &Session,
    args: ReconcileArgs,
    prompter: &mut Prompter<R, W>,
) -> anyhow::Result<()> {
    let mut vault = ctx.open()?;
    let drift = vault.reconcile()?;
    if drift.is_clean() {
        println!("{} Registry and vault agree.", "✓".green().bold());
        return Ok(());
    }
    print_drift(&drift);
    if !args.prune || drift.dangling.is_empty() {
        return Ok(());
    }

    let confirmed = args.yes
        || vault.config().auto_repair
        || prompter.confirm(&format!(
            "Remove {} dangling registry entries?",
            drift.dangling.len()
        ))?;
    if !confirmed {
        println!("Nothing removed.");
        return Ok(());
    }
    for name in vault.prune_dangling()? {
        println!("  {} {}", "removed:".red(), name);
    }
    Ok(())
}

fn cmd_force(ctx: &Session, args: ForceArgs) -> anyhow::Result<()> {
    let vault = ctx.open()?;
    let outcome = vault.force(args.stage, &args.input, args.output.as_deref(), args.method)?;
    let mut detail = String::new();
    if let Some(method) = outcome.method {
        detail.push_str(&format!(" ({method})"));
    }
    println!(
        "{} {} {} → {}{}",
        "✓".green().bold(),
        outcome.stage.to_string().cyan(),
        outcome.input.display(),
        outcome.output.display().to_string().bold(),
        detail
    );
    if let Some(key) = outcome.key {
        println!("  Key: {}", key.to_string().dimmed());
    }
    Ok(())
}

fn import_label(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if path.is_dir() {
        format!("{name}/")
    } else {
        name
    }
}

fn choose_method<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    default: CompressionMethod,
) -> anyhow::Result<CompressionMethod> {
    writeln!(prompter.output(), "{}", "Compression:".bold())?;
    for (i, method) in CompressionMethod::ALL.iter().enumerate() {
        let marker = if *method == default { " (default)" } else { "" };
        writeln!(
            prompter.output(),
            "  {}) {} {}{}",
            (i + 1).to_string().bold(),
            method.to_string().cyan(),
            method.description(),
            marker
        )?;
    }
    let method = prompter.ask("Choose a method:", |answer| {
        if answer.is_empty() {
            return Some(default);
        }
        if let Ok(n) = answer.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| CompressionMethod::ALL.get(i).copied());
        }
        answer.parse().ok()
    })?;
    Ok(method)
}

fn ask_conflict<R: BufRead, W: Write>(
    prompter: &mut Prompter<R, W>,
    conflict: &NameConflict,
) -> anyhow::Result<ConflictChoice> {
    writeln!(
        prompter.output(),
        "{} {} already exists ({})",
        "!".yellow().bold(),
        conflict.requested.yellow(),
        conflict.existing.describe()
    )?;
    writeln!(prompter.output(), "  {}) replace it", "1".bold())?;
    writeln!(
        prompter.output(),
        "  {}) keep both, storing this one as {}",
        "2".bold(),
        conflict.alternate.yellow()
    )?;
    Ok(prompter.ask("Choose 1 or 2:", ConflictChoice::from_response)?)
}

fn print_drift(drift: &DriftReport) {
    for name in &drift.orphaned {
        println!("  {} {} (in vault, not in registry)", "orphaned:".yellow(), name);
    }
    for name in &drift.dangling {
        println!("  {} {} (in registry, missing from vault)", "dangling:".red(), name);
    }
}

fn print_stages(stages: &[StageResult]) {
    for stage in stages {
        let bytes = stage
            .bytes
            .map(|b| format!("  {b} bytes"))
            .unwrap_or_default();
        println!(
            "  {:<15}{:>8.1?}{}",
            stage.stage.to_string().dimmed(),
            stage.elapsed,
            bytes
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Cursor;

    fn run(root: &Path, args: &[&str], script: &str) -> anyhow::Result<String> {
        let mut argv = vec!["sarc", "--root"];
        let root = root.display().to_string();
        argv.push(&root);
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let mut prompter = Prompter::new(Cursor::new(script.as_bytes().to_vec()), Vec::new());
        run_command(cli, &mut prompter)?;
        Ok(String::from_utf8(prompter.output().clone()).unwrap())
    }

    #[test]
    fn init_writes_default_config() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["init"], "").unwrap();
        let text = fs::read_to_string(root.path().join("sarc.toml")).unwrap();
        let config = VaultConfig::from_toml(&text).unwrap();
        assert_eq!(config.default_method, CompressionMethod::Gz);
        assert!(root.path().join("import").is_dir());
        assert!(root.path().join("keys").is_dir());
    }

    #[test]
    fn interactive_ingest_then_egress() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["init"], "").unwrap();
        fs::write(root.path().join("import/notes.md"), b"# notes\n").unwrap();

        let shown = run(root.path(), &["ingest"], "1\n\n").unwrap();
        assert!(shown.contains("notes.md"));
        assert!(root.path().join("vault/notes").is_file());

        run(root.path(), &["egress"], "1\n").unwrap();
        assert_eq!(fs::read(root.path().join("out/notes.md")).unwrap(), b"# notes\n");
        assert!(!root.path().join("vault/notes").exists());
    }

    #[test]
    fn conflict_prompt_keeps_both() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["init"], "").unwrap();
        fs::write(root.path().join("import/report.txt"), b"one").unwrap();
        run(root.path(), &["ingest", "report.txt", "-m", "zst"], "").unwrap();

        let shown = run(root.path(), &["ingest", "report.txt", "-m", "zst"], "3\n2\n").unwrap();
        assert!(shown.contains(".txt file"));
        assert!(shown.contains("report (1)"));
        assert!(root.path().join("vault/report (1)").is_file());
    }

    #[test]
    fn prune_needs_confirmation() {
        let root = tempfile::tempdir().unwrap();
        run(root.path(), &["init"], "").unwrap();
        fs::write(root.path().join("import/a.txt"), b"a").unwrap();
        run(root.path(), &["ingest", "a.txt", "--method", "gz"], "").unwrap();
        fs::remove_file(root.path().join("vault/a")).unwrap();

        run(root.path(), &["reconcile", "--prune"], "n\n").unwrap();
        let registry = fs::read_to_string(root.path().join("registry.json")).unwrap();
        assert!(registry.contains("\"a\""));

        run(root.path(), &["reconcile", "--prune"], "y\n").unwrap();
        let registry = fs::read_to_string(root.path().join("registry.json")).unwrap();
        assert!(!registry.contains("\"a\""));
    }

    #[test]
    fn empty_import_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = run(root.path(), &["ingest"], "").unwrap_err();
        assert!(err.to_string().contains("nothing to ingest"));
    }
}
