use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use relaxo::{Change, CommitOptions, Database, ObjectId, View};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli.db, cli.command, &mut out)
}

pub fn execute(db_path: &Path, command: Command, out: &mut dyn Write) -> anyhow::Result<()> {
    debug!(db = %db_path.display(), "opening database");
    let db = Database::connect(db_path)
        .with_context(|| format!("cannot open database at {}", db_path.display()))?;
    match command {
        Command::Init => cmd_init(&db, db_path, out),
        Command::Log(args) => cmd_log(&db, args, out),
        Command::Ls(args) => cmd_ls(&db, args, out),
        Command::Cat(args) => cmd_cat(&db, args, out),
        Command::Put(args) => cmd_put(&db, args, out),
        Command::Rm(args) => cmd_rm(&db, args, out),
        Command::Diff(args) => cmd_diff(&db, args, out),
        Command::Branches(args) => cmd_branches(&db, args, out),
    }
}

fn cmd_init(db: &Database, path: &Path, out: &mut dyn Write) -> anyhow::Result<()> {
    writeln!(out, "{} Database ready in {}", "✓".green().bold(), path.display().to_string().bold())?;
    writeln!(out, "  Default branch: {}", db.default_branch().yellow())?;
    writeln!(out, "  Branches with commits: {}", db.branches()?.len())?;
    Ok(())
}

fn cmd_log(db: &Database, args: LogArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let branch = args.branch.as_deref().unwrap_or(db.default_branch());
    let mut history = db.history(branch)?;
    if let Some(path) = &args.path {
        history = history.touching(path);
    }

    let mut shown = 0;
    for item in history.take(args.limit) {
        let (id, commit) = item?;
        if args.oneline {
            writeln!(out, "{} {}", id.short_hex().yellow(), commit.summary())?;
        } else {
            if shown > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{} {}", "commit".yellow(), id.to_hex().yellow())?;
            writeln!(out, "Author: {}", commit.author)?;
            writeln!(out, "Date:   {}", commit.author.when)?;
            writeln!(out)?;
            for line in commit.message.lines() {
                writeln!(out, "    {line}")?;
            }
        }
        shown += 1;
    }
    if shown == 0 {
        writeln!(out, "No commits on {}.", branch.yellow())?;
    }
    Ok(())
}

fn cmd_ls(db: &Database, args: LsArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let view = revision(db, args.revision.rev.as_deref())?;
    if args.recursive {
        for (path, id) in view.leaves(&args.dir)? {
            writeln!(out, "{}  {}", id.short_hex().dimmed(), path)?;
        }
        return Ok(());
    }
    for entry in view.list(&args.dir)? {
        if entry.is_tree() {
            writeln!(out, "{}/", entry.name.blue().bold())?;
        } else {
            writeln!(out, "{}", entry.name)?;
        }
    }
    Ok(())
}

fn cmd_cat(db: &Database, args: CatArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let view = revision(db, args.revision.rev.as_deref())?;
    let Some(bytes) = view.read_bytes(&args.path)? else {
        bail!("no document at {}", args.path);
    };
    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?,
        Err(_) => writeln!(out, "{}", String::from_utf8_lossy(&bytes))?,
    }
    Ok(())
}

fn cmd_put(db: &Database, args: PutArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(&args.json).context("document is not valid JSON")?;
    let branch = args.branch.as_deref().unwrap_or(db.default_branch());
    let message = args.message.unwrap_or_else(|| format!("Update {}", args.path));
    let outcome = db.commit_to(branch, CommitOptions::new(message), |dataset| {
        dataset.insert(&args.path, &value).map(|_| ())
    })?;
    report_outcome(outcome.commit, branch, out)
}

fn cmd_rm(db: &Database, args: RmArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let branch = args.branch.as_deref().unwrap_or(db.default_branch());
    let message = args.message.unwrap_or_else(|| format!("Remove {}", args.path));
    let outcome = db.commit_to(branch, CommitOptions::new(message), |dataset| {
        dataset.delete(&args.path)
    })?;
    report_outcome(outcome.commit, branch, out)
}

fn report_outcome(commit: Option<ObjectId>, branch: &str, out: &mut dyn Write) -> anyhow::Result<()> {
    match commit {
        Some(id) => writeln!(
            out,
            "{} [{} {}]",
            "✓".green().bold(),
            branch.yellow(),
            id.short_hex()
        )?,
        None => writeln!(out, "Nothing to commit.")?,
    }
    Ok(())
}

fn cmd_diff(db: &Database, args: DiffArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let old = resolve_revision(db, &args.old)?;
    let new = resolve_revision(db, &args.new)?;
    let changes = db.changes(Some(&old), &new)?;
    if changes.is_empty() {
        writeln!(out, "No changes.")?;
    }
    for change in changes {
        let line = change.to_string();
        let colored = match change {
            Change::Added { .. } => line.green(),
            Change::Deleted { .. } => line.red(),
            Change::Modified { .. } => line.yellow(),
        };
        writeln!(out, "{colored}")?;
    }
    Ok(())
}

fn cmd_branches(db: &Database, args: BranchesArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    if let Some(name) = args.delete {
        if !db.delete_branch(&name)? {
            bail!("no branch named {name}");
        }
        writeln!(out, "Deleted branch {}", name.yellow())?;
        return Ok(());
    }
    let head = db.head_branch()?;
    let branches = db.branches()?;
    if branches.is_empty() {
        writeln!(out, "No branches yet.")?;
    }
    for (name, tip) in branches {
        if head.as_deref() == Some(name.as_str()) {
            writeln!(out, "* {} {}", name.green().bold(), tip.short_hex().dimmed())?;
        } else {
            writeln!(out, "  {} {}", name, tip.short_hex().dimmed())?;
        }
    }
    Ok(())
}

/// A branch name or a full commit id.
fn resolve_revision(db: &Database, rev: &str) -> anyhow::Result<ObjectId> {
    if let Ok(Some(tip)) = db.resolve(rev) {
        return Ok(tip);
    }
    let id: ObjectId = rev.parse().map_err(|_| anyhow!("unknown revision {rev}"))?;
    db.read_commit(&id)
        .with_context(|| format!("{rev} is not a commit"))?;
    Ok(id)
}

fn revision<'a>(db: &'a Database, rev: Option<&str>) -> anyhow::Result<View<'a, relaxo::JsonCodec>> {
    Ok(match rev {
        Some(rev) => db.at(&resolve_revision(db, rev)?)?,
        None => db.current()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
        colored::control::set_override(false);
        let mut argv = vec!["relaxo"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        execute(dir, cli.command, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn init_reports_default_branch() {
        let dir = tempfile::tempdir().unwrap();
        let output = run(dir.path(), &["init"]).unwrap();
        assert!(output.contains("Default branch: master"));
        assert!(dir.path().join("config.toml").is_file());
    }

    #[test]
    fn put_then_cat() {
        let dir = tempfile::tempdir().unwrap();
        let output = run(dir.path(), &["put", "records/0", r#"{"name":"good-0"}"#]).unwrap();
        assert!(output.contains("[master "));

        let output = run(dir.path(), &["cat", "records/0"]).unwrap();
        assert!(output.contains("\"name\": \"good-0\""));
    }

    #[test]
    fn put_rejects_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run(dir.path(), &["put", "x", "{oops"]).is_err());
    }

    #[test]
    fn ls_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["put", "records/subdirectory/0", "1"]).unwrap();
        run(dir.path(), &["put", "records/0", "2"]).unwrap();

        let output = run(dir.path(), &["ls", "records"]).unwrap();
        assert_eq!(output, "0\nsubdirectory/\n");

        let output = run(dir.path(), &["ls", "-R"]).unwrap();
        assert!(output.contains("records/subdirectory/0"));
    }

    #[test]
    fn rm_of_missing_path_commits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["put", "a", "1"]).unwrap();
        let output = run(dir.path(), &["rm", "missing"]).unwrap();
        assert_eq!(output, "Nothing to commit.\n");
        let output = run(dir.path(), &["rm", "a"]).unwrap();
        assert!(output.contains("[master "));
        assert!(run(dir.path(), &["cat", "a"]).is_err());
    }

    #[test]
    fn log_and_path_filter() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["put", "a", "1", "-m", "first"]).unwrap();
        run(dir.path(), &["put", "b", "1", "-m", "second"]).unwrap();

        let output = run(dir.path(), &["log", "--oneline"]).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("second"));

        let output = run(dir.path(), &["log", "--oneline", "--path", "a"]).unwrap();
        assert_eq!(output.lines().count(), 1);
        assert!(output.contains("first"));
    }

    #[test]
    fn diff_between_commits() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["put", "a", "1"]).unwrap();
        let first = Database::connect(dir.path()).unwrap().resolve("master").unwrap().unwrap();
        run(dir.path(), &["put", "a", "2"]).unwrap();
        run(dir.path(), &["put", "b", "1"]).unwrap();

        let output = run(dir.path(), &["diff", &first.to_hex(), "master"]).unwrap();
        assert_eq!(output, "M a\nA b\n");
        assert!(run(dir.path(), &["diff", "nope", "master"]).is_err());
    }

    #[test]
    fn branches_marks_head() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(run(dir.path(), &["branches"]).unwrap(), "No branches yet.\n");
        run(dir.path(), &["put", "a", "1"]).unwrap();
        run(dir.path(), &["put", "a", "1", "--branch", "side"]).unwrap();
        let output = run(dir.path(), &["branches"]).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert!(lines[0].starts_with("* master"));
        assert!(lines[1].starts_with("  side"));
    }

    #[test]
    fn branches_delete() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path(), &["put", "a", "1"]).unwrap();
        run(dir.path(), &["put", "a", "2", "--branch", "side"]).unwrap();

        assert_eq!(run(dir.path(), &["branches", "-d", "side"]).unwrap(), "Deleted branch side\n");
        assert!(run(dir.path(), &["branches", "-d", "side"]).is_err());
        assert!(run(dir.path(), &["branches", "-d", "master"]).is_err());
        assert!(run(dir.path(), &["branches"]).unwrap().starts_with("* master"));
    }
}
