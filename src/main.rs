use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colored::Colorize;
use geobit::areas::repository::{Context, Repository};
use geobit::artifacts::core::progress::DefaultProgressListener;
use geobit::artifacts::diff::diff_entry::{ChangeType, DiffEntry};
use geobit::artifacts::diff::tree_diff::DiffTreeWalk;
use geobit::artifacts::objects::commit::Commit;
use geobit::artifacts::objects::feature::Feature;
use geobit::artifacts::objects::feature_type::FeatureType;
use geobit::artifacts::objects::object::RevObject;
use geobit::artifacts::objects::object_id::ObjectId;
use geobit::artifacts::objects::tree::RevTree;
use geobit::artifacts::patch::Patch;
use geobit::commands::plumbing::create_patch::CreatePatch;
use geobit::commands::plumbing::diff_feature::DiffFeature;
use geobit::commands::plumbing::diff_tree::DiffTree;
use geobit::commands::plumbing::rev_object_parse::RevObjectParse;
use geobit::commands::plumbing::verify_patch::VerifyPatch;
use geobit::commands::porcelain::add::AddOp;
use geobit::commands::porcelain::apply_patch::ApplyPatchOp;
use geobit::commands::porcelain::branch::{BranchCreateOp, BranchDeleteOp, BranchListOp};
use geobit::commands::porcelain::checkout::{CheckoutOp, CheckoutTarget};
use geobit::commands::porcelain::commit::CommitOp;
use geobit::commands::porcelain::log::LogOp;
use geobit::commands::porcelain::merge::{MergeOp, MergeOutcome};
use geobit::commands::porcelain::remove::RemoveOp;
use geobit::commands::porcelain::reset::{ResetMode, ResetOp};
use geobit::commands::porcelain::status::StatusOp;
use geobit::commands::porcelain::tag::{TagCreateOp, TagListOp, TagRemoveOp};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "geobit",
    version,
    about = "Version control for geospatial features",
    long_about = "geobit tracks feature collections the way git tracks files: \
    features are staged, committed, branched, merged and exchanged as patches, \
    with changes resolved down to single attributes.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
"
)]
struct Cli {
    #[arg(short = 'C', long = "repo", global = true, help = "Run as if started in this directory")]
    repo: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create an empty repository")]
    Init {
        #[arg(index = 1, help = "Directory to create the repository in")]
        path: Option<PathBuf>,
    },
    #[command(about = "Read or write a configuration value")]
    Config {
        key: String,
        value: Option<String>,
    },
    #[command(about = "Load features from a JSON file into the working tree")]
    Import {
        #[arg(index = 1, help = "File holding a path, a feature type and features keyed by name")]
        file: PathBuf,
    },
    #[command(about = "Delete features or trees from the working tree")]
    Delete {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    #[command(about = "Stage working tree changes")]
    Add {
        paths: Vec<String>,
    },
    #[command(name = "rm", about = "Remove features from the working tree and the staging area")]
    Remove {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    #[command(about = "Record the staged changes")]
    Commit {
        #[arg(short, long)]
        message: String,
        #[arg(short, long, help = "Stage every change first")]
        all: bool,
        #[arg(long)]
        allow_empty: bool,
        #[arg(long, value_name = "NAME <EMAIL>")]
        author: Option<String>,
    },
    #[command(about = "Show staged, unstaged and conflicting changes")]
    Status {
        paths: Vec<String>,
        #[arg(long, default_value_t = 50, help = "Changes listed per section")]
        limit: usize,
    },
    #[command(about = "Show the commit history")]
    Log {
        #[arg(default_value = "HEAD")]
        revision: String,
        #[arg(short = 'n', long)]
        max_count: Option<usize>,
        #[arg(long)]
        oneline: bool,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(about = "List, create or delete branches")]
    Branch {
        name: Option<String>,
        start: Option<String>,
        #[arg(short, long)]
        delete: bool,
        #[arg(short, long)]
        force: bool,
    },
    #[command(about = "Switch branches or detach HEAD at a commit")]
    Checkout {
        target: String,
        #[arg(short, long, help = "Discard local changes")]
        force: bool,
    },
    #[command(about = "List, create or delete tags")]
    Tag {
        name: Option<String>,
        commit: Option<String>,
        #[arg(short, long)]
        message: Option<String>,
        #[arg(short, long)]
        delete: bool,
    },
    #[command(about = "Merge a commit into the current branch")]
    Merge {
        commit: String,
        #[arg(short, long)]
        message: Option<String>,
    },
    #[command(about = "Move the current branch to a commit")]
    Reset {
        #[arg(default_value = "HEAD")]
        target: String,
        #[arg(long, conflicts_with = "hard")]
        soft: bool,
        #[arg(long)]
        hard: bool,
    },
    #[command(about = "Show changes between two trees")]
    Diff {
        old: Option<String>,
        new: Option<String>,
        #[arg(long, help = "Compare HEAD with the staging area")]
        cached: bool,
        #[arg(long, help = "Only list changed paths")]
        name_status: bool,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(name = "format-patch", about = "Write the changes between two trees as a patch")]
    FormatPatch {
        old: String,
        #[arg(default_value = "WORK_HEAD")]
        new: String,
        #[arg(short, long, help = "Write to a file instead of standard output")]
        output: Option<PathBuf>,
        #[arg(last = true)]
        paths: Vec<String>,
    },
    #[command(about = "Apply a patch to the working tree")]
    Apply {
        file: PathBuf,
        #[arg(short = 'R', long)]
        reverse: bool,
        #[arg(long, help = "Apply what applies and report the rest")]
        partial: bool,
        #[arg(long, help = "Only report whether the patch applies")]
        check: bool,
    },
    #[command(about = "Show an object by revision or <revision>:<path>")]
    Show {
        spec: String,
    },
}

/// Import file layout
#[derive(Deserialize)]
struct FeatureCollection {
    path: String,
    feature_type: FeatureType,
    features: BTreeMap<String, Feature>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("GEOBIT_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };

    if let Commands::Init { path } = &cli.command {
        let root = path.as_ref().map_or_else(|| cwd.clone(), |path| cwd.join(path));
        std::fs::create_dir_all(&root)?;
        let repository = Repository::init(&root)?;
        let root = repository.root().unwrap_or(&root).canonicalize()?;
        println!("Initialized empty geobit repository in {}", root.display());
        return Ok(());
    }

    let repo = Repository::open(&cwd)?;
    run(&repo, cli.command).await
}

async fn run(repo: &Repository, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } => {}
        Commands::Config { key, value } => match value {
            Some(value) => repo.config().set(&key, &value)?,
            None => match repo.config().get(&key)? {
                Some(value) => println!("{value}"),
                None => anyhow::bail!("{key} is not set"),
            },
        },
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
            let collection: FeatureCollection = serde_json::from_str(&content)?;
            let expected = collection.features.len();
            let progress = DefaultProgressListener::new();

            let inserted = repo.working_tree().insert_all(
                &collection.path,
                collection.features,
                &collection.feature_type,
                &progress,
                expected,
            )?;
            println!("Imported {} feature(s) into {}", inserted.len(), collection.path);
        }
        Commands::Delete { paths } => {
            let removed = repo.working_tree().delete_all(paths.iter().map(String::as_str))?;
            println!("Deleted {removed} node(s)");
        }
        Commands::Add { paths } => {
            repo.command(AddOp::new(paths).progress(Arc::new(DefaultProgressListener::new())))
                .await?;
        }
        Commands::Remove { paths } => {
            for path in repo.command(RemoveOp::new(paths)).await? {
                println!("rm '{path}'");
            }
        }
        Commands::Commit {
            message,
            all,
            allow_empty,
            author,
        } => {
            let mut op = CommitOp::new(message).all(all).allow_empty(allow_empty);
            if let Some(author) = author {
                let (name, email) = parse_identity(&author)?;
                op = op.author(name, email);
            }

            let (id, commit) = repo.command(op).await?;
            let branch = current_branch(repo)?.unwrap_or_else(|| "detached HEAD".to_string());
            println!("[{branch} {}] {}", id.to_short_oid(), commit.short_message());
        }
        Commands::Status { paths, limit } => print_status(repo, paths, limit).await?,
        Commands::Log {
            revision,
            max_count,
            oneline,
            paths,
        } => {
            let mut op = LogOp::default().start(revision).paths(paths);
            if let Some(max_count) = max_count {
                op = op.limit(max_count);
            }

            for (id, commit) in repo.command(op).await? {
                print_commit(&id, &commit, oneline);
            }
        }
        Commands::Branch {
            name,
            start,
            delete,
            force,
        } => match name {
            None => {
                for branch in repo.command(BranchListOp).await? {
                    let marker = if branch.current { "*" } else { " " };
                    let name = if branch.current { branch.name.green().to_string() } else { branch.name };
                    println!("{marker} {name} {}", branch.commit.to_short_oid());
                }
            }
            Some(name) if delete => {
                let id = repo.command(BranchDeleteOp::new(name.as_str()).force(force)).await?;
                println!("Deleted branch {name} (was {}).", id.to_short_oid());
            }
            Some(name) => {
                let mut op = BranchCreateOp::new(name).force(force);
                if let Some(start) = start {
                    op = op.source(start);
                }
                let branch = repo.command(op).await?;
                println!("Created branch {} at {}", branch.name, branch.commit.to_short_oid());
            }
        },
        Commands::Checkout { target, force } => {
            match repo.command(CheckoutOp::new(target).force(force)).await? {
                (CheckoutTarget::Branch(name), _) => println!("Switched to branch '{}'", short_ref(&name)),
                (CheckoutTarget::Detached(id), _) => println!("HEAD is now at {}", id.to_short_oid()),
            }
        }
        Commands::Tag {
            name,
            commit,
            message,
            delete,
        } => match name {
            None => {
                for (name, _) in repo.command(TagListOp).await? {
                    println!("{name}");
                }
            }
            Some(name) if delete => {
                let id = repo.command(TagRemoveOp::new(name.as_str())).await?;
                println!("Deleted tag '{name}' (was {})", id.to_short_oid());
            }
            Some(name) => {
                let mut op = TagCreateOp::new(name);
                if let Some(commit) = commit {
                    op = op.commit(commit);
                }
                if let Some(message) = message {
                    op = op.message(message);
                }
                let (_, tag) = repo.command(op).await?;
                println!("Tagged {} as {}", tag.target().to_short_oid(), tag.name());
            }
        },
        Commands::Merge { commit, message } => {
            let mut op = MergeOp::new(commit).progress(Arc::new(DefaultProgressListener::new()));
            if let Some(message) = message {
                op = op.message(message);
            }

            match repo.command(op).await? {
                MergeOutcome::UpToDate => println!("Already up to date."),
                MergeOutcome::FastForward(id) => println!("Fast-forward to {}", id.to_short_oid()),
                MergeOutcome::Merged(id) => println!("Merge made, commit {}", id.to_short_oid()),
                MergeOutcome::Conflicted(conflicts) => {
                    for conflict in &conflicts {
                        println!("CONFLICT: {}", conflict.path());
                    }
                    println!("Automatic merge failed; fix conflicts, then add and commit the result.");
                    std::process::exit(1);
                }
            }
        }
        Commands::Reset { target, soft, hard } => {
            let mode = match (soft, hard) {
                (true, _) => ResetMode::Soft,
                (_, true) => ResetMode::Hard,
                _ => ResetMode::Mixed,
            };
            let id = repo.command(ResetOp::new(mode).target(target)).await?;
            println!("HEAD is now at {}", id.to_short_oid());
        }
        Commands::Diff {
            old,
            new,
            cached,
            name_status,
            paths,
        } => {
            let (default_old, default_new) = if cached { ("HEAD", "STAGE_HEAD") } else { ("STAGE_HEAD", "WORK_HEAD") };
            let old = old.unwrap_or_else(|| default_old.to_string());
            let new = new.unwrap_or_else(|| default_new.to_string());

            let walk = repo.run(DiffTree::new(old.as_str(), new.as_str()).filters(paths)).await?;
            for entry in walk {
                print_diff_entry(repo, &entry?, &old, &new, name_status).await?;
            }
        }
        Commands::FormatPatch {
            old,
            new,
            output,
            paths,
        } => {
            let patch = repo.run(CreatePatch::new(old, new).filters(paths)).await?;
            match output {
                Some(output) => {
                    patch.write_to(&output)?;
                    println!("Wrote {} change(s) to {}", patch.count(), output.display());
                }
                None => println!("{}", patch.to_json()?),
            }
        }
        Commands::Apply {
            file,
            reverse,
            partial,
            check,
        } => apply(repo, &file, reverse, partial, check).await?,
        Commands::Show { spec } => match repo.run(RevObjectParse::new(spec.as_str())).await? {
            Some((id, object)) => show(repo, &id, &object)?,
            None => anyhow::bail!("not a valid object name: '{spec}'"),
        },
    }

    Ok(())
}

async fn print_status(repo: &Repository, paths: Vec<String>, limit: usize) -> anyhow::Result<()> {
    let status = repo.command(StatusOp::default().filters(paths).limit(limit)).await?;

    match &status.branch {
        Some(branch) => println!("On branch {}", short_ref(branch)),
        None => println!(
            "HEAD detached at {}",
            status.head.map(|id| id.to_short_oid()).unwrap_or_default()
        ),
    }
    if status.head.is_none() {
        println!("\nNo commits yet");
    }
    if status.merging.is_some() {
        println!("\nYou have unmerged paths.");
    }

    let sections = [
        ("Changes to be committed:", &status.staged, status.count_staged, true),
        ("Changes not staged for commit:", &status.unstaged, status.count_unstaged, false),
    ];
    for (title, entries, count, staged) in sections {
        if count == 0 {
            continue;
        }
        println!("\n{title}");
        for entry in entries {
            let label = change_label(entry.change_type());
            let label = if staged { label.green() } else { label.red() };
            println!("\t{label}{}", entry.path());
        }
        if count > entries.len() {
            println!("\t... and {} more", count - entries.len());
        }
    }

    if status.count_conflicted > 0 {
        println!("\nUnmerged paths:");
        for conflict in &status.conflicts {
            println!("\t{}{}", "both modified: ".red(), conflict.path());
        }
    }

    if status.is_clean() {
        println!("nothing to commit, working tree clean");
    }
    Ok(())
}

fn change_label(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Added => "added:    ",
        ChangeType::Removed => "removed:  ",
        ChangeType::Modified => "modified: ",
    }
}

fn print_commit(id: &ObjectId, commit: &Commit, oneline: bool) {
    if oneline {
        println!("{} {}", id.to_short_oid().yellow(), commit.short_message());
        return;
    }

    println!("{}", format!("commit {id}").yellow());
    if commit.parents().len() > 1 {
        let parents = commit.parents().iter().map(ObjectId::to_short_oid).collect::<Vec<_>>();
        println!("Merge: {}", parents.join(" "));
    }
    println!("Author: {}", commit.author().display_name());
    println!("Date:   {}", commit.author().readable_timestamp());
    println!();
    for line in commit.message().lines() {
        println!("    {line}");
    }
    println!();
}

async fn print_diff_entry(repo: &Repository, entry: &DiffEntry, old: &str, new: &str, name_status: bool) -> anyhow::Result<()> {
    println!("{entry}");
    if name_status || entry.is_tree() || entry.change_type() != ChangeType::Modified {
        return Ok(());
    }

    let path = entry.path();
    let diff = repo
        .run(DiffFeature::new(format!("{old}:{path}"), format!("{new}:{path}")))
        .await?;
    for change in diff.changes() {
        println!("    {}: {}", change.descriptor.name(), change.diff);
    }
    Ok(())
}

async fn apply(repo: &Repository, file: &Path, reverse: bool, partial: bool, check: bool) -> anyhow::Result<()> {
    let patch = Patch::read_from(file)?;

    if check {
        let results = repo.run(VerifyPatch::new(patch).reverse(reverse)).await?;
        if results.to_reject.is_empty() {
            println!("Patch applies cleanly ({} change(s))", results.to_apply.count());
            return Ok(());
        }
        print!("{}", results.to_reject);
        anyhow::bail!("{} change(s) would be rejected", results.to_reject.count());
    }

    let rejected = repo
        .command(ApplyPatchOp::new(patch).reverse(reverse).partial(partial))
        .await?;
    if !rejected.is_empty() {
        println!("Rejected:");
        print!("{rejected}");
    }
    Ok(())
}

fn show(repo: &Repository, id: &ObjectId, object: &RevObject) -> anyhow::Result<()> {
    match object {
        RevObject::Commit(commit) => print_commit(id, commit, false),
        RevObject::Tag(tag) => {
            println!("tag {}", tag.name());
            println!("Tagger: {}", tag.tagger().display_name());
            println!("\n{}\n", tag.message());
            println!("object {}", tag.target());
        }
        RevObject::Tree(_) => {
            let walk = DiffTreeWalk::new(repo.objects().clone(), RevTree::empty_id(), *id)?.report_trees(true);
            for entry in walk {
                if let Some(node) = entry?.new_ref() {
                    println!("{node}");
                }
            }
        }
        RevObject::Feature(feature) => {
            for value in feature.values() {
                match value {
                    Some(value) => println!("{value}"),
                    None => println!("NULL"),
                }
            }
        }
        RevObject::FeatureType(feature_type) => {
            println!("{}", feature_type.name());
            for descriptor in feature_type.descriptors() {
                println!("{}: {}", descriptor.name(), descriptor.value_type());
            }
        }
    }
    Ok(())
}

fn current_branch(repo: &Repository) -> anyhow::Result<Option<String>> {
    let head = repo.refs().final_name("HEAD")?;
    Ok(head.starts_with("refs/heads/").then(|| short_ref(&head).to_string()))
}

fn short_ref(name: &str) -> &str {
    name.strip_prefix("refs/heads/").unwrap_or(name)
}

/// Split `Name <email>`
fn parse_identity(identity: &str) -> anyhow::Result<(String, String)> {
    let (name, rest) = identity
        .split_once('<')
        .ok_or_else(|| anyhow::anyhow!("invalid identity '{identity}', expected 'Name <email>'"))?;
    let email = rest
        .strip_suffix('>')
        .ok_or_else(|| anyhow::anyhow!("invalid identity '{identity}', expected 'Name <email>'"))?;

    Ok((name.trim().to_string(), email.trim().to_string()))
}
