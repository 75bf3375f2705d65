/*!
 * Shard - content-addressed storage for large files
 *
 * CLI driver around the shard core:
 * - `init`, `track`, `status` manage the repository and tracked set
 * - `commit` chunks tracked files into the local object store and writes
 *   git-friendly `.shard.json` manifest sidecars
 * - `push`/`pull` synchronize blocks with a remote server, skipping
 *   whatever the peer already has
 * - `checkout` reconstructs a file from its sidecar
 * - `gc` reclaims blocks no present sidecar references
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Arg, ArgAction, ArgMatches, Command};
use chrono::Utc;

use shard::error::Result;
use shard::{gc, logging, sync};
use shard::{Index, LocalStore, RemoteClient, SyncConfig};

fn cli() -> Command {
    let remote_arg = Arg::new("remote")
        .long("remote")
        .value_name("URL")
        .help("Remote server URL")
        .required(true);

    Command::new("shard")
        .version(clap::crate_version!())
        .about("Content-addressed block storage with git-friendly manifests")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .help("Enable debug logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .value_name("LEVEL")
                .help("Log level: error, warn, info, debug, trace"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .global(true)
                .value_name("FILE")
                .help("Write JSON logs to a file instead of stderr"),
        )
        .arg(
            Arg::new("workers")
                .long("workers")
                .global(true)
                .value_name("COUNT")
                .value_parser(clap::value_parser!(usize))
                .help("Parallel block transfers (max 8, default 4)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .value_name("SECONDS")
                .value_parser(clap::value_parser!(u64))
                .help("Per-request timeout in seconds (default 30)"),
        )
        .arg(
            Arg::new("retry-attempts")
                .long("retry-attempts")
                .global(true)
                .value_name("COUNT")
                .value_parser(clap::value_parser!(u32))
                .help("Retries for transient remote failures (default 3)"),
        )
        .subcommand(Command::new("init").about("Initialize an empty shard repository in .shard/"))
        .subcommand(
            Command::new("track")
                .about("Start tracking a file")
                .arg(Arg::new("path").value_name("PATH").required(true)),
        )
        .subcommand(
            Command::new("untrack")
                .about("Stop tracking a file")
                .arg(Arg::new("path").value_name("PATH").required(true)),
        )
        .subcommand(Command::new("status").about("Show status of tracked files"))
        .subcommand(
            Command::new("commit")
                .about("Commit tracked files to the local store")
                .arg(
                    Arg::new("message")
                        .short('m')
                        .long("message")
                        .value_name("MSG")
                        .help("Commit message")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("checkout")
                .about("Restore a file from its manifest sidecar")
                .arg(Arg::new("sidecar").value_name("SIDECAR").required(true)),
        )
        .subcommand(
            Command::new("push")
                .about("Push committed files to a remote server")
                .arg(remote_arg.clone()),
        )
        .subcommand(
            Command::new("pull")
                .about("Fetch missing blocks for a manifest sidecar")
                .arg(Arg::new("sidecar").value_name("SIDECAR").required(true))
                .arg(remote_arg)
                .arg(
                    Arg::new("manifest")
                        .long("manifest")
                        .value_name("ID")
                        .help("Fetch this manifest from the remote into SIDECAR first"),
                ),
        )
        .subcommand(
            Command::new("diff")
                .about("Show block-level diff against the last commit")
                .arg(Arg::new("path").value_name("PATH").required(true)),
        )
        .subcommand(
            Command::new("gc")
                .about("Delete blocks no present sidecar references")
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .help("Report what would be freed without deleting")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("git-init").about("Configure git to ignore .shard/ but track manifests"),
        )
}

fn config_from(matches: &ArgMatches) -> Result<SyncConfig> {
    let mut config = SyncConfig::default();
    config.verbose = matches.get_flag("verbose");
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.log_level = level.parse()?;
    }
    if let Some(file) = matches.get_one::<String>("log-file") {
        config.log_file = Some(PathBuf::from(file));
    }
    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.workers = *workers;
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.timeout_secs = *timeout;
    }
    if let Some(attempts) = matches.get_one::<u32>("retry-attempts") {
        config.retry_attempts = *attempts;
    }
    Ok(config)
}

fn main() {
    let matches = cli().get_matches();

    let code = match config_from(&matches).and_then(|config| {
        logging::init_logging(&config)?;
        run(&matches, &config)
    }) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    process::exit(code);
}

fn run(matches: &ArgMatches, config: &SyncConfig) -> Result<i32> {
    let workspace = Path::new(".");
    let store = LocalStore::for_workspace(workspace);
    let index = Index::for_workspace(workspace);

    match matches.subcommand() {
        Some(("init", _)) => {
            store.init()?;
            println!("Initialized empty shard repository in .shard/");
            Ok(0)
        }
        Some(("track", sub)) => {
            let path = sub.get_one::<String>("path").expect("required");
            if !Path::new(path).exists() {
                eprintln!("Error: File {} not found.", path);
                return Ok(1);
            }
            if index.add(path)? {
                println!("Tracking {}", path);
            } else {
                println!("{} is already tracked", path);
            }
            Ok(0)
        }
        Some(("untrack", sub)) => {
            let path = sub.get_one::<String>("path").expect("required");
            if index.remove(path)? {
                println!("No longer tracking {}", path);
            } else {
                println!("{} is not tracked", path);
            }
            Ok(0)
        }
        Some(("status", _)) => {
            let tracked = index.load()?;
            if tracked.is_empty() {
                println!("No tracked files.");
                return Ok(0);
            }
            println!("Tracked files:");
            for path in &tracked {
                let flag = if !Path::new(path).exists() {
                    'D'
                } else if !sync::sidecar_path(Path::new(path)).exists() {
                    '?'
                } else {
                    // Presence check only; does not re-chunk
                    'M'
                };
                println!(" {} {}", flag, path);
            }
            Ok(0)
        }
        Some(("commit", sub)) => {
            let message = sub.get_one::<String>("message").expect("required");
            let tracked = index.load()?;
            if tracked.is_empty() {
                println!("Nothing to commit (no tracked files).");
                return Ok(0);
            }
            store.init()?;

            let mut meta = BTreeMap::new();
            meta.insert("message".to_string(), message.clone());
            meta.insert("committed_at".to_string(), Utc::now().to_rfc3339());

            for path in &tracked {
                let file = Path::new(path);
                if !file.exists() {
                    eprintln!("Warning: Tracked file {} missing, skipping.", path);
                    continue;
                }
                println!("Chunking {}...", path);
                let (manifest_id, sidecar) = sync::commit_file(&store, file, meta.clone())?;
                println!("Committed {} -> {}", path, manifest_id);
                println!("Updated manifest: {}", sidecar.display());
            }
            Ok(0)
        }
        Some(("checkout", sub)) => {
            let sidecar = PathBuf::from(sub.get_one::<String>("sidecar").expect("required"));
            let restored = sync::checkout(&store, &sidecar)?;
            println!("Restored {}", restored.display());
            Ok(0)
        }
        Some(("push", sub)) => {
            let remote = sub.get_one::<String>("remote").expect("required");
            let tracked = index.load()?;
            if tracked.is_empty() {
                println!("Nothing to push.");
                return Ok(0);
            }
            let client = RemoteClient::new(remote, config)?;
            let outcome = sync::push_tracked(&store, &client, &tracked, config)?;

            for file in &outcome.pushed {
                println!("Pushed {}", file);
            }
            for file in &outcome.skipped {
                println!("Skipped {} (no manifest found, commit first)", file);
            }
            for (file, e) in &outcome.failed {
                eprintln!("Failed to push {}: {}", file, e);
            }
            Ok(outcome.exit_code())
        }
        Some(("pull", sub)) => {
            let sidecar = PathBuf::from(sub.get_one::<String>("sidecar").expect("required"));
            let remote = sub.get_one::<String>("remote").expect("required");
            let client = RemoteClient::new(remote, config)?;

            if let Some(manifest_id) = sub.get_one::<String>("manifest") {
                println!("Fetching manifest {}...", manifest_id);
                sync::fetch_manifest(&store, &client, manifest_id, &sidecar)?;
            }

            let outcome = sync::pull_file(&store, &client, &sidecar, config)?;
            println!(
                "All blocks present ({} fetched, {} already local).",
                outcome.blocks_fetched, outcome.blocks_present
            );
            println!("Run `shard checkout {}` to restore the file.", sidecar.display());
            Ok(0)
        }
        Some(("diff", sub)) => {
            let path = Path::new(sub.get_one::<String>("path").expect("required"));
            if !path.exists() {
                eprintln!("File {} not found.", path.display());
                return Ok(1);
            }
            let report = sync::diff(path)?;
            println!("Diff for {}:", path.display());
            println!("  Old blocks: {}", report.old_blocks);
            println!("  New blocks: {}", report.new_blocks);
            println!("  Unchanged:  {}", report.unchanged);
            println!("  Added:      {}", report.added);
            println!("  Removed:    {}", report.removed);
            println!("  Change:     {:.1}%", report.change_percent());
            Ok(0)
        }
        Some(("gc", sub)) => {
            let dry_run = sub.get_flag("dry-run");
            let stats = gc::collect(&store, workspace, dry_run)?;
            if dry_run {
                println!(
                    "Would free {} bytes ({} objects).",
                    stats.bytes_freed, stats.objects_deleted
                );
            } else {
                println!(
                    "Freed {} bytes ({} objects).",
                    stats.bytes_freed, stats.objects_deleted
                );
            }
            Ok(0)
        }
        Some(("git-init", _)) => {
            git_init(workspace)?;
            println!("Updated .gitignore for shard.");
            Ok(0)
        }
        _ => unreachable!("subcommand required"),
    }
}

/// Ignore the object store but keep manifest sidecars tracked
fn git_init(workspace: &Path) -> Result<()> {
    use std::fs::OpenOptions;
    use std::io::Write;

    let path = workspace.join(".gitignore");
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(b"\n# Shard\n.shard/\n!*.shard.json\n")?;
    Ok(())
}
