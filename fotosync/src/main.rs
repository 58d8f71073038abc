use std::sync::Arc;

use anyhow::Context;
use fotosync::config::{ListingLocation, SyncConfig};
use fotosync::prompt::{AutoApprove, ConfirmationPrompt, TerminalPrompt};
use fotosync::sync::differ::{FsDirectory, InventoryDiffer};
use fotosync::sync::listing::{FileListingSource, HttpListingSource, RemoteListingSource};
use fotosync::sync::progress::JsonProgressStore;
use fotosync::sync::scheduler::BatchScheduler;
use fotosync::sync::session::{RecordStatus, SessionController, SessionOutcome, record_status};
use fotosync::sync::uploader::HttpUploader;
use fotosync_core::StorageClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    Rescan,
    Status,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CliOptions {
    mode: CliMode,
    assume_yes: bool,
    verbose: bool,
}

fn parse_cli<I>(args: I) -> anyhow::Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions {
        mode: CliMode::Run,
        assume_yes: false,
        verbose: false,
    };
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--rescan" => options.mode = CliMode::Rescan,
            "--status" => options.mode = CliMode::Status,
            "--yes" | "-y" => options.assume_yes = true,
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => options.mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(options)
}

fn print_help() {
    println!("Usage: fotosync [--yes] [--rescan] [--status] [--verbose]");
    println!("  --yes      Start uploading without asking");
    println!("  --rescan   Discard saved progress and diff the inventories again");
    println!("  --status   Show saved progress and exit");
    println!("  --verbose  Debug logging (RUST_LOG overrides)");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let options = parse_cli(std::env::args())?;
    if options.mode == CliMode::Help {
        print_help();
        return Ok(());
    }
    fotosync::logging::init(options.verbose)?;

    let config = SyncConfig::from_env()?;
    let store = Arc::new(JsonProgressStore::new(&config.progress_path));

    if options.mode == CliMode::Status {
        return print_status(store.as_ref(), &config).await;
    }

    let storage = config.require_storage()?;
    let mut client = StorageClient::with_timeout(
        &storage.base_url,
        storage.bucket.clone(),
        config.upload_timeout,
    )
    .context("invalid storage configuration")?;
    if let Some(token) = &storage.token {
        client = client.with_token(token.clone());
    }

    let listing: Box<dyn RemoteListingSource> = match &config.listing {
        ListingLocation::File(path) => Box::new(FileListingSource::new(path)),
        ListingLocation::Url(url) => Box::new(HttpListingSource::new(client.clone(), url)),
    };
    let differ = InventoryDiffer::new(listing, Box::new(FsDirectory::new(&config.local_dir)))
        .with_encoding(config.listing_encoding);
    let uploader = Arc::new(HttpUploader::new(
        client,
        &config.local_dir,
        config.remote_prefix.clone(),
        config.scheduler.batch_size,
    ));
    let scheduler = BatchScheduler::new(uploader, store.clone(), config.scheduler);
    let prompt: Arc<dyn ConfirmationPrompt> = if options.assume_yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalPrompt)
    };
    let mut controller = SessionController::new(store, differ, scheduler, prompt);
    if let Some(mirror) = &config.mirror_path {
        controller = controller.with_mirror(mirror);
    }

    let outcome = match options.mode {
        CliMode::Rescan => controller.rescan().await?,
        _ => controller.run().await?,
    };
    report(&outcome, &config);
    Ok(())
}

async fn print_status(store: &JsonProgressStore, config: &SyncConfig) -> anyhow::Result<()> {
    let status = record_status(store).await?;
    let path = config.progress_path.display();
    match status {
        RecordStatus::NeverScanned => println!("No saved progress at {path}; next run scans."),
        RecordStatus::Empty => println!("{path} exists but is empty; run with --rescan."),
        RecordStatus::Pending(count) => println!("{count} files pending in {path}."),
    }
    Ok(())
}

fn report(outcome: &SessionOutcome, config: &SyncConfig) {
    match outcome {
        SessionOutcome::Synced => println!("Everything is in sync, nothing to upload."),
        SessionOutcome::NothingPending => println!(
            "{} exists but is empty. Run with --rescan to scan again.",
            config.progress_path.display()
        ),
        SessionOutcome::Declined { pending } => println!(
            "Cancelled. {pending} pending files stay saved in {} for next time.",
            config.progress_path.display()
        ),
        SessionOutcome::Completed(summary) => {
            println!(
                "Done: {} files uploaded in {} batches.",
                summary.uploaded, summary.batches
            );
            if !summary.dead_lettered.is_empty() {
                println!("Gave up on {} files:", summary.dead_lettered.len());
                for file in &summary.dead_lettered {
                    println!("  - {file}");
                }
            }
        }
    }
}
