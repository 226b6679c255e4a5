use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, FeedState, GalleryClient, ImageFile, LoadMore, LogNotifier, Settlement,
    SubmitOutcome,
};
use shared::protocol::ImageRecord;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Overrides `api_url` from gallery.toml / the environment.
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    upload_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prints the feed, following the cursor for up to `pages` pages.
    Feed {
        #[arg(long, default_value_t = 1)]
        pages: usize,
        #[arg(long)]
        json: bool,
    },
    /// Uploads an image and registers it in the collection.
    Submit {
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(upload_url) = cli.upload_url {
        settings.upload_url = upload_url;
    }
    let client = GalleryClient::from_settings(&settings)?;

    match cli.command {
        Command::Feed { pages, json } => print_feed(&client, pages.max(1), json).await,
        Command::Submit {
            file,
            title,
            description,
        } => submit(&client, file, title, description).await,
    }
}

async fn print_feed(client: &GalleryClient, pages: usize, json: bool) -> Result<()> {
    let mut feed = client.feed();
    feed.mount().await;

    for _ in 1..pages {
        match feed.load_more().await {
            LoadMore::Appended { .. } | LoadMore::Restarted => {}
            LoadMore::Ignored | LoadMore::Failed => break,
        }
    }

    if let FeedState::Error { error, .. } = feed.state() {
        if feed.view().is_empty() {
            bail!("{error}");
        }
        eprintln!("warning: {error}; showing the pages fetched so far");
    }

    if json {
        println!("{}", serde_json::to_string_pretty(feed.view())?);
    } else {
        for record in feed.view() {
            print_record(record);
        }
    }
    if feed.has_next_page() {
        println!("(more images available; pass --pages {} to load them)", pages + 1);
    }
    Ok(())
}

fn print_record(record: &ImageRecord) {
    println!(
        "{}  {}  {}  {}  {}",
        record.id,
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.title,
        record.description,
        record.url
    );
}

async fn submit(
    client: &GalleryClient,
    file: PathBuf,
    title: String,
    description: String,
) -> Result<()> {
    let file = ImageFile::from_path(&file).await?;
    let form = client.submission_form(Arc::new(LogNotifier));
    form.select_file(Some(file)).await;
    form.set_title(title).await;
    form.set_description(description).await;

    let mut progress = form.subscribe_progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = *progress.borrow_and_update();
            tracing::debug!(percent = current.percent(), "upload progress");
        }
    });

    let outcome = form.submit().await;
    reporter.abort();

    match outcome {
        SubmitOutcome::Settled(Settlement::Success(record)) => {
            println!("created image id={} url={}", record.id, record.url);
            Ok(())
        }
        SubmitOutcome::Settled(Settlement::Failure(err)) => bail!("{err}"),
        SubmitOutcome::Rejected(errors) => bail!("invalid input: {errors}"),
        SubmitOutcome::Ignored | SubmitOutcome::Abandoned => {
            bail!("submission did not run to completion")
        }
    }
}
