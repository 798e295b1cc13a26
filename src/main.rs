use std::{path::Path, process, sync::Arc};

use amberlink::{
    application::{
        error::AppError,
        pipeline::{ChunkPipeline, RequestHead},
        repos::{CacheSession, CacheStateStore},
    },
    config::{self, AnnotateArgs, QueueArgs},
    infra::{
        db::SqliteCacheStore,
        error::InfraError,
        stream::{WriterDownstream, reader_frames},
        telemetry,
    },
};
use tokio::io::{self as tokio_io, AsyncRead, AsyncWriteExt};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?report.messages, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?report.messages, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Annotate(AnnotateArgs::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Annotate(args) => run_annotate(settings, args).await,
        config::Command::Migrate => run_migrate(settings).await,
        config::Command::Queue(args) => run_queue(settings, args).await,
    }
}

async fn run_annotate(settings: config::Settings, args: AnnotateArgs) -> Result<(), AppError> {
    if args.chunk_size == 0 {
        return Err(AppError::validation("--chunk-size must be greater than zero"));
    }

    let behavior = settings.filter.resolve(&args.uri);
    let store: Arc<dyn CacheStateStore> = Arc::new(SqliteCacheStore::new(
        behavior.store_location.clone(),
        settings.database.create_if_missing,
    ));
    let pipeline = ChunkPipeline::new(store, behavior);

    let reader = open_input(args.file.as_deref()).await?;
    let upstream = reader_frames(reader, args.chunk_size);
    let mut downstream = WriterDownstream::new(tokio_io::stdout());
    let mut head = RequestHead::new(args.uri, Some(args.content_type));

    let summary = pipeline.run(&mut head, upstream, &mut downstream).await?;
    info!(
        mode = ?summary.mode,
        chunks = summary.chunks,
        links = summary.links_matched,
        annotated = summary.links_annotated,
        enqueued = summary.links_enqueued,
        degraded = summary.degraded_chunks,
        bytes = downstream.written(),
        "annotation finished"
    );

    if pipeline.config().cache_delivery {
        let content_type = head.content_type.as_deref().unwrap_or("application/octet-stream");
        let mut stderr = tokio_io::stderr();
        stderr
            .write_all(format!("Content-Type: {content_type}\n").as_bytes())
            .await
            .map_err(InfraError::from)?;
    }

    Ok(())
}

async fn open_input(file: Option<&Path>) -> Result<Box<dyn AsyncRead + Unpin + Send>, AppError> {
    match file {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(|err| {
                AppError::validation(format!("failed to open `{}`: {err}", path.display()))
            })?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio_io::stdin())),
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let store = SqliteCacheStore::new(
        settings.database.path.clone(),
        settings.database.create_if_missing,
    );
    store.run_migrations().await?;
    info!(database = %store.location(), "cache state schema is up to date");
    Ok(())
}

async fn run_queue(settings: config::Settings, args: QueueArgs) -> Result<(), AppError> {
    let store = SqliteCacheStore::new(settings.database.path.clone(), false);
    let mut session = store.open().await?;
    let entries = session.pending_queue(args.limit).await?;
    session.close().await?;

    let mut stdout = tokio_io::stdout();
    for entry in &entries {
        let mut line = serde_json::to_string(entry)
            .map_err(|err| AppError::unexpected(format!("failed to encode queue entry: {err}")))?;
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(InfraError::from)?;
    }
    stdout.flush().await.map_err(InfraError::from)?;

    info!(count = entries.len(), "listed pending queue entries");
    Ok(())
}
