//! Archive IIIF proxy - authorizing image access to legacy building-dossier archives.
//!
//! This binary runs the HTTP proxy, the zip job worker, or signs tokens.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use archive_iiif_proxy::{
    access::{AccessEngine, AccessPolicy},
    bulk::{
        create_s3_client, create_sqs_client, HttpMailer, JobQueue, JobSubmitter, Mailer,
        ObjectStore, RetryPolicy, S3ObjectStore, SqsJobQueue, ZipSettings, ZipWorker,
    },
    config::{
        Cli, Command, MailArgs, ServeConfig, StorageArgs, TokenConfig, TokenKind, UpstreamArgs,
        WorkerConfig,
    },
    fetch::{build_http_client, FileEndpoints, FilePipeline, HttpFileSource},
    metadata::{HttpMetadataSource, MetadataResolver},
    server::{create_router, AppState, RouterConfig, TokenAuth},
    service::ArchiveService,
    transform::ImageTransformer,
};

type HttpArchiveService = ArchiveService<HttpMetadataSource, HttpFileSource>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Worker(config) => run_worker(config).await,
        Command::Token(config) => run_token(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let policy = config.access.policy();
    let service = match build_service(&config.upstream, &policy) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to build upstream clients: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Configuration:");
    info!("  Metadata service: {}", config.upstream.metadata_url);
    info!("  edepot files: {}", config.upstream.edepot_url);
    info!("  wabo files: {}", config.upstream.wabo_url);

    let auth = TokenAuth::new(
        config.staff_secret_or_empty(),
        config.mail_secret_or_empty(),
        policy,
    );
    let mut state = AppState::new(service, auth)
        .with_login_origins(config.login_origins.clone())
        .with_mail_token_ttl(config.mail_token_ttl());

    match build_bulk(&config.storage).await {
        Some((queue, store)) => {
            info!("  Zip jobs: enabled");
            state = state.with_submitter(JobSubmitter::new(queue, store));
        }
        None => warn!("  Zip jobs: DISABLED - set APX_S3_BUCKET and APX_QUEUE_URL to enable"),
    }

    match build_mailer(&config.mail, &config.upstream) {
        Ok(Some(mailer)) => {
            info!("  Login links: enabled");
            state = state.with_mailer(mailer);
        }
        Ok(None) => warn!("  Login links: DISABLED - set APX_MAIL_ENDPOINT to enable"),
        Err(e) => {
            error!("Failed to build mail client: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let router = create_router(state, build_router_config(&config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server listening on: http://{}", addr);

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Worker Command
// =============================================================================

async fn run_worker(config: WorkerConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let policy = config.access.policy();
    let service = match build_service(&config.upstream, &policy) {
        Ok(service) => service,
        Err(e) => {
            error!("Failed to build upstream clients: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let Some((queue, store)) = build_bulk(&config.storage).await else {
        error!("Configuration error: S3 bucket and queue URL are required");
        return ExitCode::FAILURE;
    };

    let mailer = match build_mailer(&config.mail, &config.upstream) {
        Ok(Some(mailer)) => mailer,
        Ok(None) => {
            error!("Configuration error: mail endpoint is required");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!("Failed to build mail client: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let worker = ZipWorker::new(Arc::new(service), queue, store, mailer)
        .with_retry_policy(RetryPolicy {
            max_attempts: config.max_attempts,
        })
        .with_settings(ZipSettings {
            archive_prefix: config.archive_prefix.clone(),
            link_expiry: config.link_expiry(),
            ..ZipSettings::default()
        });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing current job");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    ExitCode::SUCCESS
}

// =============================================================================
// Token Command
// =============================================================================

fn run_token(config: TokenConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let auth = TokenAuth::new(
        config.staff_secret.as_deref().unwrap_or(""),
        config.mail_secret.as_deref().unwrap_or(""),
        AccessPolicy::default(),
    );

    let token = match config.kind {
        TokenKind::Staff => {
            auth.sign_staff_token(&config.scopes, config.subject.as_deref(), config.ttl())
        }
        TokenKind::Mail => {
            auth.issue_mail_token(config.subject.as_deref().unwrap_or(""), config.ttl())
        }
    };

    println!("{}", token);
    ExitCode::SUCCESS
}

// =============================================================================
// Wiring
// =============================================================================

fn build_service(
    upstream: &UpstreamArgs,
    policy: &AccessPolicy,
) -> Result<HttpArchiveService, reqwest::Error> {
    let client = build_http_client(upstream.connect_timeout(), upstream.request_timeout())?;

    let mut metadata_source = HttpMetadataSource::new(client.clone(), &upstream.metadata_url);
    if let Some(ref key) = upstream.metadata_api_key {
        metadata_source = metadata_source.with_api_key(key);
    }

    let mut file_source = HttpFileSource::new(client);
    if let (Some(user), Some(pass)) = (&upstream.wabo_username, &upstream.wabo_password) {
        file_source = file_source.with_basic_auth(&upstream.wabo_url, user, pass);
    }

    Ok(ArchiveService::new(
        MetadataResolver::new(metadata_source, policy.clone()),
        AccessEngine::new(policy.clone()),
        FilePipeline::new(
            file_source,
            FileEndpoints::new(&upstream.edepot_url, &upstream.wabo_url),
        ),
        ImageTransformer::new(upstream.jpeg_quality),
    ))
}

async fn build_bulk(storage: &StorageArgs) -> Option<(Arc<dyn JobQueue>, Arc<dyn ObjectStore>)> {
    let (bucket, queue_url) = storage.bulk_target()?;

    let s3 = create_s3_client(storage.s3_endpoint.as_deref(), &storage.s3_region).await;
    let sqs = create_sqs_client(storage.queue_endpoint.as_deref(), &storage.s3_region).await;

    info!("  S3 bucket: {}", bucket);
    info!("  Queue: {}", queue_url);

    let store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::new(s3, bucket));
    let queue: Arc<dyn JobQueue> = Arc::new(SqsJobQueue::new(sqs, queue_url));
    Some((queue, store))
}

fn build_mailer(
    mail: &MailArgs,
    upstream: &UpstreamArgs,
) -> Result<Option<Arc<dyn Mailer>>, reqwest::Error> {
    let Some(endpoint) = mail.mail_endpoint.as_deref().filter(|e| !e.is_empty()) else {
        return Ok(None);
    };

    let client = build_http_client(upstream.connect_timeout(), upstream.request_timeout())?;
    let mut mailer = HttpMailer::new(client, endpoint);
    if let Some(ref key) = mail.mail_api_key {
        mailer = mailer.with_api_key(key);
    }
    Ok(Some(Arc::new(mailer)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "archive_iiif_proxy=debug,tower_http=debug"
    } else {
        "archive_iiif_proxy=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
