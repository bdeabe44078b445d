use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tengine_core::{CapabilityIndex, TransformDefinition, TransformRequest};
use tengine_dispatch::{
    DispatchRequest, TRANSPORT_HTTP, TRANSPORT_QUEUE, TransformService, TransformServiceDeps,
};
use tengine_exec::ProcessExecutor;
use tengine_fsops::{SharedFileStore, TempFileManager};
use tengine_telemetry::Metrics;
use tengine_test_support::{
    FAILURE_STDERR, FakeTransformers, command_definition, pipeline_definition,
};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    _fakes: FakeTransformers,
    work: TempDir,
    store: Arc<SharedFileStore>,
    _store_dir: TempDir,
    service: TransformService,
}

impl Harness {
    fn new(
        build: impl FnOnce(&FakeTransformers) -> Vec<TransformDefinition>,
    ) -> Result<Self, Box<dyn Error>> {
        let fakes = FakeTransformers::install()?;
        let work = tempfile::tempdir()?;
        let store_dir = tempfile::tempdir()?;
        let store = Arc::new(SharedFileStore::new(store_dir.path())?);
        let index = CapabilityIndex::build(build(&fakes))?;
        let service = TransformService::new(TransformServiceDeps {
            index: Arc::new(index),
            temp: TempFileManager::new(work.path())?,
            store: store.clone(),
            executor: Arc::new(ProcessExecutor::new()),
            metrics: Metrics::new()?,
            default_timeout: Duration::from_secs(10),
        });
        Ok(Self {
            _fakes: fakes,
            work,
            store,
            _store_dir: store_dir,
            service,
        })
    }

    fn leftover_files(&self) -> Result<usize, Box<dyn Error>> {
        count_entries(self.work.path())
    }
}

fn count_entries(dir: &Path) -> Result<usize, Box<dyn Error>> {
    Ok(std::fs::read_dir(dir)?.count())
}

fn text_to_copy(fakes: &FakeTransformers) -> Vec<TransformDefinition> {
    vec![
        command_definition("copier", fakes.copy(), &[("text/plain", "text/copy")], &["pageLimit"]),
        command_definition("broken", fakes.failing(), &[("text/plain", "text/broken")], &[]),
        command_definition("silent", fakes.silent(), &[("text/plain", "text/silent")], &[]),
        command_definition("slow", fakes.slow(), &[("text/plain", "text/slow")], &[]),
        command_definition("crash", fakes.crashing(), &[("text/plain", "text/crash")], &[]),
    ]
}

fn upload(target: &str, bytes: &[u8]) -> DispatchRequest {
    DispatchRequest::upload(
        TransformRequest::new("req-1", "text/plain", target, "out"),
        Some("reports/quarterly.txt".into()),
        bytes.to_vec(),
        TRANSPORT_HTTP,
    )
}

#[tokio::test]
async fn upload_is_transformed_and_returned_inline() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let outcome = harness.service.dispatch(upload("text/copy", b"hello")).await;

    assert_eq!(outcome.reply.status, 201);
    assert_eq!(outcome.reply.request_id, "req-1");
    let artifact = outcome.artifact.ok_or("missing artifact")?;
    assert_eq!(artifact.bytes, b"hello");
    assert_eq!(artifact.filename, "quarterly.out");
    assert_eq!(artifact.media_type, "text/copy");
    assert_eq!(harness.leftover_files()?, 0);
    assert_eq!(harness.service.metrics().transform_count("http", 201), 1);
    Ok(())
}

#[tokio::test]
async fn test_delay_holds_the_reply_but_not_the_recorded_duration() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = upload("text/copy", b"hello");
    request.request.options.insert("testDelay".into(), "700".into());

    let started = Instant::now();
    let outcome = harness.service.dispatch(request).await;
    let wall = started.elapsed();

    assert_eq!(outcome.reply.status, 201);
    assert!(wall >= Duration::from_millis(700), "wall time {wall:?}");
    assert!(
        outcome.elapsed < Duration::from_millis(700),
        "recorded {:?}",
        outcome.elapsed
    );
    Ok(())
}

#[tokio::test]
async fn test_delay_is_ignored_outside_http() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = TransformRequest::new("req-q", "text/plain", "text/copy", "out");
    request.options.insert("testDelay".into(), "5000".into());

    let started = Instant::now();
    let outcome = harness
        .service
        .dispatch(DispatchRequest::upload(request, None, b"hi".to_vec(), TRANSPORT_QUEUE))
        .await;

    assert_eq!(outcome.reply.status, 201);
    assert!(started.elapsed() < Duration::from_secs(5));
    Ok(())
}

#[tokio::test]
async fn unsupported_pair_is_rejected_without_running_anything() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let outcome = harness.service.dispatch(upload("image/png", b"x")).await;

    assert_eq!(outcome.reply.status, 400);
    assert_eq!(
        outcome.reply.error_details.as_deref(),
        Some("No transforms for: text/plain -> image/png")
    );
    assert!(outcome.artifact.is_none());
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}

#[tokio::test]
async fn unknown_option_blocks_the_match() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = upload("text/copy", b"x");
    request.request.options.insert("colour".into(), "red".into());
    let outcome = harness.service.dispatch(request).await;

    assert_eq!(outcome.reply.status, 400);
    assert_eq!(
        outcome.reply.error_details.as_deref(),
        Some("Unsupported transform options for: text/plain -> text/copy: colour")
    );
    Ok(())
}

#[tokio::test]
async fn reserved_options_do_not_block_the_match() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = upload("text/copy", b"x");
    request.request.options.insert("timeout".into(), "5000".into());
    request.request.options.insert("targetMimetype".into(), "text/copy".into());
    let outcome = harness.service.dispatch(request).await;
    assert_eq!(outcome.reply.status, 201);
    Ok(())
}

#[tokio::test]
async fn missing_target_extension_is_reported_by_name() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = upload("text/copy", b"x");
    request.request.target_extension.clear();
    let outcome = harness.service.dispatch(request).await;

    assert_eq!(outcome.reply.status, 400);
    assert_eq!(
        outcome.reply.error_details.as_deref(),
        Some("Request parameter 'targetExtension' is missing")
    );
    Ok(())
}

#[tokio::test]
async fn non_zero_exit_is_a_bad_request_carrying_stderr() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let outcome = harness.service.dispatch(upload("text/broken", b"x")).await;

    assert_eq!(outcome.reply.status, 400);
    let details = outcome.reply.error_details.unwrap_or_default();
    assert!(details.starts_with("Transformer exit code was not 0"));
    assert!(details.contains(FAILURE_STDERR));
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}

#[tokio::test]
async fn clean_exit_without_output_is_an_internal_error() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let outcome = harness.service.dispatch(upload("text/silent", b"x")).await;

    assert_eq!(outcome.reply.status, 500);
    assert_eq!(
        outcome.reply.error_details.as_deref(),
        Some("Transformer failed to create an output file")
    );
    Ok(())
}

#[tokio::test]
async fn killed_transformer_is_an_internal_error() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let outcome = harness.service.dispatch(upload("text/crash", b"x")).await;
    assert_eq!(outcome.reply.status, 500);
    assert!(
        outcome
            .reply
            .error_details
            .unwrap_or_default()
            .starts_with("Transformer terminated abnormally")
    );
    Ok(())
}

#[tokio::test]
async fn timeout_option_takes_precedence_and_kills_the_process() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = upload("text/slow", b"x").with_timeout(Some(Duration::from_secs(20)));
    request.request.options.insert("timeout".into(), "200".into());
    let outcome = harness.service.dispatch(request).await;

    assert_eq!(outcome.reply.status, 500);
    assert_eq!(
        outcome.reply.error_details.as_deref(),
        Some("Transformer slow exceeded time limit of 200ms")
    );
    assert!(outcome.elapsed < Duration::from_secs(10));
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}

#[tokio::test]
async fn pipeline_chains_steps_and_releases_intermediates() -> TestResult {
    let harness = Harness::new(|fakes| {
        vec![
            command_definition("first", fakes.copy(), &[("text/plain", "text/middle")], &[]),
            command_definition(
                "second",
                fakes.echo_args(&["--pages={option:pageLimit}"]),
                &[("text/middle", "text/final")],
                &["pageLimit"],
            ),
            pipeline_definition(
                "chain",
                ("text/plain", "text/final"),
                &[("first", Some("text/middle")), ("second", None)],
            ),
        ]
    })?;
    let mut request = upload("text/final", b"body");
    request.request.options.insert("pageLimit".into(), "3".into());
    let outcome = harness.service.dispatch(request).await;

    assert_eq!(outcome.reply.status, 201, "{:?}", outcome.reply.error_details);
    let artifact = outcome.artifact.ok_or("missing artifact")?;
    let rendered = String::from_utf8(artifact.bytes)?;
    assert!(rendered.lines().any(|line| line == "--pages=3"));
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}

#[tokio::test]
async fn store_backed_request_returns_a_target_reference() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let source_reference = harness.store.put_bytes(b"stored body", "txt").await?;
    let mut request = TransformRequest::new("req-9", "text/plain", "text/copy", "out");
    request.source_reference = Some(source_reference);
    request.client_data = Some("tag".into());

    let reply = harness.service.handle(request, None, "queue").await;

    assert_eq!(reply.status, 201);
    assert_eq!(reply.client_data.as_deref(), Some("tag"));
    let target_reference = reply.target_reference.ok_or("missing target reference")?;
    assert_eq!(harness.store.get_bytes(&target_reference).await?, b"stored body");
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}

#[tokio::test]
async fn store_backed_request_without_reference_is_rejected() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let request = TransformRequest::new("req-10", "text/plain", "text/copy", "out");
    let reply = harness.service.handle(request, None, "queue").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.error_details.as_deref(), Some("source reference not supplied"));
    Ok(())
}

#[tokio::test]
async fn unknown_store_reference_is_rejected() -> TestResult {
    let harness = Harness::new(text_to_copy)?;
    let mut request = TransformRequest::new("req-11", "text/plain", "text/copy", "out");
    request.source_reference = Some("does-not-exist.txt".into());
    let reply = harness.service.handle(request, None, "queue").await;

    assert_eq!(reply.status, 400);
    assert_eq!(reply.error_details.as_deref(), Some("source reference not found"));
    assert_eq!(harness.leftover_files()?, 0);
    Ok(())
}
