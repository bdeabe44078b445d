use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tengine_config::ProbeTestConfig;
use tengine_core::{CapabilityIndex, ProbeTimingModel, TransformOptions};
use tengine_dispatch::{ProbeKind, ProbeTester, TransformService, TransformServiceDeps};
use tengine_exec::ProcessExecutor;
use tengine_fsops::{SharedFileStore, TempFileManager};
use tengine_telemetry::Metrics;
use tengine_test_support::{FakeTransformers, command_definition};

type TestResult = Result<(), Box<dyn Error>>;

const FIXTURE: &[u8] = b"probe fixture body";

struct Setup {
    _fakes: FakeTransformers,
    _dirs: Vec<TempDir>,
    service: TransformService,
    fixture: ProbeTestConfig,
}

fn setup(target_media_type: &str) -> Result<Setup, Box<dyn Error>> {
    let fakes = FakeTransformers::install()?;
    let work = tempfile::tempdir()?;
    let store = tempfile::tempdir()?;
    let fixtures = tempfile::tempdir()?;
    let source_file = fixtures.path().join("probe.txt");
    std::fs::write(&source_file, FIXTURE)?;

    let index = CapabilityIndex::build(vec![
        command_definition("copier", fakes.copy(), &[("text/plain", "text/copy")], &[]),
        command_definition("broken", fakes.failing(), &[("text/plain", "text/broken")], &[]),
    ])?;
    let service = TransformService::new(TransformServiceDeps {
        index: Arc::new(index),
        temp: TempFileManager::new(work.path())?,
        store: Arc::new(SharedFileStore::new(store.path())?),
        executor: Arc::new(ProcessExecutor::new()),
        metrics: Metrics::new()?,
        default_timeout: Duration::from_secs(10),
    });
    let fixture = ProbeTestConfig {
        source_file,
        source_media_type: "text/plain".into(),
        target_media_type: target_media_type.into(),
        target_extension: "out".into(),
        options: TransformOptions::new(),
        expected_length: FIXTURE.len() as u64,
        plus_or_minus: 0,
        max_transforms: 0,
        max_transform_seconds: 0,
        liveness_period_seconds: 3600,
    };
    Ok(Setup {
        _fakes: fakes,
        _dirs: vec![work, store, fixtures],
        service,
        fixture,
    })
}

fn model() -> Arc<ProbeTimingModel> {
    Arc::new(ProbeTimingModel::new(110, 5))
}

#[tokio::test]
async fn probes_without_fixture_pass_without_transforming() -> TestResult {
    let setup = setup("text/copy")?;
    let tester = ProbeTester::new("engine", setup.service, model(), None)?;
    let outcome = tester.check(ProbeKind::Live).await;
    assert!(outcome.healthy);
    assert_eq!(outcome.message, "Success - No transform");
    Ok(())
}

#[tokio::test]
async fn readiness_transforms_once_then_answers_from_cache() -> TestResult {
    let setup = setup("text/copy")?;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(setup.fixture))?;

    let first = tester.check(ProbeKind::Ready).await;
    assert!(first.healthy, "{}", first.message);
    assert!(first.message.starts_with("Success - engine "));
    assert!(first.message.ends_with("ms"));

    let second = tester.check(ProbeKind::Ready).await;
    assert!(second.healthy);
    assert_eq!(second.message, "Success - No transform");
    assert_eq!(tester.model().snapshot().sample_count, 0);
    Ok(())
}

#[tokio::test]
async fn liveness_skips_work_inside_the_period() -> TestResult {
    let setup = setup("text/copy")?;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(setup.fixture))?;

    assert!(tester.check(ProbeKind::Live).await.message.starts_with("Success - engine"));
    assert_eq!(
        tester.check(ProbeKind::Live).await.message,
        "Success - No transform"
    );
    Ok(())
}

#[tokio::test]
async fn failing_liveness_is_sticky() -> TestResult {
    let setup = setup("text/broken")?;
    let mut fixture = setup.fixture;
    fixture.liveness_period_seconds = 0;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(fixture))?;

    let first = tester.check(ProbeKind::Live).await;
    assert!(!first.healthy);
    assert!(first.message.starts_with("Failed - Transformer exit code was not 0"));

    let second = tester.check(ProbeKind::Live).await;
    assert!(!second.healthy);
    assert_eq!(second.message, first.message);
    Ok(())
}

#[tokio::test]
async fn unexpected_output_length_fails_the_probe() -> TestResult {
    let setup = setup("text/copy")?;
    let mut fixture = setup.fixture;
    fixture.expected_length = 1000;
    fixture.plus_or_minus = 10;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(fixture))?;

    let outcome = tester.check(ProbeKind::Ready).await;
    assert!(!outcome.healthy);
    assert!(outcome.message.contains("outside the expected range"));
    Ok(())
}

#[tokio::test]
async fn failed_self_tests_leave_the_baseline_untouched() -> TestResult {
    let setup = setup("text/broken")?;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(setup.fixture))?;

    for _ in 0..6 {
        assert!(!tester.check(ProbeKind::Ready).await.healthy);
    }
    let baseline = tester.model().snapshot();
    assert_eq!(baseline.sample_count, 0);
    assert!(!baseline.cold_start_discarded);
    assert!(!baseline.warmed_up);
    Ok(())
}

#[tokio::test]
async fn wrong_length_outputs_leave_the_baseline_untouched() -> TestResult {
    let setup = setup("text/copy")?;
    let mut fixture = setup.fixture;
    fixture.expected_length = 1000;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(fixture))?;

    for _ in 0..3 {
        assert!(!tester.check(ProbeKind::Ready).await.healthy);
    }
    assert!(!tester.model().snapshot().cold_start_discarded);
    Ok(())
}

#[tokio::test]
async fn liveness_dies_after_max_transforms() -> TestResult {
    let setup = setup("text/copy")?;
    let mut fixture = setup.fixture;
    fixture.max_transforms = 1;
    fixture.liveness_period_seconds = 0;
    let tester = ProbeTester::new("engine", setup.service, model(), Some(fixture))?;

    assert!(tester.check(ProbeKind::Live).await.healthy);
    let outcome = tester.check(ProbeKind::Live).await;
    assert!(!outcome.healthy);
    assert!(outcome.message.contains("more than 1 transformations"));
    assert!(!tester.check(ProbeKind::Ready).await.healthy);
    Ok(())
}

#[tokio::test]
async fn unreadable_fixture_is_a_construction_error() -> TestResult {
    let setup = setup("text/copy")?;
    let mut fixture = setup.fixture;
    fixture.source_file = fixture.source_file.with_file_name("missing.txt");
    assert!(ProbeTester::new("engine", setup.service, model(), Some(fixture)).is_err());
    Ok(())
}
