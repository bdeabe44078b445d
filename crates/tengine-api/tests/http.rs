use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;
use tengine_api::{ApiServer, ApiState};
use tengine_core::{CapabilityIndex, ProbeTimingModel, TransformRequest};
use tengine_dispatch::{ProbeTester, TransformService, TransformServiceDeps};
use tengine_exec::ProcessExecutor;
use tengine_fsops::{SharedFileStore, TempFileManager};
use tengine_telemetry::Metrics;
use tengine_test_support::{FakeTransformers, command_definition};
use tower::ServiceExt;

type TestResult = Result<(), Box<dyn Error>>;

const BOUNDARY: &str = "tengine-test-boundary";

struct TestApp {
    _fakes: FakeTransformers,
    _dirs: Vec<TempDir>,
    store: Arc<SharedFileStore>,
    router: Router,
}

fn app() -> Result<TestApp, Box<dyn Error>> {
    let fakes = FakeTransformers::install()?;
    let work = tempfile::tempdir()?;
    let store_dir = tempfile::tempdir()?;
    let store = Arc::new(SharedFileStore::new(store_dir.path())?);
    let index = CapabilityIndex::build(vec![
        command_definition("copier", fakes.copy(), &[("text/plain", "text/copy")], &[]),
        command_definition(
            "echo",
            fakes.echo_args(&["--pages={option:pageLimit}"]),
            &[("text/plain", "text/echo")],
            &["pageLimit"],
        ),
    ])?;
    let service = TransformService::new(TransformServiceDeps {
        index: Arc::new(index),
        temp: TempFileManager::new(work.path())?,
        store: store.clone(),
        executor: Arc::new(ProcessExecutor::new()),
        metrics: Metrics::new()?,
        default_timeout: Duration::from_secs(10),
    });
    let probes = Arc::new(ProbeTester::new(
        "test-engine",
        service.clone(),
        Arc::new(ProbeTimingModel::new(110, 5)),
        None,
    )?);
    let server = ApiServer::new(ApiState::new("test-engine", service, probes), 1024 * 1024);
    Ok(TestApp {
        _fakes: fakes,
        _dirs: vec![work, store_dir],
        store,
        router: server.router(),
    })
}

fn multipart_body(file: Option<(&str, &[u8])>, fields: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Result<Request<Body>, Box<dyn Error>> {
    Ok(Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?)
}

async fn send(
    router: &Router,
    request: Request<Body>,
) -> Result<(StatusCode, Response), Box<dyn Error>> {
    let response = router.clone().oneshot(request).await?;
    Ok((response.status(), response))
}

async fn body_bytes(response: Response) -> Result<Vec<u8>, Box<dyn Error>> {
    Ok(to_bytes(response.into_body(), usize::MAX).await?.to_vec())
}

async fn body_json(response: Response) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::from_slice(&body_bytes(response).await?)?)
}

#[tokio::test]
async fn multipart_upload_returns_the_artifact_as_an_attachment() -> TestResult {
    let app = app()?;
    let body = multipart_body(
        Some(("docs/quick brown.txt", b"fox")),
        &[
            ("sourceMimetype", "text/plain"),
            ("targetMimetype", "text/copy"),
            ("targetExtension", "out"),
        ],
    );
    let (status, response) = send(&app.router, multipart_request("/transform", body)?).await?;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_DISPOSITION),
        Some(&header::HeaderValue::from_static(
            "attachment; filename*=UTF-8''quick%20brown.out"
        ))
    );
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_bytes(response).await?, b"fox");
    Ok(())
}

#[tokio::test]
async fn multipart_without_supported_pair_is_a_bad_request() -> TestResult {
    let app = app()?;
    let body = multipart_body(
        Some(("a.txt", b"fox")),
        &[
            ("sourceMimetype", "text/plain"),
            ("targetMimetype", "image/png"),
            ("targetExtension", "png"),
        ],
    );
    let (status, response) = send(&app.router, multipart_request("/transform", body)?).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let problem = body_json(response).await?;
    assert_eq!(problem["status"], 400);
    assert_eq!(problem["detail"], "No transforms for: text/plain -> image/png");
    Ok(())
}

#[tokio::test]
async fn multipart_without_file_is_a_bad_request() -> TestResult {
    let app = app()?;
    let body = multipart_body(None, &[("sourceMimetype", "text/plain")]);
    let (status, response) = send(&app.router, multipart_request("/transform", body)?).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await?["detail"],
        "Required request part 'file' is not present"
    );
    Ok(())
}

#[tokio::test]
async fn json_request_mirrors_the_reply_status() -> TestResult {
    let app = app()?;
    let mut request = TransformRequest::new("json-1", "text/plain", "text/copy", "out");
    request.source_reference = Some(app.store.put_bytes(b"stored", "txt").await?);
    let http_request = Request::builder()
        .method("POST")
        .uri("/transform?timeout=5000")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&request)?))?;
    let (status, response) = send(&app.router, http_request).await?;

    assert_eq!(status, StatusCode::CREATED);
    let reply = body_json(response).await?;
    assert_eq!(reply["requestId"], "json-1");
    let reference = reply["targetReference"].as_str().ok_or("missing reference")?;
    assert_eq!(app.store.get_bytes(reference).await?, b"stored");
    Ok(())
}

#[tokio::test]
async fn json_request_failure_keeps_reply_body() -> TestResult {
    let app = app()?;
    let request = TransformRequest::new("json-2", "text/plain", "text/copy", "out");
    let http_request = Request::builder()
        .method("POST")
        .uri("/transform")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&request)?))?;
    let (status, response) = send(&app.router, http_request).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let reply = body_json(response).await?;
    assert_eq!(reply["status"], 400);
    assert_eq!(reply["errorDetails"], "source reference not supplied");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() -> TestResult {
    let app = app()?;
    let http_request = Request::builder()
        .method("POST")
        .uri("/transform")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{nope"))?;
    let (status, response) = send(&app.router, http_request).await?;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body_json(response).await?["detail"]
        .as_str()
        .unwrap_or_default()
        .to_owned();
    assert!(detail.starts_with("Failed to deserialize transform request"));
    Ok(())
}

#[tokio::test]
async fn test_endpoint_maps_numbered_options() -> TestResult {
    let app = app()?;
    let body = multipart_body(
        Some(("sample.txt", b"x")),
        &[
            ("sourceMimetype", "text/plain"),
            ("targetMimetype", "text/copy"),
            ("_targetMimetype", "text/echo"),
            ("targetExtension", "txt"),
            ("name0", "pageLimit"),
            ("value0", "3"),
        ],
    );
    let (status, response) = send(&app.router, multipart_request("/test", body)?).await?;

    assert_eq!(status, StatusCode::OK);
    let rendered = String::from_utf8(body_bytes(response).await?)?;
    assert!(rendered.lines().any(|line| line == "--pages=3"));
    Ok(())
}

#[tokio::test]
async fn capability_snapshot_lists_transformers() -> TestResult {
    let app = app()?;
    let request = Request::builder()
        .uri("/transform/config?configVersion=2")
        .body(Body::empty())?;
    let (status, response) = send(&app.router, request).await?;

    assert_eq!(status, StatusCode::OK);
    let descriptor = body_json(response).await?;
    assert_eq!(descriptor["engineName"], "test-engine");
    let names: Vec<&str> = descriptor["transformers"]
        .as_array()
        .ok_or("transformers missing")?
        .iter()
        .filter_map(|transformer| transformer["name"].as_str())
        .collect();
    assert_eq!(names, vec!["copier", "echo"]);
    Ok(())
}

#[tokio::test]
async fn probes_version_and_metrics_are_served() -> TestResult {
    let app = app()?;

    for uri in ["/live", "/ready"] {
        let request = Request::builder().uri(uri).body(Body::empty())?;
        let (status, response) = send(&app.router, request).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body_bytes(response).await?, b"Success - No transform");
    }

    let request = Request::builder().uri("/version").body(Body::empty())?;
    let (_, response) = send(&app.router, request).await?;
    let version = String::from_utf8(body_bytes(response).await?)?;
    assert!(version.starts_with("test-engine "));
    assert!(version.ends_with(" available"));

    let request = Request::builder().uri("/metrics").body(Body::empty())?;
    let (status, response) = send(&app.router, request).await?;
    assert_eq!(status, StatusCode::OK);
    let rendered = String::from_utf8(body_bytes(response).await?)?;
    assert!(rendered.contains("http_requests_total"));
    assert!(rendered.contains(r#"outcome="healthy""#));
    assert!(rendered.contains(r#"outcome="served""#));
    Ok(())
}
