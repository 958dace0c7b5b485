mod common;

use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{Call, FakeEngine, RecordingSurface};
use gantry::{
    bootstrap, engine_asset_reachable, load_state_from_path, BootConfig, BootstrapOptions,
    HttpTransport, RunState,
};
use hyper::header::CONTENT_LENGTH;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use tokio::sync::oneshot;
use url::Url;

#[derive(Default)]
struct Counters {
    head: AtomicUsize,
    get: AtomicUsize,
}

/// Scripted origin serving the given path/body pairs. Unknown paths 404,
/// paths under `/fail/` answer 500.
async fn start_origin(
    files: Vec<(&'static str, Vec<u8>)>,
) -> (Url, Arc<Counters>, oneshot::Sender<()>) {
    let files: Arc<HashMap<&'static str, Vec<u8>>> = Arc::new(files.into_iter().collect());
    let counters = Arc::new(Counters::default());

    let make_svc = {
        let files = files.clone();
        let counters = counters.clone();
        make_service_fn(move |_conn| {
            let files = files.clone();
            let counters = counters.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    handle_request(req, files.clone(), counters.clone())
                }))
            }
        })
    };

    let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
    let builder = Server::try_bind(&addr).expect("bind");
    let local_addr = builder.local_addr();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = builder.serve(make_svc).with_graceful_shutdown(async move {
        let _ = shutdown_rx.await;
    });

    tokio::spawn(server);

    let origin = Url::parse(&format!("http://{local_addr}/")).expect("url");
    (origin, counters, shutdown_tx)
}

async fn handle_request(
    req: Request<Body>,
    files: Arc<HashMap<&'static str, Vec<u8>>>,
    counters: Arc<Counters>,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    if path.starts_with("/fail/") {
        let mut resp = Response::new(Body::empty());
        *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        return Ok(resp);
    }
    let body = files.get(path.as_str()).cloned();
    match *req.method() {
        Method::HEAD => {
            counters.head.fetch_add(1, Ordering::SeqCst);
            let mut resp = Response::new(Body::empty());
            match body {
                Some(bytes) => {
                    resp.headers_mut()
                        .insert(CONTENT_LENGTH, bytes.len().to_string().parse().unwrap());
                }
                None => *resp.status_mut() = StatusCode::NOT_FOUND,
            }
            Ok(resp)
        }
        Method::GET => {
            counters.get.fetch_add(1, Ordering::SeqCst);
            match body {
                Some(bytes) => Ok(Response::new(Body::from(bytes))),
                None => {
                    let mut resp = Response::new(Body::empty());
                    *resp.status_mut() = StatusCode::NOT_FOUND;
                    Ok(resp)
                }
            }
        }
        _ => {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
            Ok(resp)
        }
    }
}

#[tokio::test]
async fn boot_state_served_over_http_is_imported_and_run() {
    let state = b"http-run-state".to_vec();
    let (origin, counters, shutdown) =
        start_origin(vec![("/images/boot-state.bin", state.clone())]).await;

    let transport = HttpTransport::new(origin);
    let mut engine = FakeEngine::default();
    let loaded = load_state_from_path(&mut engine, &transport, "/images/boot-state.bin").await;

    assert!(loaded);
    assert_eq!(engine.calls, vec![Call::Restore, Call::Run]);
    assert_eq!(engine.restored_payloads, vec![state]);
    assert_eq!(counters.get.load(Ordering::SeqCst), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn missing_boot_state_over_http_reports_no_state() {
    let (origin, counters, shutdown) = start_origin(vec![]).await;

    let transport = HttpTransport::new(origin);
    let mut engine = FakeEngine::default();
    let loaded = load_state_from_path(&mut engine, &transport, "/images/boot-state.bin").await;

    assert!(!loaded);
    assert!(engine.calls.is_empty());
    assert_eq!(counters.get.load(Ordering::SeqCst), 1);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn server_error_during_state_fetch_reports_no_state() {
    let (origin, _counters, shutdown) = start_origin(vec![]).await;

    let transport = HttpTransport::new(origin);
    let mut engine = FakeEngine::default();
    let loaded = load_state_from_path(&mut engine, &transport, "/fail/boot-state.bin").await;

    assert!(!loaded);
    assert_eq!(engine.calls_of(&Call::Restore), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn head_probe_tracks_engine_asset_availability() {
    let (origin, counters, shutdown) =
        start_origin(vec![("/assets/engine.wasm", b"\0asm".to_vec())]).await;

    let transport = HttpTransport::new(origin);
    assert!(engine_asset_reachable(&transport, "/assets/engine.wasm").await);
    assert!(!engine_asset_reachable(&transport, "/assets/absent.wasm").await);
    assert_eq!(counters.head.load(Ordering::SeqCst), 2);
    assert_eq!(counters.get.load(Ordering::SeqCst), 0);

    let _ = shutdown.send(());
}

#[tokio::test]
async fn bootstrap_restores_boot_state_over_http() {
    let (origin, _counters, shutdown) = start_origin(vec![
        ("/assets/engine.wasm", b"\0asm".to_vec()),
        ("/images/boot-state.bin", b"http-state".to_vec()),
    ])
    .await;

    let transport = HttpTransport::new(origin);
    let mut surface = RecordingSurface::default();
    let session = bootstrap(
        |_: &BootConfig| Ok(FakeEngine::default()),
        &transport,
        &mut surface,
        BootConfig::default(),
        BootstrapOptions {
            probe_engine_asset: true,
            download_dir: std::env::temp_dir(),
        },
    )
    .await
    .unwrap();

    assert_eq!(session.run_state(), RunState::Running);
    assert_eq!(session.config().engine_url, "/assets/engine.wasm");
    assert_eq!(
        session.engine().restored_payloads,
        vec![b"http-state".to_vec()]
    );
    assert_eq!(surface.save_controls, 1);

    let _ = shutdown.send(());
}
