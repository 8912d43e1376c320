//! Recorder supervisor lifecycle against an in-process backend

mod support;

use recplay_common::{Error, SessionState};
use std::sync::Arc;
use std::time::{Duration, Instant};
use support::{memory_store, supervisor, BrokenStore, FakeBackend};
use tempfile::TempDir;

const URL: &str = "https://shop.example.com/login";

async fn wait_for_state(
    sup: &recplay_daemon::recorder::RecorderSupervisor,
    id: &str,
    state: SessionState,
) {
    for _ in 0..200 {
        if sup.status(id).await.map(|s| s.state).ok() == Some(state) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {} never reached {}", id, state);
}

#[tokio::test]
async fn test_record_poll_save() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let store = memory_store();
    let (sup, registry) = supervisor(backend.clone(), store.clone(), dir.path());

    let id = sup.start(URL, "login flow").await.unwrap();
    assert!(id.starts_with("rec-"));
    assert!(registry.contains(&id));

    // Nothing recorded yet
    let status = sup.status(&id).await.unwrap();
    assert!(status.running);
    assert_eq!(status.state, SessionState::Active);
    assert_eq!(status.code, "");

    let code = "await page.goto('https://shop.example.com/login');\n";
    backend.write_code(&id, code);
    assert_eq!(sup.status(&id).await.unwrap().code, code);

    let test = sup.save(&id, None).await.unwrap();
    assert_eq!(test.name, "login flow");
    assert_eq!(test.url, URL);
    assert_eq!(test.code, code);
    assert_eq!(test.metadata.get("session_id"), Some(&id));

    // Saved sessions are gone and their artifact removed
    assert!(sup.status(&id).await.unwrap_err().is_not_found());
    assert!(!registry.contains(&id));
    assert!(!backend.artifact(&id).exists());
    assert!(store.get(&test.id).unwrap().is_some());
}

#[tokio::test]
async fn test_save_name_override() {
    let dir = TempDir::new().unwrap();
    let (sup, _) = supervisor(FakeBackend::default(), memory_store(), dir.path());

    let id = sup.start(URL, "draft").await.unwrap();
    let test = sup.save(&id, Some("  checkout ")).await.unwrap();
    assert_eq!(test.name, "checkout");
    // Empty code is saved as-is
    assert_eq!(test.code, "");
}

#[tokio::test]
async fn test_start_validation() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, registry) = supervisor(backend.clone(), memory_store(), dir.path());

    for url in ["ftp://example.com", "not a url", ""] {
        let err = sup.start(url, "t").await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)), "{}: {:?}", url, err);
    }
    let err = sup.start(URL, "   ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));

    assert_eq!(backend.started(), 0);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_spawn_failure_leaves_no_session() {
    let dir = TempDir::new().unwrap();
    let (sup, registry) = supervisor(
        FakeBackend::failing("npx: No such file or directory"),
        memory_store(),
        dir.path(),
    );

    let err = sup.start(URL, "t").await.unwrap_err();
    assert!(matches!(err, Error::Spawn(ref m) if m.contains("npx")));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_stop_is_terminal() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, registry) = supervisor(backend.clone(), memory_store(), dir.path());

    let id = sup.start(URL, "t").await.unwrap();
    backend.write_code(&id, "partial");

    sup.stop(&id).await.unwrap();
    assert!(!registry.contains(&id));
    assert!(!backend.artifact(&id).exists());

    assert!(sup.stop(&id).await.unwrap_err().is_not_found());
    assert!(sup.status(&id).await.unwrap_err().is_not_found());
    assert!(sup.save(&id, None).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_unknown_session() {
    let dir = TempDir::new().unwrap();
    let (sup, _) = supervisor(FakeBackend::default(), memory_store(), dir.path());

    let err = sup.status("rec-0-deadbeef").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn test_recorder_exit_keeps_code_for_saving() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, _) = supervisor(backend.clone(), memory_store(), dir.path());

    let id = sup.start(URL, "closed window").await.unwrap();
    backend.write_code(&id, "await page.click('#buy');");
    backend.exit(&id, 0);

    wait_for_state(&sup, &id, SessionState::Finished).await;
    let status = sup.status(&id).await.unwrap();
    assert!(!status.running);
    assert_eq!(status.exit_code, Some(0));
    assert_eq!(status.code, "await page.click('#buy');");

    // Code captured at exit survives the artifact disappearing
    std::fs::remove_file(backend.artifact(&id)).unwrap();
    let test = sup.save(&id, None).await.unwrap();
    assert_eq!(test.code, "await page.click('#buy');");
}

#[tokio::test]
async fn test_concurrent_save_and_stop() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, registry) = supervisor(backend.clone(), memory_store(), dir.path());
    let sup = Arc::new(sup);

    let id = sup.start(URL, "race").await.unwrap();
    backend.write_code(&id, "await page.goto('x');");

    let (saved, stopped) = tokio::join!(sup.save(&id, None), sup.stop(&id));
    match (saved, stopped) {
        (Ok(_), Err(e)) | (Err(e), Ok(_)) if e.is_not_found() => {}
        (a, b) => panic!("exactly one of save/stop must win: {:?} / {:?}", a, b),
    }
    assert!(!registry.contains(&id));
}

#[tokio::test]
async fn test_failed_save_keeps_session() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, registry) = supervisor(backend.clone(), Arc::new(BrokenStore), dir.path());

    let id = sup.start(URL, "t").await.unwrap();
    backend.write_code(&id, "await page.goto('x');");

    let err = sup.save(&id, None).await.unwrap_err();
    assert_eq!(err.code(), "internal_error");

    // Still alive, code intact
    assert!(registry.contains(&id));
    let status = sup.status(&id).await.unwrap();
    assert!(status.running);
    assert_eq!(status.code, "await page.goto('x');");
}

#[tokio::test]
async fn test_reap_finished_and_idle() {
    let dir = TempDir::new().unwrap();
    let backend = FakeBackend::default();
    let (sup, registry) = supervisor(backend.clone(), memory_store(), dir.path());

    let finished = sup.start(URL, "finished").await.unwrap();
    let idle = sup.start(URL, "idle").await.unwrap();
    backend.exit(&finished, 0);
    wait_for_state(&sup, &finished, SessionState::Finished).await;

    // Nothing is old enough yet
    assert_eq!(sup.reap(Instant::now()).await, 0);

    // Past the finished TTL (30s) but not the idle timeout (60s)
    assert_eq!(sup.reap(Instant::now() + Duration::from_secs(31)).await, 1);
    assert!(!registry.contains(&finished));
    assert!(registry.contains(&idle));

    // Past the idle timeout
    assert_eq!(sup.reap(Instant::now() + Duration::from_secs(61)).await, 1);
    assert!(registry.is_empty());
    assert!(sup.status(&idle).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_list_and_shutdown() {
    let dir = TempDir::new().unwrap();
    let (sup, registry) = supervisor(FakeBackend::default(), memory_store(), dir.path());

    let a = sup.start(URL, "a").await.unwrap();
    let b = sup.start("http://localhost:3000", "b").await.unwrap();

    let list = sup.list().await;
    assert_eq!(list.len(), 2);
    let ids: Vec<_> = list.iter().map(|s| s.session_id.clone()).collect();
    assert!(ids.contains(&a) && ids.contains(&b));
    assert!(list.iter().all(|s| s.state == SessionState::Active && s.pid == Some(4242)));

    sup.shutdown().await;
    assert!(registry.is_empty());
    assert!(sup.list().await.is_empty());
}
