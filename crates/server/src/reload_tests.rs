// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::build_index::BuildIndex;
use crate::launcher::scripted::ScriptedLauncher;
use crate::server::ServerDeps;
use crate::telemetry::{LogExporter, TelemetryHub};
use serde_json::json;

#[test]
fn signal_names_come_from_json_file_stems() {
    assert_eq!(signal_name(Path::new("/build/echo.json")).as_deref(), Some("echo"));
    assert_eq!(signal_name(Path::new("/build/deep.agent.json")).as_deref(), Some("deep.agent"));
    assert!(signal_name(Path::new("/build/echo.tmp")).is_none());
    assert!(signal_name(Path::new("/build/.hidden")).is_none());
}

fn write_definition(dir: &Path, name: &str, greeting: &str) {
    let definition = json!({
        "name": name,
        "scope": { "schema": { "type": "object" }, "access": { "kind": "open" } },
        "plugins": [],
        "source": format!("/app/agents/{}/agent.ts", name),
        "config": {
            "path": format!("/app/agents/{}/config.json", name),
            "values": { "greeting": greeting },
        },
    });
    std::fs::write(
        dir.join(format!("{}.json", name)),
        serde_json::to_vec_pretty(&definition).unwrap(),
    )
    .unwrap();
}

/// End-to-end through the real notify watcher: a content change restarts
/// the matching worker; a same-content rewrite does not.
#[tokio::test(flavor = "multi_thread")]
async fn watcher_restarts_only_on_content_changes() {
    let dir = tempfile::tempdir().unwrap();
    write_definition(dir.path(), "echo", "hi");
    write_definition(dir.path(), "calc", "sum");

    let launcher = Arc::new(ScriptedLauncher::new());
    let server = LifeServer::new(ServerDeps {
        build: BuildIndex::load(dir.path()).unwrap(),
        launcher: Arc::clone(&launcher) as Arc<dyn crate::launcher::WorkerLauncher>,
        tokens: Arc::new(life_transport::EnvTokenSource::new("wss://t", "k", "s")),
        telemetry: TelemetryHub::new(Arc::new(LogExporter)),
    });

    let echo = server.create(None, "echo").unwrap();
    server.start(&echo.id, &json!({}), json!({})).await.unwrap();
    let calc = server.create(None, "calc").unwrap();
    server.start(&calc.id, &json!({}), json!({})).await.unwrap();
    assert_eq!(launcher.launch_count(), 2);

    let _watcher = ReloadWatcher::spawn(Arc::clone(&server)).unwrap();
    // Give the native watcher a moment to arm.
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Rewrite with identical bytes: debounce fires, hash matches, nothing
    // restarts.
    write_definition(dir.path(), "echo", "hi");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(launcher.launch_count(), 2);

    // Real change: exactly the echo worker restarts; calc is undisturbed.
    write_definition(dir.path(), "echo", "hello");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if launcher.launch_count() == 3 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "echo never restarted");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(launcher.latest().unwrap().starts()[0].name, "echo");
}
