//! Cucumber suite driving the orchestrator through the `bdd` hooks.
//!
//! Runs with `harness = false`; requires the `cucumber` feature.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use cucumber::{given, then, when, World};
use handset::bdd::{self, HasContext};
use handset::{
    ArtifactStore, ContextId, DriverManager, MemorySink, MockConnector, MockDevice, Reporting,
    ScenarioOrchestrator, ScenarioStatus, SessionHandle, Settings,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock};

static ORCHESTRATOR: OnceLock<Arc<ScenarioOrchestrator>> = OnceLock::new();
static SEEN_SESSIONS: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn orchestrator() -> &'static Arc<ScenarioOrchestrator> {
    ORCHESTRATOR.get().expect("orchestrator installed before run")
}

#[derive(Debug, World)]
#[world(init = Self::new)]
struct DeviceWorld {
    context: ContextId,
    session: Option<String>,
}

impl DeviceWorld {
    fn new() -> Self {
        Self {
            context: ContextId::unique(),
            session: None,
        }
    }

    fn handle(&self) -> Arc<SessionHandle> {
        orchestrator().manager().get_handle(&self.context).unwrap()
    }
}

impl HasContext for DeviceWorld {
    fn context(&self) -> &ContextId {
        &self.context
    }
}

#[given("a session for the scenario")]
fn a_session(world: &mut DeviceWorld) {
    let id = world.handle().session_id().to_string();
    SEEN_SESSIONS.lock().unwrap().push(id.clone());
    world.session = Some(id);
}

#[when("the application is reset")]
fn reset_app(world: &mut DeviceWorld) {
    orchestrator()
        .manager()
        .reset_application(&world.context)
        .unwrap();
}

#[when(expr = "the application is backgrounded for {int} seconds")]
fn background_app(world: &mut DeviceWorld, seconds: i64) {
    orchestrator()
        .manager()
        .send_to_background(&world.context, seconds)
        .unwrap();
    assert!(orchestrator().manager().has_handle(&world.context));
}

#[then(expr = "the device reports platform {string}")]
fn reports_platform(world: &mut DeviceWorld, platform: String) {
    let name = orchestrator()
        .manager()
        .current_platform_name(&world.context)
        .unwrap();
    assert_eq!(name, platform);
}

#[then(expr = "the device reports device {string}")]
fn reports_device(world: &mut DeviceWorld, device: String) {
    let name = orchestrator()
        .manager()
        .current_device_name(&world.context)
        .unwrap();
    assert_eq!(name, device);
}

#[then("no other scenario shares it")]
fn session_not_shared(world: &mut DeviceWorld) {
    let mine = world.session.clone().unwrap();
    let seen = SEEN_SESSIONS.lock().unwrap();
    assert_eq!(seen.iter().filter(|s| **s == mine).count(), 1);
}

#[tokio::main]
async fn main() {
    let dir = tempfile::TempDir::new().unwrap();
    let settings = Arc::new(
        Settings::from_pairs([
            ("framework.platform", "android"),
            ("framework.device.name", "Pixel 7"),
            ("android.app.path", "/nonexistent/app.apk"),
            ("android.app.package", "com.example.shop"),
            ("android.app.activity", ".MainActivity"),
            ("framework.output.dir", dir.path().to_str().unwrap()),
        ])
        .unwrap(),
    );
    let device = MockDevice::new();
    let manager = Arc::new(DriverManager::new(
        Arc::clone(&settings),
        Arc::new(MockConnector::with_device(device.clone())),
    ));
    let sink = MemorySink::new();
    let orchestrator_arc = Arc::new(ScenarioOrchestrator::new(
        Arc::clone(&settings),
        manager,
        ArtifactStore::new(dir.path()),
        Reporting::new().with_sink(Box::new(sink.clone())),
    ));
    ORCHESTRATOR
        .set(Arc::clone(&orchestrator_arc))
        .expect("orchestrator set once");

    bdd::start_suite(&orchestrator_arc).await.unwrap();

    let before = Arc::clone(&orchestrator_arc);
    let after = Arc::clone(&orchestrator_arc);
    DeviceWorld::cucumber()
        .with_default_cli()
        .before(move |feature, rule, scenario, world| {
            bdd::before_scenario(Arc::clone(&before), feature, rule, scenario, world)
        })
        .after(move |feature, rule, scenario, finished, world| {
            bdd::after_scenario(Arc::clone(&after), feature, rule, scenario, finished, world)
        })
        .run("tests/features")
        .await;

    bdd::finish_suite(&orchestrator_arc).await;

    let summaries = sink.summaries();
    assert_eq!(summaries.len(), 3, "every scenario reported");
    assert!(summaries.iter().all(|s| s.status == ScenarioStatus::Passed));
    assert!(summaries.iter().all(|s| s.tags.contains(&"smoke".to_string())));
    assert!(summaries
        .iter()
        .all(|s| s.location.as_deref().is_some_and(|l| l.contains("lifecycle.feature:"))));

    let contexts: HashSet<_> = summaries.iter().map(|s| s.context.clone()).collect();
    assert_eq!(contexts.len(), 3, "one context per scenario");
    assert_eq!(orchestrator_arc.manager().active_contexts(), 0);
    assert!(device.live_sessions().is_empty());
    assert!(device.was_called("background_app:2"));
}
