use std::{
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header::CONTENT_TYPE, Request, StatusCode},
    Router,
};
use cucumber::{gherkin::Step, given, then, when, World as _};
use journey::{
    config::AppConfig,
    db::{init_pool, run_migrations},
    error::AppError,
    models::{activity::Activity, link::Link, participant::Participant, trip::Trip},
    routes::create_router,
    services::{
        mailer::{MailError, Mailer},
        store::{NewActivity, NewLink, NewTrip, SqliteStore, TripStore, TripUpdate},
    },
    state::AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    trip_id: Option<Uuid>,
    participant_id: Option<Uuid>,
    last_status: Option<StatusCode>,
    last_body: Value,
}

impl AppWorld {
    fn test_state(&self) -> &TestState {
        self.state.as_ref().expect("state must be initialised first")
    }

    fn trip_id(&self) -> Uuid {
        self.trip_id.expect("a trip must be created first")
    }

    fn expand(&self, raw: &str) -> String {
        let mut expanded = raw.to_string();
        if let Some(id) = self.trip_id {
            expanded = expanded.replace("{trip_id}", &id.to_string());
        }
        if let Some(id) = self.participant_id {
            expanded = expanded.replace("{participant_id}", &id.to_string());
        }
        expanded
    }

    async fn send(&mut self, method: &str, path: &str, body: Option<String>) {
        let uri = self.expand(path);
        let router = self.test_state().router.clone();

        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(raw) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(self.expand(&raw))
            }
            None => Body::empty(),
        };

        let response = router
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible");
        self.last_status = Some(response.status());
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        self.last_body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body is json")
        };
    }

    fn status(&self) -> StatusCode {
        self.last_status.expect("a request must be sent first")
    }

    async fn create_trip(
        &mut self,
        destination: &str,
        starts_at: &str,
        ends_at: &str,
        invites: &[String],
    ) {
        let body = json!({
            "destination": destination,
            "starts_at": starts_at,
            "ends_at": ends_at,
            "emails_to_invite": invites,
            "owner_name": "Ana",
            "owner_email": "ana@example.com",
        });
        self.send("POST", "/trips", Some(body.to_string())).await;
        if self.status() == StatusCode::CREATED {
            let id = self.last_body["trip_id"]
                .as_str()
                .and_then(|raw| Uuid::parse_str(raw).ok())
                .expect("trip_id is a uuid");
            self.trip_id = Some(id);
        }
    }

    async fn fetch_trip(&mut self) -> Value {
        self.send("GET", "/trips/{trip_id}", None).await;
        assert_eq!(self.status(), StatusCode::OK);
        self.last_body["trip"].clone()
    }

    async fn fetch_participants(&mut self) -> Vec<Value> {
        self.send("GET", "/trips/{trip_id}/participants", None).await;
        assert_eq!(self.status(), StatusCode::OK);
        self.last_body["participants"]
            .as_array()
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Default, Clone, Copy)]
struct TestOptions {
    notify_invitees: bool,
    failing_mailer: bool,
}

struct TestState {
    router: Router,
    store: Arc<CountingStore>,
    mailer: Arc<RecordingMailer>,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new(options: TestOptions) -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            smtp_host: "localhost".into(),
            smtp_port: 1025,
            mail_from: "mailpit@journey.com".into(),
            notify_invitees: options.notify_invitees,
        };

        let db = init_pool(&config.database_url).await?;
        run_migrations(&db).await?;

        let store = Arc::new(CountingStore::new(SqliteStore::new(db)));
        let mailer = Arc::new(RecordingMailer::new(options.failing_mailer));
        let app = AppState::new(config, store.clone(), mailer.clone());

        Ok(Self {
            router: create_router(app),
            store,
            mailer,
            _root: root,
        })
    }
}

/// Delegates to the sqlite store while counting every call.
struct CountingStore {
    inner: SqliteStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn new(inner: SqliteStore) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    fn hit(&self) -> &SqliteStore {
        self.calls.fetch_add(1, Ordering::SeqCst);
        &self.inner
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TripStore for CountingStore {
    async fn create_trip(&self, trip: NewTrip) -> Result<Uuid, AppError> {
        self.hit().create_trip(trip).await
    }
    async fn get_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        self.hit().get_trip(id).await
    }
    async fn update_trip(&self, id: Uuid, update: TripUpdate) -> Result<Option<Trip>, AppError> {
        self.hit().update_trip(id, update).await
    }
    async fn confirm_trip(&self, id: Uuid) -> Result<Option<Trip>, AppError> {
        self.hit().confirm_trip(id).await
    }
    async fn get_participant(&self, id: Uuid) -> Result<Option<Participant>, AppError> {
        self.hit().get_participant(id).await
    }
    async fn confirm_participant(&self, id: Uuid) -> Result<bool, AppError> {
        self.hit().confirm_participant(id).await
    }
    async fn invite_participant(&self, trip_id: Uuid, email: &str) -> Result<Uuid, AppError> {
        self.hit().invite_participant(trip_id, email).await
    }
    async fn get_participants(&self, trip_id: Uuid) -> Result<Vec<Participant>, AppError> {
        self.hit().get_participants(trip_id).await
    }
    async fn get_trip_activities(&self, trip_id: Uuid) -> Result<Vec<Activity>, AppError> {
        self.hit().get_trip_activities(trip_id).await
    }
    async fn create_activity(&self, activity: NewActivity) -> Result<Uuid, AppError> {
        self.hit().create_activity(activity).await
    }
    async fn get_trip_links(&self, trip_id: Uuid) -> Result<Vec<Link>, AppError> {
        self.hit().get_trip_links(trip_id).await
    }
    async fn create_trip_link(&self, link: NewLink) -> Result<Uuid, AppError> {
        self.hit().create_trip_link(link).await
    }
}

#[derive(Default)]
struct RecordingMailer {
    fail: bool,
    owner_sends: Mutex<Vec<Uuid>>,
    participant_sends: Mutex<Vec<(Uuid, Uuid)>>,
}

impl RecordingMailer {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            ..Self::default()
        }
    }

    fn owner_sends(&self) -> Vec<Uuid> {
        self.owner_sends.lock().expect("mailer lock").clone()
    }

    fn participant_sends(&self) -> Vec<(Uuid, Uuid)> {
        self.participant_sends.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_trip_owner_confirmation(&self, trip_id: Uuid) -> Result<(), MailError> {
        self.owner_sends.lock().expect("mailer lock").push(trip_id);
        if self.fail {
            return Err(MailError::TripMissing(trip_id));
        }
        Ok(())
    }

    async fn send_participant_confirmation(
        &self,
        participant_id: Uuid,
        trip_id: Uuid,
    ) -> Result<(), MailError> {
        self.participant_sends
            .lock()
            .expect("mailer lock")
            .push((participant_id, trip_id));
        if self.fail {
            return Err(MailError::ParticipantMissing(participant_id));
        }
        Ok(())
    }
}

async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..50 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

async fn fresh_state(world: &mut AppWorld, options: TestOptions) {
    world.state = Some(TestState::new(options).await.expect("state"));
    world.trip_id = None;
    world.participant_id = None;
    world.last_status = None;
    world.last_body = Value::Null;
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    fresh_state(world, TestOptions::default()).await;
}

#[given("a fresh application state with invitee notifications enabled")]
async fn given_fresh_state_notifying(world: &mut AppWorld) {
    let options = TestOptions {
        notify_invitees: true,
        ..TestOptions::default()
    };
    fresh_state(world, options).await;
}

#[given("a fresh application state whose mail delivery fails")]
async fn given_fresh_state_failing_mail(world: &mut AppWorld) {
    let options = TestOptions {
        failing_mailer: true,
        ..TestOptions::default()
    };
    fresh_state(world, options).await;
}

#[given(regex = r#"^a trip to "([^"]+)" from "([^"]+)" to "([^"]+)"$"#)]
async fn given_trip(
    world: &mut AppWorld,
    destination: String,
    starts_at: String,
    ends_at: String,
) {
    world.create_trip(&destination, &starts_at, &ends_at, &[]).await;
    assert_eq!(world.status(), StatusCode::CREATED);
}

#[when(regex = r#"^I create a trip to "([^"]+)" from "([^"]+)" to "([^"]+)"$"#)]
async fn when_create_trip(
    world: &mut AppWorld,
    destination: String,
    starts_at: String,
    ends_at: String,
) {
    world.create_trip(&destination, &starts_at, &ends_at, &[]).await;
}

#[when(regex = r#"^I create a trip to "([^"]+)" from "([^"]+)" to "([^"]+)" inviting "([^"]+)"$"#)]
async fn when_create_trip_inviting(
    world: &mut AppWorld,
    destination: String,
    starts_at: String,
    ends_at: String,
    invitee: String,
) {
    world
        .create_trip(&destination, &starts_at, &ends_at, &[invitee])
        .await;
}

#[given(regex = r#"^"([^"]+)" is invited to the trip$"#)]
async fn given_invited(world: &mut AppWorld, email: String) {
    let body = json!({ "email": email }).to_string();
    world.send("POST", "/trips/{trip_id}/invites", Some(body)).await;
    assert_eq!(world.status(), StatusCode::CREATED);
    remember_participant(world, &email).await;
}

#[given(regex = r#"^I know the participant id of "([^"]+)"$"#)]
async fn given_known_participant(world: &mut AppWorld, email: String) {
    remember_participant(world, &email).await;
}

async fn remember_participant(world: &mut AppWorld, email: &str) {
    let participants = world.fetch_participants().await;
    let id = participants
        .iter()
        .find(|p| p["email"] == email)
        .and_then(|p| p["id"].as_str())
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .expect("participant listed");
    world.participant_id = Some(id);
}

#[when(regex = r#"^I send a (GET|POST|PUT|PATCH) request to "([^"]+)"$"#)]
async fn when_send(world: &mut AppWorld, method: String, path: String) {
    world.send(&method, &path, None).await;
}

#[when(regex = r#"^I send a (GET|POST|PUT|PATCH) request to "([^"]+)" with body:$"#)]
async fn when_send_with_body(world: &mut AppWorld, method: String, path: String, step: &Step) {
    let body = step.docstring.clone().expect("body docstring");
    world.send(&method, &path, Some(body)).await;
}

#[then(regex = r"^the response status is (\d+)$")]
async fn then_status(world: &mut AppWorld, expected: u16) {
    assert_eq!(world.status().as_u16(), expected, "body: {}", world.last_body);
}

#[then(regex = r#"^the response message contains "([^"]+)"$"#)]
async fn then_message_contains(world: &mut AppWorld, fragment: String) {
    let message = world.last_body["message"]
        .as_str()
        .expect("error body has a message");
    assert!(message.contains(&fragment), "message was {message:?}");
}

#[then("the response body is empty")]
async fn then_body_empty(world: &mut AppWorld) {
    assert_eq!(world.last_body, Value::Null);
}

#[then(regex = r#"^the response contains a uuid "([a-z_]+)"$"#)]
async fn then_contains_uuid(world: &mut AppWorld, field: String) {
    let raw = world.last_body[field.as_str()]
        .as_str()
        .expect("field is a string");
    assert!(Uuid::parse_str(raw).is_ok(), "{raw} is not a uuid");
}

#[then(regex = r#"^the trip has destination "([^"]+)" from "([^"]+)" to "([^"]+)"$"#)]
async fn then_trip_details(
    world: &mut AppWorld,
    destination: String,
    starts_at: String,
    ends_at: String,
) {
    let trip = world.fetch_trip().await;
    assert_eq!(trip["destination"], destination);
    assert_eq!(trip["id"], world.trip_id().to_string());
    let timestamp = |raw: &str| raw.parse::<chrono::DateTime<chrono::Utc>>().expect("timestamp");
    let field = |name: &str| timestamp(trip[name].as_str().expect("timestamp field"));
    assert_eq!(field("starts_at"), timestamp(&starts_at));
    assert_eq!(field("ends_at"), timestamp(&ends_at));
}

#[then(regex = r"^the trip (is|is not) confirmed$")]
async fn then_trip_confirmed(world: &mut AppWorld, verb: String) {
    let trip = world.fetch_trip().await;
    assert_eq!(trip["is_confirmed"], Value::Bool(verb == "is"));
}

#[then(regex = r"^the trip lists (\d+) participants?$")]
async fn then_participant_count(world: &mut AppWorld, expected: usize) {
    assert_eq!(world.fetch_participants().await.len(), expected);
}

#[then(regex = r#"^participant "([^"]+)" (is|is not) confirmed$"#)]
async fn then_participant_confirmed(world: &mut AppWorld, email: String, verb: String) {
    let participants = world.fetch_participants().await;
    let participant = participants
        .iter()
        .find(|p| p["email"] == email)
        .expect("participant listed");
    assert_eq!(participant["is_confirmed"], Value::Bool(verb == "is"));
}

#[then("no participant exposes a name")]
async fn then_no_names(world: &mut AppWorld) {
    for participant in world.fetch_participants().await {
        assert_eq!(participant["name"], Value::Null);
    }
}

#[then(regex = r"^the response lists (\d+) activity days?$")]
async fn then_activity_days(world: &mut AppWorld, expected: usize) {
    let days = world.last_body["activities"].as_array().expect("activities");
    assert_eq!(days.len(), expected);
}

#[then(regex = r#"^activity day (\d+) is "([^"]+)" with (\d+) activit(?:y|ies)$"#)]
async fn then_activity_day(world: &mut AppWorld, index: usize, date: String, count: usize) {
    let day = &world.last_body["activities"][index - 1];
    assert_eq!(day["date"], date);
    assert_eq!(day["activities"].as_array().map(Vec::len), Some(count));
}

#[then(regex = r"^the response lists (\d+) links?$")]
async fn then_link_count(world: &mut AppWorld, expected: usize) {
    let links = world.last_body["links"].as_array().expect("links");
    assert_eq!(links.len(), expected);
}

#[then(regex = r#"^link (\d+) is "([^"]+)" pointing at "([^"]+)"$"#)]
async fn then_link(world: &mut AppWorld, index: usize, title: String, url: String) {
    let link = &world.last_body["links"][index - 1];
    assert_eq!(link["title"], title);
    assert_eq!(link["url"], url);
}

#[then("the store was never called")]
async fn then_store_untouched(world: &mut AppWorld) {
    assert_eq!(world.test_state().store.calls(), 0);
}

#[then("an owner confirmation email is dispatched for the trip")]
async fn then_owner_email(world: &mut AppWorld) {
    let trip_id = world.trip_id();
    let mailer = world.test_state().mailer.clone();
    assert!(eventually(|| mailer.owner_sends().contains(&trip_id)).await);
}

#[then(regex = r#"^a participant confirmation email is dispatched to "([^"]+)"$"#)]
async fn then_participant_email(world: &mut AppWorld, email: String) {
    remember_participant(world, &email).await;
    let expected = (world.participant_id.expect("participant"), world.trip_id());
    let mailer = world.test_state().mailer.clone();
    assert!(eventually(|| mailer.participant_sends().contains(&expected)).await);
}

#[then("no participant confirmation email is dispatched")]
async fn then_no_participant_email(world: &mut AppWorld) {
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(world.test_state().mailer.participant_sends().is_empty());
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
