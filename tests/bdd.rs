use std::{collections::HashMap, fmt, net::SocketAddr};

use anyhow::Context;
use chrono::{Duration, Utc};
use cucumber::{given, then, when, World as _};
use planner::{
    activities::{self, ActivityInput},
    auth::{self, AuthUser},
    config::AppConfig,
    db::init_pool,
    error::AppError,
    links::{self, LinkInput},
    models::{participant::Participant, trip::Trip},
    participation,
    services::mail::Mailer,
    state::AppState,
    trips::{self, NewTrip, TripPatch},
};
use tempfile::TempDir;

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    users: HashMap<String, AuthUser>,
    trip_id: Option<String>,
    last_error: Option<AppError>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn user(&self, name: &str) -> AuthUser {
        self.users
            .get(name)
            .unwrap_or_else(|| panic!("user {name} must be registered first"))
            .clone()
    }

    fn trip_id(&self) -> String {
        self.trip_id.clone().expect("a trip must exist first")
    }

    async fn current_trip(&self) -> Trip {
        trips::fetch_trip(&self.app_state().db, &self.trip_id())
            .await
            .expect("trip loads")
    }

    async fn participant_by_email(&self, email: &str) -> Participant {
        participation::participants_of(&self.app_state().db, &self.trip_id())
            .await
            .expect("participants load")
            .into_iter()
            .find(|participant| participant.email == email)
            .unwrap_or_else(|| panic!("no participant with email {email}"))
    }
}

struct TestState {
    app: AppState,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: "bdd-signing-secret".into(),
            api_base_url: "http://localhost:3333".into(),
            web_base_url: "http://localhost:5173".into(),
            smtp_url: None,
            mail_from: "Trip Planner <no-reply@planner.local>".into(),
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let mailer = Mailer::from_config(&config)?;
        let app = AppState::new(config, db, mailer);
        Ok(Self { app, _root: root })
    }

    fn app(&self) -> &AppState {
        &self.app
    }
}

#[given("a fresh application state")]
async fn given_fresh_state(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.users.clear();
    world.trip_id = None;
    world.last_error = None;
}

#[given(
    regex = r#"^a registered user "([^"]+)" with email "([^"]+)" and password "([^"]+)"$"#
)]
async fn given_registered_user(world: &mut AppWorld, name: String, email: String, password: String) {
    let app = world.app_state().clone();
    let (profile, _token) = auth::register_user(&app, &name, &email, &password)
        .await
        .expect("register user");
    world.users.insert(
        name,
        AuthUser {
            id: profile.id,
            name: profile.name,
            email: profile.email,
        },
    );
}

async fn create_trip_for(
    world: &mut AppWorld,
    owner: String,
    destination: String,
    start_offset: i64,
    duration: i64,
    invites: Vec<String>,
) {
    let app = world.app_state().clone();
    let user = world.user(&owner);
    let starts_at = Utc::now() + Duration::days(start_offset);
    let input = NewTrip {
        destination,
        starts_at,
        ends_at: starts_at + Duration::days(duration),
        emails_to_invite: invites,
    };
    let result = trips::create_trip(&app, &user.id, &user.name, &user.email, input).await;
    match result {
        Ok(trip) => {
            world.trip_id = Some(trip.id);
            world.last_error = None;
        }
        Err(err) => world.last_error = Some(err),
    }
}

#[when(regex = r#"^"([^"]+)" creates a trip to "([^"]+)" starting in (-?\d+) days lasting (-?\d+) days$"#)]
async fn when_creates_trip(
    world: &mut AppWorld,
    owner: String,
    destination: String,
    start_offset: i64,
    duration: i64,
) {
    create_trip_for(world, owner, destination, start_offset, duration, Vec::new()).await;
}

#[when(
    regex = r#"^"([^"]+)" creates a trip to "([^"]+)" starting in (-?\d+) days lasting (-?\d+) days inviting "([^"]+)"$"#
)]
async fn when_creates_trip_with_invite(
    world: &mut AppWorld,
    owner: String,
    destination: String,
    start_offset: i64,
    duration: i64,
    invitee: String,
) {
    create_trip_for(world, owner, destination, start_offset, duration, vec![invitee]).await;
}

#[given(regex = r#"^"([^"]+)" created a trip to "([^"]+)" starting in (-?\d+) days lasting (-?\d+) days$"#)]
async fn given_created_trip(
    world: &mut AppWorld,
    owner: String,
    destination: String,
    start_offset: i64,
    duration: i64,
) {
    create_trip_for(world, owner, destination, start_offset, duration, Vec::new()).await;
    assert!(world.last_error.is_none(), "trip creation failed: {:?}", world.last_error);
}

#[given(
    regex = r#"^"([^"]+)" created a trip to "([^"]+)" starting in (-?\d+) days lasting (-?\d+) days inviting "([^"]+)"$"#
)]
async fn given_created_trip_with_invite(
    world: &mut AppWorld,
    owner: String,
    destination: String,
    start_offset: i64,
    duration: i64,
    invitee: String,
) {
    create_trip_for(world, owner, destination, start_offset, duration, vec![invitee]).await;
    assert!(world.last_error.is_none(), "trip creation failed: {:?}", world.last_error);
}

async fn join_trip_as(world: &mut AppWorld, name: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let trip = world.current_trip().await;
    let result = participation::join_trip(&app.db, &trip, &user).await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" joins the trip$"#)]
async fn when_joins_trip(world: &mut AppWorld, name: String) {
    join_trip_as(world, name).await;
}

#[given(regex = r#"^"([^"]+)" joined the trip$"#)]
async fn given_joined_trip(world: &mut AppWorld, name: String) {
    join_trip_as(world, name).await;
    assert!(world.last_error.is_none(), "join failed: {:?}", world.last_error);
}

#[when(regex = r#"^"([^"]+)" leaves the trip$"#)]
async fn when_leaves_trip(world: &mut AppWorld, name: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let trip = world.current_trip().await;
    let result = participation::leave_trip(&app.db, &trip, &user).await;
    world.last_error = result.err();
}

async fn set_confirmation_as(world: &mut AppWorld, name: String, confirmed: bool) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let participant = world.participant_by_email(&user.email).await;
    let result =
        participation::set_self_confirmation(&app.db, &participant.id, &user.id, confirmed).await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" confirms their participation$"#)]
async fn when_confirms_self(world: &mut AppWorld, name: String) {
    set_confirmation_as(world, name, true).await;
}

#[given(regex = r#"^"([^"]+)" confirmed their participation$"#)]
async fn given_confirmed_self(world: &mut AppWorld, name: String) {
    set_confirmation_as(world, name, true).await;
    assert!(world.last_error.is_none(), "confirm failed: {:?}", world.last_error);
}

#[when(regex = r#"^"([^"]+)" withdraws their confirmation$"#)]
async fn when_withdraws_confirmation(world: &mut AppWorld, name: String) {
    set_confirmation_as(world, name, false).await;
}

#[when(regex = r#"^"([^"]+)" tries to confirm the participation of "([^"]+)"$"#)]
async fn when_confirms_other(world: &mut AppWorld, name: String, email: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let participant = world.participant_by_email(&email).await;
    let result =
        participation::set_self_confirmation(&app.db, &participant.id, &user.id, true).await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" removes the participant "([^"]+)"$"#)]
async fn when_removes_participant(world: &mut AppWorld, name: String, email: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let participant = world.participant_by_email(&email).await;
    let trip_id = world.trip_id();
    let result = async {
        let trip = auth::require_trip_owner(&app.db, &trip_id, &user.id).await?;
        participation::remove_participant(&app, &trip, &participant.id).await
    }
    .await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" deletes the trip$"#)]
async fn when_deletes_trip(world: &mut AppWorld, name: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let trip_id = world.trip_id();
    let result = async {
        auth::require_trip_owner(&app.db, &trip_id, &user.id).await?;
        trips::delete_trip(&app.db, &trip_id).await
    }
    .await;
    world.last_error = result.err();
}

#[when(
    regex = r#"^"([^"]+)" updates the trip to "([^"]+)" starting in (-?\d+) days lasting (-?\d+) days$"#
)]
async fn when_updates_trip(
    world: &mut AppWorld,
    name: String,
    destination: String,
    start_offset: i64,
    duration: i64,
) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let trip_id = world.trip_id();
    let starts_at = Utc::now() + Duration::days(start_offset);
    let patch = TripPatch {
        destination,
        starts_at,
        ends_at: starts_at + Duration::days(duration),
    };
    let result = async {
        let trip = auth::require_trip_owner(&app.db, &trip_id, &user.id).await?;
        trips::update_trip(&app, &trip, patch).await
    }
    .await;
    world.last_error = result.err();
}

async fn invite_to_trip(world: &mut AppWorld, name: String, email: String) {
    let app = world.app_state().clone();
    let user = world.user(&name);
    let trip_id = world.trip_id();
    let result = async {
        let trip = auth::require_trip_owner(&app.db, &trip_id, &user.id).await?;
        participation::invite(&app, &trip, &email).await
    }
    .await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" invites "([^"]+)" to the trip$"#)]
async fn when_invites(world: &mut AppWorld, name: String, email: String) {
    invite_to_trip(world, name, email).await;
}

#[given(regex = r#"^"([^"]+)" invited "([^"]+)" to the trip$"#)]
async fn given_invited(world: &mut AppWorld, name: String, email: String) {
    invite_to_trip(world, name, email).await;
    assert!(world.last_error.is_none(), "invite failed: {:?}", world.last_error);
}

async fn add_activity(world: &mut AppWorld, title: String, offset: i64) {
    let app = world.app_state().clone();
    let trip = world.current_trip().await;
    let input = ActivityInput {
        title,
        occurs_at: trip.starts_at + Duration::days(offset),
    };
    let result = activities::create_activity(&app.db, &trip, input).await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" adds an activity "([^"]+)" scheduled (-?\d+) days after the trip starts$"#)]
async fn when_adds_activity(world: &mut AppWorld, _name: String, title: String, offset: i64) {
    add_activity(world, title, offset).await;
}

#[given(regex = r#"^"([^"]+)" added an activity "([^"]+)" scheduled (-?\d+) days after the trip starts$"#)]
async fn given_added_activity(world: &mut AppWorld, _name: String, title: String, offset: i64) {
    add_activity(world, title, offset).await;
    assert!(world.last_error.is_none(), "activity failed: {:?}", world.last_error);
}

async fn add_link(world: &mut AppWorld, title: String, url: String) {
    let app = world.app_state().clone();
    let trip = world.current_trip().await;
    let result = links::create_link(&app.db, &trip, LinkInput { title, url }).await;
    world.last_error = result.err();
}

#[when(regex = r#"^"([^"]+)" adds a link "([^"]+)" to "([^"]+)"$"#)]
async fn when_adds_link(world: &mut AppWorld, _name: String, title: String, url: String) {
    add_link(world, title, url).await;
}

#[given(regex = r#"^"([^"]+)" added a link "([^"]+)" to "([^"]+)"$"#)]
async fn given_added_link(world: &mut AppWorld, _name: String, title: String, url: String) {
    add_link(world, title, url).await;
    assert!(world.last_error.is_none(), "link failed: {:?}", world.last_error);
}

#[then("the trip is created")]
async fn then_trip_created(world: &mut AppWorld) {
    assert!(world.last_error.is_none(), "unexpected error: {:?}", world.last_error);
    assert!(world.trip_id.is_some());
}

#[then("the request is rejected as invalid")]
async fn then_rejected_invalid(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::BadRequest(_))),
        "expected a validation error, got {:?}",
        world.last_error
    );
}

#[then("the request is rejected as forbidden")]
async fn then_rejected_forbidden(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::Forbidden(_))),
        "expected a forbidden error, got {:?}",
        world.last_error
    );
}

#[then("the request is rejected as an invalid state")]
async fn then_rejected_invalid_state(world: &mut AppWorld) {
    assert!(
        matches!(world.last_error, Some(AppError::InvalidState(_))),
        "expected an invalid-state error, got {:?}",
        world.last_error
    );
}

#[then(regex = r"^the trip has (\d+) participants$")]
async fn then_participant_count(world: &mut AppWorld, expected: usize) {
    let participants = participation::participants_of(&world.app_state().db, &world.trip_id())
        .await
        .expect("participants load");
    assert_eq!(participants.len(), expected);
}

#[then(regex = r#"^the participant "([^"]+)" is (confirmed|unconfirmed)$"#)]
async fn then_participant_confirmation(world: &mut AppWorld, email: String, status: String) {
    let participant = world.participant_by_email(&email).await;
    assert_eq!(participant.is_confirmed, status == "confirmed");
}

#[then(regex = r#"^the trip destination is "([^"]+)"$"#)]
async fn then_trip_destination(world: &mut AppWorld, expected: String) {
    let trip = world.current_trip().await;
    assert_eq!(trip.destination, expected);
}

#[then(regex = r"^the trip has (\d+) recorded invitations$")]
async fn then_invitation_count(world: &mut AppWorld, expected: i64) {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invitations WHERE trip_id = ?")
        .bind(world.trip_id())
        .fetch_one(&world.app_state().db)
        .await
        .expect("count invitations");
    assert_eq!(count, expected);
}

#[then(regex = r"^the trip has (\d+) links$")]
async fn then_link_count(world: &mut AppWorld, expected: usize) {
    let links = links::list_links(&world.app_state().db, &world.trip_id())
        .await
        .expect("links load");
    assert_eq!(links.len(), expected);
}

#[then(regex = r"^the agenda spans (\d+) days$")]
async fn then_agenda_span(world: &mut AppWorld, expected: usize) {
    let trip = world.current_trip().await;
    let schedule = activities::list_activities(&world.app_state().db, &trip)
        .await
        .expect("agenda loads");
    assert_eq!(schedule.len(), expected);
}

#[then(regex = r"^day (\d+) of the agenda has (\d+) activities$")]
async fn then_agenda_day(world: &mut AppWorld, day: usize, expected: usize) {
    let trip = world.current_trip().await;
    let schedule = activities::list_activities(&world.app_state().db, &trip)
        .await
        .expect("agenda loads");
    let entry = schedule.get(day - 1).expect("day within the trip span");
    assert_eq!(entry.activities.len(), expected);
}

#[then("no rows reference the deleted trip")]
async fn then_no_orphan_rows(world: &mut AppWorld) {
    let db = &world.app_state().db;
    let trip_id = world.trip_id();
    for table in ["invitations", "activities", "links", "participants"] {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE trip_id = ?"))
                .bind(&trip_id)
                .fetch_one(db)
                .await
                .expect("count rows");
        assert_eq!(count, 0, "{table} still references the deleted trip");
    }
    let trips_left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips WHERE id = ?")
        .bind(&trip_id)
        .fetch_one(db)
        .await
        .expect("count trips");
    assert_eq!(trips_left, 0);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
