//! Store tests against a live PostgreSQL (15 or newer)
//!
//! Skipped unless `TRANSPARENCY_TEST_DATABASE_URL` points at a scratch
//! database. Every test uses its own identifiers so tests can share it.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use transparency::{
    store::{
        apply_schema, load_countries, MeetingLoader, OrganizationLoader, RosterLoader, StoreError,
    },
    types::{
        CountryTables, Department, EntityRef, Leader, Meeting, Member, Organization,
        Participants, RoleAssignment,
    },
};

const DATABASE_URL_VAR: &str = "TRANSPARENCY_TEST_DATABASE_URL";

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var(DATABASE_URL_VAR) else {
        eprintln!("{} not set, skipping", DATABASE_URL_VAR);
        return None;
    };
    let pool = PgPool::connect(&url).await.unwrap();

    // Concurrent CREATE TABLE IF NOT EXISTS can collide on a fresh database
    for _ in 0..3 {
        if apply_schema(&pool).await.is_ok() {
            return Some(pool);
        }
    }
    apply_schema(&pool).await.unwrap();
    Some(pool)
}

/// Remove what earlier runs left behind for these codes
async fn reset(pool: &PgPool, codes: &[&str]) {
    for code in codes {
        sqlx::query("DELETE FROM organizations WHERE organization_id = $1")
            .bind(code)
            .execute(pool)
            .await
            .unwrap();
    }
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

fn organization(code: &str, name: &str, updated_at: DateTime<Utc>) -> Organization {
    Organization {
        identification_code: code.to_string(),
        name: name.to_string(),
        country_name: String::new(),
        country_id: None,
        legal_status: "ASBL".to_string(),
        registered_at: at(2012, 1, 1),
        updated_at,
    }
}

async fn stored_organization(pool: &PgPool, code: &str) -> (String, String, DateTime<Utc>) {
    sqlx::query_as(
        "SELECT organization_name, organization_legal_status, organization_updated_at \
         FROM organizations WHERE organization_id = $1",
    )
    .bind(code)
    .fetch_one(pool)
    .await
    .unwrap()
}

// ============================================================================
// Organizations
// ============================================================================

#[tokio::test]
async fn test_identical_reload_is_a_noop() {
    let Some(pool) = test_pool().await else { return };
    reset(&pool, &["9000001-01", "9000001-02"]).await;
    let loader = OrganizationLoader::new(pool.clone());
    let batch = vec![
        organization("9000001-01", "Alpha", at(2017, 6, 1)),
        organization("9000001-02", "Beta", at(2017, 6, 1)),
    ];

    loader.load(&batch).await.unwrap();
    let again = loader.load(&batch).await.unwrap();

    assert_eq!(again.staged, 2);
    assert_eq!(again.applied, 0);
    assert_eq!(stored_organization(&pool, "9000001-01").await.0, "Alpha");
}

#[tokio::test]
async fn test_older_record_never_overwrites_newer() {
    let Some(pool) = test_pool().await else { return };
    reset(&pool, &["9000002-01"]).await;
    let loader = OrganizationLoader::new(pool.clone());

    loader
        .load(&[organization("9000002-01", "Current", at(2018, 3, 1))])
        .await
        .unwrap();
    let outcome = loader
        .load(&[organization("9000002-01", "Stale", at(2016, 3, 1))])
        .await
        .unwrap();

    assert_eq!(outcome.applied, 0);
    let (name, _, updated_at) = stored_organization(&pool, "9000002-01").await;
    assert_eq!(name, "Current");
    assert_eq!(updated_at, at(2018, 3, 1));
}

#[tokio::test]
async fn test_newer_record_overwrites_every_field() {
    let Some(pool) = test_pool().await else { return };
    reset(&pool, &["9000003-01"]).await;
    let loader = OrganizationLoader::new(pool.clone());

    loader
        .load(&[organization("9000003-01", "Old Name", at(2015, 1, 1))])
        .await
        .unwrap();
    let mut newer = organization("9000003-01", "New Name", at(2019, 1, 1));
    newer.legal_status = "GmbH".to_string();
    let outcome = loader.load(&[newer]).await.unwrap();

    assert_eq!(outcome.applied, 1);
    assert_eq!(
        stored_organization(&pool, "9000003-01").await,
        ("New Name".to_string(), "GmbH".to_string(), at(2019, 1, 1))
    );
}

#[tokio::test]
async fn test_duplicate_code_in_one_batch_keeps_newest() {
    let Some(pool) = test_pool().await else { return };
    reset(&pool, &["9000004-01"]).await;
    let loader = OrganizationLoader::new(pool.clone());

    let outcome = loader
        .load(&[
            organization("9000004-01", "First", at(2015, 1, 1)),
            organization("9000004-01", "Second", at(2017, 1, 1)),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.staged, 2);
    assert_eq!(stored_organization(&pool, "9000004-01").await.0, "Second");
}

#[tokio::test]
async fn test_text_with_copy_special_characters() {
    let Some(pool) = test_pool().await else { return };
    reset(&pool, &["9000005-01"]).await;
    let loader = OrganizationLoader::new(pool.clone());
    let name = "Tab\tNew\nLine \\ Backslash";

    loader
        .load(&[organization("9000005-01", name, at(2017, 1, 1))])
        .await
        .unwrap();
    assert_eq!(stored_organization(&pool, "9000005-01").await.0, name);
}

// ============================================================================
// Roster and meetings
// ============================================================================

fn department(suffix: &str) -> Department {
    let leader_id = format!("lead-{}", suffix);
    Department {
        name: format!("Department {}", suffix),
        abbreviation: format!("DEP-{}", suffix),
        description: String::new(),
        leaders: vec![Leader {
            id: Some(leader_id.clone()),
            name: "Leader".to_string(),
            role: "Commissioner".to_string(),
            country: "ZZ".to_string(),
            leader_host_id: String::new(),
            member_host_id: String::new(),
        }],
        members: vec![Member {
            id: Some(format!("member-{}", suffix)),
            name: "Member".to_string(),
            roles: vec![RoleAssignment {
                leader: Some(leader_id),
                role: "Adviser".to_string(),
            }],
        }],
    }
}

#[tokio::test]
async fn test_roster_upsert_is_repeatable() {
    let Some(pool) = test_pool().await else { return };
    let loader = RosterLoader::new(pool.clone());
    let countries = load_countries(&pool).await.unwrap();
    let mut dep = department("r1");

    loader.upsert_department(&dep, &countries).await.unwrap();
    dep.leaders[0].name = "Renamed Leader".to_string();
    let counts = loader.upsert_department(&dep, &countries).await.unwrap();
    assert_eq!((counts.leaders, counts.members, counts.roles), (1, 1, 1));

    let (name, country): (String, Option<i32>) =
        sqlx::query_as("SELECT leader_name, leader_country FROM leaders WHERE leader_id = $1")
            .bind("lead-r1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(name, "Renamed Leader");
    assert_eq!(country, None);

    let roles: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM members_roles WHERE member_id = $1")
            .bind("member-r1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(roles, 1);
}

#[tokio::test]
async fn test_roster_member_without_id_writes_nothing() {
    let Some(pool) = test_pool().await else { return };
    let loader = RosterLoader::new(pool.clone());
    let mut dep = department("r2");
    dep.members[0].id = None;

    let err = loader
        .upsert_department(&dep, &CountryTables::new(HashMap::new(), HashMap::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Roster(_)));

    let departments: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM departments WHERE department_abbreviation = $1")
            .bind("DEP-r2")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(departments, 0);
}

#[tokio::test]
async fn test_meetings_load_is_idempotent() {
    let Some(pool) = test_pool().await else { return };
    let countries = load_countries(&pool).await.unwrap();
    RosterLoader::new(pool.clone())
        .upsert_department(&department("m1"), &countries)
        .await
        .unwrap();

    let meetings = vec![
        Meeting {
            date: NaiveDate::from_ymd_opt(2017, 3, 14),
            cancelled: false,
            location: "Brussels".to_string(),
            subject: "Trade".to_string(),
            entities: vec![
                EntityRef::Registered("1234-56".to_string()),
                EntityRef::Unregistered,
            ],
            participants: Participants::Leader("lead-m1".to_string()),
        },
        Meeting {
            date: None,
            cancelled: true,
            location: "Strasbourg".to_string(),
            subject: "Energy".to_string(),
            entities: vec![],
            participants: Participants::Members(vec!["member-m1".to_string()]),
        },
    ];
    let loader = MeetingLoader::new(pool.clone());

    let first = loader.load("host-m1", &meetings).await.unwrap();
    let second = loader.load("host-m1", &meetings).await.unwrap();
    assert_eq!(first, second);

    let links: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM meetings_entities WHERE meeting_id = $1")
            .bind(first[0])
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(links, 2);

    let members: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM meetings_members WHERE meeting_id = $1")
            .bind(first[1])
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(members, 1);
}

#[tokio::test]
async fn test_meetings_differing_only_by_entity_stay_separate() {
    let Some(pool) = test_pool().await else { return };
    let countries = load_countries(&pool).await.unwrap();
    RosterLoader::new(pool.clone())
        .upsert_department(&department("m2"), &countries)
        .await
        .unwrap();

    let meeting = |entity: &str, cancelled: bool| Meeting {
        date: NaiveDate::from_ymd_opt(2018, 5, 2),
        cancelled,
        location: "Brussels".to_string(),
        subject: "Trade policy".to_string(),
        entities: vec![EntityRef::Registered(entity.to_string())],
        participants: Participants::Leader("lead-m2".to_string()),
    };
    let loader = MeetingLoader::new(pool.clone());

    let ids = loader
        .load(
            "host-m2",
            &[meeting("1111-11", false), meeting("2222-22", true)],
        )
        .await
        .unwrap();
    assert_ne!(ids[0], ids[1]);

    let stored: Vec<(i64, bool)> = sqlx::query_as(
        "SELECT meeting_id, meeting_cancelled FROM meetings \
         WHERE meeting_host = $1 ORDER BY meeting_id",
    )
    .bind("host-m2")
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(stored, vec![(ids[0], false), (ids[1], true)]);

    let entity: String =
        sqlx::query_scalar("SELECT entity_id FROM meetings_entities WHERE meeting_id = $1")
            .bind(ids[0])
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(entity, "1111-11");
}
