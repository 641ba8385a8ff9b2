// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running
//! (`FIRESTORE_EMULATOR_HOST`). Every test uses fresh UUIDs, so runs do not
//! interfere with each other.

use chrono::{Duration, TimeZone, Utc};
use collab_notes::db::NoteStore;
use collab_notes::models::{CollaboratorGrant, NewNote, NotePatch, Profile};
use collab_notes::services::{NoteRepository, SystemClock};
use std::sync::Arc;
use uuid::Uuid;

mod common;
use common::test_db;

fn new_note(owner: Uuid, title: &str, at: chrono::DateTime<Utc>) -> NewNote {
    NewNote {
        title: title.to_string(),
        content: format!("<h1>{}</h1>", title),
        user_id: owner,
        created_at: at,
        updated_at: at,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// NOTE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_note_insert_update_roundtrip() {
    require_emulator!();

    let db = test_db().await;
    let owner = Uuid::new_v4();
    let created = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();

    let note = db.insert_note(&new_note(owner, "Draft", created)).await.unwrap();
    let fetched = db.get_note(note.id).await.unwrap().unwrap();
    assert_eq!(fetched, note);

    let updated_at = created + Duration::seconds(5);
    let found = db
        .update_note(
            note.id,
            &NotePatch {
                title: None,
                content: Some("<p>body</p>".to_string()),
            },
            updated_at,
        )
        .await
        .unwrap();
    assert!(found);

    let fetched = db.get_note(note.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "Draft");
    assert_eq!(fetched.content, "<p>body</p>");
    assert_eq!(fetched.created_at, created);
    assert_eq!(fetched.updated_at, updated_at);
}

#[tokio::test]
async fn test_update_missing_note_reports_false() {
    require_emulator!();

    let db = test_db().await;
    let found = db
        .update_note(
            Uuid::new_v4(),
            &NotePatch {
                title: Some("x".to_string()),
                content: None,
            },
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!found);
}

#[tokio::test]
async fn test_list_notes_by_owner_most_recent_first() {
    require_emulator!();

    let db = test_db().await;
    let owner = Uuid::new_v4();
    let base = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();

    let first = db.insert_note(&new_note(owner, "T1", base)).await.unwrap();
    let second = db
        .insert_note(&new_note(owner, "T2", base + Duration::minutes(1)))
        .await
        .unwrap();
    let third = db
        .insert_note(&new_note(owner, "T3", base + Duration::minutes(2)))
        .await
        .unwrap();
    db.insert_note(&new_note(Uuid::new_v4(), "other", base))
        .await
        .unwrap();

    let ids: Vec<Uuid> = db
        .list_notes_by_owner(owner)
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    assert_eq!(ids, vec![third.id, second.id, first.id]);
}

// ═══════════════════════════════════════════════════════════════════════════
// PROFILE & GRANT TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_profile_insert_is_unique() {
    require_emulator!();

    let db = test_db().await;
    let now = Utc::now();
    let email = format!("{}@example.com", Uuid::new_v4());
    let profile = Profile {
        id: Uuid::new_v4(),
        email: email.clone(),
        full_name: Some("Test User".to_string()),
        avatar_url: None,
        created_at: now,
        updated_at: now,
    };

    assert!(db.insert_profile(&profile).await.unwrap());
    assert!(!db.insert_profile(&profile).await.unwrap());

    let by_email = db.find_profile_by_email(&email).await.unwrap().unwrap();
    assert_eq!(by_email.id, profile.id);
}

#[tokio::test]
async fn test_grant_insert_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let note_id = Uuid::new_v4();
    let user_id = Uuid::new_v4();
    let grant = CollaboratorGrant::new(note_id, user_id, Utc::now());

    assert!(db.insert_grant(&grant).await.unwrap());
    assert!(!db.insert_grant(&grant).await.unwrap());

    assert_eq!(db.list_grants_for_note(note_id).await.unwrap().len(), 1);
    assert_eq!(db.list_grants_for_user(user_id).await.unwrap().len(), 1);
    assert!(db.get_grant(note_id, user_id).await.unwrap().is_some());
    assert!(db.get_grant(note_id, Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_shared_notes_most_recent_first() {
    require_emulator!();

    let db = Arc::new(test_db().await);
    let collaborator = Uuid::new_v4();
    let base = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();

    // Inserted out of order, each by a different owner.
    let mut expected = Vec::new();
    for minutes in [1, 0, 2] {
        let note = db
            .insert_note(&new_note(
                Uuid::new_v4(),
                &format!("T{}", minutes + 1),
                base + Duration::minutes(minutes),
            ))
            .await
            .unwrap();
        db.insert_grant(&CollaboratorGrant::new(note.id, collaborator, base))
            .await
            .unwrap();
        expected.push((minutes, note.id));
    }
    expected.sort_by(|a, b| b.0.cmp(&a.0));

    let repo = NoteRepository::new(db, Arc::new(SystemClock::new()));
    let ids: Vec<Uuid> = repo
        .list_collaborative_notes(collaborator)
        .await
        .unwrap()
        .into_iter()
        .map(|shared| shared.note.id)
        .collect();
    assert_eq!(
        ids,
        expected.into_iter().map(|(_, id)| id).collect::<Vec<_>>()
    );
}
