// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Notes (title, rich-text content, owner)
//! - Profiles (one per authenticated user)
//! - Note collaborators (grant edges keyed by `{note_id}_{user_id}`)
//!
//! Documents are decoded into `*Doc` structs and converted into domain
//! models with `TryFrom`, so malformed rows are rejected at this boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firestore::errors::FirestoreError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{collections, NoteStore};
use crate::error::AppError;
use crate::models::{CollaboratorGrant, NewNote, Note, NotePatch, Profile};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

// ─── Document Shapes ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NoteDoc {
    id: String,
    title: String,
    content: String,
    user_id: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileDoc {
    id: String,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    created_at: DateTime<Utc>,
    #[serde(with = "firestore::serialize_as_timestamp")]
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GrantDoc {
    id: String,
    note_id: String,
    user_id: String,
    #[serde(with = "firestore::serialize_as_timestamp")]
    created_at: DateTime<Utc>,
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::Database(format!("Malformed {} id in document: {:?}", what, raw)))
}

impl TryFrom<NoteDoc> for Note {
    type Error = AppError;

    fn try_from(doc: NoteDoc) -> Result<Self, Self::Error> {
        Ok(Note {
            id: parse_id(&doc.id, "note")?,
            title: doc.title,
            content: doc.content,
            user_id: parse_id(&doc.user_id, "owner")?,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

impl From<&Note> for NoteDoc {
    fn from(note: &Note) -> Self {
        NoteDoc {
            id: note.id.to_string(),
            title: note.title.clone(),
            content: note.content.clone(),
            user_id: note.user_id.to_string(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl TryFrom<ProfileDoc> for Profile {
    type Error = AppError;

    fn try_from(doc: ProfileDoc) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: parse_id(&doc.id, "profile")?,
            email: doc.email,
            full_name: doc.full_name,
            avatar_url: doc.avatar_url,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        })
    }
}

impl From<&Profile> for ProfileDoc {
    fn from(profile: &Profile) -> Self {
        ProfileDoc {
            id: profile.id.to_string(),
            email: profile.email.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

impl TryFrom<GrantDoc> for CollaboratorGrant {
    type Error = AppError;

    fn try_from(doc: GrantDoc) -> Result<Self, Self::Error> {
        Ok(CollaboratorGrant {
            id: doc.id,
            note_id: parse_id(&doc.note_id, "note")?,
            user_id: parse_id(&doc.user_id, "user")?,
            created_at: doc.created_at,
        })
    }
}

impl From<&CollaboratorGrant> for GrantDoc {
    fn from(grant: &CollaboratorGrant) -> Self {
        GrantDoc {
            id: grant.id.clone(),
            note_id: grant.note_id.to_string(),
            user_id: grant.user_id.to_string(),
            created_at: grant.created_at,
        }
    }
}

fn convert_all<D, T>(docs: Vec<D>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<D, Error = AppError>,
{
    docs.into_iter().map(T::try_from).collect()
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator accepts any bearer token; skip real credentials.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    /// Insert a document, reporting `false` if one already exists under the ID.
    async fn insert_unique<T>(&self, collection: &str, doc_id: &str, doc: &T) -> Result<bool, AppError>
    where
        T: Serialize + for<'de> Deserialize<'de> + Send + Sync,
    {
        let result: Result<T, FirestoreError> = self
            .get_client()?
            .fluent()
            .insert()
            .into(collection)
            .document_id(doc_id)
            .object(doc)
            .execute()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(FirestoreError::DataConflictError(_)) => {
                tracing::debug!(collection, doc_id, "Document already exists");
                Ok(false)
            }
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }
}

#[async_trait]
impl NoteStore for FirestoreDb {
    // ─── Note Operations ─────────────────────────────────────────

    async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>, AppError> {
        let doc: Option<NoteDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::NOTES)
            .obj()
            .one(&note_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        doc.map(Note::try_from).transpose()
    }

    async fn insert_note(&self, note: &NewNote) -> Result<Note, AppError> {
        let stored = Note {
            id: Uuid::new_v4(),
            title: note.title.clone(),
            content: note.content.clone(),
            user_id: note.user_id,
            created_at: note.created_at,
            updated_at: note.updated_at,
        };
        let doc = NoteDoc::from(&stored);

        if !self
            .insert_unique(collections::NOTES, &doc.id, &doc)
            .await?
        {
            return Err(AppError::Database(format!(
                "Note id collision on insert: {}",
                doc.id
            )));
        }

        Ok(stored)
    }

    async fn update_note(
        &self,
        note_id: Uuid,
        patch: &NotePatch,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let Some(mut note) = self.get_note(note_id).await? else {
            return Ok(false);
        };
        patch.apply_to(&mut note, updated_at);

        // Only the patched fields are written; concurrent writers of the
        // other field are not clobbered.
        let mut fields = vec!["updated_at"];
        if patch.title.is_some() {
            fields.push("title");
        }
        if patch.content.is_some() {
            fields.push("content");
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(fields)
            .in_col(collections::NOTES)
            .document_id(note_id.to_string())
            .object(&NoteDoc::from(&note))
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(true)
    }

    async fn list_notes_by_owner(&self, user_id: Uuid) -> Result<Vec<Note>, AppError> {
        let owner = user_id.to_string();
        let docs: Vec<NoteDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTES)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .order_by([("updated_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        convert_all(docs)
    }

    // ─── Profile Operations ──────────────────────────────────────

    async fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        let doc: Option<ProfileDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(&user_id.to_string())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        doc.map(Profile::try_from).transpose()
    }

    async fn find_profile_by_email(&self, email: &str) -> Result<Option<Profile>, AppError> {
        let email = email.to_string();
        let docs: Vec<ProfileDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        docs.into_iter().next().map(Profile::try_from).transpose()
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<bool, AppError> {
        let doc = ProfileDoc::from(profile);
        self.insert_unique(collections::PROFILES, &doc.id, &doc)
            .await
    }

    // ─── Collaborator Operations ─────────────────────────────────

    async fn get_grant(
        &self,
        note_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CollaboratorGrant>, AppError> {
        let doc: Option<GrantDoc> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::NOTE_COLLABORATORS)
            .obj()
            .one(&CollaboratorGrant::key(note_id, user_id))
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        doc.map(CollaboratorGrant::try_from).transpose()
    }

    async fn insert_grant(&self, grant: &CollaboratorGrant) -> Result<bool, AppError> {
        let doc = GrantDoc::from(grant);
        self.insert_unique(collections::NOTE_COLLABORATORS, &doc.id, &doc)
            .await
    }

    async fn list_grants_for_note(
        &self,
        note_id: Uuid,
    ) -> Result<Vec<CollaboratorGrant>, AppError> {
        let note = note_id.to_string();
        let docs: Vec<GrantDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTE_COLLABORATORS)
            .filter(move |q| q.for_all([q.field("note_id").eq(note.clone())]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        convert_all(docs)
    }

    async fn list_grants_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<CollaboratorGrant>, AppError> {
        let user = user_id.to_string();
        let docs: Vec<GrantDoc> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::NOTE_COLLABORATORS)
            .filter(move |q| q.for_all([q.field("user_id").eq(user.clone())]))
            .order_by([("created_at", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        convert_all(docs)
    }
}
