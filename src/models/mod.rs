// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod collaborator;
pub mod note;
pub mod profile;

pub use collaborator::{CollaboratorGrant, GrantOutcome};
pub use note::{NewNote, Note, NotePatch, OwnedNote, SharedNote};
pub use profile::{IdentityUser, Profile};
