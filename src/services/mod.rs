// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod access;
pub mod autosave;
pub mod clock;
pub mod identity;
pub mod notes;
pub mod sessions;

pub use access::{AccessResolver, AccessRole, Permission};
pub use autosave::{AutosaveController, Draft, SaveState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use identity::{AuthApiClient, IdentityProvider, ProviderSession};
pub use notes::{NoteRepository, NoteWriter};
pub use sessions::{EditEvent, EditSessions, SessionStatus};
