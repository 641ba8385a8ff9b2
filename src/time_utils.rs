// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Utc};

/// Long human date used in note templates, e.g. "October 18, 2026".
pub fn format_long_date(date: DateTime<Utc>) -> String {
    date.format("%B %d, %Y").to_string()
}
