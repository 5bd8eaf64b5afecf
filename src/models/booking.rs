//! Booking model and its append-only note history.
//!
//! A booking is one patient's reserved date at a facility. Its approval
//! `status` belongs to an external workflow; this crate only ever moves
//! `target_date` (during overbooking correction) and records each move as
//! a structured [`NoteEntry`]. Notes are never edited or removed.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::GestationalAge;

/// Opaque booking identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub String);

impl BookingId {
    /// Creates an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BookingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Approval state, owned by the external workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Awaiting approval.
    #[default]
    Pending,
    /// Approved.
    Approved,
    /// Rejected; does not occupy capacity.
    Rejected,
}

impl BookingStatus {
    /// Whether a booking in this state counts against capacity.
    #[inline]
    pub fn is_active(self) -> bool {
        self != BookingStatus::Rejected
    }
}

/// What a note records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteKind {
    /// The booking was moved off an overbooked date.
    Relocated {
        /// Date before the move.
        original_date: NaiveDate,
        /// Date after the move.
        new_date: NaiveDate,
        /// `new_date - original_date` in days.
        shift_days: i32,
    },
    /// No free date was found near an overbooked date.
    NoSlotFound {
        /// The overbooked date the booking stays on.
        original_date: NaiveDate,
        /// Search radius that was exhausted.
        window_days: u32,
    },
    /// Free text supplied by an operator or upstream import.
    Remark(String),
}

/// One immutable entry in a booking's note history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    /// When the entry was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Entry content.
    pub kind: NoteKind,
}

impl NoteEntry {
    /// Relocation entry.
    pub fn relocated(
        recorded_at: DateTime<Utc>,
        original_date: NaiveDate,
        new_date: NaiveDate,
        shift_days: i32,
    ) -> Self {
        Self {
            recorded_at,
            kind: NoteKind::Relocated {
                original_date,
                new_date,
                shift_days,
            },
        }
    }

    /// Manual-review entry.
    pub fn no_slot_found(
        recorded_at: DateTime<Utc>,
        original_date: NaiveDate,
        window_days: u32,
    ) -> Self {
        Self {
            recorded_at,
            kind: NoteKind::NoSlotFound {
                original_date,
                window_days,
            },
        }
    }

    /// Free-text entry.
    pub fn remark(recorded_at: DateTime<Utc>, text: impl Into<String>) -> Self {
        Self {
            recorded_at,
            kind: NoteKind::Remark(text.into()),
        }
    }
}

impl fmt::Display for NoteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NoteKind::Relocated {
                original_date,
                new_date,
                shift_days,
            } => write!(
                f,
                "[AUTO-CORRECTION {}]: date moved from {} to {} ({:+} days) due to capacity overflow.",
                self.recorded_at.to_rfc3339(),
                original_date,
                new_date,
                shift_days
            ),
            NoteKind::NoSlotFound {
                original_date,
                window_days,
            } => write!(
                f,
                "NO SLOT AVAILABLE: {} exceeded capacity and no slot was found within ±{} days. MANUAL REVIEW REQUIRED.",
                original_date, window_days
            ),
            NoteKind::Remark(text) => f.write_str(text),
        }
    }
}

/// Ordered, append-only note history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteLog {
    entries: Vec<NoteEntry>,
}

impl NoteLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry at the end.
    pub fn append(&mut self, entry: NoteEntry) {
        self.entries.push(entry);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[NoteEntry] {
        &self.entries
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&NoteEntry> {
        self.entries.last()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Renders the whole history as the free-text field shown to users,
/// entries separated by a blank line.
impl fmt::Display for NoteLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("\n\n")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// A booked delivery/procedure date at a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Store-assigned identifier.
    pub id: BookingId,
    /// Facility name as received (casing not normalized).
    pub facility: String,
    /// Scheduled date.
    pub target_date: NaiveDate,
    /// When the booking was registered (FIFO key).
    pub registered_at: DateTime<Utc>,
    /// Approval state.
    pub status: BookingStatus,
    /// GA at the time the booking was computed.
    pub ga_snapshot: GestationalAge,
    /// Append-only note history.
    pub notes: NoteLog,
    /// Hint for the external workflow that a human must look at this booking.
    pub needs_review: bool,
}

impl Booking {
    /// Creates a pending booking with no notes.
    pub fn new(
        id: impl Into<BookingId>,
        facility: impl Into<String>,
        target_date: NaiveDate,
        registered_at: DateTime<Utc>,
        ga_snapshot: GestationalAge,
    ) -> Self {
        Self {
            id: id.into(),
            facility: facility.into(),
            target_date,
            registered_at,
            status: BookingStatus::Pending,
            ga_snapshot,
            notes: NoteLog::new(),
            needs_review: false,
        }
    }

    /// Sets the approval status.
    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    /// Appends a note.
    pub fn with_note(mut self, entry: NoteEntry) -> Self {
        self.notes.append(entry);
        self
    }

    /// Whether the booking occupies capacity.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Moves the booking and records the move in its notes.
    pub fn apply_relocation(&mut self, new_date: NaiveDate, note: NoteEntry) {
        self.target_date = new_date;
        self.notes.append(note);
    }

    /// Raises the review hint and records why.
    pub fn flag_for_review(&mut self, note: NoteEntry) {
        self.needs_review = true;
        self.notes.append(note);
    }

    /// Whether a no-slot note was already recorded for `date`.
    pub fn has_no_slot_note(&self, date: NaiveDate) -> bool {
        self.notes.entries().iter().any(|entry| {
            matches!(
                entry.kind,
                NoteKind::NoSlotFound { original_date, .. } if original_date == date
            )
        })
    }
}
