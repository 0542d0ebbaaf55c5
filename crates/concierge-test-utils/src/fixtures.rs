// SPDX-FileCopyrightText: 2026 Concierge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identity fixtures.

use concierge_core::{GuestIdentity, StaffIdentity};

/// A guest with a room and an email derived from `guest_id`.
pub fn guest(guest_id: &str) -> GuestIdentity {
    GuestIdentity {
        guest_id: guest_id.to_string(),
        name: "Ada Lovelace".to_string(),
        email: Some(format!("{guest_id}@example.com")),
        room_number: Some("204".to_string()),
    }
}

pub fn staff(staff_id: &str) -> StaffIdentity {
    StaffIdentity {
        staff_id: staff_id.to_string(),
        name: format!("Staff {staff_id}"),
    }
}
