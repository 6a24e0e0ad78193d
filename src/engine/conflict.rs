use std::collections::HashSet;

use crate::model::*;

/// Rooms that cannot be offered for `window`.
///
/// A room is out if it is under maintenance, or if a binding reservation
/// (confirmed or checked in) overlaps the window. Overlap is half-open:
/// a stay ending on the window's check-in day does not block it.
/// `Occupied` status is not consulted; reservation overlap is authoritative.
pub fn unavailable_rooms<'a>(
    window: &StayWindow,
    rooms: impl IntoIterator<Item = &'a Room>,
    reservations: impl IntoIterator<Item = &'a Reservation>,
) -> HashSet<RoomId> {
    let mut blocked: HashSet<RoomId> = reservations
        .into_iter()
        .filter(|r| r.blocks(window))
        .map(|r| r.room_id)
        .collect();

    for room in rooms {
        match room.status {
            RoomStatus::Maintenance => {
                blocked.insert(room.id);
            }
            RoomStatus::Occupied if !blocked.contains(&room.id) => {
                tracing::debug!(
                    "room {} is marked occupied but has no binding reservation in {window}",
                    room.room_number
                );
            }
            _ => {}
        }
    }

    blocked
}
