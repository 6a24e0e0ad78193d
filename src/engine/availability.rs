use std::collections::HashSet;

use crate::model::*;

/// Room types that fit `guest_count` and still have a free room, cheapest first.
///
/// One row per type no matter how many of its rooms are free. Equal prices
/// fall back to ascending id so the order never depends on input order.
pub fn available_room_types(
    room_types: &[RoomType],
    rooms: &[Room],
    unavailable: &HashSet<RoomId>,
    guest_count: u32,
) -> Vec<AvailableRoomType> {
    let types_with_free_room: HashSet<RoomTypeId> = rooms
        .iter()
        .filter(|room| !unavailable.contains(&room.id))
        .map(|room| room.room_type_id)
        .collect();

    let mut seen = HashSet::new();
    let mut result: Vec<AvailableRoomType> = room_types
        .iter()
        .filter(|rt| rt.capacity >= guest_count)
        .filter(|rt| types_with_free_room.contains(&rt.id))
        .filter(|rt| seen.insert(rt.id))
        .map(AvailableRoomType::from)
        .collect();

    result.sort_by(|a, b| {
        a.price_per_night
            .total_cmp(&b.price_per_night)
            .then(a.id.cmp(&b.id))
    });
    result
}
