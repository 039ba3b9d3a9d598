//! Pure port occupancy queries over a structure's ports and splice rows.

use fibermesh_core::{FiberSummary, MergeGroupId, Port, Side, Splice};

/// Port numbers on `side`, ascending and deduplicated.
pub fn side_ports(ports: &[Port], side: Side) -> Vec<u32> {
    let direction = side.direction();
    let mut numbers: Vec<u32> = ports
        .iter()
        .filter(|port| port.direction == direction)
        .map(|port| port.port_number)
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

/// Free ports on `side` from `start_port` upward, stopping at the first
/// occupied port.
///
/// Ports beyond an occupied one are never returned, even when free.
pub fn available_ports(
    ports: &[Port],
    splices: &[Splice],
    side: Side,
    start_port: u32,
) -> Vec<u32> {
    side_ports(ports, side)
        .into_iter()
        .filter(|port_number| *port_number >= start_port)
        .take_while(|port_number| !is_occupied(splices, *port_number, side))
        .collect()
}

pub fn row(splices: &[Splice], port_number: u32) -> Option<&Splice> {
    splices.iter().find(|splice| splice.port_number == port_number)
}

pub fn merge_group_of(splices: &[Splice], port_number: u32, side: Side) -> Option<MergeGroupId> {
    row(splices, port_number).and_then(|splice| splice.merge_group(side))
}

/// Ports whose `side` endpoint references `group`, ascending.
pub fn group_ports(splices: &[Splice], group: MergeGroupId, side: Side) -> Vec<u32> {
    let mut ports: Vec<u32> = splices
        .iter()
        .filter(|splice| splice.merge_group(side) == Some(group))
        .map(|splice| splice.port_number)
        .collect();
    ports.sort_unstable();
    ports
}

/// Side a merge group lives on, judged from the rows that reference it.
pub fn group_side(splices: &[Splice], group: MergeGroupId) -> Option<Side> {
    [Side::A, Side::B]
        .into_iter()
        .find(|side| splices.iter().any(|splice| splice.merge_group(*side) == Some(group)))
}

/// The fiber on `(port_number, side)`, recorded on the row itself or on any
/// row of its merge group.
pub fn port_occupant(splices: &[Splice], port_number: u32, side: Side) -> Option<&FiberSummary> {
    let row = row(splices, port_number)?;
    if let Some(fiber) = row.fiber(side) {
        return Some(fiber);
    }
    let group = row.merge_group(side)?;
    splices
        .iter()
        .filter(|splice| splice.merge_group(side) == Some(group))
        .find_map(|splice| splice.fiber(side))
}

pub fn is_occupied(splices: &[Splice], port_number: u32, side: Side) -> bool {
    port_occupant(splices, port_number, side).is_some()
}
