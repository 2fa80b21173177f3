// Copyright (c) 2025 - Cowboy AI, Inc.
//! Pure Validation Functions - Physical Invariants
//!
//! Pre-write checks run by the planner before a record is staged. All
//! functions are pure: they look only at the values handed in and return
//! the error the write would be rejected with.
//!
//! # Invariant Categories
//!
//! 1. **Naming**: record names follow [`validate_name`]
//! 2. **Heights**: datacenter/room heights are positive, racks are at least
//!    the minimum rack size and never taller than their room, hosts stay
//!    within the host height bounds
//! 3. **Slots**: a host occupies `[position, position + height)`, must fit
//!    inside its rack and must not overlap another host of the same rack
//! 4. **Shrinking**: a room cannot shrink below a contained rack, a rack
//!    cannot shrink below an occupied unit

use crate::config::Limits;
use crate::domain::{validate_name, EntityKind, Host, HostId, Rack};
use crate::errors::{HeightLimit, InventoryError, InventoryResult};

/// Validate a record name against the naming rules
pub fn check_name(kind: EntityKind, name: &str, limits: &Limits) -> InventoryResult<()> {
    validate_name(name, limits.max_name_length).map_err(|err| InventoryError::InvalidName {
        kind,
        name: name.to_string(),
        reason: err.to_string(),
    })
}

/// Datacenters and rooms only need a positive height
pub fn check_positive_height(kind: EntityKind, name: &str, height: u32) -> InventoryResult<()> {
    if height == 0 {
        return Err(InventoryError::InvalidHeight {
            kind,
            name: name.to_string(),
            height,
            min: 1,
            max: u32::MAX,
        });
    }
    Ok(())
}

/// Validate rack height against the minimum rack size and its room
///
/// # Rules
/// - `height >= limits.min_rack_height`
/// - `height <= room_height`
pub fn check_rack_height(
    rack: &str,
    height: u32,
    room_height: u32,
    limits: &Limits,
) -> InventoryResult<()> {
    if height < limits.min_rack_height {
        return Err(InventoryError::HeightExceeded {
            rack: rack.to_string(),
            height,
            bound: limits.min_rack_height,
            limit: HeightLimit::RackMinimum,
        });
    }
    if height > room_height {
        return Err(InventoryError::HeightExceeded {
            rack: rack.to_string(),
            height,
            bound: room_height,
            limit: HeightLimit::RoomHeight,
        });
    }
    Ok(())
}

/// Validate host height against the configured bounds
pub fn check_host_height(host: &str, height: u32, limits: &Limits) -> InventoryResult<()> {
    if !(limits.min_host_height..=limits.max_host_height).contains(&height) {
        return Err(InventoryError::InvalidHeight {
            kind: EntityKind::Host,
            name: host.to_string(),
            height,
            min: limits.min_host_height,
            max: limits.max_host_height,
        });
    }
    Ok(())
}

/// Whether `[position, position + height)` lies inside a rack of `rack_height` units
pub fn fits(position: u32, height: u32, rack_height: u32) -> bool {
    position >= 1
        && height >= 1
        && u64::from(position) + u64::from(height) - 1 <= u64::from(rack_height)
}

/// Validate that a host slot range fits its rack
pub fn check_slot_fit(rack: &Rack, host: &str, position: u32, height: u32) -> InventoryResult<()> {
    if !fits(position, height, rack.height) {
        return Err(InventoryError::SlotOutOfRange {
            rack: rack.name.clone(),
            host: host.to_string(),
            position,
            height,
            rack_height: rack.height,
        });
    }
    Ok(())
}

/// Validate that a host slot range does not overlap any other host of the rack
///
/// `host_id` is skipped so an update can be checked against its own old slot.
pub fn check_slot_free<'a>(
    rack: &Rack,
    host_id: HostId,
    host: &str,
    position: u32,
    height: u32,
    occupants: impl IntoIterator<Item = &'a Host>,
) -> InventoryResult<()> {
    let conflict = occupants
        .into_iter()
        .filter(|other| other.id != host_id)
        .find(|other| other.overlaps(position, height));

    match conflict {
        Some(occupant) => Err(InventoryError::SlotConflict {
            rack: rack.name.clone(),
            host: host.to_string(),
            position,
            height,
            occupant: occupant.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Lowest position where `height` free units start, if any
pub fn first_free_position<'a>(
    rack_height: u32,
    height: u32,
    occupants: impl IntoIterator<Item = &'a Host>,
) -> Option<u32> {
    if height == 0 || height > rack_height {
        return None;
    }
    let occupants: Vec<&Host> = occupants.into_iter().collect();
    (1..=rack_height - height + 1)
        .find(|&position| !occupants.iter().any(|host| host.overlaps(position, height)))
}

/// A room may not shrink below any rack it contains
pub fn check_room_shrink<'a>(
    new_height: u32,
    racks: impl IntoIterator<Item = &'a Rack>,
) -> InventoryResult<()> {
    match racks.into_iter().find(|rack| rack.height > new_height) {
        Some(rack) => Err(InventoryError::HeightExceeded {
            rack: rack.name.clone(),
            height: rack.height,
            bound: new_height,
            limit: HeightLimit::RoomHeight,
        }),
        None => Ok(()),
    }
}

/// A rack may not shrink below any occupied unit
pub fn check_rack_shrink<'a>(
    rack: &Rack,
    new_height: u32,
    hosts: impl IntoIterator<Item = &'a Host>,
) -> InventoryResult<()> {
    match hosts
        .into_iter()
        .find(|host| !fits(host.position, host.height, new_height))
    {
        Some(host) => Err(InventoryError::SlotOutOfRange {
            rack: rack.name.clone(),
            host: host.name.clone(),
            position: host.position,
            height: host.height,
            rack_height: new_height,
        }),
        None => Ok(()),
    }
}
