//! One-shot selection of the worst-case end device.
//!
//! The device furthest from the reference gateway is the one whose airtime
//! budget is tracked individually. Positions are static for the whole run
//! (device mobility is a non-goal), so the selection happens once from a
//! snapshot taken before the steady-state phase begins.

use lwsim_common::Position;

/// Index of the device furthest from `reference`, or `None` for an empty
/// slice.
///
/// Distances are Euclidean; ties resolve to the first index in iteration
/// order because only a strictly greater distance replaces the current
/// candidate.
pub fn furthest_device(positions: &[Position], reference: Position) -> Option<usize> {
    let mut furthest: Option<(usize, f64)> = None;
    for (index, position) in positions.iter().enumerate() {
        let distance = position.distance_to(&reference);
        match furthest {
            Some((_, max)) if distance <= max => {}
            _ => furthest = Some((index, distance)),
        }
    }
    furthest.map(|(index, _)| index)
}
