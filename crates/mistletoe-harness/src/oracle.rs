//! Exhaustive reference resolver for small rosters.
//!
//! Used as ground truth: if the oracle finds no assignment, none exists, and
//! the real resolver must report infeasibility.

use mistletoe_core::{Assignment, ExclusionGraph, ParticipantId, RosterSnapshot};

/// Largest roster the oracle is meant for. Search is factorial in roster size.
pub const ORACLE_MAX_PARTICIPANTS: usize = 7;

/// Find any valid assignment by backtracking over giftee choices.
///
/// Returns `None` when the roster has fewer than two participants or when the
/// exclusions rule out every assignment.
pub fn brute_force(roster: &RosterSnapshot, graph: &ExclusionGraph) -> Option<Assignment> {
    let ids: Vec<&ParticipantId> = roster.ids().collect();
    if ids.len() < 2 {
        return None;
    }

    let mut taken = vec![false; ids.len()];
    let mut giftee_of = Vec::with_capacity(ids.len());
    if !search(&ids, graph, &mut taken, &mut giftee_of) {
        return None;
    }

    Some(
        giftee_of
            .iter()
            .enumerate()
            .map(|(giver, &giftee)| (ids[giver].clone(), ids[giftee].clone()))
            .collect(),
    )
}

/// Whether any valid assignment exists.
pub fn is_feasible(roster: &RosterSnapshot, graph: &ExclusionGraph) -> bool {
    brute_force(roster, graph).is_some()
}

fn search(
    ids: &[&ParticipantId],
    graph: &ExclusionGraph,
    taken: &mut [bool],
    giftee_of: &mut Vec<usize>,
) -> bool {
    let giver = giftee_of.len();
    if giver == ids.len() {
        return true;
    }

    for giftee in 0..ids.len() {
        if giftee == giver || taken[giftee] || !graph.allows(ids[giver], ids[giftee]) {
            continue;
        }
        taken[giftee] = true;
        giftee_of.push(giftee);
        if search(ids, graph, taken, giftee_of) {
            return true;
        }
        giftee_of.pop();
        taken[giftee] = false;
    }

    false
}
