//! Bipartite matching over the allowed giver → giftee edges.
//!
//! Both sides are the same roster, indexed by position in the snapshot. An
//! edge `(giver, giftee)` exists iff `giver != giftee` and the pair is not
//! excluded, so a perfect matching is exactly a valid assignment.
//!
//! The search is Kuhn's augmenting-path algorithm with an explicit stack, so
//! long alternating paths on large rosters cannot overflow the call stack.
//! Candidate giftees are scanned in index order, which makes the result
//! deterministic for a given roster.

use std::collections::VecDeque;

/// Allowed-edge view of a roster, stored as sorted excluded indices per giver.
#[derive(Debug, Clone)]
pub(crate) struct CandidateGraph {
    excluded: Vec<Vec<usize>>,
}

impl CandidateGraph {
    /// `excluded[i]` must be sorted; it never needs to contain `i` itself.
    pub(crate) fn new(excluded: Vec<Vec<usize>>) -> Self {
        Self { excluded }
    }

    pub(crate) fn len(&self) -> usize {
        self.excluded.len()
    }

    pub(crate) fn allows(&self, giver: usize, giftee: usize) -> bool {
        giver != giftee && self.excluded[giver].binary_search(&giftee).is_err()
    }

    /// Number of giftees this giver may be assigned.
    pub(crate) fn degree(&self, giver: usize) -> usize {
        let n = self.len();
        let excluded = self.excluded[giver].iter().filter(|&&j| j != giver && j < n).count();
        n.saturating_sub(1).saturating_sub(excluded)
    }

    /// Whether a full permutation (`giftees[giver]`) respects every edge.
    pub(crate) fn accepts(&self, giftees: &[usize]) -> bool {
        giftees.iter().enumerate().all(|(giver, &giftee)| self.allows(giver, giftee))
    }
}

/// Outcome of a maximum matching run.
#[derive(Debug, Clone)]
pub(crate) struct Matching {
    /// `giftee_of[giver]`
    pub(crate) giftee_of: Vec<Option<usize>>,
    /// `giver_of[giftee]`
    pub(crate) giver_of: Vec<Option<usize>>,
}

impl Matching {
    pub(crate) fn size(&self) -> usize {
        self.giftee_of.iter().flatten().count()
    }

    pub(crate) fn is_perfect(&self) -> bool {
        self.size() == self.giftee_of.len()
    }
}

/// The search was stopped by its budget callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Aborted;

struct Frame {
    giver: usize,
    cursor: usize,
}

/// Compute a maximum matching.
///
/// `keep_going` is polled once per augmenting search; returning `false`
/// aborts the run.
pub(crate) fn maximum_matching(
    graph: &CandidateGraph,
    mut keep_going: impl FnMut() -> bool,
) -> Result<Matching, Aborted> {
    let n = graph.len();
    let mut matching = Matching { giftee_of: vec![None; n], giver_of: vec![None; n] };
    let mut visited = vec![false; n];

    for start in 0..n {
        if !keep_going() {
            return Err(Aborted);
        }
        visited.fill(false);
        augment(graph, start, &mut matching, &mut visited);
    }

    Ok(matching)
}

/// Search one augmenting path from an unmatched giver and flip it.
fn augment(graph: &CandidateGraph, start: usize, matching: &mut Matching, visited: &mut [bool]) {
    let n = graph.len();
    let mut stack = vec![Frame { giver: start, cursor: 0 }];
    // path[k] is the giftee frame k took to reach frame k + 1
    let mut path: Vec<usize> = Vec::new();

    while let Some(top) = stack.last_mut() {
        let giver = top.giver;
        let mut next = None;

        while top.cursor < n {
            let giftee = top.cursor;
            top.cursor += 1;
            if !visited[giftee] && graph.allows(giver, giftee) {
                visited[giftee] = true;
                next = Some(giftee);
                break;
            }
        }

        let Some(giftee) = next else {
            stack.pop();
            path.pop();
            continue;
        };

        match matching.giver_of[giftee] {
            None => {
                path.push(giftee);
                for (frame, &giftee) in stack.iter().zip(&path) {
                    matching.giftee_of[frame.giver] = Some(giftee);
                    matching.giver_of[giftee] = Some(frame.giver);
                }
                return;
            },
            Some(owner) => {
                path.push(giftee);
                stack.push(Frame { giver: owner, cursor: 0 });
            },
        }
    }
}

/// Givers that cannot all be served and the strictly smaller set of giftees
/// they can reach.
///
/// Starting from every unmatched giver, follow allowed edges to giftees and
/// matched edges back to givers. With a maximum matching every giftee reached
/// is matched, so the reached givers outnumber the reached giftees.
pub(crate) fn hall_violator(
    graph: &CandidateGraph,
    matching: &Matching,
) -> (Vec<usize>, Vec<usize>) {
    let n = graph.len();
    let mut seen_giver = vec![false; n];
    let mut seen_giftee = vec![false; n];
    let mut queue: VecDeque<usize> = VecDeque::new();

    for giver in 0..n {
        if matching.giftee_of[giver].is_none() {
            seen_giver[giver] = true;
            queue.push_back(giver);
        }
    }

    while let Some(giver) = queue.pop_front() {
        for giftee in 0..n {
            if seen_giftee[giftee] || !graph.allows(giver, giftee) {
                continue;
            }
            seen_giftee[giftee] = true;
            if let Some(owner) = matching.giver_of[giftee] {
                if !seen_giver[owner] {
                    seen_giver[owner] = true;
                    queue.push_back(owner);
                }
            }
        }
    }

    let pick = |seen: Vec<bool>| {
        seen.into_iter().enumerate().filter_map(|(i, s)| s.then_some(i)).collect::<Vec<_>>()
    };
    (pick(seen_giver), pick(seen_giftee))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(excluded: Vec<Vec<usize>>) -> (CandidateGraph, Matching) {
        let graph = CandidateGraph::new(excluded);
        let matching = maximum_matching(&graph, || true).unwrap();
        (graph, matching)
    }

    #[test]
    fn unconstrained_roster_has_perfect_matching() {
        let (graph, matching) = run(vec![vec![]; 5]);
        assert!(matching.is_perfect());

        let giftees: Vec<usize> = matching.giftee_of.iter().map(|g| g.unwrap()).collect();
        assert!(graph.accepts(&giftees));
    }

    #[test]
    fn augmenting_path_reassigns_earlier_givers() {
        // 2 can only give to 1, which 0 took first; 0 must move over to 2.
        let (graph, matching) = run(vec![vec![], vec![], vec![0]]);
        assert!(matching.is_perfect());
        assert_eq!(matching.giftee_of, vec![Some(2), Some(0), Some(1)]);

        let giftees: Vec<usize> = matching.giftee_of.iter().map(|g| g.unwrap()).collect();
        assert!(graph.accepts(&giftees));
    }

    #[test]
    fn hall_violator_names_the_bottleneck() {
        // 0, 1 and 3 can only reach 2.
        let (graph, matching) = run(vec![vec![1, 3], vec![0, 3], vec![], vec![0, 1]]);
        assert!(!matching.is_perfect());

        let (constrained, available) = hall_violator(&graph, &matching);
        assert!(constrained.len() > available.len());
        assert!(constrained.contains(&0) && constrained.contains(&1));
        assert_eq!(available, vec![2]);
    }

    #[test]
    fn degree_counts_allowed_giftees() {
        let graph = CandidateGraph::new(vec![vec![1, 2], vec![0], vec![0]]);
        assert_eq!(graph.degree(0), 0);
        assert_eq!(graph.degree(1), 1);
    }

    #[test]
    fn budget_callback_aborts() {
        let graph = CandidateGraph::new(vec![vec![]; 4]);
        let mut polls = 0;
        let result = maximum_matching(&graph, || {
            polls += 1;
            polls < 3
        });
        assert_eq!(result.err(), Some(Aborted));
    }
}
