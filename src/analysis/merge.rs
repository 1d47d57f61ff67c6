// Bottom-up pruning of weak change point candidates
//
// Candidates from the windowed search were accepted with a relaxed p-value.
// The merger repeatedly drops the weakest one (highest p-value while any is
// insignificant, then smallest magnitude while below `min_magnitude`) and
// recomputes the stats of the two neighbours, whose segments just grew.
// Live candidates form a doubly linked list over a Vec, so removal and
// neighbour lookup are O(1).

use crate::analysis::significance::SignificanceTester;
use crate::analysis::Candidate;
use crate::error::Result;

#[derive(Debug, Clone, Copy)]
struct Node {
    candidate: Candidate,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LiveList {
    nodes: Vec<Node>,
    head: Option<usize>,
    len: usize,
}

impl LiveList {
    fn new(candidates: Vec<Candidate>) -> Self {
        let count = candidates.len();
        let nodes = candidates
            .into_iter()
            .enumerate()
            .map(|(i, candidate)| Node {
                candidate,
                prev: i.checked_sub(1),
                next: (i + 1 < count).then_some(i + 1),
            })
            .collect();
        Self {
            nodes,
            head: (count > 0).then_some(0),
            len: count,
        }
    }

    fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::successors(self.head, move |&i| self.nodes[i].next)
    }

    fn unlink(&mut self, slot: usize) {
        let Node { prev, next, .. } = self.nodes[slot];
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        if let Some(n) = next {
            self.nodes[n].prev = prev;
        }
        self.len -= 1;
    }

    fn into_candidates(self) -> Vec<Candidate> {
        self.iter().map(|i| self.nodes[i].candidate).collect()
    }
}

/// First candidate with the largest p-value
fn weakest_by_pvalue(list: &LiveList) -> Option<usize> {
    let mut weakest: Option<usize> = None;
    for slot in list.iter() {
        let pvalue = list.nodes[slot].candidate.stats.pvalue;
        match weakest {
            Some(w) if pvalue <= list.nodes[w].candidate.stats.pvalue => {}
            _ => weakest = Some(slot),
        }
    }
    weakest
}

/// First candidate with the smallest magnitude
fn weakest_by_magnitude(list: &LiveList) -> Option<usize> {
    let mut weakest: Option<usize> = None;
    for slot in list.iter() {
        let magnitude = list.nodes[slot].candidate.stats.change_magnitude();
        match weakest {
            Some(w) if magnitude >= list.nodes[w].candidate.stats.change_magnitude() => {}
            _ => weakest = Some(slot),
        }
    }
    weakest
}

/// Prunes `candidates` (sorted by index, stats relative to their neighbours)
/// until every survivor has `pvalue <= max_pvalue` and a magnitude above
/// `min_magnitude`.
pub(crate) fn merge(
    candidates: Vec<Candidate>,
    series: &[f64],
    max_pvalue: f64,
    min_magnitude: f64,
    tester: &dyn SignificanceTester,
) -> Result<Vec<Candidate>> {
    let mut list = LiveList::new(candidates);

    while list.len > 0 {
        let Some(mut weakest) = weakest_by_pvalue(&list) else {
            break;
        };
        if list.nodes[weakest].candidate.stats.pvalue <= max_pvalue {
            let Some(smallest) = weakest_by_magnitude(&list) else {
                break;
            };
            // NaN magnitudes (both means zero) do not pass this check.
            if list.nodes[smallest].candidate.stats.change_magnitude() > min_magnitude {
                break;
            }
            weakest = smallest;
        }

        let Node { prev, next, candidate } = list.nodes[weakest];
        tracing::trace!(
            index = candidate.index,
            pvalue = candidate.stats.pvalue,
            "dropping change point candidate"
        );
        list.unlink(weakest);

        for slot in [prev, next].into_iter().flatten() {
            recompute(&mut list, slot, series, tester)?;
        }
    }

    Ok(list.into_candidates())
}

fn recompute(
    list: &mut LiveList,
    slot: usize,
    series: &[f64],
    tester: &dyn SignificanceTester,
) -> Result<()> {
    let node = list.nodes[slot];
    let begin = node.prev.map_or(0, |p| list.nodes[p].candidate.index);
    let end = node.next.map_or(series.len(), |n| list.nodes[n].candidate.index);
    let index = node.candidate.index;
    list.nodes[slot].candidate.stats = tester.compare(&series[begin..index], &series[index..end])?;
    Ok(())
}
