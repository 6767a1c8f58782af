//! Checkout suggestions: dart sequences that finish a leg from a remaining score.

use std::{
    cmp::{Ordering, Reverse},
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use super::{
    segment::Segment,
    x01::{DARTS_PER_TURN, FinishRule},
};

/// Maximum number of suggestions returned for one request.
pub const MAX_SUGGESTIONS: usize = 3;
/// Highest score a single dart can take off.
pub const MAX_DART_SCORE: u32 = 60;
/// Highest score that can be checked out with three darts under double-out.
pub const MAX_DOUBLE_OUT_CHECKOUT: u32 = 170;
/// Scores at or below 170 that no three-dart double-out route reaches.
pub const BOGEY_NUMBERS: [u32; 7] = [159, 162, 163, 165, 166, 168, 169];

/// Solutions collected by the single-out search before it stops exploring.
const SINGLE_OUT_SOLUTION_CAP: usize = 5;

/// Finishing doubles in order of preference; the inner bull comes last.
const PREFERRED_DOUBLES: [u8; 20] = [
    20, 16, 8, 18, 12, 10, 4, 2, 1, 14, 6, 19, 17, 15, 13, 11, 9, 7, 5, 3,
];

/// A sequence of darts finishing a leg.
pub type Route = Vec<Segment>;

/// Suggest up to [`MAX_SUGGESTIONS`] routes finishing `remaining_score` in at most
/// `darts_left` darts, fewest darts first.
///
/// Impossible requests yield an empty list. Routes never span turns, so a
/// `darts_left` above [`DARTS_PER_TURN`] searches with a single turn's darts.
pub fn compute_checkout_suggestions(
    remaining_score: u32,
    darts_left: u32,
    rule: FinishRule,
) -> Vec<Route> {
    if darts_left == 0
        || remaining_score == 0
        || remaining_score > darts_left.saturating_mul(MAX_DART_SCORE)
    {
        return Vec::new();
    }
    let darts = (darts_left as usize).min(DARTS_PER_TURN);

    match rule {
        FinishRule::DoubleOut => DOUBLE_OUT_TABLE.lookup(remaining_score, darts),
        FinishRule::SingleOut => single_out_routes(remaining_score, darts),
    }
}

static DOUBLE_OUT_TABLE: LazyLock<CheckoutTable> = LazyLock::new(CheckoutTable::build);

/// Precomputed double-out routes keyed by score, bucketed by dart count.
struct CheckoutTable {
    routes: HashMap<u32, [Vec<Route>; DARTS_PER_TURN]>,
}

impl CheckoutTable {
    fn build() -> Self {
        let setups = setup_segments();
        let finishers = finishing_segments();
        let mut routes: HashMap<u32, [Vec<Route>; DARTS_PER_TURN]> = HashMap::new();
        let mut push = |route: Route| {
            let score = route.iter().map(Segment::scored).sum::<u32>();
            if score <= MAX_DOUBLE_OUT_CHECKOUT {
                routes.entry(score).or_default()[route.len() - 1].push(route);
            }
        };

        for finisher in &finishers {
            push(vec![*finisher]);
            for (index, first) in setups.iter().enumerate() {
                push(vec![*first, *finisher]);
                // Setup darts are kept in descending order so permutations collapse.
                for second in &setups[index..] {
                    push(vec![*first, *second, *finisher]);
                }
            }
        }

        for buckets in routes.values_mut() {
            for bucket in buckets.iter_mut() {
                bucket.sort_by(compare_routes);
                bucket.truncate(MAX_SUGGESTIONS);
            }
        }

        Self { routes }
    }

    fn lookup(&self, score: u32, darts: usize) -> Vec<Route> {
        if BOGEY_NUMBERS.contains(&score) {
            return Vec::new();
        }
        let Some(buckets) = self.routes.get(&score) else {
            return Vec::new();
        };
        buckets[..darts]
            .iter()
            .flatten()
            .take(MAX_SUGGESTIONS)
            .cloned()
            .collect()
    }
}

/// Non-miss segments sorted from the highest to the lowest ordering key.
fn setup_segments() -> Vec<Segment> {
    let mut segments: Vec<Segment> = (1..=20)
        .flat_map(|n| [Segment::Single(n), Segment::Double(n), Segment::Triple(n)])
        .chain([Segment::OuterBull, Segment::InnerBull])
        .collect();
    segments.sort_by_key(|segment| Reverse(segment_key(segment)));
    segments
}

fn finishing_segments() -> Vec<Segment> {
    PREFERRED_DOUBLES
        .iter()
        .map(|n| Segment::Double(*n))
        .chain([Segment::InnerBull])
        .collect()
}

/// Total order on segments: by points, then by ring.
fn segment_key(segment: &Segment) -> (u32, u8) {
    let ring = match segment {
        Segment::Miss => 0,
        Segment::Single(_) | Segment::OuterBull => 1,
        Segment::Double(_) | Segment::InnerBull => 2,
        Segment::Triple(_) => 3,
    };
    (segment.scored(), ring)
}

/// Effort of hitting a setup dart; big single beds are easiest.
fn setup_cost(segment: &Segment) -> u8 {
    match segment {
        Segment::Single(_) | Segment::OuterBull | Segment::Miss => 0,
        Segment::Triple(_) => 1,
        Segment::Double(_) | Segment::InnerBull => 2,
    }
}

fn finisher_rank(segment: &Segment) -> usize {
    match segment {
        Segment::Double(n) => PREFERRED_DOUBLES
            .iter()
            .position(|preferred| preferred == n)
            .unwrap_or(PREFERRED_DOUBLES.len()),
        _ => PREFERRED_DOUBLES.len(),
    }
}

fn compare_routes(a: &Route, b: &Route) -> Ordering {
    let rank = |route: &Route| {
        let (finisher, setup) = route.split_last().map_or((None, &[][..]), |(f, s)| (Some(f), s));
        let cost: u8 = setup.iter().map(setup_cost).sum();
        let finisher = finisher.map_or(usize::MAX, finisher_rank);
        let setup_keys: Vec<Reverse<(u32, u8)>> =
            setup.iter().map(|s| Reverse(segment_key(s))).collect();
        (route.len(), cost, finisher, setup_keys)
    };
    rank(a).cmp(&rank(b))
}

/// Candidate darts for the single-out search: triples, then singles, then doubles,
/// each from the highest value down.
fn single_out_candidates() -> Vec<Segment> {
    let triples = (1..=20).rev().map(Segment::Triple);
    let singles = std::iter::once(Segment::OuterBull).chain((1..=20).rev().map(Segment::Single));
    let doubles = std::iter::once(Segment::InnerBull).chain((1..=20).rev().map(Segment::Double));
    triples.chain(singles).chain(doubles).collect()
}

fn single_out_routes(remaining: u32, darts: usize) -> Vec<Route> {
    let candidates = single_out_candidates();
    let mut search = SingleOutSearch {
        candidates: &candidates,
        path: Vec::with_capacity(darts),
        seen: HashSet::new(),
        solutions: Vec::new(),
    };
    search.explore(remaining, darts);

    let mut solutions = search.solutions;
    solutions.sort_by_key(Vec::len);
    solutions.truncate(MAX_SUGGESTIONS);
    solutions
}

struct SingleOutSearch<'a> {
    candidates: &'a [Segment],
    path: Route,
    seen: HashSet<Vec<String>>,
    solutions: Vec<Route>,
}

impl SingleOutSearch<'_> {
    fn explore(&mut self, remaining: u32, darts: usize) {
        for candidate in self.candidates {
            if self.solutions.len() >= SINGLE_OUT_SOLUTION_CAP {
                return;
            }
            let scored = candidate.scored();
            if scored > remaining {
                continue;
            }

            self.path.push(*candidate);
            if scored == remaining {
                let labels = self.path.iter().map(Segment::label).collect();
                if self.seen.insert(labels) {
                    self.solutions.push(self.path.clone());
                }
            } else if darts > 1 {
                self.explore(remaining - scored, darts - 1);
            }
            self.path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(routes: &[Route]) -> Vec<Vec<String>> {
        routes
            .iter()
            .map(|route| route.iter().map(Segment::label).collect())
            .collect()
    }

    fn suggest(score: u32, darts: u32, rule: FinishRule) -> Vec<Vec<String>> {
        labels(&compute_checkout_suggestions(score, darts, rule))
    }

    fn contains(routes: &[Vec<String>], expected: &[&str]) -> bool {
        routes.iter().any(|route| route == expected)
    }

    #[test]
    fn canonical_double_out_finishes() {
        assert!(contains(&suggest(170, 3, FinishRule::DoubleOut), &["T20", "T20", "DB"]));
        assert!(contains(&suggest(167, 3, FinishRule::DoubleOut), &["T20", "T19", "DB"]));
        assert!(contains(&suggest(40, 1, FinishRule::DoubleOut), &["D20"]));
        assert!(contains(&suggest(2, 1, FinishRule::DoubleOut), &["D1"]));
        assert!(contains(&suggest(3, 3, FinishRule::DoubleOut), &["S1", "D1"]));
    }

    #[test]
    fn bogey_numbers_have_no_route() {
        for score in BOGEY_NUMBERS {
            assert!(
                suggest(score, 3, FinishRule::DoubleOut).is_empty(),
                "{score} should not be finishable"
            );
        }
    }

    #[test]
    fn guards_return_empty() {
        assert!(suggest(40, 0, FinishRule::DoubleOut).is_empty());
        assert!(suggest(0, 3, FinishRule::DoubleOut).is_empty());
        assert!(suggest(121, 2, FinishRule::SingleOut).is_empty());
        assert!(suggest(171, 3, FinishRule::DoubleOut).is_empty());
        // 1 can never be finished on a double.
        assert!(suggest(1, 3, FinishRule::DoubleOut).is_empty());
    }

    #[test]
    fn darts_beyond_one_turn_search_a_single_turn() {
        assert!(suggest(200, 4, FinishRule::SingleOut).is_empty());
        assert!(suggest(241, 4, FinishRule::SingleOut).is_empty());
        assert_eq!(
            suggest(180, 4, FinishRule::SingleOut).first(),
            Some(&vec!["T20".to_owned(), "T20".to_owned(), "T20".to_owned()])
        );
        assert_eq!(
            suggest(170, 5, FinishRule::DoubleOut),
            suggest(170, 3, FinishRule::DoubleOut)
        );
    }

    #[test]
    fn routes_respect_darts_left_and_are_sorted() {
        let routes = suggest(100, 3, FinishRule::DoubleOut);
        assert_eq!(routes.first().map(Vec::len), Some(2));
        assert!(routes.len() <= MAX_SUGGESTIONS);
        assert!(routes.windows(2).all(|pair| pair[0].len() <= pair[1].len()));

        assert!(suggest(100, 1, FinishRule::DoubleOut).is_empty());
        for route in suggest(60, 2, FinishRule::DoubleOut) {
            assert!(route.len() <= 2);
        }
    }

    #[test]
    fn every_double_out_route_adds_up_and_ends_on_a_double() {
        for score in 2..=170 {
            for route in compute_checkout_suggestions(score, 3, FinishRule::DoubleOut) {
                let total: u32 = route.iter().map(Segment::scored).sum();
                assert_eq!(total, score);
                assert!(route.last().is_some_and(Segment::is_double_out_finisher));
            }
        }
    }

    #[test]
    fn one_dart_double_out_prefers_the_exact_double() {
        assert_eq!(suggest(40, 3, FinishRule::DoubleOut)[0], vec!["D20"]);
        assert_eq!(suggest(50, 1, FinishRule::DoubleOut), vec![vec!["DB"]]);
    }

    #[test]
    fn single_out_search_prefers_fewest_darts() {
        let routes = suggest(60, 3, FinishRule::SingleOut);
        assert_eq!(routes[0], vec!["T20"]);
        assert_eq!(routes.len(), MAX_SUGGESTIONS);
        assert!(routes.windows(2).all(|pair| pair[0].len() <= pair[1].len()));
    }

    #[test]
    fn single_out_allows_single_finish() {
        let routes = suggest(7, 1, FinishRule::SingleOut);
        assert!(contains(&routes, &["T1"]) || contains(&routes, &["S7"]));
        for route in &routes {
            assert_eq!(route.len(), 1);
        }
    }
}
