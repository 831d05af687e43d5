use log::debug;

use crate::models::{Difficulty, Hold, Route, RouteHold};

/// Types that make a move harder to hold on to
pub const HARD_TYPES: [&str; 4] = ["Crimp", "Pinch", "Sloper", "Pocket"];
/// Types that make a move easier
pub const EASY_TYPES: [&str; 2] = ["Jug", "Volume"];

const HARD_SCORE: i32 = 3;
const HARD_GAP: f64 = 0.15;
const MODERATE_SCORE: i32 = 1;
const MODERATE_GAP: f64 = 0.08;

pub const EMPTY_ROUTE_NOTE: &str = "No holds provided; unable to generate a route.";
pub const LOCAL_ROUTE_NOTE: &str = "Route generated locally from the detected holds using hold-type and \
spacing heuristics. These are suggestions only: check every hold on the wall and climb safely.";

/// Difficulty label with the numbers that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyAssessment {
    pub difficulty: Difficulty,
    pub type_score: i32,
    pub mean_gap: f64,
}

/// Python-style title case: first letter of each alphabetic run upper, rest lower
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn type_weight(hold_type: &str) -> i32 {
    let canonical = title_case(hold_type);
    if HARD_TYPES.contains(&canonical.as_str()) {
        1
    } else if EASY_TYPES.contains(&canonical.as_str()) {
        -1
    } else {
        0
    }
}

/// Sort holds by ascending normalized vertical center. The sort is stable, so
/// holds at the same height keep their input order.
///
/// This is a purely numeric ordering. In image coordinates (origin top-left,
/// y growing downward) the first hold is the one nearest the top of the photo.
pub fn order_by_height(holds: &[Hold]) -> Vec<&Hold> {
    let mut ordered: Vec<&Hold> = holds.iter().collect();
    ordered.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));
    ordered
}

/// Mean absolute vertical gap between consecutive holds; 0 for fewer than two
pub fn mean_vertical_gap(ordered: &[&Hold]) -> f64 {
    if ordered.len() < 2 {
        return 0.0;
    }
    let total: f64 = ordered
        .windows(2)
        .map(|pair| (pair[1].center_y() - pair[0].center_y()).abs())
        .sum();
    total / (ordered.len() - 1) as f64
}

pub fn assess_difficulty(ordered: &[&Hold]) -> DifficultyAssessment {
    let type_score: i32 = ordered.iter().map(|h| type_weight(&h.hold_type)).sum();
    let mean_gap = mean_vertical_gap(ordered);

    let difficulty = if type_score >= HARD_SCORE || mean_gap >= HARD_GAP {
        Difficulty::Hard
    } else if type_score >= MODERATE_SCORE || mean_gap >= MODERATE_GAP {
        Difficulty::Moderate
    } else {
        Difficulty::Easy
    };

    DifficultyAssessment {
        difficulty,
        type_score,
        mean_gap,
    }
}

/// Build the local route: every hold in height order, a variation that skips
/// every other hold, and a difficulty estimate.
pub fn sequence_route(holds: &[Hold]) -> Route {
    if holds.is_empty() {
        return Route {
            route_a: Vec::new(),
            route_b: Vec::new(),
            difficulty: Difficulty::Easy,
            notes: EMPTY_ROUTE_NOTE.to_string(),
        };
    }

    let ordered = order_by_height(holds);
    let assessment = assess_difficulty(&ordered);
    debug!(
        "local route over {} holds: score {}, mean gap {:.3} -> {}",
        ordered.len(),
        assessment.type_score,
        assessment.mean_gap,
        assessment.difficulty
    );

    let route_a: Vec<RouteHold> = ordered.iter().map(|h| RouteHold::from(*h)).collect();
    let route_b: Vec<RouteHold> = route_a.iter().step_by(2).cloned().collect();

    Route {
        route_a,
        route_b,
        difficulty: assessment.difficulty,
        notes: LOCAL_ROUTE_NOTE.to_string(),
    }
}
