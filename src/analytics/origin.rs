use std::fmt;

use opencv::core::Point;
use serde::{Deserialize, Serialize};

use super::region::OrientedBox;

/// Edge of the workspace a region reached into the frame from.
///
/// The camera looks down at the bench, so the left image edge is the
/// operator's right-hand side and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Left,
    Right,
    Front,
    Unknown,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Left => "left",
            Origin::Right => "right",
            Origin::Front => "front",
            Origin::Unknown => "unknown",
        }
    }

    pub fn is_known(&self) -> bool {
        *self != Origin::Unknown
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to settle boxes whose corners touch more than one edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Scan corners in box order; the first corner matching any rule decides.
    #[default]
    FirstMatch,
    /// Check every corner, then take the highest-priority rule that matched.
    EdgePriority,
    /// Scan corners in box order; the first corner on a side edge decides,
    /// and front only holds if no corner reaches a side edge.
    SideOverridesFront,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBounds {
    pub width: i32,
    pub height: i32,
}

type EdgeRule = (fn(Point, FrameBounds) -> bool, Origin);

// Priority order: earlier entries win.
const RULES: [EdgeRule; 3] = [
    (|p: Point, _: FrameBounds| p.x <= 0, Origin::Right),
    (|p: Point, b: FrameBounds| p.x >= b.width, Origin::Left),
    (|p: Point, _: FrameBounds| p.y <= 0, Origin::Front),
];

fn first_rule(corner: Point, bounds: FrameBounds) -> Option<(usize, Origin)> {
    RULES
        .iter()
        .enumerate()
        .find(|(_, (matches, _))| matches(corner, bounds))
        .map(|(rank, &(_, origin))| (rank, origin))
}

pub struct OriginClassifier {
    bounds: FrameBounds,
    tie_break: TieBreak,
}

impl OriginClassifier {
    pub fn new(bounds: FrameBounds, tie_break: TieBreak) -> Self {
        Self { bounds, tie_break }
    }

    pub fn bounds(&self) -> FrameBounds {
        self.bounds
    }

    /// Label one box. Total: every box gets exactly one origin.
    pub fn classify_box(&self, bx: &OrientedBox) -> Origin {
        let mut hits = bx
            .corners
            .iter()
            .filter_map(|&corner| first_rule(corner, self.bounds));

        let decided = match self.tie_break {
            TieBreak::FirstMatch => hits.next(),
            TieBreak::EdgePriority => hits.min_by_key(|&(rank, _)| rank),
            TieBreak::SideOverridesFront => {
                let mut front = None;
                for hit in hits {
                    if hit.1 != Origin::Front {
                        return hit.1;
                    }
                    front = Some(hit);
                }
                front
            }
        };

        decided.map_or(Origin::Unknown, |(_, origin)| origin)
    }

    /// Labels indexed like `boxes`.
    pub fn classify(&self, boxes: &[OrientedBox]) -> Vec<Origin> {
        boxes.iter().map(|bx| self.classify_box(bx)).collect()
    }
}
