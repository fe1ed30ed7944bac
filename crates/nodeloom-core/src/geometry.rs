//! Axis-aligned rectangle math used by grouping and layout skills.

use nodeloom_types::graph::{Bounds, Group, Node, Position};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// A node's rectangle. A node without a position sits at the origin.
    pub fn of_node(node: &Node) -> Self {
        let pos = node.position_or_default();
        Self::new(pos.x, pos.y, node.width, node.height)
    }

    pub fn of_group(group: &Group) -> Self {
        Self::from_bounds(group.bounds)
    }

    pub fn from_bounds(bounds: Bounds) -> Self {
        Self::new(bounds.x, bounds.y, bounds.width, bounds.height)
    }

    pub fn to_bounds(self) -> Bounds {
        Bounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Position {
        Position::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Strict overlap: rectangles that only share an edge do not intersect.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Grow by `padding` on every side.
    pub fn padded(&self, padding: f64) -> Rect {
        Rect::new(
            self.x - padding,
            self.y - padding,
            self.width + padding * 2.0,
            self.height + padding * 2.0,
        )
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }
}

/// Bounding box of a node set, `None` when the set is empty.
pub fn bounding_box<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Option<Rect> {
    nodes
        .into_iter()
        .map(Rect::of_node)
        .reduce(|acc, r| acc.union(&r))
}

/// Group bounds: the padded bounding box of the member nodes.
pub fn group_bounds<'a>(members: impl IntoIterator<Item = &'a Node>, padding: f64) -> Option<Bounds> {
    bounding_box(members).map(|r| r.padded(padding).to_bounds())
}

// ---------------------------------------------------------------------------
// Axis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    #[default]
    X,
    Y,
}

impl Axis {
    pub fn coord(&self, pos: Position) -> f64 {
        match self {
            Axis::X => pos.x,
            Axis::Y => pos.y,
        }
    }

    pub fn with_coord(&self, pos: Position, value: f64) -> Position {
        match self {
            Axis::X => Position::new(value, pos.y),
            Axis::Y => Position::new(pos.x, value),
        }
    }

    /// A delta of `amount` along this axis.
    pub fn delta(&self, amount: f64) -> Position {
        self.with_coord(Position::default(), amount)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}
