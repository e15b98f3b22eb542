//! Core data model for stage layout: positions, boxes, connector points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque individual identifier from the relationship graph (e.g. `@I12@`).
pub type IndividualId = String;
/// Opaque family identifier from the relationship graph (e.g. `@F3@`).
pub type FamilyId = String;

/// All individuals currently placed on the stage, keyed by id.
///
/// Ordered map so that recomputing a layout from identical input walks
/// the individuals in identical order and produces identical output.
pub type IndiMap = BTreeMap<IndividualId, PlacedIndividual>;

/// Connector polylines: `lines[a][b]` is the single connector between
/// `a` and a related individual `b`. Spouse lines are stored once under
/// whichever partner was routed first; parent-child lines are parent-keyed.
pub type LinesMap = BTreeMap<IndividualId, BTreeMap<IndividualId, Vec<LinePosition>>>;

/// Canvas coordinates. `y` grows downward; negative values are valid
/// (ancestors sit above the home person).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Person box dimensions. Uniform for a settings profile but stored per
/// individual (fan-chart and override cases size boxes individually).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

/// Box rendering style: two-line boxes by default, single-line compact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    Normal,
    Compact,
}

/// One individual placed on the stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedIndividual {
    pub position: Position,
    pub size: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#gen: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<LineStyle>,
}

impl PlacedIndividual {
    pub fn new(position: Position, size: Size) -> Self {
        Self {
            position,
            size,
            r#gen: None,
            line: None,
        }
    }

    pub fn left(&self) -> f64 {
        self.position.x
    }

    pub fn right(&self) -> f64 {
        self.position.x + self.size.w
    }

    pub fn top(&self) -> f64 {
        self.position.y
    }

    pub fn bottom(&self) -> f64 {
        self.position.y + self.size.h
    }

    pub fn center_x(&self) -> f64 {
        self.position.x + self.size.w / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.position.y + self.size.h / 2.0
    }
}

/// Ordered point in a connector polyline. Consecutive points form straight
/// orthogonal segments; `is_corner` marks a rounded elbow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinePosition {
    pub x: f64,
    pub y: f64,
    pub is_corner: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_index: Option<usize>,
}

impl LinePosition {
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            x: fix_number(x),
            y: fix_number(y),
            is_corner: false,
            color_index: None,
        }
    }

    pub fn corner(x: f64, y: f64) -> Self {
        Self {
            x: fix_number(x),
            y: fix_number(y),
            is_corner: true,
            color_index: None,
        }
    }

    pub fn with_color(mut self, color_index: Option<usize>) -> Self {
        self.color_index = color_index;
        self
    }
}

/// Sex as recorded in the relationship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    /// Preset shading index for box-attached line endpoints.
    pub fn shade_index(self) -> usize {
        match self {
            Sex::Male => 0,
            Sex::Female => 1,
            Sex::Unknown => 2,
        }
    }
}

/// How the stage was produced. Auto modes space children trunks wider
/// than manual placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeMode {
    Manual,
    Tree,
    Genealogy,
}

impl TreeMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "tree" => Some(Self::Tree),
            "genealogy" => Some(Self::Genealogy),
            _ => None,
        }
    }

    pub fn is_auto(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

/// Layout settings profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Default box width when no measured size is supplied.
    pub box_width: f64,
    /// Default box height when no measured size is supplied.
    pub box_height: f64,
    /// Horizontal gap between spouse boxes.
    pub horizontal_margin: f64,
    /// Vertical gap between generation rows.
    pub vertical_margin: f64,
    /// Step between reserved connector lanes.
    pub line_spacing: f64,
    pub colorize_lines: bool,
    /// Number of colors in the caller's line palette.
    pub palette_len: usize,
    /// Bound on position-fixer driver iterations.
    pub fixer_iteration_cap: usize,
    /// Bound on lane probes before the tracker gives up shifting.
    pub lane_probe_cap: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            box_width: 120.0,
            box_height: 60.0,
            horizontal_margin: 40.0,
            vertical_margin: 100.0,
            line_spacing: 20.0,
            colorize_lines: false,
            palette_len: 6,
            fixer_iteration_cap: 10,
            lane_probe_cap: 500,
        }
    }
}

/// Measured or synthetic bounding box, validator input only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRect {
    pub id: String,
    pub rect: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
            width,
            height,
        }
    }

    /// Axis-aligned overlap test. Touching edges count as overlap,
    /// matching how rendered boxes visually collide.
    pub fn overlaps(&self, other: &Rect) -> bool {
        !(self.right < other.left
            || self.left > other.right
            || self.bottom < other.top
            || self.top > other.bottom)
    }
}

/// Structured validity result for a rendered stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityReport {
    pub is_valid: bool,
    pub on_stage_length: usize,
    pub unique_coordinates_length: usize,
    pub overlaps_length: usize,
    pub overlaps: BTreeMap<String, (StageRect, StageRect)>,
    pub missing: Vec<IndividualId>,
}

/// Round a coordinate to 1/1000 so repeated recomputation cannot
/// accumulate sub-pixel drift. Identical inputs yield bit-identical output.
pub fn fix_number(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
