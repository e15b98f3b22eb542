//! JSON entry points shared by the wasm bindings and the CLI.
//!
//! The stage document mirrors what the rendering side holds: placed
//! individuals keyed by id, family records, and a settings profile. Box
//! sizes are optional; when absent they are derived from the display name
//! so off-thread callers never need DOM measurements.

use crate::graph::{FamilyGraph, FamilyRecord, IndividualRecord};
use crate::layout;
use crate::layout::FixOutcome;
use crate::measure::BoxMetrics;
use crate::model::{
    IndiMap, IndividualId, LineStyle, LinesMap, PlacedIndividual, Position, Settings, Sex, Size,
    StageRect, TreeMode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid stage document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown tree mode: {0}")]
    UnknownMode(String),
}

/// One individual as supplied by the caller. `size` wins when present;
/// otherwise the box is sized from `name`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualDoc {
    pub position: Position,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub r#gen: Option<i64>,
    #[serde(default)]
    pub line: Option<LineStyle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FamilyDoc {
    pub id: String,
    #[serde(default)]
    pub parents: Vec<IndividualId>,
    #[serde(default)]
    pub children: Vec<IndividualId>,
}

/// Full input document for the line and fixer operations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDoc {
    pub individuals: BTreeMap<IndividualId, IndividualDoc>,
    #[serde(default)]
    pub families: Vec<FamilyDoc>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub selected: Option<IndividualId>,
    #[serde(default)]
    pub missing: Vec<IndividualId>,
}

/// Fixer reply: shifted placements plus the re-derived lines.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FixReply {
    indis: IndiMap,
    lines: LinesMap,
    iterations: usize,
    converged: bool,
}

struct Stage {
    indis: IndiMap,
    graph: FamilyGraph,
    settings: Settings,
    mode: TreeMode,
    selected: Option<IndividualId>,
    missing: Vec<IndividualId>,
}

impl StageDoc {
    fn into_stage(self) -> Result<Stage, ApiError> {
        let mode = match self.mode.as_deref() {
            None => TreeMode::Manual,
            Some(raw) => {
                TreeMode::from_str(raw).ok_or_else(|| ApiError::UnknownMode(raw.to_string()))?
            }
        };

        let metrics = BoxMetrics::default();
        let mut indis = IndiMap::new();
        let mut records = Vec::new();
        for (id, doc) in self.individuals {
            let size = doc.size.unwrap_or_else(|| match &doc.name {
                Some(name) => metrics.box_size(name, doc.line.unwrap_or(LineStyle::Normal)),
                None => Size {
                    w: self.settings.box_width,
                    h: self.settings.box_height,
                },
            });
            let mut placed = PlacedIndividual::new(doc.position, size);
            placed.r#gen = doc.r#gen;
            placed.line = doc.line;
            indis.insert(id.clone(), placed);
            records.push(IndividualRecord {
                id,
                sex: doc.sex.unwrap_or(Sex::Unknown),
                name: doc.name,
            });
        }

        let families = self
            .families
            .into_iter()
            .map(|f| FamilyRecord {
                id: f.id,
                parents: f.parents,
                children: f.children,
            })
            .collect();

        Ok(Stage {
            indis,
            graph: FamilyGraph::new(records, families),
            settings: self.settings,
            mode,
            selected: self.selected,
            missing: self.missing,
        })
    }
}

/// Parse a stage document and return its connector lines as JSON.
pub fn compute_lines_json(input: &str) -> Result<String, ApiError> {
    let stage = serde_json::from_str::<StageDoc>(input)?.into_stage()?;
    let lines = layout::compute_lines(
        &stage.indis,
        &stage.settings,
        stage.mode,
        stage.selected.as_deref(),
        &stage.graph,
    );
    Ok(serde_json::to_string(&lines)?)
}

/// Parse a stage document, run the position fixer, and return the shifted
/// placements plus lines as JSON.
pub fn fix_positions_json(input: &str) -> Result<String, ApiError> {
    let stage = serde_json::from_str::<StageDoc>(input)?.into_stage()?;
    let lines = layout::compute_lines(
        &stage.indis,
        &stage.settings,
        stage.mode,
        stage.selected.as_deref(),
        &stage.graph,
    );
    let FixOutcome {
        indis,
        lines,
        iterations,
        converged,
    } = layout::fix_positions(
        &stage.indis,
        &lines,
        &stage.settings,
        stage.mode,
        stage.selected.as_deref(),
        &stage.graph,
    );
    let reply = FixReply {
        indis,
        lines,
        iterations,
        converged,
    };
    Ok(serde_json::to_string(&reply)?)
}

/// Parse a stage document and return its validity report as JSON.
pub fn check_stage_validity_json(input: &str) -> Result<String, ApiError> {
    let stage = serde_json::from_str::<StageDoc>(input)?.into_stage()?;
    let rects: Vec<StageRect> = layout::stage_rects(&stage.indis);
    let report = layout::check_stage_validity(&rects, &stage.missing);
    Ok(serde_json::to_string(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent_child_doc() -> String {
        r#"{
            "individuals": {
                "@I1@": { "position": { "x": 0, "y": 0 }, "size": { "w": 100, "h": 50 } },
                "@I2@": { "position": { "x": 0, "y": 200 }, "size": { "w": 100, "h": 50 } }
            },
            "families": [
                { "id": "@F1@", "parents": ["@I1@"], "children": ["@I2@"] }
            ],
            "mode": "tree"
        }"#
        .to_string()
    }

    #[test]
    fn test_compute_lines_json_round_trip() {
        let out = compute_lines_json(&parent_child_doc()).unwrap();
        let lines: LinesMap = serde_json::from_str(&out).unwrap();
        let poly = &lines["@I1@"]["@I2@"];
        assert_eq!(poly.len(), 3);
        assert_eq!(poly[0].x, 50.0);
        assert!(poly[1].is_corner);
        assert_eq!(poly[2].y, 200.0);
    }

    #[test]
    fn test_unknown_mode_is_rejected() {
        let doc = r#"{ "individuals": {}, "mode": "radial" }"#;
        match compute_lines_json(doc) {
            Err(ApiError::UnknownMode(m)) => assert_eq!(m, "radial"),
            other => panic!("expected unknown-mode error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_document_is_a_parse_error() {
        assert!(matches!(
            compute_lines_json("{ not json"),
            Err(ApiError::Parse(_))
        ));
    }

    #[test]
    fn test_size_is_derived_from_name_when_absent() {
        let doc = r#"{
            "individuals": {
                "@I1@": { "position": { "x": 0, "y": 0 }, "name": "Jan Kowalski" }
            }
        }"#;
        // No relations, so no lines; parsing alone exercises the sizing.
        let out = compute_lines_json(doc).unwrap();
        let lines: LinesMap = serde_json::from_str(&out).unwrap();
        assert!(lines.is_empty());

        let report: crate::model::ValidityReport =
            serde_json::from_str(&check_stage_validity_json(doc).unwrap()).unwrap();
        assert!(report.is_valid);
        assert_eq!(report.on_stage_length, 1);
    }

    #[test]
    fn test_fix_positions_json_reports_convergence() {
        let doc = r#"{
            "individuals": {
                "@I1@": { "position": { "x": 0, "y": 0 }, "size": { "w": 100, "h": 50 } },
                "@I2@": { "position": { "x": 0, "y": 95 }, "size": { "w": 100, "h": 50 } }
            },
            "families": [
                { "id": "@F1@", "parents": ["@I1@"], "children": ["@I2@"] }
            ],
            "mode": "tree"
        }"#;
        let out = fix_positions_json(doc).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["converged"], true);
        assert_eq!(value["indis"]["@I2@"]["position"]["y"], 110.0);
    }

    #[test]
    fn test_validity_json_flags_overlap_and_missing() {
        let doc = r#"{
            "individuals": {
                "@I1@": { "position": { "x": 0, "y": 0 }, "size": { "w": 100, "h": 50 } },
                "@I2@": { "position": { "x": 50, "y": 20 }, "size": { "w": 100, "h": 50 } }
            },
            "missing": ["@I9@"]
        }"#;
        let report: crate::model::ValidityReport =
            serde_json::from_str(&check_stage_validity_json(doc).unwrap()).unwrap();
        assert!(!report.is_valid);
        assert_eq!(report.overlaps_length, 1);
        assert!(report.overlaps.contains_key("@I1@,@I2@"));
        assert_eq!(report.missing, vec!["@I9@".to_string()]);
    }
}
