//! Post-layout row correction.
//!
//! A children trunk must stay at least one line step above the row of the
//! child it feeds; otherwise the trunk visually cuts through that row's
//! boxes. The fixer finds the topmost offending row, shifts it and every
//! row below it down by the shortfall, re-derives the lines, and repeats
//! until stable or the iteration cap is hit.

use crate::graph::RelationshipGraph;
use crate::layout::routes::compute_lines;
use crate::model::{IndiMap, LinesMap, Settings, TreeMode, fix_number};
use tracing::debug;

const Y_EPS: f64 = 1e-6;

/// Result of a fixer run. `converged` is false when the iteration cap was
/// reached with corrections still pending; the layout returned is the best
/// one found, never an error.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    pub indis: IndiMap,
    pub lines: LinesMap,
    pub iterations: usize,
    pub converged: bool,
}

/// One pending correction: shift `row_y` and everything below it down.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Correction {
    row_y: f64,
    shortfall: f64,
}

/// Iteratively resolve trunk-through-row collisions.
///
/// Inputs are deep-copied; the caller's maps are never mutated. The loop
/// is a plain bounded driver, not recursion, so the cap stays auditable.
pub fn fix_positions(
    indis: &IndiMap,
    lines: &LinesMap,
    settings: &Settings,
    mode: TreeMode,
    selected: Option<&str>,
    graph: &dyn RelationshipGraph,
) -> FixOutcome {
    let mut indis = indis.clone();
    let mut lines = lines.clone();
    let cap = settings.fixer_iteration_cap.max(1);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < cap {
        iterations += 1;
        match find_correction(&indis, &lines, settings, graph) {
            None => {
                converged = true;
                break;
            }
            Some(correction) => {
                shift_rows(&mut indis, correction);
                // Row spacing changed, so every trunk may legally sit
                // somewhere else now.
                lines = compute_lines(&indis, settings, mode, selected, graph);
            }
        }
    }

    if !converged {
        debug!(cap, "position fixer hit the iteration cap without converging");
    }

    FixOutcome {
        indis,
        lines,
        iterations,
        converged,
    }
}

/// Find the topmost row whose safe ceiling is violated by a connector
/// heading into it, and the largest shortfall against that row.
///
/// Only connectors whose target is strictly below the source and is not
/// simply the source's spouse are considered; spouse arcs legitimately
/// run close to their own boxes.
fn find_correction(
    indis: &IndiMap,
    lines: &LinesMap,
    settings: &Settings,
    graph: &dyn RelationshipGraph,
) -> Option<Correction> {
    let mut best: Option<Correction> = None;

    for (source, targets) in lines {
        let Some(src) = indis.get(source) else {
            continue;
        };
        for (target, poly) in targets {
            let Some(tgt) = indis.get(target) else {
                continue;
            };
            if tgt.position.y <= src.position.y + Y_EPS {
                continue;
            }
            if graph.is_spouse_of(source, target) {
                continue;
            }

            let row_y = tgt.position.y;
            let ceiling = row_y - settings.line_spacing;
            if poly.len() < 3 {
                continue;
            }
            for pt in &poly[1..poly.len() - 1] {
                if pt.y > ceiling + Y_EPS {
                    let shortfall = fix_number(pt.y - ceiling);
                    let candidate = Correction { row_y, shortfall };
                    best = Some(match best {
                        None => candidate,
                        Some(current) => pick(current, candidate),
                    });
                }
            }
        }
    }

    best
}

/// Topmost offending row wins; within one row, the largest shortfall.
fn pick(a: Correction, b: Correction) -> Correction {
    if (a.row_y - b.row_y).abs() < Y_EPS {
        if b.shortfall > a.shortfall { b } else { a }
    } else if b.row_y < a.row_y {
        b
    } else {
        a
    }
}

/// Shift every individual at or below the offending row straight down.
/// Rows are grouped by exact y, so whole rows move together and relative
/// layout within a row is preserved. Nothing above the row moves.
fn shift_rows(indis: &mut IndiMap, correction: Correction) {
    for placed in indis.values_mut() {
        if placed.position.y >= correction.row_y - Y_EPS {
            placed.position.y = fix_number(placed.position.y + correction.shortfall);
        }
    }
}
