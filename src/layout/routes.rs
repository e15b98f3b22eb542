//! Connector route building: spouse lines and parent-child trunks.
//!
//! One pass walks the placed individuals from the center of the canvas
//! outward, partitions each person's relatives by family, resolves the
//! family's junction points, and emits the orthogonal polylines. Lane
//! reservations and junction caches live only for the duration of a pass.

use crate::graph::{FamilyUnit, RelationshipGraph};
use crate::layout::channels::{ChannelTracker, HorizontalNudge, LaneRequest, VerticalNudge};
use crate::layout::junctions::{
    ChildrenTrunk, FamilyJunctions, ROW_EPS, SpouseRoute, spouse_junction,
};
use crate::model::{
    FamilyId, IndiMap, IndividualId, LinePosition, LinesMap, PlacedIndividual, Position, Settings,
    TreeMode, fix_number,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Compute all connector polylines for the placed individuals.
pub fn compute_lines(
    indis: &IndiMap,
    settings: &Settings,
    mode: TreeMode,
    selected: Option<&str>,
    graph: &dyn RelationshipGraph,
) -> LinesMap {
    extend_lines(indis, &LinesMap::new(), settings, mode, selected, graph)
}

/// Incremental form: connectors already present in `prior` are kept as-is
/// and individuals whose relations are fully routed are skipped entirely.
pub fn extend_lines(
    indis: &IndiMap,
    prior: &LinesMap,
    settings: &Settings,
    mode: TreeMode,
    selected: Option<&str>,
    graph: &dyn RelationshipGraph,
) -> LinesMap {
    // Selection does not affect routing yet; kept for interface stability.
    let _ = selected;

    let mut pass = RoutePass {
        indis,
        settings,
        mode,
        graph,
        tracker: ChannelTracker::new(settings),
        junctions: BTreeMap::new(),
        rendered: BTreeSet::new(),
        lines: prior.clone(),
    };
    pass.tracker.reset_color_rotation();

    // Near-center individuals first: central trunks get first pick of
    // lanes, which keeps outer connectors nested around them.
    for id in processing_order(indis) {
        pass.route_individual(&id);
    }
    pass.lines
}

fn processing_order(indis: &IndiMap) -> Vec<IndividualId> {
    let mut ids: Vec<IndividualId> = indis.keys().cloned().collect();
    ids.sort_by(|a, b| {
        let ax = indis[a].position.x.abs();
        let bx = indis[b].position.x.abs();
        ax.partial_cmp(&bx)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cmp(b))
    });
    ids
}

fn has_line(lines: &LinesMap, a: &str, b: &str) -> bool {
    lines.get(a).is_some_and(|m| m.contains_key(b))
        || lines.get(b).is_some_and(|m| m.contains_key(a))
}

fn trunk_offset(settings: &Settings, mode: TreeMode) -> f64 {
    // Auto-generated trees leave more room under the parents than manual
    // placement, where the user controls the spacing.
    if mode.is_auto() {
        settings.line_spacing * 2.0
    } else {
        settings.line_spacing
    }
}

struct RoutePass<'a> {
    indis: &'a IndiMap,
    settings: &'a Settings,
    mode: TreeMode,
    graph: &'a dyn RelationshipGraph,
    tracker: ChannelTracker,
    junctions: BTreeMap<FamilyId, FamilyJunctions>,
    /// (family, child) pairs already drawn in this pass, so re-iterating a
    /// family through the other parent never double-draws a connector.
    rendered: BTreeSet<(FamilyId, IndividualId)>,
    lines: LinesMap,
}

impl RoutePass<'_> {
    fn route_individual(&mut self, pid: &str) {
        if pid.is_empty() {
            return;
        }
        let Some(p) = self.indis.get(pid).cloned() else {
            return;
        };
        let units = self.graph.family_units(pid);

        let mut spouses_on_stage: BTreeSet<&IndividualId> = BTreeSet::new();
        let mut children_on_stage: BTreeSet<&IndividualId> = BTreeSet::new();
        for unit in &units {
            if let Some(sid) = &unit.spouse {
                if self.indis.contains_key(sid) {
                    spouses_on_stage.insert(sid);
                }
            }
            for cid in &unit.children {
                if self.indis.contains_key(cid) {
                    children_on_stage.insert(cid);
                }
            }
        }
        let expected = spouses_on_stage.len() + children_on_stage.len();
        let existing = self.lines.get(pid).map(|m| m.len()).unwrap_or(0);
        if expected > 0 && existing >= expected {
            trace!(id = pid, "already fully routed, skipping");
            return;
        }

        for unit in &units {
            self.route_family(pid, &p, unit);
        }
    }

    fn route_family(&mut self, pid: &str, p: &PlacedIndividual, unit: &FamilyUnit) {
        let spouse: Option<(IndividualId, PlacedIndividual)> = unit
            .spouse
            .as_ref()
            .and_then(|sid| self.indis.get(sid).map(|s| (sid.clone(), s.clone())));
        let placed_children: Vec<(IndividualId, PlacedIndividual)> = unit
            .children
            .iter()
            .filter_map(|cid| self.indis.get(cid).map(|c| (cid.clone(), c.clone())))
            .collect();
        if spouse.is_none() && placed_children.is_empty() {
            return;
        }

        // Lane owner key: the family for a couple, the lone parent for a
        // single-parent unit so that trunks of that parent's families
        // share one lane instead of stacking parallel trunks.
        let owner: FamilyId = if spouse.is_some() {
            unit.family_id.clone()
        } else {
            pid.to_string()
        };

        if let Some((sid, s)) = &spouse {
            let route = match self
                .junctions
                .get(&unit.family_id)
                .and_then(|j| j.spouse.clone())
            {
                Some(route) => route,
                None => {
                    let (anchor, route) =
                        spouse_junction(&unit.family_id, p, s, self.settings, &mut self.tracker);
                    let j = self.junctions.entry(unit.family_id.clone()).or_default();
                    j.anchor = Some(anchor);
                    j.spouse = Some(route.clone());
                    route
                }
            };
            if !has_line(&self.lines, pid, sid) {
                let poly = spouse_polyline(
                    &route,
                    self.graph.sex(pid).shade_index(),
                    self.graph.sex(sid).shade_index(),
                );
                self.lines
                    .entry(pid.to_string())
                    .or_default()
                    .insert(sid.clone(), poly);
            }
        }

        if placed_children.is_empty() {
            return;
        }

        let anchor = {
            let j = self.junctions.entry(unit.family_id.clone()).or_default();
            match j.anchor {
                Some(a) => a,
                None => {
                    let single = Position {
                        x: fix_number(p.center_x()),
                        y: fix_number(p.bottom()),
                    };
                    j.single = Some(single);
                    j.anchor = Some(single);
                    single
                }
            }
        };

        let trunk = match self
            .junctions
            .get(&unit.family_id)
            .and_then(|j| j.children.clone())
        {
            Some(t) => t,
            None => {
                let t = self.claim_trunk(&owner, anchor, p, spouse.as_ref(), &placed_children);
                if let Some(j) = self.junctions.get_mut(&unit.family_id) {
                    j.children = Some(t.clone());
                }
                t
            }
        };

        let start_color = spouse
            .is_none()
            .then(|| self.graph.sex(pid).shade_index());
        let spouse_id = spouse.as_ref().map(|(sid, _)| sid.clone());

        for (cid, c) in &placed_children {
            if self.rendered.contains(&(unit.family_id.clone(), cid.clone())) {
                continue;
            }
            if has_line(&self.lines, pid, cid) {
                continue;
            }
            if let Some(sid) = &spouse_id {
                if has_line(&self.lines, sid, cid) {
                    continue;
                }
            }
            let poly = self.child_polyline(&owner, anchor, &trunk, cid, c, start_color);
            self.lines
                .entry(pid.to_string())
                .or_default()
                .insert(cid.clone(), poly);
            self.rendered
                .insert((unit.family_id.clone(), cid.clone()));
        }
    }

    /// Reserve the horizontal children trunk for one family unit.
    fn claim_trunk(
        &mut self,
        owner: &FamilyId,
        anchor: Position,
        p: &PlacedIndividual,
        spouse: Option<&(IndividualId, PlacedIndividual)>,
        placed_children: &[(IndividualId, PlacedIndividual)],
    ) -> ChildrenTrunk {
        let base_bottom = spouse
            .map(|(_, s)| p.bottom().max(s.bottom()))
            .unwrap_or_else(|| p.bottom());
        let preferred = base_bottom + trunk_offset(self.settings, self.mode);

        let mut lo = anchor.x;
        let mut hi = anchor.x;
        for (_, c) in placed_children {
            lo = lo.min(c.center_x());
            hi = hi.max(c.center_x());
        }

        let lane = self.tracker.next_horizontal_lane(
            &LaneRequest {
                family: owner,
                x1: lo,
                y1: preferred,
                x2: hi,
                y2: preferred,
            },
            true,
            self.settings.line_spacing,
            self.settings.colorize_lines,
            false,
            Some(VerticalNudge::Down),
        );
        // A re-query of a shared single-parent trunk returns the earlier
        // span; extend the reservation to cover this family's children.
        if lane.x1 > fix_number(lo) || lane.x2 < fix_number(hi) {
            self.tracker.record_horizontal(owner, lane.y1, lo, hi);
        }

        ChildrenTrunk {
            y: lane.y1,
            x: placed_children
                .iter()
                .map(|(cid, c)| (cid.clone(), fix_number(c.center_x())))
                .collect(),
            color_index: lane.color_index,
        }
    }

    /// Polyline from the family anchor down to one child's top-center.
    fn child_polyline(
        &mut self,
        owner: &FamilyId,
        anchor: Position,
        trunk: &ChildrenTrunk,
        cid: &str,
        c: &PlacedIndividual,
        start_color: Option<usize>,
    ) -> Vec<LinePosition> {
        let child_x = trunk
            .x
            .get(cid)
            .copied()
            .unwrap_or_else(|| fix_number(c.center_x()));
        let child_top = fix_number(c.top());
        let trunk_y = trunk.y;
        let tc = trunk.color_index;
        let child_shade = self.graph.sex(cid).shade_index();

        let mut points = vec![LinePosition::point(anchor.x, anchor.y).with_color(start_color)];

        // Another family's trunk inside the drop band: step around it with
        // a second pair of elbows instead of cutting straight through.
        let step_around = child_top > trunk_y
            && self
                .tracker
                .reserved_between(child_x, child_x, trunk_y, child_top, owner);
        if step_around {
            let approach_y = fix_number(child_top - self.settings.line_spacing);
            // Step toward the anchor side so the long drop does not
            // overshoot past the child before coming back.
            let (dir, prefer) = if anchor.x <= child_x {
                (-1.0, HorizontalNudge::Left)
            } else {
                (1.0, HorizontalNudge::Right)
            };
            let vlane = self.tracker.next_vertical_lane(
                &LaneRequest {
                    family: owner,
                    x1: child_x + dir * self.settings.line_spacing,
                    y1: trunk_y,
                    x2: child_x + dir * self.settings.line_spacing,
                    y2: approach_y,
                },
                false,
                self.settings.line_spacing,
                false,
                false,
                Some(prefer),
            );
            let lane_x = vlane.x1;
            points.push(LinePosition::corner(anchor.x, trunk_y).with_color(tc));
            if (lane_x - anchor.x).abs() >= ROW_EPS {
                points.push(LinePosition::corner(lane_x, trunk_y).with_color(tc));
            }
            points.push(LinePosition::corner(lane_x, approach_y));
            points.push(LinePosition::corner(child_x, approach_y));
            points.push(LinePosition::point(child_x, child_top).with_color(Some(child_shade)));
            self.tracker
                .record_vertical(owner, anchor.x, anchor.y, trunk_y);
            self.tracker
                .record_horizontal(owner, approach_y, lane_x, child_x);
            self.tracker
                .record_vertical(owner, child_x, approach_y, child_top);
            return points;
        }

        if (anchor.x - child_x).abs() < ROW_EPS {
            points.push(LinePosition::corner(anchor.x, trunk_y).with_color(tc));
        } else {
            points.push(LinePosition::corner(anchor.x, trunk_y).with_color(tc));
            points.push(LinePosition::corner(child_x, trunk_y).with_color(tc));
        }
        points.push(LinePosition::point(child_x, child_top).with_color(Some(child_shade)));

        self.tracker
            .record_vertical(owner, anchor.x, anchor.y, trunk_y);
        self.tracker
            .record_vertical(owner, child_x, trunk_y, child_top);
        points
    }
}

fn spouse_polyline(route: &SpouseRoute, from_shade: usize, to_shade: usize) -> Vec<LinePosition> {
    match route {
        SpouseRoute::Straight {
            y,
            from_x,
            mid_x,
            to_x,
        } => vec![
            LinePosition::point(*from_x, *y).with_color(Some(from_shade)),
            LinePosition::point(*mid_x, *y),
            LinePosition::point(*to_x, *y).with_color(Some(to_shade)),
        ],
        SpouseRoute::Raised {
            lane_y,
            from_top,
            to_top,
            color_index,
        } => vec![
            LinePosition::point(from_top.x, from_top.y).with_color(Some(from_shade)),
            LinePosition::corner(from_top.x, *lane_y).with_color(*color_index),
            LinePosition::corner(to_top.x, *lane_y).with_color(*color_index),
            LinePosition::point(to_top.x, to_top.y).with_color(Some(to_shade)),
        ],
    }
}
