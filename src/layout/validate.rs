//! Stage sanity checks run after a layout pass.
//!
//! Rendering bugs show up as boxes stacked on the exact same coordinate or
//! overlapping their neighbours; the report counts both so callers can
//! flag a broken stage without diffing pixel output.

use crate::model::{IndiMap, IndividualId, Rect, StageRect, ValidityReport, fix_number};
use std::collections::BTreeMap;

/// Bounding rects for every placed individual, in id order.
pub fn stage_rects(indis: &IndiMap) -> Vec<StageRect> {
    indis
        .iter()
        .map(|(id, placed)| StageRect {
            id: id.clone(),
            rect: Rect::new(
                fix_number(placed.left()),
                fix_number(placed.top()),
                fix_number(placed.size.w),
                fix_number(placed.size.h),
            ),
        })
        .collect()
}

/// Check a rendered stage for stacked and overlapping boxes.
///
/// `missing` lists individuals that should be on the stage but were not
/// rendered; a non-empty list alone makes the stage invalid. Overlapping
/// pairs are keyed by the sorted id pair, so each collision is reported
/// once regardless of iteration order.
pub fn check_stage_validity(rects: &[StageRect], missing: &[IndividualId]) -> ValidityReport {
    let mut coordinates: BTreeMap<String, Vec<&StageRect>> = BTreeMap::new();
    for rect in rects {
        let key = format!("{},{}", rect.rect.left, rect.rect.top);
        coordinates.entry(key).or_default().push(rect);
    }

    let mut overlaps: BTreeMap<String, (StageRect, StageRect)> = BTreeMap::new();
    for (i, a) in rects.iter().enumerate() {
        for b in &rects[i + 1..] {
            if a.rect.overlaps(&b.rect) {
                let (first, second) = if a.id <= b.id { (a, b) } else { (b, a) };
                overlaps
                    .entry(format!("{},{}", first.id, second.id))
                    .or_insert_with(|| (first.clone(), second.clone()));
            }
        }
    }

    let on_stage_length = rects.len();
    let unique_coordinates_length = coordinates.len();
    let is_valid = overlaps.is_empty()
        && unique_coordinates_length == on_stage_length
        && missing.is_empty();

    ValidityReport {
        is_valid,
        on_stage_length,
        unique_coordinates_length,
        overlaps_length: overlaps.len(),
        overlaps,
        missing: missing.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlacedIndividual, Position, Size};

    fn rect(id: &str, left: f64, top: f64, w: f64, h: f64) -> StageRect {
        StageRect {
            id: id.to_string(),
            rect: Rect::new(left, top, w, h),
        }
    }

    #[test]
    fn test_spread_out_stage_is_valid() {
        let rects = vec![
            rect("@I1@", 0.0, 0.0, 100.0, 50.0),
            rect("@I2@", 150.0, 0.0, 100.0, 50.0),
            rect("@I3@", 0.0, 150.0, 100.0, 50.0),
        ];
        let report = check_stage_validity(&rects, &[]);
        assert!(report.is_valid);
        assert_eq!(report.on_stage_length, 3);
        assert_eq!(report.unique_coordinates_length, 3);
        assert_eq!(report.overlaps_length, 0);
    }

    #[test]
    fn test_overlapping_boxes_reported_once_per_pair() {
        let rects = vec![
            rect("@I2@", 50.0, 25.0, 100.0, 50.0),
            rect("@I1@", 0.0, 0.0, 100.0, 50.0),
        ];
        let report = check_stage_validity(&rects, &[]);
        assert!(!report.is_valid);
        assert_eq!(report.overlaps_length, 1);
        let (a, b) = &report.overlaps["@I1@,@I2@"];
        assert_eq!(a.id, "@I1@");
        assert_eq!(b.id, "@I2@");

        // Input order does not matter: swapping the rects yields the same
        // overlap keys and pair contents.
        let swapped = vec![rects[1].clone(), rects[0].clone()];
        assert_eq!(check_stage_validity(&swapped, &[]).overlaps, report.overlaps);
    }

    #[test]
    fn test_moving_boxes_apart_restores_validity() {
        let rects = vec![
            rect("@I1@", 0.0, 0.0, 100.0, 50.0),
            rect("@I2@", 200.0, 25.0, 100.0, 50.0),
        ];
        let report = check_stage_validity(&rects, &[]);
        assert!(report.is_valid);
        assert!(report.overlaps.is_empty());
    }

    #[test]
    fn test_stacked_coordinates_are_invalid() {
        // Same left,top with different sizes still collapses the key.
        let rects = vec![
            rect("@I1@", 0.0, 0.0, 100.0, 50.0),
            rect("@I2@", 0.0, 0.0, 80.0, 40.0),
            rect("@I3@", 300.0, 0.0, 100.0, 50.0),
        ];
        let report = check_stage_validity(&rects, &[]);
        assert!(!report.is_valid);
        assert_eq!(report.on_stage_length, 3);
        assert_eq!(report.unique_coordinates_length, 2);
    }

    #[test]
    fn test_missing_individuals_invalidate_the_stage() {
        let rects = vec![rect("@I1@", 0.0, 0.0, 100.0, 50.0)];
        let report = check_stage_validity(&rects, &["@I7@".to_string()]);
        assert!(!report.is_valid);
        assert_eq!(report.missing, vec!["@I7@".to_string()]);
        assert_eq!(report.overlaps_length, 0);
    }

    #[test]
    fn test_stage_rects_follow_id_order() {
        let mut indis = IndiMap::new();
        indis.insert(
            "@I2@".to_string(),
            PlacedIndividual::new(Position { x: 200.0, y: 0.0 }, Size { w: 100.0, h: 50.0 }),
        );
        indis.insert(
            "@I1@".to_string(),
            PlacedIndividual::new(Position { x: 0.0, y: 0.0 }, Size { w: 100.0, h: 50.0 }),
        );
        let rects = stage_rects(&indis);
        assert_eq!(rects[0].id, "@I1@");
        assert_eq!(rects[1].id, "@I2@");
        assert_eq!(rects[1].rect.right, 300.0);
    }

    #[test]
    fn test_touching_edges_count_as_overlap() {
        let rects = vec![
            rect("@I1@", 0.0, 0.0, 100.0, 50.0),
            rect("@I2@", 100.0, 0.0, 100.0, 50.0),
        ];
        let report = check_stage_validity(&rects, &[]);
        assert!(!report.is_valid);
        assert_eq!(report.overlaps_length, 1);
    }
}
