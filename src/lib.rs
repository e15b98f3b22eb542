pub mod api;
pub mod graph;
pub mod layout;
pub mod measure;
pub mod model;

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Compute connector polylines for a stage document
#[wasm_bindgen(js_name = "computeLines")]
pub fn compute_lines(stage: &str) -> Result<String, String> {
    api::compute_lines_json(stage).map_err(|e| e.to_string())
}

/// Run the position fixer and return shifted placements plus lines
#[wasm_bindgen(js_name = "fixPositions")]
pub fn fix_positions(stage: &str) -> Result<String, String> {
    api::fix_positions_json(stage).map_err(|e| e.to_string())
}

/// Check a rendered stage for stacked or overlapping boxes
#[wasm_bindgen(js_name = "checkStageValidity")]
pub fn check_stage_validity(stage: &str) -> Result<String, String> {
    api::check_stage_validity_json(stage).map_err(|e| e.to_string())
}
