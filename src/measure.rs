use crate::model::{LineStyle, Size, fix_number};
use unicode_width::UnicodeWidthStr;

/// Approximate text metrics for person boxes. The real app measures boxes
/// in the DOM; callers that run off-thread (worker, CLI) derive sizes from
/// the display label instead.
pub struct BoxMetrics {
    pub char_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    pub min_box_width: f64,
    pub min_box_height: f64,
}

impl Default for BoxMetrics {
    fn default() -> Self {
        Self {
            char_width: 8.0,
            line_height: 20.0,
            padding_x: 12.0,
            padding_y: 8.0,
            min_box_width: 100.0,
            min_box_height: 44.0,
        }
    }
}

impl BoxMetrics {
    pub fn text_width(&self, text: &str) -> f64 {
        let width = UnicodeWidthStr::width(text);
        width as f64 * self.char_width
    }

    /// Size for a person box from its display label. Normal boxes show the
    /// name and a dates line; compact boxes show a single line.
    pub fn box_size(&self, label: &str, style: LineStyle) -> Size {
        let longest = label
            .lines()
            .map(|line| self.text_width(line))
            .fold(0.0, f64::max);
        let w = (longest + self.padding_x * 2.0).max(self.min_box_width);

        let text_lines = match style {
            LineStyle::Normal => 2.0,
            LineStyle::Compact => 1.0,
        };
        let h = (text_lines * self.line_height + self.padding_y * 2.0).max(self.min_box_height);

        Size {
            w: fix_number(w),
            h: fix_number(h),
        }
    }
}
