//! Text wrapping and centered block math for card composition.
//!
//! Wrapping takes the measurement function as a parameter so the same
//! algorithm serves both glyph-advance and bounding-box backed fonts.

use rusttype::{point, Font, Scale};

/// Width of `text` via summed glyph advances.
pub fn advance_width(font: &Font<'_>, px: f32, text: &str) -> f32 {
    let scale = Scale::uniform(px);
    text.chars()
        .map(|ch| font.glyph(ch).scaled(scale).h_metrics().advance_width)
        .sum()
}

/// Width of `text` via the rendered bounding box.
pub fn bbox_width(font: &Font<'_>, px: f32, text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let mut width = 0.0f32;
    for glyph in font.layout(text, scale, point(0.0, v_metrics.ascent)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            width = width.max(bb.max.x as f32);
        }
    }
    width
}

/// Greedy word wrap: words are appended with a separating space and the
/// candidate line is measured; on overflow the accumulated line is committed
/// and the word opens the next one. The final accumulator is always
/// committed, so empty input yields exactly one empty line. A single word
/// wider than `max_width` stands alone on its line, unhyphenated.
pub fn wrap<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if measure(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    lines.push(current);
    lines
}

/// Box variant of [`wrap`]: identical wrapping decisions, but an empty
/// trailing accumulator is not committed, so empty input yields no lines.
pub fn wrap_to_box<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = wrap(text, max_width, measure);
    if lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

/// Vertical start of a block of `line_count` lines centered in a box.
pub fn centered_block_y(box_y: i32, box_h: i32, line_count: usize, line_h: i32) -> i32 {
    box_y + (box_h - line_count as i32 * line_h) / 2
}

/// Horizontal start of one line centered in a box.
pub fn centered_line_x(box_x: i32, box_w: i32, line_w: f32) -> i32 {
    box_x + ((box_w as f32 - line_w) / 2.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    // 10px per character, close enough to a monospaced font.
    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn wrap_empty_input_is_one_empty_line() {
        assert_eq!(wrap("", 100.0, mono), vec![String::new()]);
    }

    #[test]
    fn wrap_keeps_lines_under_limit() {
        let lines = wrap("aa bb cc dd", 50.0, mono);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
        for line in &lines {
            assert!(mono(line) <= 50.0);
        }
    }

    #[test]
    fn wrap_overwide_word_stands_alone() {
        let lines = wrap("hi incomprehensible ok", 60.0, mono);
        assert!(lines.contains(&"incomprehensible".to_string()));
        for line in lines.iter().filter(|l| mono(l) > 60.0) {
            assert!(!line.contains(' '), "overwide line must be a single word");
        }
    }

    #[test]
    fn wrap_to_box_drops_empty_remainder() {
        assert!(wrap_to_box("", 100.0, mono).is_empty());
        // same decisions as wrap for normal text
        assert_eq!(
            wrap_to_box("aa bb cc dd", 50.0, mono),
            wrap("aa bb cc dd", 50.0, mono)
        );
    }

    #[test]
    fn centered_block_math() {
        // 60px box, two 16px lines: (60 - 32) / 2 = 14 below the box top.
        assert_eq!(centered_block_y(1020, 60, 2, 16), 1034);
        assert_eq!(centered_line_x(60, 960, 100.0), 60 + 430);
    }
}
