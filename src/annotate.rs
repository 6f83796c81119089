//! Draws match results onto frames.

use crate::frame::Frame;
use crate::matcher::MatchResult;
use crate::render::{self, GREEN, WHITE};

const TEXT_PADDING: u32 = 6;
const BOTTOM_MARGIN: u32 = 10;
const BOX_THICKNESS: u32 = 2;

/// Stateless frame annotator.
///
/// With `highlight` set, each face gets a box and a filled name strip along
/// its bottom edge. Otherwise a single caption lists who is on screen.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameAnnotator {
    highlight: bool,
}

impl FrameAnnotator {
    pub fn new(highlight: bool) -> Self {
        Self { highlight }
    }

    pub fn annotate(&self, frame: &mut Frame, results: &[MatchResult]) {
        if self.highlight {
            self.highlight_faces(frame, results);
        } else {
            self.draw_caption(frame, results);
        }
    }

    fn text_scale(frame: &Frame) -> u32 {
        (frame.height() / 480).max(1)
    }

    fn highlight_faces(&self, frame: &mut Frame, results: &[MatchResult]) {
        let scale = Self::text_scale(frame);
        for result in results {
            let bbox = result.bbox;
            render::draw_box(&mut frame.image, &bbox, GREEN, BOX_THICKNESS);

            let label = result.identity.label();
            let (text_w, text_h) = render::text_size(label, scale);
            let strip_h = (text_h + TEXT_PADDING * 2) as i64;
            let bottom = bbox.bottom as i64;
            render::fill_rect(
                &mut frame.image,
                bbox.left as i64,
                bottom - strip_h,
                bbox.right as i64,
                bottom,
                GREEN,
            );
            let text_x = bbox.left as i64 + (bbox.width() as i64 - text_w as i64) / 2;
            let text_y = bottom - TEXT_PADDING as i64 - text_h as i64;
            render::draw_text(&mut frame.image, text_x, text_y, label, scale, WHITE);
        }
    }

    fn draw_caption(&self, frame: &mut Frame, results: &[MatchResult]) {
        let caption = caption(results);
        if caption.is_empty() {
            return;
        }
        let scale = Self::text_scale(frame);
        let (text_w, text_h) = render::text_size(&caption, scale);
        let x = (frame.width() as i64 - text_w as i64) / 2;
        let y = frame.height() as i64 - BOTTOM_MARGIN as i64 - text_h as i64;
        render::draw_text(&mut frame.image, x, y, &caption, scale, WHITE);
    }
}

/// Distinct known names in detection order, then `"<n> unknown"` if any face is unmatched.
pub fn caption(results: &[MatchResult]) -> String {
    let mut names: Vec<String> = Vec::new();
    let mut unknown = 0usize;
    for result in results {
        let label = result.identity.label();
        if result.identity.is_unknown() {
            unknown += 1;
        } else if !names.iter().any(|n| n == label) {
            names.push(label.to_string());
        }
    }
    if unknown > 0 {
        names.push(format!("{} unknown", unknown));
    }
    names.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use image::{Rgb, RgbImage};

    use crate::detect::BoundingBox;
    use crate::matcher::Identity;

    fn result(identity: Identity, bbox: [u32; 4]) -> MatchResult {
        MatchResult {
            identity,
            bbox: BoundingBox::from(bbox),
        }
    }

    #[test]
    fn caption_lists_distinct_names_and_unknown_count() {
        let results = vec![
            result(Identity::known("Alice"), [0, 1, 1, 0]),
            result(Identity::Unknown, [0, 1, 1, 0]),
            result(Identity::known("Bob"), [0, 1, 1, 0]),
            result(Identity::known("Alice"), [0, 1, 1, 0]),
            result(Identity::Unknown, [0, 1, 1, 0]),
        ];
        assert_eq!(caption(&results), "Alice, Bob, 2 unknown");
        assert_eq!(caption(&results[..1]), "Alice");
        assert_eq!(caption(&[]), "");
    }

    #[test]
    fn highlight_draws_box_and_label_strip() {
        let mut frame = Frame::new(0, Duration::ZERO, RgbImage::new(200, 200));
        let results = vec![result(Identity::known("Al"), [20, 120, 120, 20])];

        FrameAnnotator::new(true).annotate(&mut frame, &results);

        assert_eq!(*frame.image.get_pixel(20, 20), GREEN);
        assert_eq!(*frame.image.get_pixel(60, 60), Rgb([0, 0, 0]));
        assert_eq!(*frame.image.get_pixel(21, 118), GREEN);
        assert_eq!(results[0].bbox, BoundingBox::new(20, 120, 120, 20));
    }

    #[test]
    fn caption_mode_writes_near_bottom_only() {
        let mut frame = Frame::new(0, Duration::ZERO, RgbImage::new(120, 60));
        let results = vec![result(Identity::Unknown, [0, 10, 10, 0])];

        FrameAnnotator::new(false).annotate(&mut frame, &results);

        let lit_rows: Vec<u32> = (0..60)
            .filter(|&y| (0..120).any(|x| *frame.image.get_pixel(x, y) == WHITE))
            .collect();
        assert!(!lit_rows.is_empty());
        assert!(lit_rows.iter().all(|&y| (43..50).contains(&y)));
    }
}
