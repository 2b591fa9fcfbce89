//! Card composition: fixed 1080-wide layout over the template image.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgba, RgbaImage};
use rust_decimal::{Decimal, RoundingStrategy};
use rusttype::{point, Font, Scale};
use thiserror::Error;

use crate::assets::{AssetBundle, AssetError};
use crate::layout;

const SUBJECT_H: u32 = 500;
const SUBJECT_MAX_W: u32 = 1020;
const BAND_TOP: f32 = 227.0;
const BAND_BOTTOM: f32 = 727.0;
const CANVAS_CENTER_X: f32 = 540.0;

const FRAME_GRAY_POS: (u32, u32) = (60, 727);
const FRAME_GREEN_POS: (u32, u32) = (560, 894);
const LOGO_POS: (i64, i64) = (60, 60);
const LOGO_SIZE: (u32, u32) = (960, 167);

const ARTICLE_POS: (f32, f32) = (102.0, 912.0);
const ARTICLE_PX: f32 = 49.0;
const UNDERLINE_GAP: i32 = 16;
const UNDERLINE_THICKNESS: u32 = 5;

const NAME_POS: (f32, f32) = (102.0, 756.0);
const NAME_PX: f32 = 24.0;
const NAME_MAX_W: f32 = 400.0;
const NAME_PITCH: f32 = 40.0;

const KIND_POS: (f32, f32) = (602.0, 931.5);
const KIND_PX: f32 = 42.0;

const PRICE_POS: (f32, f32) = (560.0, 756.0);
const PRICE_PX: f32 = 82.0;

const DISCLAIMER_BOX: (i32, i32, i32, i32) = (60, 1020, 960, 60); // x, y, w, h
const DISCLAIMER_PX: f32 = 12.0;
const DISCLAIMER_PITCH: i32 = 16;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRAY: Rgba<u8> = Rgba([0x80, 0x80, 0x80, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

const TRADEMARK_TEXT: &str = "LEGO, the LEGO logo, the Minifigure, DUPLO, the DUPLO logo, \
    NINJAGO, the NINJAGO logo, the FRIENDS logo, the HIDDEN SIDE logo, the MINIFIGURES logo, \
    MINDSTORMS and the MINDSTORMS logo are trademarks of the LEGO Group. \u{a9}2023 The LEGO Group. \
    All rights reserved.";

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("asset: {0}")]
    Asset(#[from] AssetError),
}

/// Variable fields drawn onto one card.
pub struct CardText<'a> {
    pub article: &'a str,
    pub name: &'a str,
    pub color: Option<&'a str>,
    pub kind: &'a str,
    pub price: Option<&'a str>,
}

/// Composition capability the pipeline draws through.
pub trait CardComposer: Send + Sync {
    fn compose(&self, cutout: &RgbaImage, text: &CardText<'_>) -> Result<RgbaImage, ComposeError>;
}

impl CardComposer for AssetBundle {
    fn compose(&self, cutout: &RgbaImage, text: &CardText<'_>) -> Result<RgbaImage, ComposeError> {
        compose_card(self, cutout, text)
    }
}

/// Compose the final card: subject centered in the 227..727 band over the
/// template, frames and series logo overlaid, then the text block.
pub fn compose_card(
    assets: &AssetBundle,
    cutout: &RgbaImage,
    text: &CardText<'_>,
) -> Result<RgbaImage, ComposeError> {
    let mut card = assets.template.clone();

    // Subject over opaque white of its own size, so leftover transparency
    // from the cutout cannot fringe against the template.
    let resized = fit_subject(cutout);
    let mut subject = ImageBuffer::from_pixel(resized.width(), resized.height(), WHITE);
    overlay_alpha(&mut subject, &resized, 0, 0);

    let band_center_y = (BAND_TOP + BAND_BOTTOM) / 2.0;
    let pos_x = CANVAS_CENTER_X - subject.width() as f32 / 2.0;
    let pos_y = band_center_y - subject.height() as f32 / 2.0;
    imageops::replace(&mut card, &subject, pos_x as i64, pos_y as i64);

    if let Some(frame) = &assets.frame_gray {
        overlay_alpha(&mut card, frame, FRAME_GRAY_POS.0, FRAME_GRAY_POS.1);
    }
    if let Some(frame) = &assets.frame_green {
        overlay_alpha(&mut card, frame, FRAME_GREEN_POS.0, FRAME_GREEN_POS.1);
    }

    if let Some(color) = text.color {
        if let Some(logo) = assets.logo_for_color(color)? {
            let logo = imageops::resize(&logo, LOGO_SIZE.0, LOGO_SIZE.1, FilterType::Lanczos3);
            imageops::replace(&mut card, &logo, LOGO_POS.0, LOGO_POS.1);
        }
    }

    draw_texts(&mut card, assets, text);
    Ok(card)
}

fn draw_texts(card: &mut RgbaImage, assets: &AssetBundle, text: &CardText<'_>) {
    // Article code with its underline.
    draw_text(
        card,
        &assets.font_bold,
        ARTICLE_PX,
        ARTICLE_POS.0,
        ARTICLE_POS.1,
        BLACK,
        text.article,
    );
    let (article_w, article_h) = text_size(&assets.font_bold, ARTICLE_PX, text.article);
    let underline_y = ARTICLE_POS.1 as i32 + article_h as i32 + UNDERLINE_GAP;
    draw_hline(
        card,
        ARTICLE_POS.0 as i32,
        ARTICLE_POS.0 as i32 + article_w as i32,
        underline_y,
        UNDERLINE_THICKNESS,
        BLACK,
    );

    // Wrapped part name, measured by glyph advances; the disclaimer block
    // below uses bounding-box measurement instead. Both converge for the
    // ASCII text drawn here.
    let name_lines = layout::wrap(text.name, NAME_MAX_W, |s| {
        layout::advance_width(&assets.font_regular, NAME_PX, s)
    });
    for (i, line) in name_lines.iter().enumerate() {
        draw_text(
            card,
            &assets.font_regular,
            NAME_PX,
            NAME_POS.0,
            NAME_POS.1 + i as f32 * NAME_PITCH,
            BLACK,
            line,
        );
    }

    // Category marker.
    draw_text(
        card,
        &assets.font_medium,
        KIND_PX,
        KIND_POS.0,
        KIND_POS.1,
        BLACK,
        text.kind,
    );

    if let Some(price) = text.price {
        draw_text(
            card,
            &assets.font_bold,
            PRICE_PX,
            PRICE_POS.0,
            PRICE_POS.1,
            BLACK,
            &format_price(price),
        );
    }

    // Trademark disclaimer, centered both ways in its band.
    let (box_x, box_y, box_w, box_h) = DISCLAIMER_BOX;
    let lines = layout::wrap_to_box(TRADEMARK_TEXT, box_w as f32, |s| {
        layout::bbox_width(&assets.font_regular, DISCLAIMER_PX, s)
    });
    let mut y = layout::centered_block_y(box_y, box_h, lines.len(), DISCLAIMER_PITCH);
    for line in &lines {
        let line_w = layout::bbox_width(&assets.font_regular, DISCLAIMER_PX, line);
        let x = layout::centered_line_x(box_x, box_w, line_w);
        draw_text(card, &assets.font_regular, DISCLAIMER_PX, x as f32, y as f32, GRAY, line);
        y += DISCLAIMER_PITCH;
    }
}

/// Two-step subject resize: scale to height 500 preserving aspect, then
/// clamp width to 1020 with a second aspect-preserving pass. The two-pass
/// rounding is load-bearing for the final card geometry.
pub(crate) fn fit_subject(cutout: &RgbaImage) -> RgbaImage {
    if cutout.width() == 0 || cutout.height() == 0 {
        return RgbaImage::new(1, SUBJECT_H);
    }
    let w = ((SUBJECT_H as f32 / cutout.height() as f32) * cutout.width() as f32) as u32;
    let mut resized = imageops::resize(cutout, w.max(1), SUBJECT_H, FilterType::Lanczos3);

    if resized.width() > SUBJECT_MAX_W {
        let factor = SUBJECT_MAX_W as f32 / resized.width() as f32;
        let h = (resized.height() as f32 * factor) as u32;
        resized = imageops::resize(&resized, SUBJECT_MAX_W, h.max(1), FilterType::Lanczos3);
    }
    resized
}

/// Final artifact name: the transient download prefix and cutout marker are
/// stripped, and the normalized color lands before the extension.
pub fn final_filename(source_name: &str, color: Option<&str>) -> String {
    let base = source_name.replace("buffer_", "").replace("_no_bg", "");
    match color {
        Some(color) if !color.is_empty() => {
            let color = color.replace(' ', "_");
            match base.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}_{color}.{ext}"),
                None => format!("{base}_{color}"),
            }
        }
        _ => base,
    }
}

/// Price text: two decimals truncated toward zero, comma separator.
pub fn format_price(raw: &str) -> String {
    let d = raw
        .trim()
        .replace(',', ".")
        .parse::<Decimal>()
        .unwrap_or(Decimal::ZERO);
    let d = d.round_dp_with_strategy(2, RoundingStrategy::ToZero);
    format!("{d:.2}").replace('.', ",") + " \u{20bd}"
}

/// Draw `text` with `y` as the top of the text box; rusttype positions by
/// baseline, so the ascent is added here.
fn draw_text(
    img: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    x: f32,
    y: f32,
    color: Rgba<u8>,
    text: &str,
) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let baseline = y + v_metrics.ascent;

    for glyph in font.layout(text, scale, point(x, baseline)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, v| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 {
                    return;
                }
                let (px, py) = (px as u32, py as u32);
                if px >= img.width() || py >= img.height() {
                    return;
                }
                let a = (v * 255.0) as u8;
                if a == 0 {
                    return;
                }
                let dst = img.get_pixel_mut(px, py);
                // alpha blend: src over dst
                let sa = a as f32 / 255.0;
                let inv = 1.0 - sa;
                dst.0[0] = (color.0[0] as f32 * sa + dst.0[0] as f32 * inv) as u8;
                dst.0[1] = (color.0[1] as f32 * sa + dst.0[1] as f32 * inv) as u8;
                dst.0[2] = (color.0[2] as f32 * sa + dst.0[2] as f32 * inv) as u8;
                dst.0[3] = 255;
            });
        }
    }
}

/// Rendered bounding box of `text` at `px`.
fn text_size(font: &Font<'_>, px: f32, text: &str) -> (f32, f32) {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);

    let mut min_x = f32::MAX;
    let mut min_y = f32::MAX;
    let mut max_x = f32::MIN;
    let mut max_y = f32::MIN;
    for glyph in font.layout(text, scale, point(0.0, v_metrics.ascent)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            min_x = min_x.min(bb.min.x as f32);
            min_y = min_y.min(bb.min.y as f32);
            max_x = max_x.max(bb.max.x as f32);
            max_y = max_y.max(bb.max.y as f32);
        }
    }
    if max_x <= min_x {
        return (0.0, 0.0);
    }
    (max_x - min_x, max_y - min_y)
}

fn draw_hline(img: &mut RgbaImage, x0: i32, x1: i32, y: i32, thickness: u32, color: Rgba<u8>) {
    for dy in 0..thickness as i32 {
        let yy = y + dy;
        if yy < 0 || yy >= img.height() as i32 {
            continue;
        }
        for x in x0.max(0)..x1.min(img.width() as i32) {
            img.put_pixel(x as u32, yy as u32, color);
        }
    }
}

fn overlay_alpha(base: &mut RgbaImage, over: &RgbaImage, x: u32, y: u32) {
    for oy in 0..over.height() {
        for ox in 0..over.width() {
            let p = over.get_pixel(ox, oy);
            let a = p.0[3] as f32 / 255.0;
            if a <= 0.0 {
                continue;
            }
            let bx = x + ox;
            let by = y + oy;
            if bx >= base.width() || by >= base.height() {
                continue;
            }
            let dst = base.get_pixel_mut(bx, by);
            let inv = 1.0 - a;
            dst.0[0] = (p.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
            dst.0[1] = (p.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
            dst.0[2] = (p.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
            dst.0[3] = 255;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn wide_subject_is_clamped_to_max_width() {
        // 2000x100 would become 10000 wide at height 500; the second pass
        // must bring it back to exactly 1020.
        let cutout = RgbaImage::from_pixel(2000, 100, Rgba([1, 2, 3, 255]));
        let fitted = fit_subject(&cutout);
        assert_eq!(fitted.width(), SUBJECT_MAX_W);
        assert!(fitted.height() <= SUBJECT_H);
    }

    #[test]
    fn tall_subject_keeps_height_500() {
        let cutout = RgbaImage::from_pixel(100, 400, Rgba([1, 2, 3, 255]));
        let fitted = fit_subject(&cutout);
        assert_eq!(fitted.height(), SUBJECT_H);
        assert_eq!(fitted.width(), 125);
    }

    #[test]
    fn zero_sized_subject_yields_placeholder() {
        let fitted = fit_subject(&RgbaImage::new(0, 0));
        assert_eq!((fitted.width(), fitted.height()), (1, SUBJECT_H));
    }

    #[test]
    fn final_filename_strips_markers_and_appends_color() {
        assert_eq!(
            final_filename("3001_no_bg.png", Some("Red")),
            "3001_Red.png"
        );
        assert_eq!(
            final_filename("buffer_3001.jpg", Some("Dark Blue")),
            "3001_Dark_Blue.jpg"
        );
        assert_eq!(final_filename("buffer_3001_no_bg.png", None), "3001.png");
    }

    #[test]
    fn price_is_truncated_not_rounded() {
        assert_eq!(format_price("129.999"), "129,99 \u{20bd}");
        assert_eq!(format_price("40"), "40,00 \u{20bd}");
        assert_eq!(format_price("garbage"), "0,00 \u{20bd}");
    }

    #[test]
    fn overlay_respects_alpha() {
        let mut base = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 255]));
        let mut over = RgbaImage::from_pixel(2, 1, Rgba([255, 255, 255, 255]));
        over.put_pixel(1, 0, Rgba([255, 255, 255, 0]));

        overlay_alpha(&mut base, &over, 0, 0);
        assert_eq!(base.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(base.get_pixel(1, 0).0, [0, 0, 0, 255]);
    }
}
