//! Generated slide images.
//!
//! Placeholders are a flat palette color with a darker centered panel and
//! the slide number drawn in a block font. Text-slide backgrounds are the
//! same palette without panel or label, since the slide text is overlaid at
//! compose time. Both are drawn in-process with `image`.

use image::{Rgb, RgbImage};
use reelgen_models::Resolution;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Background colors cycled by slide index.
pub const PALETTE: [[u8; 3]; 8] = [
    [52, 73, 94],
    [22, 160, 133],
    [41, 128, 185],
    [142, 68, 173],
    [192, 57, 43],
    [211, 84, 0],
    [39, 174, 96],
    [44, 62, 80],
];

pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub fn palette_color(index: usize) -> [u8; 3] {
    PALETTE[index % PALETTE.len()]
}

/// 3x5 digit glyphs, one row per byte, high bit on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

fn fill(img: &mut RgbImage, rect: Rect, color: Rgb<u8>) {
    let x_end = (rect.x + rect.w).min(img.width());
    let y_end = (rect.y + rect.h).min(img.height());
    for y in rect.y..y_end {
        for x in rect.x..x_end {
            img.put_pixel(x, y, color);
        }
    }
}

/// Draw `number` centered inside `area`, scaled to fit.
fn draw_number(img: &mut RgbImage, number: usize, area: Rect) {
    let digits: Vec<usize> = number
        .to_string()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .map(|d| d as usize)
        .collect();
    if digits.is_empty() {
        return;
    }

    // Each glyph is 3 cells wide with one cell of spacing, 5 cells tall plus
    // one cell of margin above and below
    let cols = digits.len() as u32 * 4 - 1;
    let cell = (area.h / 7).min(area.w / (cols + 2));
    if cell == 0 {
        return;
    }

    let text_w = cols * cell;
    let text_h = 5 * cell;
    let left = area.x + (area.w - text_w) / 2;
    let top = area.y + (area.h - text_h) / 2;

    for (i, digit) in digits.iter().enumerate() {
        let glyph_x = left + i as u32 * 4 * cell;
        for (row, bits) in DIGITS[*digit].iter().enumerate() {
            for col in 0..3u32 {
                if bits & (0b100 >> col) != 0 {
                    let rect = Rect {
                        x: glyph_x + col * cell,
                        y: top + row as u32 * cell,
                        w: cell,
                        h: cell,
                    };
                    fill(img, rect, LABEL_COLOR);
                }
            }
        }
    }
}

/// Flat background with a darker centered panel holding the slide number.
fn render_numbered(index: usize, res: Resolution) -> RgbImage {
    let [r, g, b] = palette_color(index);
    let mut img = RgbImage::from_pixel(res.width, res.height, Rgb([r, g, b]));

    let panel = Rect {
        w: res.width * 3 / 5,
        h: res.height / 6,
        x: (res.width - res.width * 3 / 5) / 2,
        y: (res.height - res.height / 6) / 2,
    };
    fill(&mut img, panel, Rgb([r / 2, g / 2, b / 2]));
    draw_number(&mut img, index + 1, panel);
    img
}

fn render_plain(index: usize, res: Resolution) -> RgbImage {
    let [r, g, b] = palette_color(index);
    RgbImage::from_pixel(res.width, res.height, Rgb([r, g, b]))
}

async fn save_png(path: &Path, res: Resolution, render: impl FnOnce() -> RgbImage + Send + 'static) -> MediaResult<PathBuf> {
    if res.width == 0 || res.height == 0 {
        return Err(MediaError::invalid_input(format!("slide image resolution {res}")));
    }

    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || render().save_with_format(&target, image::ImageFormat::Png))
        .await
        .map_err(|e| MediaError::internal(format!("slide image render task failed: {e}")))??;
    Ok(path.to_path_buf())
}

/// Write a placeholder PNG for slide `index` (zero-based) at exactly `res`,
/// labelled with `index + 1`.
pub async fn render_placeholder(path: impl AsRef<Path>, index: usize, res: Resolution) -> MediaResult<PathBuf> {
    save_png(path.as_ref(), res, move || render_numbered(index, res)).await
}

/// Write a plain palette background for text slide `index` at exactly `res`.
pub async fn render_text_background(path: impl AsRef<Path>, index: usize, res: Resolution) -> MediaResult<PathBuf> {
    save_png(path.as_ref(), res, move || render_plain(index, res)).await
}
