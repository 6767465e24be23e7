//! FFmpeg filter graph fragments for slides.

use reelgen_models::{ColorGrade, Resolution, TextPosition};

/// Largest zoom factor reached by the Ken Burns effect.
pub const KEN_BURNS_MAX_ZOOM: f64 = 1.2;

/// Fixed filter fragment for a color grade.
pub fn color_grade_filter(grade: ColorGrade) -> &'static str {
    match grade {
        ColorGrade::Vibrant => "eq=saturation=1.4:contrast=1.1",
        ColorGrade::Warm => "colorbalance=rs=0.1:gs=0.02:bs=-0.1,eq=saturation=1.1",
        ColorGrade::Cool => "colorbalance=rs=-0.1:gs=0.0:bs=0.12",
        ColorGrade::Vintage => "curves=preset=vintage,eq=saturation=0.85",
        ColorGrade::Sepia => {
            "colorchannelmixer=.393:.769:.189:0:.349:.686:.168:0:.272:.534:.131"
        }
        ColorGrade::BlackWhite => "hue=s=0",
        ColorGrade::Dramatic => "eq=contrast=1.3:brightness=-0.05:saturation=1.2",
    }
}

/// Fit the input inside `res` and pad the remainder with black.
pub fn scale_pad(res: Resolution) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1",
        w = res.width,
        h = res.height
    )
}

/// Slow centered zoom from 1.0 to [`KEN_BURNS_MAX_ZOOM`] over `duration`.
///
/// Expects one input frame per output frame (`-loop 1 -framerate fps`).
pub fn ken_burns(res: Resolution, duration: f64, fps: u32) -> String {
    let frames = (duration * fps as f64).round().max(1.0);
    let increment = (KEN_BURNS_MAX_ZOOM - 1.0) / frames;
    format!(
        "zoompan=z='min(1+{inc:.6}*on,{max})':x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':d=1:s={w}x{h}:fps={fps}",
        inc = increment,
        max = KEN_BURNS_MAX_ZOOM,
        w = res.width,
        h = res.height,
        fps = fps
    )
}

/// Fade in at the start and out at the end of a slide.
///
/// Every non-`None` transition renders as this fade pair.
pub fn fade_in_out(duration: f64, transition: f64) -> Option<String> {
    let t = transition.min(duration / 2.0);
    if t <= 0.0 || !t.is_finite() {
        return None;
    }
    Some(format!(
        "fade=t=in:st=0:d={t:.3},fade=t=out:st={out:.3}:d={t:.3}",
        t = t,
        out = duration - t
    ))
}

/// `x`/`y` expressions for a text anchor with a fixed pixel margin.
pub fn text_anchor(position: TextPosition, margin: u32) -> (String, String) {
    let m = margin;
    let left = m.to_string();
    let hcenter = "(w-text_w)/2".to_string();
    let right = format!("w-text_w-{m}");
    let top = m.to_string();
    let vcenter = "(h-text_h)/2".to_string();
    let bottom = format!("h-text_h-{m}");

    match position {
        TextPosition::TopLeft => (left, top),
        TextPosition::Top => (hcenter, top),
        TextPosition::TopRight => (right, top),
        TextPosition::Center => (hcenter, vcenter),
        TextPosition::BottomLeft => (left, bottom),
        TextPosition::Bottom => (hcenter, bottom),
        TextPosition::BottomRight => (right, bottom),
    }
}

/// Draw the contents of `text_file` at `position`.
///
/// Reading from a file keeps arbitrary script text out of the filter syntax.
pub fn drawtext(text_file: &str, position: TextPosition, res: Resolution) -> String {
    let margin = res.width / 20;
    let font_size = (res.width.min(res.height) / 18).max(12);
    let (x, y) = text_anchor(position, margin);
    format!(
        "drawtext=textfile='{file}':fontcolor=white:fontsize={size}:line_spacing=8:box=1:boxcolor=black@0.5:boxborderw={border}:x={x}:y={y}",
        file = escape_filter_value(text_file),
        size = font_size,
        border = font_size / 2,
        x = x,
        y = y
    )
}

/// Escape a value placed inside single quotes in a filter graph.
pub fn escape_filter_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("'\\\\\\''"),
            ':' => out.push_str("\\:"),
            _ => out.push(c),
        }
    }
    out
}

/// Greedy word wrap used for overlay text.
pub fn wrap_text(text: &str, max_chars: usize) -> String {
    let max_chars = max_chars.max(1);
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.join("\n")
}

/// Characters per overlay line for a resolution.
pub fn wrap_width(res: Resolution) -> usize {
    let font_size = (res.width.min(res.height) / 18).max(12);
    // Average glyph is roughly 0.55 em wide
    ((res.width as f64 * 0.85) / (font_size as f64 * 0.55)).floor().max(10.0) as usize
}
