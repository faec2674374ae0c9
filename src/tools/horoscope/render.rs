/// Procedural horoscope card rendering.
///
/// Everything is laid out in fractions of the canvas so the same card
/// renders at story size (1080x1920) or at a thumbnail size.

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::zodiac::{Background, Palette, Style, ZodiacSign, palette_for};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSize {
    pub width: u32,
    pub height: u32,
}

/// Instagram story format.
pub const STORY_SIZE: CardSize = CardSize {
    width: 1080,
    height: 1920,
};

/// Inputs that determine a card's pixels.
#[derive(Debug, Clone)]
pub struct CardSpec {
    pub sign: ZodiacSign,
    pub style: Style,
    /// Pre-formatted, e.g. "Monday, October 19, 2026"
    pub date: String,
    pub horoscope: String,
    pub lucky_number: u8,
    pub lucky_color: String,
    pub daily_vibe: String,
    /// Seed for decorative scatter (stars, bokeh)
    pub seed: u64,
}

const REGULAR_TTF: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans.ttf");
const BOLD_TTF: &[u8] = include_bytes!("../../../assets/fonts/DejaVuSans-Bold.ttf");

/// Label colour used on every style.
const GOLD: &str = "#FFD700";

/// Embedded DejaVu faces. Parsing borrows the static bytes, so loading per
/// render costs only a table walk.
pub struct CardFonts {
    regular: FontRef<'static>,
    bold: FontRef<'static>,
}

impl CardFonts {
    pub fn load() -> Result<Self, InvalidFont> {
        Ok(Self {
            regular: FontRef::try_from_slice(REGULAR_TTF)?,
            bold: FontRef::try_from_slice(BOLD_TTF)?,
        })
    }
}

/// Parse `#RRGGBB` into an opaque colour. Malformed input yields black.
pub fn parse_hex(hex: &str) -> Rgba<u8> {
    let digits = hex.trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => Rgba([r, g, b, 255]),
        _ => Rgba([0, 0, 0, 255]),
    }
}

fn with_alpha(color: Rgba<u8>, alpha: u8) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], alpha])
}

fn lerp(a: Rgba<u8>, b: Rgba<u8>, t: f32) -> Rgba<u8> {
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    Rgba([mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2]), 255])
}

fn blend_pixel(img: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= img.width() as i64 || y >= img.height() as i64 {
        return;
    }
    img.get_pixel_mut(x as u32, y as u32).blend(&color);
}

fn fill_rect(img: &mut RgbaImage, x0: i64, y0: i64, x1: i64, y1: i64, color: Rgba<u8>) {
    for y in y0.max(0)..y1.min(img.height() as i64) {
        for x in x0.max(0)..x1.min(img.width() as i64) {
            blend_pixel(img, x, y, color);
        }
    }
}

fn fill_circle(img: &mut RgbaImage, cx: i64, cy: i64, radius: i64, color: Rgba<u8>) {
    fill_ring(img, cx, cy, radius, 0, color);
}

/// Annulus between `inner` (exclusive) and `outer` (inclusive) radii.
fn fill_ring(img: &mut RgbaImage, cx: i64, cy: i64, outer: i64, inner: i64, color: Rgba<u8>) {
    let (outer_sq, inner_sq) = (outer * outer, inner * inner);
    for y in (cy - outer)..=(cy + outer) {
        for x in (cx - outer)..=(cx + outer) {
            let d = (x - cx).pow(2) + (y - cy).pow(2);
            if d <= outer_sq && (inner == 0 || d > inner_sq) {
                blend_pixel(img, x, y, color);
            }
        }
    }
}

fn fill_rounded_rect(
    img: &mut RgbaImage,
    (x0, y0, x1, y1): (i64, i64, i64, i64),
    radius: i64,
    color: Rgba<u8>,
) {
    let radius = radius.min((x1 - x0) / 2).min((y1 - y0) / 2).max(0);
    for y in y0..y1 {
        for x in x0..x1 {
            // Distance to the nearest corner centre, only inside corner boxes.
            let dx = if x < x0 + radius {
                x0 + radius - x
            } else if x >= x1 - radius {
                x - (x1 - radius - 1)
            } else {
                0
            };
            let dy = if y < y0 + radius {
                y0 + radius - y
            } else if y >= y1 - radius {
                y - (y1 - radius - 1)
            } else {
                0
            };
            if dx * dx + dy * dy <= radius * radius {
                blend_pixel(img, x, y, color);
            }
        }
    }
}

fn paint_background(img: &mut RgbaImage, background: Background) {
    let height = img.height().max(2) - 1;
    match background {
        Background::Solid(hex) => {
            let color = parse_hex(hex);
            for pixel in img.pixels_mut() {
                *pixel = color;
            }
        }
        Background::Gradient(top, bottom) => {
            let (top, bottom) = (parse_hex(top), parse_hex(bottom));
            for (_, y, pixel) in img.enumerate_pixels_mut() {
                *pixel = lerp(top, bottom, y as f32 / height as f32);
            }
        }
    }
}

fn scatter_stars(img: &mut RgbaImage, rng: &mut StdRng, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let count = (w * h / 4000).max(8);
    let max_radius = (w / 360).max(1);
    for _ in 0..count {
        let x = rng.gen_range(0..w);
        let y = rng.gen_range(0..h);
        let radius = rng.gen_range(0..=max_radius);
        let alpha = rng.gen_range(90..=255);
        fill_circle(img, x, y, radius, with_alpha(color, alpha));
    }
}

fn scatter_bokeh(img: &mut RgbaImage, rng: &mut StdRng, color: Rgba<u8>) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    for _ in 0..7 {
        let radius = rng.gen_range((w / 12).max(1)..=(w / 5).max(2));
        let x = rng.gen_range(0..w);
        let y = rng.gen_range(0..h);
        fill_circle(img, x, y, radius, with_alpha(color, 28));
    }
}

/// Glowing halo around the sign glyph, with a 12-point wheel marking the
/// sign's position.
fn draw_sign_halo(img: &mut RgbaImage, fonts: &CardFonts, palette: &Palette, sign: ZodiacSign) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (cx, cy) = (w / 2, h * 17 / 100);
    let radius = (w * 13 / 100).max(4);
    let thickness = (w * 12 / 1000).max(1);
    let accent = parse_hex(palette.accent);
    let secondary = parse_hex(palette.secondary);

    for step in 1..=6 {
        let spread = thickness * step * 2;
        fill_ring(
            img,
            cx,
            cy,
            radius + spread,
            radius + spread - thickness * 2,
            with_alpha(accent, 40 - step as u8 * 5),
        );
    }
    fill_ring(img, cx, cy, radius, radius - thickness, accent);

    let wheel = radius * 3 / 4;
    let dot = (w / 120).max(1);
    for (i, other) in ZodiacSign::ALL.iter().enumerate() {
        let angle = std::f64::consts::TAU * i as f64 / 12.0 - std::f64::consts::FRAC_PI_2;
        let x = cx + (wheel as f64 * angle.cos()).round() as i64;
        let y = cy + (wheel as f64 * angle.sin()).round() as i64;
        if *other == sign {
            fill_circle(img, x, y, dot * 2, accent);
        } else {
            fill_circle(img, x, y, dot, secondary);
        }
    }

    let glyph = sign.symbol().to_string();
    let scale = px(radius as f32);
    let (_, glyph_h) = text_size(scale, &fonts.regular, &glyph);
    draw_centered(img, &fonts.regular, &glyph, scale, cx, cy - glyph_h as i64 / 2, accent);
}

fn draw_divider(img: &mut RgbaImage, y: i64, color: Rgba<u8>) {
    let w = img.width() as i64;
    let thickness = (img.height() as i64 / 480).max(1);
    fill_rect(img, w / 5, y, w - w / 5, y + thickness, color);
}

fn px(size: f32) -> PxScale {
    PxScale::from(size.max(1.0))
}

/// Font size as per-mille of the canvas height.
fn scale_of(height: i64, per_mille: i64) -> PxScale {
    px((height * per_mille) as f32 / 1000.0)
}

/// Shrink `scale` until `text` fits in `max_width`.
fn fit_scale(font: &FontRef<'_>, text: &str, scale: PxScale, max_width: i64) -> PxScale {
    let (width, _) = text_size(scale, font, text);
    if width as i64 <= max_width || width == 0 {
        return scale;
    }
    px(scale.y * max_width.max(1) as f32 / width as f32)
}

/// Greedy word wrap against rendered width.
fn wrap_words(font: &FontRef<'_>, text: &str, scale: PxScale, max_width: i64) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        let candidate = if line.is_empty() {
            word.to_string()
        } else {
            format!("{line} {word}")
        };
        if line.is_empty() || text_size(scale, font, &candidate).0 as i64 <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Draw one line horizontally centred on `cx` with its top at `top`.
/// Returns the line height.
fn draw_centered(
    img: &mut RgbaImage,
    font: &FontRef<'_>,
    text: &str,
    scale: PxScale,
    cx: i64,
    top: i64,
    color: Rgba<u8>,
) -> i64 {
    let (width, height) = text_size(scale, font, text);
    let x = cx - width as i64 / 2;
    draw_text_mut(img, color, x as i32, top as i32, scale, font, text);
    height as i64
}

/// Title block under the halo: sign name, subtitle and date.
fn draw_header(img: &mut RgbaImage, fonts: &CardFonts, palette: &Palette, card: &CardSpec) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let title = card.sign.as_str().to_uppercase();
    let scale = fit_scale(&fonts.bold, &title, scale_of(h, 48), w * 85 / 100);
    let top = h * 32 / 100;
    draw_centered(img, &fonts.bold, &title, scale, w / 2, top, parse_hex(palette.accent));
    let subtitle = "Today's Horoscope";
    let scale = fit_scale(&fonts.regular, subtitle, scale_of(h, 24), w * 85 / 100);
    draw_centered(
        img,
        &fonts.regular,
        subtitle,
        scale,
        w / 2,
        h * 375 / 1000,
        parse_hex(palette.primary),
    );
    let date_scale = fit_scale(&fonts.regular, &card.date, scale_of(h, 18), w * 85 / 100);
    draw_centered(
        img,
        &fonts.regular,
        &card.date,
        date_scale,
        w / 2,
        h * 41 / 100,
        parse_hex(palette.secondary),
    );
}

/// Horoscope text wrapped into the band between the two dividers.
fn draw_body(img: &mut RgbaImage, fonts: &CardFonts, palette: &Palette, text: &str) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let (top, bottom) = (h * 48 / 100, h * 72 / 100);
    let max_width = w * 80 / 100;
    let color = parse_hex(palette.primary);

    // Step the size down until the wrapped text fits the band.
    let mut per_mille = 26;
    let (scale, lines, line_height) = loop {
        let scale = scale_of(h, per_mille);
        let lines = wrap_words(&fonts.regular, text, scale, max_width);
        let line_height = (scale.y * 1.35).ceil() as i64;
        if line_height * lines.len() as i64 <= bottom - top || per_mille <= 14 {
            break (scale, lines, line_height);
        }
        per_mille -= 2;
    };

    let mut y = top;
    for line in lines {
        if y + line_height > bottom {
            break;
        }
        draw_centered(img, &fonts.regular, &line, scale, w / 2, y, color);
        y += line_height;
    }
}

/// Three panels: lucky number, today's vibe, lucky colour; then the footer.
fn draw_footer(img: &mut RgbaImage, fonts: &CardFonts, palette: &Palette, card: &CardSpec) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let panel_w = w * 28 / 100;
    let gap = (w - panel_w * 3) / 4;
    let (y0, y1) = (h * 77 / 100, h * 90 / 100);
    let radius = (y1 - y0) / 6;
    let panel = with_alpha(parse_hex(palette.secondary), 48);
    // Gold washes out on the light minimalist card.
    let label_color = if card.style == Style::Minimalist {
        parse_hex(palette.accent)
    } else {
        parse_hex(GOLD)
    };
    let value_color = parse_hex(palette.primary);
    let label_scale = scale_of(h, 12);

    let number = card.lucky_number.to_string();
    let columns = [
        ("LUCKY NUMBER", number.as_str(), true),
        ("TODAY'S VIBE", card.daily_vibe.as_str(), false),
        ("LUCKY COLOR", card.lucky_color.as_str(), false),
    ];
    for (i, (label, value, large)) in columns.into_iter().enumerate() {
        let x0 = gap + i as i64 * (panel_w + gap);
        let cx = x0 + panel_w / 2;
        let inner = panel_w * 90 / 100;
        fill_rounded_rect(img, (x0, y0, x0 + panel_w, y1), radius, panel);

        let label_scale = fit_scale(&fonts.bold, label, label_scale, inner);
        let mut y = y0 + (y1 - y0) / 8;
        y += draw_centered(img, &fonts.bold, label, label_scale, cx, y, label_color);
        y += (y1 - y0) / 10;

        if large {
            let scale = fit_scale(&fonts.bold, value, scale_of(h, 40), inner);
            draw_centered(img, &fonts.bold, value, scale, cx, y, value_color);
        } else {
            let scale = scale_of(h, 17);
            for line in wrap_words(&fonts.regular, value, scale, inner).iter().take(2) {
                let scale = fit_scale(&fonts.regular, line, scale, inner);
                let line_h = draw_centered(img, &fonts.regular, line, scale, cx, y, value_color);
                y += line_h * 13 / 10;
            }
        }
    }

    draw_centered(
        img,
        &fonts.regular,
        "\u{2605} Astro Daily \u{2605}",
        scale_of(h, 16),
        w / 2,
        h * 93 / 100,
        parse_hex(palette.secondary),
    );
}

/// Render one card.
pub fn render_card(card: &CardSpec, size: CardSize) -> Result<RgbaImage, InvalidFont> {
    let fonts = CardFonts::load()?;
    let palette = palette_for(card.style, card.sign.element());
    let mut img = RgbaImage::new(size.width.max(1), size.height.max(1));
    let mut rng = StdRng::seed_from_u64(card.seed);
    let h = img.height() as i64;

    paint_background(&mut img, palette.background);
    match card.style {
        Style::Mystical => scatter_stars(&mut img, &mut rng, parse_hex(palette.primary)),
        Style::Gradient => scatter_bokeh(&mut img, &mut rng, parse_hex(palette.secondary)),
        Style::Minimalist => {}
    }

    draw_sign_halo(&mut img, &fonts, &palette, card.sign);
    draw_header(&mut img, &fonts, &palette, card);
    let rule = with_alpha(parse_hex(palette.secondary), 180);
    draw_divider(&mut img, h * 45 / 100, rule);
    draw_body(&mut img, &fonts, &palette, &card.horoscope);
    draw_divider(&mut img, h * 74 / 100, rule);
    draw_footer(&mut img, &fonts, &palette, card);
    Ok(img)
}

/// PNG-encode a rendered card.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, ImageError> {
    let mut buffer = Vec::new();
    PngEncoder::new(&mut buffer).write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(buffer)
}
