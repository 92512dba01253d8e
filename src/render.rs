// src/render.rs

//! PNG pictures of one iteration snapshot, and the HTML legend that goes
//! with them.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{EmbedError, Result};
use crate::point::Layer;
use crate::snapshot::PointSnapshot;

/// Drawable area before margins.
pub const DRAW_AREA: u32 = 2000;
pub const MARGIN: u32 = 20;

const LARGE_RADIUS: f64 = 15.0;
const SMALL_RADIUS: f64 = 10.0;
const DOT_RADIUS: f64 = 5.0;
const RING_WIDTH: f64 = 4.0;

/// Fixed so that repeated renders stack points identically.
const DRAW_ORDER_SEED: u64 = 849_662_123_548_415_231;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const DARK_RED: Rgb<u8> = Rgb([128, 0, 0]);
const MID_GRAY: Rgb<u8> = Rgb([128, 128, 128]);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Colouring {
    /// Class colours; red points large with a black ring, gray points small.
    ClassByLayer,
    /// Same shapes, filled by layer instead of class.
    LayerOnly,
    /// Class colours at one size; gray points ringed, split duplicates dotted.
    SplitMarkers,
}

impl Colouring {
    pub const ALL: [Colouring; 3] = [
        Colouring::ClassByLayer,
        Colouring::LayerOnly,
        Colouring::SplitMarkers,
    ];

    pub fn index(self) -> usize {
        match self {
            Colouring::ClassByLayer => 0,
            Colouring::LayerOnly => 1,
            Colouring::SplitMarkers => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Colouring::ALL.get(index).copied()
    }

    /// Layer painted first; the other one ends up on top.
    fn bottom_layer(self) -> Layer {
        match self {
            Colouring::SplitMarkers => Layer::Red,
            _ => Layer::Gray,
        }
    }
}

/// Maps layout coordinates onto the canvas, keeping the aspect ratio.
struct CanvasTransform {
    low: [f64; 2],
    scale: f64,
}

impl CanvasTransform {
    fn fit(points: &[PointSnapshot]) -> Result<Self> {
        let mut low = [f64::INFINITY; 2];
        let mut high = [f64::NEG_INFINITY; 2];
        for point in points {
            for position in &point.positions {
                if !(position[0].is_finite() && position[1].is_finite()) {
                    return Err(EmbedError::spec(format!(
                        "point {} has a non-finite position",
                        point.point_id
                    )));
                }
                for axis in 0..2 {
                    low[axis] = low[axis].min(position[axis]);
                    high[axis] = high[axis].max(position[axis]);
                }
            }
        }

        let area = f64::from(DRAW_AREA);
        let scale = (0..2)
            .map(|axis| high[axis] - low[axis])
            .filter(|&range| range > 0.0)
            .map(|range| area / range)
            .fold(f64::INFINITY, f64::min);
        let scale = if scale.is_finite() { scale } else { 1.0 };
        if low[0].is_infinite() {
            low = [0.0, 0.0];
        }
        Ok(CanvasTransform { low, scale })
    }

    fn apply(&self, position: [f64; 2]) -> (f64, f64) {
        let margin = f64::from(MARGIN);
        (
            (position[0] - self.low[0]) * self.scale + margin,
            (position[1] - self.low[1]) * self.scale + margin,
        )
    }
}

/// Paints every pixel whose centre lies within `inner..=outer` of `(cx, cy)`.
fn fill_annulus(image: &mut RgbImage, cx: f64, cy: f64, inner: f64, outer: f64, colour: Rgb<u8>) {
    let (width, height) = image.dimensions();
    let x_start = (cx - outer).floor().max(0.0) as u32;
    let y_start = (cy - outer).floor().max(0.0) as u32;
    let x_end = ((cx + outer).ceil().max(0.0) as u32).min(width.saturating_sub(1));
    let y_end = ((cy + outer).ceil().max(0.0) as u32).min(height.saturating_sub(1));
    let inner_sq = inner * inner;
    let outer_sq = outer * outer;

    for y in y_start..=y_end {
        for x in x_start..=x_end {
            let dx = f64::from(x) + 0.5 - cx;
            let dy = f64::from(y) + 0.5 - cy;
            let distance_sq = dx * dx + dy * dy;
            if distance_sq <= outer_sq && distance_sq >= inner_sq {
                image.put_pixel(x, y, colour);
            }
        }
    }
}

fn fill_circle(image: &mut RgbImage, cx: f64, cy: f64, radius: f64, colour: Rgb<u8>) {
    fill_annulus(image, cx, cy, 0.0, radius, colour);
}

fn stroke_circle(image: &mut RgbImage, cx: f64, cy: f64, radius: f64, colour: Rgb<u8>) {
    let half = RING_WIDTH / 2.0;
    fill_annulus(image, cx, cy, radius - half, radius + half, colour);
}

fn class_colour(palette: &[[u8; 3]], point: &PointSnapshot) -> Result<Rgb<u8>> {
    usize::try_from(point.class_label)
        .ok()
        .and_then(|label| palette.get(label))
        .map(|&rgb| Rgb(rgb))
        .ok_or_else(|| {
            EmbedError::spec(format!(
                "class {} of point {} has no colour",
                point.class_label, point.point_id
            ))
        })
}

/// Draws one snapshot in the requested colouring.
pub fn render_snapshot(
    points: &[PointSnapshot],
    palette: &[[u8; 3]],
    colouring: Colouring,
) -> Result<RgbImage> {
    let transform = CanvasTransform::fit(points)?;
    let side = DRAW_AREA + 2 * MARGIN;
    let mut image = RgbImage::from_pixel(side, side, WHITE);

    let mut order: Vec<&PointSnapshot> = points.iter().collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(DRAW_ORDER_SEED));

    let bottom = colouring.bottom_layer();
    let layers = [bottom, if bottom == Layer::Red { Layer::Gray } else { Layer::Red }];
    for layer in layers {
        for point in order.iter().filter(|p| p.layer == layer) {
            let fill = match (colouring, layer) {
                (Colouring::LayerOnly, Layer::Red) => DARK_RED,
                (Colouring::LayerOnly, Layer::Gray) => MID_GRAY,
                _ => class_colour(palette, point)?,
            };
            for (slot, &position) in point.positions.iter().enumerate() {
                let (x, y) = transform.apply(position);
                match (colouring, layer) {
                    (Colouring::SplitMarkers, Layer::Red) => {
                        fill_circle(&mut image, x, y, LARGE_RADIUS, fill);
                    }
                    (Colouring::SplitMarkers, Layer::Gray) => {
                        fill_circle(&mut image, x, y, LARGE_RADIUS, fill);
                        stroke_circle(&mut image, x, y, LARGE_RADIUS, BLACK);
                        if slot == 1 {
                            fill_circle(&mut image, x, y, DOT_RADIUS, BLACK);
                        }
                    }
                    (_, Layer::Red) => {
                        fill_circle(&mut image, x, y, LARGE_RADIUS, fill);
                        stroke_circle(&mut image, x, y, LARGE_RADIUS, BLACK);
                    }
                    (_, Layer::Gray) => {
                        fill_circle(&mut image, x, y, SMALL_RADIUS, fill);
                    }
                }
            }
        }
    }
    Ok(image)
}

pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Escapes text for an HTML body or attribute.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn legend_section(
    html: &mut String,
    title: &str,
    labels: &[String],
    colours: &[String],
    big: bool,
) {
    html.push_str("<div class=\"legend-section\">\n");
    html.push_str(&format!("<div class=\"legend-title\">{}</div>\n", escape_html(title)));
    let (circle, entry) = if big {
        ("legend-circle-big", "legend-entry-big")
    } else {
        ("legend-circle-small", "legend-entry-small")
    };
    for (label, colour) in labels.iter().zip(colours) {
        html.push_str(&format!(
            "<div class=\"legend-row\"><div class=\"{circle}\" style=\"background-color:{};\"></div>\
             <div class=\"{entry}\">{}</div></div>\n",
            escape_html(colour),
            escape_html(label)
        ));
    }
}

/// HTML page naming the class behind every colour, one section per way a
/// class shows up in the PNGs.
pub fn legend_html(labels: &[String], colours: &[String]) -> String {
    let big = LARGE_RADIUS as u32 * 2;
    let small = SMALL_RADIUS as u32 * 2;
    let mut html = String::from("<html>\n<head><title>Legend</title>\n<style>\n");
    html.push_str(&format!(
        ".legend-circle-big{{width:{big}px;height:{big}px;display:inline-block;\
         border-radius:50%;border:2px solid black;vertical-align:middle;}}\n"
    ));
    html.push_str(&format!(
        ".legend-circle-small{{width:{small}px;height:{small}px;display:inline-block;\
         border-radius:50%;vertical-align:middle;}}\n"
    ));
    html.push_str(".legend-entry-big,.legend-entry-small{display:inline-block;margin-left:5px;}\n");
    html.push_str(".legend-section{border:2px solid black;padding:10px;margin:10px;}\n");
    html.push_str(".legend-row{margin-top:6px;}\n");
    html.push_str("</style>\n</head>\n<body style=\"font-size:18px;\">\n");

    legend_section(&mut html, "Colouring 0 red layer:", labels, colours, true);
    html.push_str("</div>\n");
    legend_section(&mut html, "Colouring 0 gray layer:", labels, colours, false);
    html.push_str("</div>\n");
    legend_section(&mut html, "Colouring 2 gray layer:", labels, colours, true);
    html.push_str(
        "<div class=\"legend-row\"><div class=\"legend-circle-big\" \
         style=\"background-color:white;text-align:center;\">&#9899;</div>\
         <div class=\"legend-entry-big\">Second projection</div></div>\n",
    );
    html.push_str("</div>\n</body>\n</html>\n");
    html
}

pub fn write_legend(path: &Path, labels: &[String], colours: &[String]) -> Result<()> {
    std::fs::write(path, legend_html(labels, colours))?;
    Ok(())
}
