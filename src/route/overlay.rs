use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::models::{Route, RouteHold};

const ROUTE_A_COLOR: Rgb<u8> = Rgb([255, 64, 0]);
const ROUTE_B_COLOR: Rgb<u8> = Rgb([0, 160, 255]);

/// Pixel rectangle of a route hold, at least 1x1
fn hold_rect(hold: &RouteHold, w: u32, h: u32) -> Rect {
    let [cx, cy] = hold.center_norm;
    let [bw, bh] = hold.bbox_wh_norm;
    let pw = (bw * w as f64).round().max(1.0);
    let ph = (bh * h as f64).round().max(1.0);
    let x = (cx * w as f64 - pw / 2.0).round() as i32;
    let y = (cy * h as f64 - ph / 2.0).round() as i32;
    Rect::at(x, y).of_size(pw as u32, ph as u32)
}

fn hold_center(hold: &RouteHold, w: u32, h: u32) -> (f32, f32) {
    let [cx, cy] = hold.center_norm;
    ((cx * w as f64) as f32, (cy * h as f64) as f32)
}

/// Draw the route on a copy of the wall photo: primary holds outlined and
/// joined in climbing order, variation holds marked with a dot.
pub fn draw_route(image: &DynamicImage, route: &Route) -> RgbImage {
    let mut canvas = image.to_rgb8();
    let (w, h) = canvas.dimensions();

    for pair in route.route_a.windows(2) {
        let start = hold_center(&pair[0], w, h);
        let end = hold_center(&pair[1], w, h);
        draw_line_segment_mut(&mut canvas, start, end, ROUTE_A_COLOR);
    }

    for hold in &route.route_a {
        let rect = hold_rect(hold, w, h);
        draw_hollow_rect_mut(&mut canvas, rect, ROUTE_A_COLOR);
        // Second outline, one pixel in, so boxes stay visible on busy walls
        if rect.width() > 2 && rect.height() > 2 {
            let inner = Rect::at(rect.left() + 1, rect.top() + 1).of_size(rect.width() - 2, rect.height() - 2);
            draw_hollow_rect_mut(&mut canvas, inner, ROUTE_A_COLOR);
        }
    }

    let radius = ((w.min(h) / 150).max(2)) as i32;
    for hold in &route.route_b {
        let (x, y) = hold_center(hold, w, h);
        draw_filled_circle_mut(&mut canvas, (x as i32, y as i32), radius, ROUTE_B_COLOR);
    }

    canvas
}
