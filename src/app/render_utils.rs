use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, vec2};

use runviz::Rgba;

pub(super) fn color32(colour: Rgba, opacity: f64) -> Color32 {
    let alpha = (f64::from(colour.a) * opacity.clamp(0.0, 1.0)).round() as u8;
    Color32::from_rgba_unmultiplied(colour.r, colour.g, colour.b, alpha)
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(244, 244, 240));

    let step = (60.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.center() + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(120, 120, 110, 40));

    let mut x = origin.x.rem_euclid(step) + rect.left();
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = origin.y.rem_euclid(step) + rect.top();
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

/// Cheap bounding-box test; links crossing the view diagonally still pass.
pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

/// Triangle for a link arrow whose tip sits on the rim of the target node.
/// `None` when the nodes are too close to fit one.
pub(super) fn arrow_head(start: Pos2, end: Pos2, target_radius: f32, size: f32) -> Option<[Pos2; 3]> {
    let delta = end - start;
    let length = delta.length();
    if length <= target_radius + size {
        return None;
    }

    let direction = delta / length;
    let tip = end - direction * target_radius;
    let base = tip - direction * size;
    let half_width = vec2(-direction.y, direction.x) * (size * 0.5);
    Some([tip, base + half_width, base - half_width])
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, x: f64, y: f64) -> Pos2 {
    rect.center() + pan + vec2(x as f32, y as f32) * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> (f64, f64) {
    let world = (screen - rect.center() - pan) / zoom;
    (f64::from(world.x), f64::from(world.y))
}

pub(super) fn node_radius(base: f64, zoom: f32) -> f32 {
    (base as f32 * zoom.powf(0.5)).clamp(3.0, 40.0)
}
