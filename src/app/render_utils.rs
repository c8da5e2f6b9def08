use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2, pos2};

pub(in crate::app) const MIN_SCALE: f32 = 0.1;
pub(in crate::app) const MAX_SCALE: f32 = 10.0;

const PALETTE: [Color32; 10] = [
    Color32::from_rgb(0x00, 0x71, 0xe3),
    Color32::from_rgb(0x5e, 0x5c, 0xe6),
    Color32::from_rgb(0xbf, 0x5a, 0xf2),
    Color32::from_rgb(0xff, 0x37, 0x5f),
    Color32::from_rgb(0xff, 0x9f, 0x0a),
    Color32::from_rgb(0xff, 0xd6, 0x0a),
    Color32::from_rgb(0x30, 0xd1, 0x58),
    Color32::from_rgb(0x64, 0xd2, 0xff),
    Color32::from_rgb(0x0a, 0x84, 0xff),
    Color32::from_rgb(0xac, 0x8e, 0x68),
];

pub(in crate::app) const SLOT_COLORS: [Color32; 3] = [
    Color32::from_rgb(0x00, 0x71, 0xe3),
    Color32::from_rgb(0xff, 0x37, 0x5f),
    Color32::from_rgb(0x30, 0xd1, 0x58),
];

pub(in crate::app) const EDGE_COLOR: Color32 = Color32::from_rgb(0xa1, 0xa1, 0xaa);
pub(in crate::app) const MAP_LINK_COLOR: Color32 = Color32::from_rgb(0x00, 0x71, 0xe3);

pub(in crate::app) fn category_color(rank: usize) -> Color32 {
    PALETTE[rank % PALETTE.len()]
}

pub(in crate::app) fn slot_color(slot: usize) -> Color32 {
    SLOT_COLORS[slot % SLOT_COLORS.len()]
}

pub(in crate::app) fn with_alpha(color: Color32, alpha: f32) -> Color32 {
    let alpha = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

pub(in crate::app) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

/// Canvas-local pan/zoom: `local = world * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct Transform {
    pub offset: Vec2,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn apply(self, world: Vec2) -> Vec2 {
        world * self.scale + self.offset
    }

    pub fn invert(self, local: Vec2) -> Vec2 {
        (local - self.offset) / self.scale
    }

    pub fn to_screen(self, rect: Rect, world: Vec2) -> Pos2 {
        rect.min + self.apply(world)
    }

    pub fn from_screen(self, rect: Rect, screen: Pos2) -> Vec2 {
        self.invert(screen - rect.min)
    }

    pub fn pan(&mut self, delta: Vec2) {
        self.offset += delta;
    }

    /// Scales around `anchor` so the world point under it stays put.
    pub fn zoom_at(&mut self, anchor: Vec2, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.invert(anchor);
        self.scale = (self.scale * factor).clamp(MIN_SCALE, MAX_SCALE);
        self.offset = anchor - world * self.scale;
    }
}

pub(in crate::app) fn draw_background(painter: &Painter, rect: Rect, transform: Transform) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * transform.scale.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min + transform.offset;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
        y += step;
    }
}

pub(in crate::app) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(in crate::app) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    if max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom() {
        return false;
    }

    if rect.contains(start) || rect.contains(end) {
        return true;
    }

    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    (0..4).any(|side| segments_intersect(start, end, corners[side], corners[(side + 1) % 4]))
}

fn segments_intersect(a1: Pos2, a2: Pos2, b1: Pos2, b2: Pos2) -> bool {
    fn cross(o: Pos2, a: Pos2, b: Pos2) -> f32 {
        let oa = a - o;
        let ob = b - o;
        (oa.x * ob.y) - (oa.y * ob.x)
    }

    if a1.x.max(a2.x) < b1.x.min(b2.x)
        || b1.x.max(b2.x) < a1.x.min(a2.x)
        || a1.y.max(a2.y) < b1.y.min(b2.y)
        || b1.y.max(b2.y) < a1.y.min(a2.y)
    {
        return false;
    }

    let c1 = cross(a1, a2, b1);
    let c2 = cross(a1, a2, b2);
    let c3 = cross(b1, b2, a1);
    let c4 = cross(b1, b2, a2);

    (c1 <= 0.0 && c2 >= 0.0 || c1 >= 0.0 && c2 <= 0.0)
        && (c3 <= 0.0 && c4 >= 0.0 || c3 >= 0.0 && c4 <= 0.0)
}

/// Equirectangular projection of degrees into a `size` box.
pub(in crate::app) fn project_lat_lon(lat: f64, lon: f64, size: Vec2) -> Vec2 {
    let x = ((lon + 180.0) / 360.0) as f32 * size.x;
    let y = ((90.0 - lat) / 180.0) as f32 * size.y;
    Vec2::new(x, y)
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    #[test]
    fn transform_round_trips_points() {
        let transform = Transform {
            offset: vec2(30.0, -12.0),
            scale: 2.5,
        };
        let world = vec2(17.0, 4.0);
        let back = transform.invert(transform.apply(world));
        assert!((back - world).length() < 1e-4);
    }

    #[test]
    fn zoom_keeps_anchor_fixed_and_clamps() {
        let mut transform = Transform::default();
        let anchor = vec2(200.0, 150.0);
        let before = transform.invert(anchor);

        transform.zoom_at(anchor, 3.0);
        assert!((transform.invert(anchor) - before).length() < 1e-3);

        transform.zoom_at(anchor, 100.0);
        assert_eq!(transform.scale, MAX_SCALE);
        transform.zoom_at(anchor, 1e-6);
        assert_eq!(transform.scale, MIN_SCALE);
        assert!((transform.invert(anchor) - before).length() < 1e-2);
    }

    #[test]
    fn palette_wraps_by_rank() {
        assert_eq!(category_color(0), category_color(10));
        assert_ne!(category_color(0), category_color(1));
        assert_eq!(slot_color(1), Color32::from_rgb(0xff, 0x37, 0x5f));
    }

    #[test]
    fn edge_crossing_rect_is_visible() {
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(100.0, 100.0));
        assert!(edge_visible(rect, pos2(-50.0, 50.0), pos2(150.0, 50.0), 0.0));
        assert!(!edge_visible(rect, pos2(-50.0, -50.0), pos2(-10.0, 150.0), 0.0));
        assert!(circle_visible(rect, pos2(-3.0, 50.0), 5.0));
    }

    #[test]
    fn projection_maps_corners() {
        let size = vec2(360.0, 180.0);
        assert_eq!(project_lat_lon(90.0, -180.0, size), vec2(0.0, 0.0));
        assert_eq!(project_lat_lon(0.0, 0.0, size), vec2(180.0, 90.0));
    }
}
