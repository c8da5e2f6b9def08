use eframe::egui::{self, PointerButton, Rect, Response, Ui, Vec2};

use super::super::state::Action;
use super::super::ViewModel;

const ZOOM_SENSITIVITY: f32 = 0.0018;

/// Topmost circle containing `point` within `tolerance`. Later indices are drawn
/// on top, so the scan runs backwards.
pub(in crate::app) fn hit_test_by(
    len: usize,
    point: Vec2,
    tolerance: f32,
    circle: impl Fn(usize) -> (Vec2, f32),
) -> Option<usize> {
    (0..len).rev().find(|&index| {
        let (center, radius) = circle(index);
        (center - point).length() < radius + tolerance
    })
}

/// Per-frame scroll zoom factor, bounded so a single wheel burst stays gentle.
pub(in crate::app) fn scroll_zoom_factor(scroll: f32) -> Option<f32> {
    if scroll.abs() <= f32::EPSILON {
        return None;
    }
    Some((1.0 + (scroll * ZOOM_SENSITIVITY)).clamp(0.85, 1.15))
}

impl ViewModel {
    pub(in crate::app) fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        let Some(factor) = scroll_zoom_factor(scroll) else {
            return;
        };

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.dispatch(Action::Zoom {
            anchor: pointer - rect.min,
            factor,
        });
    }

    pub(in crate::app) fn handle_pan(&mut self, response: &Response) {
        if response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.dispatch(Action::Pan(response.drag_delta()));
        }
    }

    /// Drag, hover and click handling for the force-directed canvases. A primary
    /// drag that starts on a node moves it; on empty canvas it pans.
    pub(in crate::app) fn handle_graph_input(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        self.engine.resize(rect.size());
        self.handle_zoom(ui, rect, response);
        self.handle_pan(response);

        if response.drag_started_by(PointerButton::Primary) {
            let origin = ui
                .input(|input| input.pointer.press_origin())
                .or_else(|| response.interact_pointer_pos());
            if let Some(index) = origin.and_then(|pos| self.engine.hit_test(pos - rect.min)) {
                self.dispatch(Action::DragStart(index));
            }
        }

        if response.dragged_by(PointerButton::Primary) {
            let dragging = self.engine.state().dragging.is_some();
            match response.interact_pointer_pos() {
                Some(pointer) if dragging => {
                    let world = self
                        .engine
                        .state()
                        .transform(self.engine.mode())
                        .from_screen(rect, pointer);
                    self.dispatch(Action::DragMove(world));
                }
                _ if !dragging => self.dispatch(Action::Pan(response.drag_delta())),
                _ => {}
            }
        }

        if response.drag_stopped() {
            self.dispatch(Action::DragEnd);
        }

        if self.engine.state().dragging.is_none() {
            let pointer = response.hover_pos().map(|pos| pos - rect.min);
            self.engine.pointer_moved(pointer);
        }

        if response.clicked_by(PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.engine.click(pointer - rect.min);
        }

        let cursor = if self.engine.state().dragging.is_some() {
            Some(egui::CursorIcon::Grabbing)
        } else if self.engine.state().hovered.is_some() {
            Some(egui::CursorIcon::PointingHand)
        } else {
            None
        };
        if let Some(cursor) = cursor {
            ui.output_mut(|output| output.cursor_icon = cursor);
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;

    #[test]
    fn hit_test_prefers_topmost_circle() {
        let circles = [(vec2(0.0, 0.0), 10.0), (vec2(5.0, 0.0), 10.0)];
        let hit = hit_test_by(circles.len(), vec2(2.0, 0.0), 0.0, |index| circles[index]);
        assert_eq!(hit, Some(1));
    }

    #[test]
    fn hit_test_honors_tolerance() {
        let circles = [(vec2(0.0, 0.0), 5.0)];
        assert_eq!(hit_test_by(1, vec2(8.0, 0.0), 0.0, |index| circles[index]), None);
        assert_eq!(hit_test_by(1, vec2(8.0, 0.0), 4.0, |index| circles[index]), Some(0));
    }

    #[test]
    fn scroll_zoom_is_bounded() {
        assert_eq!(scroll_zoom_factor(0.0), None);
        assert_eq!(scroll_zoom_factor(10_000.0), Some(1.15));
        assert_eq!(scroll_zoom_factor(-10_000.0), Some(0.85));
        let gentle = scroll_zoom_factor(50.0).expect("nonzero scroll");
        assert!(gentle > 1.0 && gentle < 1.15);
    }
}
