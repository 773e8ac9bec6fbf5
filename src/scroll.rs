//! Scroll viewer geometry
//!
//! Keeps two scroll bars in sync with the size of a viewport and of the
//! content shown through it. Layout and painting belong to the host; this
//! only decides which bars are visible, how big their thumbs are and where
//! the content sits for the current bar values.

use glam::Vec2;

use crate::config::ScrollViewerConfig;
use crate::observable::Observable;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollBar {
    /// Position along the track, 0 at the start and 1 at the end
    pub value: f32,
    pub visible: bool,
    /// Thumb size as a fraction of the track
    pub thumb_ratio: f32,
}

impl Default for ScrollBar {
    fn default() -> Self {
        Self {
            value: 0.0,
            visible: false,
            thumb_ratio: 1.0,
        }
    }
}

impl ScrollBar {
    // one wheel notch; returns whether the value moved
    fn step(&mut self, delta: f32, precision: f32) -> bool {
        let before = self.value;
        if delta < 0.0 && self.value > 0.0 {
            self.value = (self.value - precision).max(0.0);
        } else if delta > 0.0 && self.value < 1.0 {
            self.value = (self.value + precision).min(1.0);
        }
        self.value != before
    }
}

/// Mouse wheel input, positive deltas scroll towards the end
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelEvent {
    pub delta_x: f32,
    pub delta_y: f32,
}

/// Published whenever the content moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollOffset {
    pub offset: Vec2,
    pub horizontal: f32,
    pub vertical: f32,
}

pub struct ScrollViewer {
    config: ScrollViewerConfig,
    viewport: Vec2,
    content: Vec2,
    client: Vec2,
    horizontal: ScrollBar,
    vertical: ScrollBar,
    last_offset: Vec2,

    pub on_scroll: Observable<ScrollOffset>,
}

impl ScrollViewer {
    pub fn new(config: ScrollViewerConfig) -> Self {
        let mut viewer = Self {
            config,
            viewport: Vec2::ZERO,
            content: Vec2::ZERO,
            client: Vec2::ZERO,
            horizontal: ScrollBar::default(),
            vertical: ScrollBar::default(),
            last_offset: Vec2::ZERO,
            on_scroll: Observable::new(),
        };
        viewer.update_scroller();
        viewer
    }

    pub fn config(&self) -> &ScrollViewerConfig {
        &self.config
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport = size.max(Vec2::ZERO);
        self.update_scroller();
    }

    pub fn set_content_size(&mut self, size: Vec2) {
        self.content = size.max(Vec2::ZERO);
        self.update_scroller();
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport
    }

    pub fn content_size(&self) -> Vec2 {
        self.content
    }

    /// Viewport area left for content once visible bars are taken out
    pub fn client_size(&self) -> Vec2 {
        self.client
    }

    pub fn horizontal_bar(&self) -> &ScrollBar {
        &self.horizontal
    }

    pub fn vertical_bar(&self) -> &ScrollBar {
        &self.vertical
    }

    fn client_for(&self, horizontal_visible: bool, vertical_visible: bool) -> Vec2 {
        let bar = self.config.bar_size;
        let width = self.viewport.x - if vertical_visible { bar } else { 0.0 };
        let height = self.viewport.y - if horizontal_visible { bar } else { 0.0 };
        Vec2::new(width, height).max(Vec2::ZERO)
    }

    fn thumb_ratio(&self, client: f32, content: f32) -> f32 {
        let visible_fraction = if content > 0.0 { (client / content).min(1.0) } else { 1.0 };
        (visible_fraction * self.config.thumb_length)
            .max(self.config.min_thumb_ratio)
            .min(1.0)
    }

    /// Recompute bar visibility, thumb sizes and the content offset
    pub fn update_scroller(&mut self) {
        let force_h = self.config.force_horizontal_bar;
        let force_v = self.config.force_vertical_bar;

        // each bar eats into the other axis; visibility only grows, so each
        // bar flips at most once and the third pass only confirms
        let (mut show_h, mut show_v) = (force_h, force_v);
        for _ in 0..3 {
            let client = self.client_for(show_h, show_v);
            let h = force_h || self.content.x > client.x;
            let v = force_v || self.content.y > client.y;
            if (h, v) == (show_h, show_v) {
                break;
            }
            show_h = h;
            show_v = v;
        }

        if self.horizontal.visible && !show_h {
            self.horizontal.value = 0.0;
        }
        if self.vertical.visible && !show_v {
            self.vertical.value = 0.0;
        }
        self.horizontal.visible = show_h;
        self.vertical.visible = show_v;

        self.client = self.client_for(show_h, show_v);
        self.horizontal.thumb_ratio = self.thumb_ratio(self.client.x, self.content.x);
        self.vertical.thumb_ratio = self.thumb_ratio(self.client.y, self.content.y);

        self.publish_if_moved();
    }

    /// Where the content's top-left corner sits relative to the client area
    pub fn content_offset(&self) -> Vec2 {
        let overflow = (self.content - self.client).max(Vec2::ZERO);
        Vec2::new(
            -overflow.x * self.horizontal.value,
            -overflow.y * self.vertical.value,
        )
    }

    /// Apply a wheel event to the visible bars. Returns whether anything moved
    pub fn on_wheel(&mut self, event: WheelEvent) -> bool {
        let precision = self.config.wheel_precision;
        let mut moved = false;

        if self.vertical.visible {
            moved |= self.vertical.step(event.delta_y, precision);
        }
        if self.horizontal.visible {
            moved |= self.horizontal.step(event.delta_x, precision);
        }

        if moved {
            self.publish_if_moved();
        }
        moved
    }

    pub fn set_horizontal_value(&mut self, value: f32) {
        self.horizontal.value = value.clamp(0.0, 1.0);
        self.publish_if_moved();
    }

    pub fn set_vertical_value(&mut self, value: f32) {
        self.vertical.value = value.clamp(0.0, 1.0);
        self.publish_if_moved();
    }

    fn publish_if_moved(&mut self) {
        let offset = self.content_offset();
        if offset == self.last_offset {
            return;
        }
        self.last_offset = offset;
        self.on_scroll.notify(&ScrollOffset {
            offset,
            horizontal: self.horizontal.value,
            vertical: self.vertical.value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn viewer(viewport: Vec2, content: Vec2) -> ScrollViewer {
        let mut viewer = ScrollViewer::new(ScrollViewerConfig::default());
        viewer.set_viewport_size(viewport);
        viewer.set_content_size(content);
        viewer
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_no_bars_when_content_fits() {
        let viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 80.0));
        assert!(!viewer.horizontal_bar().visible);
        assert!(!viewer.vertical_bar().visible);
        assert_eq!(viewer.client_size(), Vec2::new(200.0, 100.0));
        assert_eq!(viewer.content_offset(), Vec2::ZERO);
    }

    #[test]
    fn test_vertical_bar_narrows_client() {
        let viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));
        assert!(viewer.vertical_bar().visible);
        assert!(!viewer.horizontal_bar().visible);
        assert_eq!(viewer.client_size(), Vec2::new(180.0, 100.0));
    }

    #[test]
    fn test_bars_cascade() {
        // fits horizontally only until the vertical bar takes 20px
        let viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(190.0, 400.0));
        assert!(viewer.vertical_bar().visible);
        assert!(viewer.horizontal_bar().visible);
        assert_eq!(viewer.client_size(), Vec2::new(180.0, 80.0));
    }

    #[test]
    fn test_forced_bars() {
        let config = ScrollViewerConfig {
            force_horizontal_bar: true,
            force_vertical_bar: true,
            ..Default::default()
        };
        let mut viewer = ScrollViewer::new(config);
        viewer.set_viewport_size(Vec2::new(200.0, 100.0));
        viewer.set_content_size(Vec2::new(10.0, 10.0));

        assert!(viewer.horizontal_bar().visible);
        assert!(viewer.vertical_bar().visible);
        assert_eq!(viewer.horizontal_bar().thumb_ratio, 0.5);
    }

    #[test]
    fn test_thumb_ratio() {
        let viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));
        // 100 / 400 of the content visible, scaled by thumb_length 0.5
        assert!(approx(viewer.vertical_bar().thumb_ratio, 0.125));

        let tall = viewer_with_content(Vec2::new(150.0, 1_000_000.0));
        assert!(approx(tall.vertical_bar().thumb_ratio, 0.05));
    }

    fn viewer_with_content(content: Vec2) -> ScrollViewer {
        viewer(Vec2::new(200.0, 100.0), content)
    }

    #[test]
    fn test_content_offset_follows_value() {
        let mut viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));
        viewer.set_vertical_value(0.5);
        assert_eq!(viewer.content_offset(), Vec2::new(0.0, -150.0));

        viewer.set_vertical_value(3.0);
        assert_eq!(viewer.vertical_bar().value, 1.0);
        assert_eq!(viewer.content_offset(), Vec2::new(0.0, -300.0));
    }

    #[test]
    fn test_wheel_steps_and_clamps() {
        let mut viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));

        assert!(!viewer.on_wheel(WheelEvent { delta_x: 0.0, delta_y: -1.0 }));
        assert!(viewer.on_wheel(WheelEvent { delta_x: 0.0, delta_y: 1.0 }));
        assert!(approx(viewer.vertical_bar().value, 0.05));

        // horizontal bar hidden, delta_x ignored
        assert!(!viewer.on_wheel(WheelEvent { delta_x: 1.0, delta_y: 0.0 }));

        viewer.set_vertical_value(0.98);
        assert!(viewer.on_wheel(WheelEvent { delta_x: 0.0, delta_y: 1.0 }));
        assert_eq!(viewer.vertical_bar().value, 1.0);
        assert!(!viewer.on_wheel(WheelEvent { delta_x: 0.0, delta_y: 1.0 }));
    }

    #[test]
    fn test_hidden_bar_resets_value() {
        let mut viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));
        viewer.set_vertical_value(0.7);

        viewer.set_content_size(Vec2::new(150.0, 50.0));
        assert!(!viewer.vertical_bar().visible);
        assert_eq!(viewer.vertical_bar().value, 0.0);
        assert_eq!(viewer.content_offset(), Vec2::ZERO);
    }

    #[test]
    fn test_on_scroll_fires_on_movement_only() {
        let mut viewer = viewer(Vec2::new(200.0, 100.0), Vec2::new(150.0, 400.0));
        let offsets = Arc::new(Mutex::new(Vec::new()));
        let o = offsets.clone();
        viewer.on_scroll.add(move |scroll| o.lock().push(scroll.offset));

        viewer.set_vertical_value(0.5);
        viewer.set_vertical_value(0.5);
        viewer.set_viewport_size(Vec2::new(200.0, 100.0));
        viewer.set_content_size(Vec2::new(150.0, 50.0));

        assert_eq!(*offsets.lock(), vec![Vec2::new(0.0, -150.0), Vec2::ZERO]);
    }
}
