//! Bounding boxes drawn over the camera feed in spatial mode.

use crate::tools::HighlightTarget;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

/// Side length of the normalized grid the model reports positions on.
pub const GRID: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    pub id: Uuid,
    pub label: String,
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
    pub created_at: DateTime<Utc>,
}

impl Highlight {
    /// Derives the box `center ± render_scale / 2`, clamped to the grid.
    pub fn from_target(target: &HighlightTarget, now: DateTime<Utc>) -> Self {
        let radius = target.render_scale.abs() / 2.0;
        Self {
            id: Uuid::new_v4(),
            label: target.label.clone(),
            xmin: (target.center_x - radius).clamp(0.0, GRID),
            ymin: (target.center_y - radius).clamp(0.0, GRID),
            xmax: (target.center_x + radius).clamp(0.0, GRID),
            ymax: (target.center_y + radius).clamp(0.0, GRID),
            created_at: now,
        }
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// The box in pixel coordinates of a `width` x `height` frame, as `(x, y, w, h)`.
    pub fn to_pixels(&self, width: u32, height: u32) -> (f64, f64, f64, f64) {
        let sx = f64::from(width) / GRID;
        let sy = f64::from(height) / GRID;
        (
            self.xmin * sx,
            self.ymin * sy,
            self.width() * sx,
            self.height() * sy,
        )
    }

    fn age(&self, now: DateTime<Utc>) -> Duration {
        // Negative ages (clock skew) count as fresh.
        (now - self.created_at).to_std().unwrap_or_default()
    }
}

/// How long a highlight stays on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightLifetime {
    Always,
    For(Duration),
}

impl Default for HighlightLifetime {
    fn default() -> Self {
        Self::For(Duration::from_secs(3))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Highlights {
    active: Vec<Highlight>,
    #[serde(skip)]
    lifetime: HighlightLifetime,
}

impl Highlights {
    pub fn new(lifetime: HighlightLifetime) -> Self {
        Self {
            active: Vec::new(),
            lifetime,
        }
    }

    /// Adds one highlight per target and returns how many were added.
    pub fn extend(&mut self, targets: &[HighlightTarget], now: DateTime<Utc>) -> usize {
        self.active
            .extend(targets.iter().map(|t| Highlight::from_target(t, now)));
        targets.len()
    }

    /// Drops highlights older than the lifetime. Returns the number removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let HighlightLifetime::For(lifetime) = self.lifetime else {
            return 0;
        };
        let before = self.active.len();
        self.active.retain(|h| h.age(now) < lifetime);
        before - self.active.len()
    }

    pub fn active(&self) -> &[Highlight] {
        &self.active
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeDelta;

    fn target(x: f64, y: f64, scale: f64) -> HighlightTarget {
        HighlightTarget {
            label: "Cup".into(),
            center_x: x,
            center_y: y,
            render_scale: scale,
        }
    }

    #[test]
    fn test_box_is_centered_on_target() {
        let h = Highlight::from_target(&target(500.0, 500.0, 100.0), Utc::now());
        assert_relative_eq!(h.xmin, 450.0);
        assert_relative_eq!(h.ymin, 450.0);
        assert_relative_eq!(h.xmax, 550.0);
        assert_relative_eq!(h.ymax, 550.0);
    }

    #[test]
    fn test_box_is_clamped_to_grid() {
        let h = Highlight::from_target(&target(20.0, 990.0, 100.0), Utc::now());
        assert_relative_eq!(h.xmin, 0.0);
        assert_relative_eq!(h.xmax, 70.0);
        assert_relative_eq!(h.ymin, 940.0);
        assert_relative_eq!(h.ymax, 1000.0);
    }

    #[test]
    fn test_pixel_conversion() {
        let h = Highlight::from_target(&target(500.0, 500.0, 100.0), Utc::now());
        let (x, y, w, h) = h.to_pixels(1280, 720);
        assert_relative_eq!(x, 576.0);
        assert_relative_eq!(y, 324.0);
        assert_relative_eq!(w, 128.0);
        assert_relative_eq!(h, 72.0);
    }

    #[test]
    fn test_prune_after_lifetime() {
        let start = Utc::now();
        let mut highlights = Highlights::default();
        highlights.extend(&[target(100.0, 100.0, 10.0)], start);
        highlights.extend(&[target(200.0, 200.0, 10.0)], start + TimeDelta::seconds(2));

        assert_eq!(highlights.prune(start + TimeDelta::milliseconds(2999)), 0);
        assert_eq!(highlights.prune(start + TimeDelta::seconds(3)), 1);
        assert_eq!(highlights.active().len(), 1);
        assert_eq!(highlights.prune(start + TimeDelta::seconds(5)), 1);
        assert!(highlights.active().is_empty());
    }

    #[test]
    fn test_always_lifetime_never_prunes() {
        let start = Utc::now();
        let mut highlights = Highlights::new(HighlightLifetime::Always);
        highlights.extend(&[target(100.0, 100.0, 10.0)], start);
        assert_eq!(highlights.prune(start + TimeDelta::days(1)), 0);
        assert_eq!(highlights.active().len(), 1);
    }
}
