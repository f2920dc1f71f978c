//! Play-Area Bounds
//!
//! Pets move inside a play area carved out of the viewport: the bottom edge
//! sits on top of the terminal and status panels, the left edge optionally
//! avoids the sidebar. Positions are expressed as offsets from the play
//! area's bottom-left corner, so the motion engine never sees raw viewport
//! coordinates.
//!
//! Layout updates arrive as a stream of metrics and are debounced before
//! pets are re-clamped.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{watch, Notify};

/// Quiet period required before a layout change is applied.
pub const LAYOUT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Panel overlap allowance: pets may sink this many pixels into the bottom
/// panels so their feet touch the panel border.
const PANEL_OVERLAP: f64 = 5.0;

/// Raw panel geometry reported by the embedding shell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutMetrics {
    /// Viewport width in pixels.
    pub viewport_width: f64,
    /// Viewport height in pixels.
    pub viewport_height: f64,
    /// Width of the left sidebar.
    pub sidebar_width: f64,
    /// Height of the terminal panel at the bottom.
    pub terminal_height: f64,
    /// Height of the status bar at the bottom.
    pub status_height: f64,
    /// Whether pets must stay clear of the sidebar.
    pub avoid_sidebar: bool,
}

impl LayoutMetrics {
    /// A full-viewport layout with no panels, used before the first report.
    #[must_use]
    pub fn unobstructed(width: f64, height: f64) -> Self {
        Self {
            viewport_width: width,
            viewport_height: height,
            sidebar_width: 0.0,
            terminal_height: 0.0,
            status_height: 0.0,
            avoid_sidebar: false,
        }
    }
}

/// The rectangle a pet of a given size may occupy, in viewport coordinates,
/// plus the derived position-space spans.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlayArea {
    /// Leftmost allowed left edge.
    pub min_left: f64,
    /// Rightmost allowed right edge.
    pub max_right: f64,
    /// Lowest allowed bottom edge (distance from viewport bottom).
    pub min_bottom: f64,
    /// Highest allowed bottom edge.
    pub max_bottom: f64,
}

impl PlayArea {
    /// Compute the play area for a pet of the given height.
    #[must_use]
    pub fn for_pet(metrics: &LayoutMetrics, pet_height: f64) -> Self {
        let min_left = if metrics.avoid_sidebar {
            metrics.sidebar_width
        } else {
            0.0
        };
        let min_bottom =
            (metrics.terminal_height + metrics.status_height - PANEL_OVERLAP).max(0.0);
        let max_bottom = (metrics.viewport_height - pet_height).max(min_bottom);
        let max_right = metrics.viewport_width.max(min_left);
        Self {
            min_left,
            max_right,
            min_bottom,
            max_bottom,
        }
    }

    /// Horizontal span available to a pet of the given width, in position
    /// space (offsets from the bottom-left corner).
    #[must_use]
    pub fn span_x(&self, pet_width: f64) -> f64 {
        (self.max_right - self.min_left - pet_width).max(0.0)
    }

    /// Vertical span available, in position space.
    #[must_use]
    pub fn span_y(&self) -> f64 {
        self.max_bottom - self.min_bottom
    }

    /// Clamp a position-space point for a pet of the given width.
    ///
    /// Returns the clamped point and whether either axis was out of bounds.
    /// Clamping is idempotent: re-clamping a clamped point is a no-op.
    #[must_use]
    pub fn clamp(&self, x: f64, y: f64, pet_width: f64) -> (f64, f64, bool) {
        let cx = x.clamp(0.0, self.span_x(pet_width));
        let cy = y.clamp(0.0, self.span_y());
        (cx, cy, cx != x || cy != y)
    }
}

/// Apply debounced layout updates to the shared metrics and wake pets for
/// re-clamping. `None` reports are logged and skipped.
pub async fn watch_layout(
    mut updates: watch::Receiver<Option<LayoutMetrics>>,
    current: Arc<RwLock<LayoutMetrics>>,
    reposition: Arc<Notify>,
) {
    while updates.changed().await.is_ok() {
        // Absorb the burst: restart the quiet period on every further update.
        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(LAYOUT_DEBOUNCE) => break,
            }
        }
        match *updates.borrow_and_update() {
            // An unchanged re-read is a no-op: nothing moved, nobody wakes.
            Some(metrics) if metrics == *current.read() => {}
            Some(metrics) => {
                *current.write() = metrics;
                tracing::debug!(
                    width = metrics.viewport_width,
                    height = metrics.viewport_height,
                    "layout applied"
                );
                reposition.notify_waiters();
            }
            None => tracing::warn!("layout update carried no metrics, skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn metrics() -> LayoutMetrics {
        LayoutMetrics {
            viewport_width: 1280.0,
            viewport_height: 800.0,
            sidebar_width: 250.0,
            terminal_height: 200.0,
            status_height: 22.0,
            avoid_sidebar: true,
        }
    }

    #[test]
    fn test_play_area_panels() {
        let area = PlayArea::for_pet(&metrics(), 40.0);
        assert_eq!(area.min_left, 250.0);
        assert_eq!(area.max_right, 1280.0);
        // 200 + 22 - 5
        assert_eq!(area.min_bottom, 217.0);
        assert_eq!(area.max_bottom, 760.0);
    }

    #[test]
    fn test_min_bottom_never_negative() {
        let mut m = metrics();
        m.terminal_height = 0.0;
        m.status_height = 2.0;
        let area = PlayArea::for_pet(&m, 40.0);
        assert_eq!(area.min_bottom, 0.0);
    }

    #[test]
    fn test_degenerate_viewport_keeps_ordering() {
        let mut m = metrics();
        m.viewport_height = 100.0;
        let area = PlayArea::for_pet(&m, 40.0);
        // min_bottom (217) exceeds viewport - height (60); max_bottom folds up.
        assert_eq!(area.max_bottom, area.min_bottom);
        assert_eq!(area.span_y(), 0.0);
    }

    #[test]
    fn test_clamp_idempotent() {
        let area = PlayArea::for_pet(&metrics(), 40.0);
        let (x, y, violated) = area.clamp(-50.0, 9999.0, 40.0);
        assert!(violated);
        let (x2, y2, violated2) = area.clamp(x, y, 40.0);
        assert!(!violated2);
        assert_eq!((x, y), (x2, y2));
    }

    #[test]
    fn test_clamp_in_bounds_untouched() {
        let area = PlayArea::for_pet(&metrics(), 40.0);
        let (x, y, violated) = area.clamp(100.0, 50.0, 40.0);
        assert_eq!((x, y), (100.0, 50.0));
        assert!(!violated);
    }

    #[tokio::test]
    async fn test_watch_layout_debounces_burst() {
        tokio::time::pause();
        let (tx, rx) = watch::channel(None);
        let current = Arc::new(RwLock::new(LayoutMetrics::unobstructed(100.0, 100.0)));
        let reposition = Arc::new(Notify::new());
        let task = tokio::spawn(watch_layout(rx, Arc::clone(&current), Arc::clone(&reposition)));

        let notified = reposition.notified();
        tokio::pin!(notified);

        // The 10ms gaps keep restarting the quiet period; only the last
        // value of the burst is ever applied.
        let mut burst = metrics();
        for width in [300.0, 400.0, 500.0] {
            burst.viewport_width = width;
            tx.send(Some(burst)).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::timeout(Duration::from_secs(5), notified.as_mut())
            .await
            .expect("debounced layout never applied");

        assert_eq!(current.read().viewport_width, 500.0);
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_layout_ignores_unchanged_metrics() {
        tokio::time::pause();
        let m = metrics();
        let (tx, rx) = watch::channel(Some(m));
        let current = Arc::new(RwLock::new(m));
        let reposition = Arc::new(Notify::new());
        let task = tokio::spawn(watch_layout(rx, Arc::clone(&current), Arc::clone(&reposition)));

        let notified = reposition.notified();
        tokio::pin!(notified);
        tx.send(Some(m)).unwrap();
        assert!(
            tokio::time::timeout(Duration::from_secs(1), notified.as_mut())
                .await
                .is_err(),
            "an unchanged layout must not wake pets"
        );

        assert_eq!(*current.read(), m);
        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_watch_layout_skips_missing_metrics() {
        tokio::time::pause();
        let (tx, rx) = watch::channel(Some(metrics()));
        let initial = LayoutMetrics::unobstructed(100.0, 100.0);
        let current = Arc::new(RwLock::new(initial));
        let reposition = Arc::new(Notify::new());
        let task = tokio::spawn(watch_layout(rx, Arc::clone(&current), reposition));

        tx.send(None).unwrap();
        // Drive the watcher to completion before looking: closing the sender
        // ends it after the pending update has been examined.
        drop(tx);
        task.await.unwrap();

        assert_eq!(*current.read(), initial);
    }
}
