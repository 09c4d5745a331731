//! Launcher visibility and modal state
//!
//! The launcher button only appears once the visitor has scrolled past a
//! route-dependent threshold, and never on denylisted routes. Opening the
//! modal hides the launcher until the modal is closed or minimized.

use serde::Serialize;

use crate::config::VisibilityConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityState {
    Hidden,
    VisibleCollapsed,
    Open,
}

#[derive(Debug, Clone)]
pub struct VisibilityController {
    config: VisibilityConfig,
    path: String,
    scroll_offset: f64,
    state: VisibilityState,
}

impl VisibilityController {
    pub fn new(config: VisibilityConfig) -> Self {
        let path = config.landing_route.clone();
        let mut controller = Self {
            config,
            path,
            scroll_offset: 0.0,
            state: VisibilityState::Hidden,
        };
        controller.state = controller.gated_state();
        controller
    }

    pub fn state(&self) -> VisibilityState {
        self.state
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn launcher_visible(&self) -> bool {
        self.state == VisibilityState::VisibleCollapsed
    }

    pub fn is_open(&self) -> bool {
        self.state == VisibilityState::Open
    }

    /// Route change. A denylisted route hides everything, modal included.
    pub fn navigate(&mut self, path: &str) -> VisibilityState {
        self.path = normalize_path(path).to_string();
        self.reevaluate();
        self.state
    }

    /// Scroll position change.
    pub fn scroll_to(&mut self, offset: f64) -> VisibilityState {
        self.scroll_offset = if offset.is_finite() { offset.max(0.0) } else { 0.0 };
        self.reevaluate();
        self.state
    }

    /// Launcher click.
    pub fn open(&mut self) -> VisibilityState {
        if self.state == VisibilityState::VisibleCollapsed {
            self.state = VisibilityState::Open;
        }
        self.state
    }

    /// Close button, backdrop click or escape key.
    pub fn close(&mut self) -> VisibilityState {
        if self.state == VisibilityState::Open {
            self.state = VisibilityState::VisibleCollapsed;
        }
        self.state
    }

    pub fn minimize(&mut self) -> VisibilityState {
        self.close()
    }

    /// Scroll offset the launcher must exceed on the current route.
    pub fn threshold(&self) -> f64 {
        if self.path == self.config.landing_route {
            self.config.landing_threshold
        } else {
            self.config.default_threshold
        }
    }

    pub fn route_hidden(&self) -> bool {
        self.config
            .hidden_prefixes
            .iter()
            .any(|prefix| self.path.starts_with(prefix.as_str()))
    }

    fn reevaluate(&mut self) {
        if self.route_hidden() {
            if self.state == VisibilityState::Open {
                tracing::debug!("Closing chat modal on hidden route {}", self.path);
            }
            self.state = VisibilityState::Hidden;
            return;
        }

        if self.state != VisibilityState::Open {
            self.state = self.gated_state();
        }
    }

    fn gated_state(&self) -> VisibilityState {
        if self.route_hidden() || self.scroll_offset <= self.threshold() {
            VisibilityState::Hidden
        } else {
            VisibilityState::VisibleCollapsed
        }
    }
}

/// Drop query string and fragment.
fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> VisibilityController {
        VisibilityController::new(VisibilityConfig::default())
    }

    #[test]
    fn test_starts_hidden() {
        assert_eq!(controller().state(), VisibilityState::Hidden);
    }

    #[test]
    fn test_landing_scroll_gate() {
        let mut c = controller();

        assert_eq!(c.scroll_to(300.0), VisibilityState::Hidden);
        assert_eq!(c.scroll_to(600.0), VisibilityState::Hidden);
        assert_eq!(c.scroll_to(601.0), VisibilityState::VisibleCollapsed);
        assert!(c.launcher_visible());

        assert_eq!(c.scroll_to(100.0), VisibilityState::Hidden);
    }

    #[test]
    fn test_other_routes_show_after_any_scroll() {
        let mut c = controller();
        c.navigate("/projects/compiler");

        assert_eq!(c.scroll_to(0.0), VisibilityState::Hidden);
        assert_eq!(c.scroll_to(40.0), VisibilityState::VisibleCollapsed);
    }

    #[test]
    fn test_denylisted_route_ignores_scroll() {
        let mut c = controller();
        c.scroll_to(5_000.0);
        assert!(c.launcher_visible());

        assert_eq!(c.navigate("/docs/internal/architecture"), VisibilityState::Hidden);
        assert_eq!(c.scroll_to(10_000.0), VisibilityState::Hidden);

        assert_eq!(c.navigate("/about"), VisibilityState::VisibleCollapsed);
    }

    #[test]
    fn test_open_close_cycle() {
        let mut c = controller();

        // Launcher not shown yet: nothing to click.
        assert_eq!(c.open(), VisibilityState::Hidden);

        c.scroll_to(700.0);
        assert_eq!(c.open(), VisibilityState::Open);
        assert!(!c.launcher_visible());

        // Scrolling while open keeps the modal.
        assert_eq!(c.scroll_to(0.0), VisibilityState::Open);

        assert_eq!(c.close(), VisibilityState::VisibleCollapsed);
        assert_eq!(c.scroll_to(0.0), VisibilityState::Hidden);

        c.scroll_to(700.0);
        c.open();
        assert_eq!(c.minimize(), VisibilityState::VisibleCollapsed);
    }

    #[test]
    fn test_hidden_route_closes_modal() {
        let mut c = controller();
        c.scroll_to(700.0);
        c.open();

        assert_eq!(c.navigate("/admin"), VisibilityState::Hidden);
        assert_eq!(c.close(), VisibilityState::Hidden);
    }

    #[test]
    fn test_query_and_fragment_ignored() {
        let mut c = controller();
        c.navigate("/?ref=home#top");
        assert_eq!(c.path(), "/");
        assert_eq!(c.threshold(), 600.0);

        c.navigate("");
        assert_eq!(c.path(), "/");
    }
}
