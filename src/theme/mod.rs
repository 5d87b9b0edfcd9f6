//! Theme system for human-mode output.

use console::Style;

/// Visual theme for human-mode output.
///
/// Centralizes colors and styles for consistent rendering.
#[derive(Debug, Clone)]
pub struct BoothTheme {
    // Brand colors
    pub accent: Style,
    pub success: Style,
    pub error: Style,
    pub warning: Style,
    pub muted: Style,

    // Component styles
    pub header: Style,
    pub label: Style,
    pub value: Style,
    pub backend: Style,
    pub path: Style,
}

impl BoothTheme {
    /// Theme with every style enabled or disabled.
    #[must_use]
    pub fn new(color: bool) -> Self {
        let style = |s: Style| s.force_styling(color);
        Self {
            accent: style(Style::new().color256(33)),
            success: style(Style::new().color256(41)),
            error: style(Style::new().color256(203)),
            warning: style(Style::new().color256(214)),
            muted: style(Style::new().color256(244)),
            header: style(Style::new().bold().color256(33)),
            label: style(Style::new().dim()),
            value: style(Style::new().bold()),
            backend: style(Style::new().bold().color256(214)),
            path: style(Style::new().italic().color256(244)),
        }
    }
}

impl Default for BoothTheme {
    fn default() -> Self {
        Self::new(console::colors_enabled())
    }
}
