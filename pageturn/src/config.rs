use facet::Facet;

/// Session options, as supplied by the page.
///
/// Deserialized from camelCase JSON; every missing field keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[facet(default, rename_all = "camelCase")]
pub struct Config {
    /// Handle links and forms that carry no `data-pageturn` directive
    pub default_navigate: bool,

    /// Prefetch links that carry no `data-pageturn-prefetch` directive
    pub default_prefetch: bool,

    /// Milliseconds before the loading class goes on `<body>`
    pub navigate_timeout: u32,

    /// Hover delay before a prefetch hint is inserted
    pub prefetch_timeout: u32,

    /// Milliseconds during which a finished prefetch is not repeated
    pub prefetch_cooldown: u32,

    /// Scroll to the top after a forward navigation
    pub reset_scroll: bool,

    /// Restore the saved scroll position on back/forward
    pub restore_scroll: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_navigate: true,
            default_prefetch: true,
            navigate_timeout: 300,
            prefetch_timeout: 50,
            prefetch_cooldown: 5000,
            reset_scroll: true,
            restore_scroll: true,
        }
    }
}
