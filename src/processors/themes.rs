//! Theme tables and theme detection for structure extraction.
//!
//! Each profile names the selectors that identify a theme, the selectors
//! that isolate its primary content region (tried in order), and the
//! chrome selectors stripped before conversion.

use scraper::{Html, Selector};

/// Selector table for one documentation theme.
#[derive(Debug, Clone, Copy)]
pub struct ThemeProfile {
    pub name: &'static str,
    /// Presence of any of these identifies the theme.
    pub markers: &'static [&'static str],
    /// Main content region candidates, in order.
    pub main_selectors: &'static [&'static str],
    /// Theme chrome removed from the region.
    pub strip_selectors: &'static [&'static str],
}

/// Sphinx theme profiles, most distinctive markers first.
pub const SPHINX_THEMES: [ThemeProfile; 4] = [
    ThemeProfile {
        name: "furo",
        markers: &["#furo-main-content", "aside.sidebar-drawer"],
        main_selectors: &["article[role=main] section", "div.content section", "section"],
        strip_selectors: &[],
    },
    ThemeProfile {
        name: "sphinx_rtd",
        markers: &["nav.wy-nav-side", "section.wy-nav-content-wrap"],
        main_selectors: &["section.wy-nav-content-wrap section", "section"],
        strip_selectors: &["nav.wy-nav-side", "nav.wy-nav-top"],
    },
    ThemeProfile {
        name: "pydata",
        markers: &["main.bd-main", "article.bd-article"],
        main_selectors: &["main.bd-main", "article.bd-article", "section"],
        strip_selectors: &["nav.bd-docs-nav", "nav.d-print-none"],
    },
    ThemeProfile {
        name: "default",
        markers: &["div.sphinxsidebar", "div.body[role=main]"],
        main_selectors: &["div.body[role=main]", "section"],
        strip_selectors: &["div.sphinxsidebar", "div.related"],
    },
];

/// MkDocs theme profiles.
pub const MKDOCS_THEMES: [ThemeProfile; 3] = [
    ThemeProfile {
        name: "material",
        markers: &["article.md-content__inner", "nav.md-nav"],
        main_selectors: &["article.md-content__inner"],
        strip_selectors: &["nav.md-nav", "div.md-sidebar", "nav.md-header__inner"],
    },
    ThemeProfile {
        name: "readthedocs",
        markers: &["div.navbar", "div.col-md-9[role=main]"],
        main_selectors: &["div.col-md-9[role=main]"],
        strip_selectors: &["div.navbar"],
    },
    ThemeProfile {
        name: "default",
        markers: &[],
        main_selectors: &["div.col-md-9[role=main]"],
        strip_selectors: &["div.navbar"],
    },
];

/// Fallback main-region chain when no theme is identified.
pub const FALLBACK_MAIN: [&str; 5] = ["main", "article", "[role=main]", ".md-content", ".container"];

/// Last-resort region before giving up and taking `<body>`.
pub const FALLBACK_SECTION: &str = "section";

/// Chrome stripped on the fallback path.
pub const FALLBACK_STRIP: [&str; 5] = [
    "nav",
    "footer",
    "aside",
    "[class*=sidebar]",
    "[class*=toc]",
];

/// Parses a selector known valid at compile time.
#[must_use]
pub fn selector(source: &str) -> Selector {
    Selector::parse(source).expect("static selector table entry must parse")
}

/// Returns the first profile whose markers appear in the document.
#[must_use]
pub fn detect_theme<'a>(document: &Html, profiles: &'a [ThemeProfile]) -> Option<&'a ThemeProfile> {
    profiles.iter().find(|profile| {
        profile
            .markers
            .iter()
            .any(|marker| document.select(&selector(marker)).next().is_some())
    })
}
