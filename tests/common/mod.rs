//! Common test utilities for librovore integration tests.
//!
//! Provides `StubFetcher` (an in-memory `Fetcher` with a route table and
//! a fetch log) plus fixture builders for synthetic Sphinx and MkDocs
//! sites.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use async_trait::async_trait;
use librovore::error::{Error, Result};
use librovore::http::{Fetched, Fetcher};
use librovore::processors::build_objects_inv;
use librovore::{Config, Core};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

enum Route {
    Body { bytes: Vec<u8>, final_url: Option<String> },
    Status(u16),
}

/// In-memory fetcher: exact-URL route table plus a log of every fetch.
///
/// The log counts network I/O the engine performed; the stub itself never
/// caches, so a zero-fetch assertion proves an engine-level cache hit.
pub struct StubFetcher {
    routes: Mutex<HashMap<String, Route>>,
    log: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            routes: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn route(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(
            url.into(),
            Route::Body {
                bytes: body.into(),
                final_url: None,
            },
        );
    }

    /// A route whose response reports a different final URL (an HTTP
    /// redirect followed by the client).
    pub fn route_redirected(
        &self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) {
        self.routes.lock().unwrap().insert(
            url.into(),
            Route::Body {
                bytes: body.into(),
                final_url: Some(final_url.into()),
            },
        );
    }

    pub fn route_status(&self, url: impl Into<String>, status: u16) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.into(), Route::Status(status));
    }

    pub fn fetch_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _ttl: Duration) -> Result<Fetched> {
        self.log.lock().unwrap().push(url.to_string());
        let routes = self.routes.lock().unwrap();
        match routes.get(url) {
            Some(Route::Body { bytes, final_url }) => Ok(Fetched {
                bytes: bytes.clone(),
                final_url: final_url.clone().unwrap_or_else(|| url.to_string()),
                headers: HashMap::new(),
            }),
            Some(Route::Status(status)) => Err(Error::ContentInaccessibility {
                reference: url.to_string(),
                cause: format!("HTTP {status} {}", reason(*status)),
            }),
            None => Err(Error::ContentInaccessibility {
                reference: url.to_string(),
                cause: "HTTP 404 Not Found".to_string(),
            }),
        }
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// A core over the stub fetcher with default configuration.
pub fn core_with(fetcher: &Arc<StubFetcher>) -> Core {
    core_with_config(fetcher, Config::default())
}

pub fn core_with_config(fetcher: &Arc<StubFetcher>, config: Config) -> Core {
    Core::with_fetcher(config, Arc::clone(fetcher) as Arc<dyn Fetcher>)
}

// ─── Sphinx fixtures ─────────────────────────────────────────────────────────

/// Inventory records shared by the Sphinx fixtures.
pub const SPHINX_RECORDS: &str = "\
foo py:function 1 api/foo.html#foo -
Bar py:class 1 api/bar.html#Bar -
pkg.client.Client py:class 1 api/client.html#pkg.client.Client -
pkg.client.connect py:function 1 api/client.html#pkg.client.connect -
request py:function 1 api/http.html#request -
requests py:module 0 api/http.html#module-requests -
RequestError py:exception 1 api/http.html#RequestError -
guide std:doc 0 guide/index.html The User Guide
setup py:function 1 api/setup.html#setup -
teardown py:function 1 api/setup.html#teardown -
";

/// A furo-themed Sphinx page.
pub fn sphinx_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head>
<meta charset="utf-8"/>
<meta name="generator" content="Sphinx 7.2.6"/>
<title>{title}</title>
</head><body>
<aside class="sidebar-drawer"><div class="sidebar-tree">navigation links</div></aside>
<article role="main" id="furo-main-content">
<section id="{title}">
<h1>{title}<a class="headerlink" href="#{title}">¶</a></h1>
{body}
</section>
</article>
</body></html>"#
    )
}

/// Routes a complete Sphinx site (inventory + index + API pages) at `base`.
///
/// `base` must not end with a slash.
pub fn seed_sphinx_site(fetcher: &StubFetcher, base: &str) {
    fetcher.route(
        format!("{base}/objects.inv"),
        build_objects_inv("demo", "1.0", SPHINX_RECORDS),
    );
    fetcher.route(base, sphinx_page("demo", "<p>Welcome to demo.</p>"));
    fetcher.route(
        format!("{base}/api/foo.html"),
        sphinx_page(
            "foo",
            r#"<dl class="py function">
<dt class="sig sig-object py" id="foo">foo(value, *, retries=3)</dt>
<dd><p>Frobnicates the value with bounded retries.</p>
<div class="highlight-python notranslate"><div class="highlight"><pre>from demo import foo
foo(42)</pre></div></div></dd>
</dl>"#,
        ),
    );
    fetcher.route(
        format!("{base}/api/bar.html"),
        sphinx_page("Bar", "<p>A bar that holds foos.</p>"),
    );
    fetcher.route(
        format!("{base}/api/client.html"),
        sphinx_page(
            "client",
            "<p>Client connection handling.</p>\
             <p>Use <code>connect()</code> to open a session.</p>",
        ),
    );
    fetcher.route(
        format!("{base}/api/http.html"),
        sphinx_page("http", "<p>HTTP request helpers.</p>"),
    );
    fetcher.route(
        format!("{base}/api/setup.html"),
        sphinx_page("setup", "<p>Fixture setup and teardown.</p>"),
    );
    fetcher.route(
        format!("{base}/guide/index.html"),
        sphinx_page("guide", "<p>Start here.</p>"),
    );
}

// ─── MkDocs fixtures ─────────────────────────────────────────────────────────

/// A Material-themed MkDocs page.
pub fn mkdocs_page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head>
<meta charset="utf-8"/>
<meta name="generator" content="mkdocs-1.5.3, mkdocs-material-9.5.0"/>
<title>{title}</title>
</head><body>
<nav class="md-nav"><ul><li>nav entry</li></ul></nav>
<div class="md-sidebar">sidebar</div>
<article class="md-content__inner md-typeset">
<h1>{title}</h1>
{body}
</article>
</body></html>"#
    )
}

/// The search index body used by the MkDocs fixtures.
pub fn mkdocs_index_json() -> String {
    let docs: Vec<serde_json::Value> = [
        ("", "Home", "Welcome to the project."),
        ("api/", "API", "API reference for the project."),
        ("guide/", "Guide", "A walk through the basics."),
        ("install/", "Installation", "How to install."),
        ("faq/", "FAQ", "Frequent questions."),
        ("changelog/", "Changelog", "Release history."),
        ("auth/", "Authentication", "Configuring credentials."),
        ("errors/", "Errors", "Error taxonomy."),
        ("cli/", "CLI", "Command line usage."),
        ("plugins/", "Plugins", "Extending the system."),
    ]
    .into_iter()
    .map(|(location, title, text)| {
        serde_json::json!({"location": location, "title": title, "text": text})
    })
    .collect();
    serde_json::json!({ "docs": docs, "config": {"lang": ["en"]} }).to_string()
}

/// Routes a complete MkDocs site at `base` (no trailing slash).
pub fn seed_mkdocs_site(fetcher: &StubFetcher, base: &str) {
    fetcher.route(format!("{base}/search/search_index.json"), mkdocs_index_json());
    fetcher.route(base, mkdocs_page("Home", "<p>Welcome to the project.</p>"));
    fetcher.route(
        format!("{base}/api/"),
        mkdocs_page(
            "API",
            r#"<p>API reference.</p>
<div class="autodoc"><div class="autodoc-signature">frob(value: int) -&gt; str</div>
<p>Turns a value into a string.</p></div>
<pre><code class="language-json">{"key": "value"}</code></pre>"#,
        ),
    );
    fetcher.route(
        format!("{base}/guide/"),
        mkdocs_page("Guide", "<p>A walk through the basics.</p>"),
    );
}
