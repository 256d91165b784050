//! HTML to Markdown conversion for documentation pages.
//!
//! A DOM walk over scraper nodes rather than a generic converter: code
//! fences need the language carried by `highlight-<lang>` wrapper
//! containers and `language-<lang>` classes, API signature blocks
//! (`dl > dt.sig`, `div.autodoc-signature`) become fenced code, tables
//! become pipe tables, and link/image targets resolve absolute against
//! the page URL.

use scraper::node::Node;
use scraper::ElementRef;
use url::Url;

const INLINE_TAGS: [&str; 18] = [
    "a", "abbr", "b", "br", "code", "del", "em", "i", "img", "ins", "kbd", "mark", "s", "samp",
    "small", "span", "strong", "sub",
];

const SKIP_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Converts an isolated content region to Markdown.
#[must_use]
pub fn convert(region: ElementRef<'_>, page_url: &str) -> String {
    let mut emitter = Emitter {
        out: String::new(),
        base: Url::parse(page_url).ok(),
    };
    emitter.blocks(region);
    normalize(&emitter.out)
}

/// Collapses runs of blank lines and trims the result.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut blank_run = 0usize;
    for line in raw.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.trim().to_string()
}

struct Emitter {
    out: String,
    base: Option<Url>,
}

impl Emitter {
    /// Walks an element's children as block content, gathering runs of
    /// inline nodes into paragraphs.
    fn blocks(&mut self, el: ElementRef<'_>) {
        let mut inline_buf = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => inline_buf.push_str(&collapse_ws(&text.text)),
                Node::Element(_) => {
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let name = child_el.value().name();
                    if SKIP_TAGS.contains(&name) {
                        continue;
                    }
                    if INLINE_TAGS.contains(&name) {
                        inline_buf.push_str(&self.inline(child_el));
                    } else {
                        self.flush_para(&mut inline_buf);
                        self.block(child_el);
                    }
                }
                _ => {}
            }
        }
        self.flush_para(&mut inline_buf);
    }

    fn flush_para(&mut self, buf: &mut String) {
        let text = buf.trim();
        if !text.is_empty() {
            self.push_block(text.to_string());
        }
        buf.clear();
    }

    fn push_block(&mut self, text: String) {
        self.out.push_str(&text);
        self.out.push_str("\n\n");
    }

    fn block(&mut self, el: ElementRef<'_>) {
        let name = el.value().name();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let text = self.inline_content(el);
                let text = text.trim();
                if !text.is_empty() {
                    self.push_block(format!("{} {}", "#".repeat(level), text));
                }
            }
            "p" => {
                let text = self.inline_content(el);
                let text = text.trim();
                if !text.is_empty() {
                    self.push_block(text.to_string());
                }
            }
            "pre" => {
                self.fence(&pre_text(el), language_of(el).as_deref());
            }
            "blockquote" => {
                let mut inner = Emitter {
                    out: String::new(),
                    base: self.base.clone(),
                };
                inner.blocks(el);
                let quoted: String = normalize(&inner.out)
                    .lines()
                    .map(|line| format!("> {line}\n"))
                    .collect();
                if !quoted.is_empty() {
                    self.out.push_str(&quoted);
                    self.out.push('\n');
                }
            }
            "ul" => self.list(el, false, 0),
            "ol" => self.list(el, true, 0),
            "table" => self.table(el),
            "dl" => self.definition_list(el),
            "hr" => self.push_block("---".to_string()),
            _ => {
                if let Some(language) = highlight_language(el) {
                    // Sphinx-style wrapper: class `highlight-<lang>` with
                    // the actual code in a nested <pre>.
                    if let Some(pre) = descendant_named(el, "pre") {
                        self.fence(&pre_text(pre), Some(&language));
                        return;
                    }
                }
                if has_class(el, "autodoc-signature") {
                    self.fence(collapse_ws(&text_of(el)).trim(), Some("python"));
                    return;
                }
                self.blocks(el);
            }
        }
    }

    fn fence(&mut self, code: &str, language: Option<&str>) {
        let code = code.trim_matches('\n');
        if code.is_empty() {
            return;
        }
        self.out.push_str("```");
        if let Some(language) = language {
            self.out.push_str(language);
        }
        self.out.push('\n');
        self.out.push_str(code);
        self.out.push_str("\n```\n\n");
    }

    fn list(&mut self, el: ElementRef<'_>, ordered: bool, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut index = 0usize;
        for item in el.child_elements().filter(|c| c.value().name() == "li") {
            index += 1;
            let marker = if ordered {
                format!("{index}. ")
            } else {
                "- ".to_string()
            };
            let mut text = String::new();
            let mut nested: Vec<(ElementRef<'_>, bool)> = Vec::new();
            for child in item.children() {
                match child.value() {
                    Node::Text(t) => text.push_str(&collapse_ws(&t.text)),
                    Node::Element(_) => {
                        let Some(child_el) = ElementRef::wrap(child) else {
                            continue;
                        };
                        match child_el.value().name() {
                            "ul" => nested.push((child_el, false)),
                            "ol" => nested.push((child_el, true)),
                            name if INLINE_TAGS.contains(&name) => {
                                text.push_str(&self.inline(child_el));
                            }
                            _ => {
                                text.push(' ');
                                text.push_str(self.inline_content(child_el).trim());
                            }
                        }
                    }
                    _ => {}
                }
            }
            self.out
                .push_str(&format!("{indent}{marker}{}\n", text.trim()));
            for (nested_el, nested_ordered) in nested {
                self.list(nested_el, nested_ordered, depth + 1);
            }
        }
        if depth == 0 {
            self.out.push('\n');
        }
    }

    fn table(&mut self, el: ElementRef<'_>) {
        let row_selector = super::themes::selector("tr");
        let mut first = true;
        for row in el.select(&row_selector) {
            let cells: Vec<String> = row
                .child_elements()
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .map(|cell| self.inline_content(cell).trim().replace('|', "\\|"))
                .collect();
            if cells.is_empty() {
                continue;
            }
            self.out.push_str(&format!("| {} |\n", cells.join(" | ")));
            if first {
                self.out
                    .push_str(&format!("|{}\n", " --- |".repeat(cells.len())));
                first = false;
            }
        }
        if !first {
            self.out.push('\n');
        }
    }

    fn definition_list(&mut self, el: ElementRef<'_>) {
        let is_signature_list = el
            .child_elements()
            .any(|c| c.value().name() == "dt" && has_class_starting(c, "sig"));
        for child in el.child_elements() {
            match child.value().name() {
                "dt" if is_signature_list => {
                    let signature = signature_text(child);
                    if !signature.is_empty() {
                        self.fence(&signature, signature_language(child).as_deref());
                    }
                }
                "dt" => {
                    let text = self.inline_content(child);
                    let text = text.trim();
                    if !text.is_empty() {
                        self.push_block(format!("**{text}**"));
                    }
                }
                "dd" => self.blocks(child),
                _ => {}
            }
        }
    }

    /// Concatenates all children rendered inline.
    fn inline_content(&self, el: ElementRef<'_>) -> String {
        let mut out = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(t) => out.push_str(&collapse_ws(&t.text)),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        if !SKIP_TAGS.contains(&child_el.value().name()) {
                            out.push_str(&self.inline(child_el));
                        }
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn inline(&self, el: ElementRef<'_>) -> String {
        match el.value().name() {
            "code" | "kbd" | "samp" => {
                let text = collapse_ws(&text_of(el));
                let text = text.trim().to_string();
                if text.is_empty() {
                    String::new()
                } else {
                    format!("`{text}`")
                }
            }
            "a" => {
                // Sphinx paragraph anchors add noise, never content.
                if has_class(el, "headerlink") {
                    return String::new();
                }
                let inner = self.inline_content(el);
                match el.value().attr("href") {
                    Some(href) if !inner.trim().is_empty() => {
                        format!("[{}]({})", inner.trim(), self.absolutize(href))
                    }
                    _ => inner,
                }
            }
            "em" | "i" => wrap_emphasis(&self.inline_content(el), "*"),
            "strong" | "b" => wrap_emphasis(&self.inline_content(el), "**"),
            "img" => {
                let alt = el.value().attr("alt").unwrap_or("");
                match el.value().attr("src") {
                    Some(src) => format!("![{alt}]({})", self.absolutize(src)),
                    None => String::new(),
                }
            }
            "br" => "\n".to_string(),
            _ => self.inline_content(el),
        }
    }

    /// Resolves a link target against the page URL. Pure fragments stay
    /// as-is so intra-page anchors keep working.
    fn absolutize(&self, target: &str) -> String {
        if target.starts_with('#') {
            return target.to_string();
        }
        match &self.base {
            Some(base) => base
                .join(target)
                .map_or_else(|_| target.to_string(), |joined| joined.to_string()),
            None => target.to_string(),
        }
    }
}

fn wrap_emphasis(inner: &str, marker: &str) -> String {
    let inner = inner.trim();
    if inner.is_empty() {
        String::new()
    } else {
        format!("{marker}{inner}{marker}")
    }
}

/// Collapses whitespace runs while keeping boundary spacing.
fn collapse_ws(s: &str) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return if s.is_empty() { String::new() } else { " ".to_string() };
    }
    let mut out = String::new();
    if s.starts_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if s.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out
}

/// Raw text of a node subtree, preserving source newlines.
fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect()
}

/// Text of a `<pre>` block with trailing fence-hostile newlines trimmed.
fn pre_text(el: ElementRef<'_>) -> String {
    text_of(el).trim_matches('\n').to_string()
}

fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

fn has_class_starting(el: ElementRef<'_>, prefix: &str) -> bool {
    el.value().classes().any(|c| c.starts_with(prefix))
}

/// Language from a Sphinx `highlight-<lang>` wrapper class.
fn highlight_language(el: ElementRef<'_>) -> Option<String> {
    el.value()
        .classes()
        .find_map(|c| c.strip_prefix("highlight-"))
        .map(str::to_string)
}

/// Language for a bare `<pre>`: a `language-<lang>` class on the pre or
/// its code child, or a `highlight-<lang>` ancestor wrapper.
fn language_of(el: ElementRef<'_>) -> Option<String> {
    let from_classes = |candidate: ElementRef<'_>| {
        candidate
            .value()
            .classes()
            .find_map(|c| c.strip_prefix("language-"))
            .map(str::to_string)
    };
    if let Some(language) = from_classes(el) {
        return Some(language);
    }
    if let Some(code) = descendant_named(el, "code") {
        if let Some(language) = from_classes(code) {
            return Some(language);
        }
    }
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|ancestor| highlight_language(ancestor))
}

fn descendant_named<'a>(el: ElementRef<'a>, name: &str) -> Option<ElementRef<'a>> {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .find(|d| d.value().name() == name)
}

/// Signature text of a `dt.sig`, with the trailing anchor glyph removed.
fn signature_text(dt: ElementRef<'_>) -> String {
    let text = collapse_ws(&text_of(dt));
    text.trim().trim_end_matches('¶').trim().to_string()
}

/// Maps a signature's domain class (`sig sig-object py`) to a fence
/// language hint.
fn signature_language(dt: ElementRef<'_>) -> Option<String> {
    dt.value()
        .classes()
        .find(|c| !c.starts_with("sig"))
        .map(|domain| match domain {
            "py" => "python".to_string(),
            "js" => "javascript".to_string(),
            "cpp" => "cpp".to_string(),
            "c" => "c".to_string(),
            "rs" | "rust" => "rust".to_string(),
            other => other.to_string(),
        })
}
