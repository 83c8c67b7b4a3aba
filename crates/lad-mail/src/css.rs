//! CSS inlining
//!
//! Moves rules from `<style>` blocks and local `<link rel="stylesheet">`
//! files into `style` attributes, the way mail clients expect them.
//!
//! Supported selectors are compound selectors of a type, an id and classes
//! (`p`, `.btn`, `#header`, `a.btn.primary`, `*`). Rules with other
//! selectors and all `@` rules are kept in a `<style>` block.
//!
//! Cascade: specificity (id > class > type), then source order. Inline
//! declarations already on the element win over stylesheet ones unless the
//! stylesheet declaration is `!important` and the inline one is not.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use tracing::debug;

use crate::transport::Transform;
use crate::{MailError, MailResult};

/// Tags whose attributes are never rewritten
const SKIPPED_TAGS: &[&str] = &["html", "head", "title", "meta", "link", "style", "script", "base"];

fn style_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style\s*>").expect("style pattern is valid"))
}

fn link_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<link\b[^>]*>").expect("link pattern is valid"))
}

fn open_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([A-Za-z][A-Za-z0-9-]*)((?:\s[^<>]*?)?)(/?)>").expect("tag pattern is valid")
    })
}

fn attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("attribute pattern is valid")
    })
}

fn style_attribute() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\s+style\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+)"#).expect("style attr pattern is valid")
    })
}

fn comment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("comment pattern is valid"))
}

/// One `property: value` pair
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub property: String,
    pub value: String,
    pub important: bool,
}

impl Declaration {
    fn render(&self, preserve_important: bool) -> String {
        let value = self.value.replace('"', "'");
        if self.important && preserve_important {
            format!("{}: {} !important", self.property, value)
        } else {
            format!("{}: {}", self.property, value)
        }
    }
}

/// Compound selector: optional type, optional id, classes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Selector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

impl Selector {
    /// Parse a compound selector; `None` for anything with combinators,
    /// pseudo-classes or attribute matchers.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty()
            || text
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '>' | '+' | '~' | ':' | '[' | ']' | '(' | ')' | ','))
        {
            return None;
        }

        let mut selector = Selector::default();
        let mut rest = text;

        if let Some(stripped) = rest.strip_prefix('*') {
            rest = stripped;
        } else {
            let end = rest.find(['.', '#']).unwrap_or(rest.len());
            if end > 0 {
                selector.tag = Some(rest[..end].to_ascii_lowercase());
            }
            rest = &rest[end..];
        }

        while !rest.is_empty() {
            let marker = rest.chars().next()?;
            let body = &rest[1..];
            let end = body.find(['.', '#', '*']).unwrap_or(body.len());
            let name = &body[..end];
            if name.is_empty() {
                return None;
            }
            match marker {
                '.' => selector.classes.push(name.to_string()),
                '#' if selector.id.is_none() => selector.id = Some(name.to_string()),
                _ => return None,
            }
            rest = &body[end..];
        }

        Some(selector)
    }

    /// (ids, classes, types) packed into one comparable number
    pub fn specificity(&self) -> u32 {
        let ids = u32::from(self.id.is_some());
        let classes = self.classes.len() as u32;
        let types = u32::from(self.tag.is_some());
        ids * 10_000 + classes * 100 + types
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if tag != &element.tag {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.id.as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        self.classes.iter().all(|c| element.classes.iter().any(|e| e == c))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    order: usize,
    declarations: Vec<Declaration>,
}

/// Parsed stylesheet: inlinable rules plus everything kept as CSS text
#[derive(Debug, Default)]
struct Stylesheet {
    rules: Vec<Rule>,
    retained: Vec<String>,
}

impl Stylesheet {
    fn parse(css: &str) -> Self {
        let css = comment().replace_all(css, "");
        let mut sheet = Stylesheet::default();
        let mut order = 0;
        let mut rest: &str = &css;

        loop {
            rest = rest.trim_start();
            if rest.is_empty() {
                break;
            }

            if rest.starts_with('@') {
                let end = at_rule_end(rest);
                sheet.retained.push(rest[..end].trim().to_string());
                rest = &rest[end..];
                continue;
            }

            let Some(open) = rest.find('{') else {
                break;
            };
            let Some(close_rel) = find_top_level(&rest[open..], '}') else {
                break;
            };
            let close = open + close_rel;
            let selectors = &rest[..open];
            let block = &rest[open + 1..close];
            let declarations = parse_declarations(block);

            let mut kept = Vec::new();
            for text in split_top_level(selectors, ',') {
                match Selector::parse(text) {
                    Some(selector) => {
                        sheet.rules.push(Rule {
                            selector,
                            order,
                            declarations: declarations.clone(),
                        });
                        order += 1;
                    }
                    None => kept.push(text.trim()),
                }
            }
            if !kept.is_empty() {
                sheet.retained.push(format!("{} {{{}}}", kept.join(", "), block.trim()));
            }

            rest = &rest[close + 1..];
        }

        sheet
    }

    fn retained_css(&self) -> String {
        self.retained.join("\n")
    }
}

/// Byte offset just past the end of an `@` rule (statement or block)
fn at_rule_end(text: &str) -> usize {
    let mut depth = 0usize;
    let mut scanner = Scanner::default();
    for (i, c) in text.char_indices() {
        if !scanner.at_top_level(c) {
            continue;
        }
        match c {
            ';' if depth == 0 => return i + 1,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
    }
    text.len()
}

/// Tracks quotes and parentheses while walking CSS text
#[derive(Debug, Default)]
struct Scanner {
    quote: Option<char>,
    parens: usize,
}

impl Scanner {
    /// Feed `c`; true when `c` sits outside any string or `(...)` group
    fn at_top_level(&mut self, c: char) -> bool {
        if let Some(quote) = self.quote {
            if c == quote {
                self.quote = None;
            }
            return false;
        }
        match c {
            '"' | '\'' => {
                self.quote = Some(c);
                false
            }
            '(' => {
                self.parens += 1;
                false
            }
            ')' => {
                self.parens = self.parens.saturating_sub(1);
                false
            }
            _ => self.parens == 0,
        }
    }
}

/// Byte offset of the first `target` outside strings and parentheses
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let mut scanner = Scanner::default();
    text.char_indices()
        .find(|&(_, c)| scanner.at_top_level(c) && c == target)
        .map(|(i, _)| i)
}

/// Split on `separator` outside strings and parentheses, so
/// `url(data:image/png;base64,...)` stays in one piece
fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut scanner = Scanner::default();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if scanner.at_top_level(c) && c == separator {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&text[start..]);
    parts
}

/// Parse `a: b; c: d !important`
pub fn parse_declarations(block: &str) -> Vec<Declaration> {
    split_top_level(block, ';')
        .into_iter()
        .filter_map(|part| {
            let (property, value) = part.split_once(':')?;
            let property = property.trim().to_ascii_lowercase();
            let mut value = value.trim();
            if property.is_empty() || value.is_empty() {
                return None;
            }
            let important = value.to_ascii_lowercase().ends_with("!important");
            if important {
                value = value[..value.len() - "!important".len()].trim_end();
            }
            Some(Declaration {
                property,
                value: value.to_string(),
                important,
            })
        })
        .collect()
}

#[derive(Debug)]
struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    style: Option<String>,
}

impl Element {
    fn parse(tag: &str, attrs: &str) -> Self {
        let mut element = Element {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            style: None,
        };
        for caps in attribute().captures_iter(attrs) {
            let name = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            match name.as_str() {
                "id" => element.id = Some(value),
                "class" => element.classes = value.split_whitespace().map(str::to_string).collect(),
                "style" => element.style = Some(value),
                _ => {}
            }
        }
        element
    }
}

/// Fold declarations in cascade order into an ordered property list
fn cascade(layers: impl IntoIterator<Item = Declaration>, into: &mut Vec<Declaration>) {
    for decl in layers {
        match into.iter_mut().find(|d| d.property == decl.property) {
            Some(existing) => {
                if decl.important || !existing.important {
                    *existing = decl;
                }
            }
            None => into.push(decl),
        }
    }
}

/// Pre-send transform that inlines stylesheet rules
#[derive(Debug, Clone)]
pub struct CssInliner {
    root: PathBuf,
    preserve_important: bool,
}

impl CssInliner {
    /// `root` resolves relative `<link href>` paths
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            preserve_important: true,
        }
    }

    /// Keep `!important` markers in the generated `style` attributes
    pub fn preserve_important(mut self, preserve: bool) -> Self {
        self.preserve_important = preserve;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_stylesheet(&self, href: &str) -> MailResult<String> {
        let relative = href.split(['?', '#']).next().unwrap_or(href).trim_start_matches('/');
        let path = self.root.join(relative);
        if !path.starts_with(&self.root) || relative.split('/').any(|p| p == "..") {
            return Err(MailError::Stylesheet(format!("stylesheet outside root: {href}")));
        }
        fs::read_to_string(&path)
            .map_err(|e| MailError::Stylesheet(format!("cannot read {}: {e}", path.display())))
    }

    /// Pull stylesheets out of `body`, returning the remaining markup and CSS
    fn extract(&self, body: &str) -> MailResult<(String, String)> {
        let mut css = String::new();
        let mut error = None;

        let without_links = link_tag().replace_all(body, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let element_attrs = attributes_of(tag);
            let is_stylesheet = element_attrs
                .iter()
                .any(|(k, v)| k == "rel" && v.eq_ignore_ascii_case("stylesheet"));
            let href = element_attrs.iter().find(|(k, _)| k == "href").map(|(_, v)| v.as_str());

            match href {
                Some(href) if is_stylesheet && !is_remote(href) => match self.read_stylesheet(href) {
                    Ok(text) => {
                        css.push_str(&text);
                        css.push('\n');
                        String::new()
                    }
                    Err(e) => {
                        if error.is_none() {
                            error = Some(e);
                        }
                        tag.to_string()
                    }
                },
                _ => tag.to_string(),
            }
        });
        if let Some(e) = error {
            return Err(e);
        }

        let without_styles = style_block().replace_all(&without_links, |caps: &Captures<'_>| {
            css.push_str(&caps[1]);
            css.push('\n');
            String::new()
        });

        Ok((without_styles.into_owned(), css))
    }

    fn inline(&self, body: &str, sheet: &Stylesheet) -> String {
        open_tag()
            .replace_all(body, |caps: &Captures<'_>| {
                let original = caps[0].to_string();
                let tag = &caps[1];
                let attrs = &caps[2];
                let self_closing = &caps[3];

                if SKIPPED_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                    return original;
                }

                let element = Element::parse(tag, attrs);
                let mut matched: Vec<&Rule> =
                    sheet.rules.iter().filter(|r| r.selector.matches(&element)).collect();
                if matched.is_empty() {
                    return original;
                }
                matched.sort_by_key(|r| (r.selector.specificity(), r.order));

                let mut declarations = Vec::new();
                cascade(
                    matched.iter().flat_map(|r| r.declarations.iter().cloned()),
                    &mut declarations,
                );
                if let Some(inline) = &element.style {
                    cascade(parse_declarations(inline), &mut declarations);
                }
                if declarations.is_empty() {
                    return original;
                }

                let style = declarations
                    .iter()
                    .map(|d| d.render(self.preserve_important))
                    .collect::<Vec<_>>()
                    .join("; ");
                let attrs = style_attribute().replace_all(attrs, "");
                let attrs = attrs.trim_end();
                let spacer = if self_closing.is_empty() { "" } else { " " };
                format!(r#"<{tag}{attrs} style="{style};"{spacer}{self_closing}>"#)
            })
            .into_owned()
    }
}

fn is_remote(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}

fn attributes_of(tag: &str) -> Vec<(String, String)> {
    attribute()
        .captures_iter(tag)
        .map(|caps| {
            let name = caps.get(1).map(|m| m.as_str().to_ascii_lowercase()).unwrap_or_default();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            (name, value)
        })
        .collect()
}

fn insert_style_block(body: &str, css: &str) -> String {
    let block = format!("<style>\n{css}\n</style>");
    match body.to_ascii_lowercase().find("</head>") {
        Some(at) => format!("{}{}{}", &body[..at], block, &body[at..]),
        None => format!("{block}{body}"),
    }
}

impl Transform for CssInliner {
    fn name(&self) -> &'static str {
        "css-inliner"
    }

    fn apply(&self, body: &str) -> MailResult<String> {
        let lower = body.to_ascii_lowercase();
        if !lower.contains("<style") && !lower.contains("stylesheet") {
            return Ok(body.to_string());
        }

        let (markup, css) = self.extract(body)?;
        let sheet = Stylesheet::parse(&css);
        debug!(rules = sheet.rules.len(), retained = sheet.retained.len(), "inlining css");

        let inlined = self.inline(&markup, &sheet);
        let retained = sheet.retained_css();
        if retained.is_empty() {
            Ok(inlined)
        } else {
            Ok(insert_style_block(&inlined, &retained))
        }
    }
}
