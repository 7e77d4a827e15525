//! Figure numbering and cross-reference resolution.
//!
//! Every image in a post (except the exempt site logo) becomes a numbered
//! figure. Media is wrapped for styling and captioned, and `[[identifier]]`
//! tokens anywhere in the text are replaced with the figure's label:
//!
//! ```text
//! ![Globe](globe.png "A globe")     →  <div class="img-root">
//!                                        <div class="img-div">
//!                                          <img src="/posts/globe/globe.png" ...>
//!                                          <p class="img-title"><b>Figure 1:</b> A globe</p>
//!                                        </div>
//!                                      </div>
//! See [[globe]].                    →  See <i>Figure 1</i>.
//! ```
//!
//! Sources whose suffix is listed in `figures.video_extensions` are embedded
//! as `<video controls>` with a single `<source>` child and use the `video-`
//! class prefix instead of `img-`.
//!
//! The [`FigureTable`] built here is scoped to one document and discarded
//! with it.

use crate::config::FiguresConfig;
use crate::document::{Document, Element, Node};
use crate::naming;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static REF_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[(.*?)\]\]").expect("invalid reference regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Class prefix for wrapper, root and caption elements.
    pub fn class_prefix(self) -> &'static str {
        match self {
            MediaKind::Image => "img-",
            MediaKind::Video => "video-",
        }
    }
}

/// One numbered image or video.
#[derive(Debug, Clone, PartialEq)]
pub struct FigureReference {
    pub identifier: String,
    /// 1-based, in document order.
    pub number: usize,
    /// The title attribute as written: `None` when absent.
    pub caption: Option<String>,
    pub kind: MediaKind,
}

impl FigureReference {
    pub fn label(&self) -> String {
        format!("Figure {}", self.number)
    }
}

/// Figures of one document, looked up by identifier.
#[derive(Debug, Default, Clone)]
pub struct FigureTable {
    figures: Vec<FigureReference>,
    by_id: HashMap<String, usize>,
}

impl FigureTable {
    /// Figures in document order.
    pub fn figures(&self) -> &[FigureReference] {
        &self.figures
    }

    pub fn len(&self) -> usize {
        self.figures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.figures.is_empty()
    }

    /// Look up a figure by identifier. When two figures share an identifier
    /// the later one wins.
    pub fn get(&self, identifier: &str) -> Option<&FigureReference> {
        self.by_id.get(identifier).map(|&i| &self.figures[i])
    }

    fn register(&mut self, identifier: String, caption: Option<String>, kind: MediaKind) -> usize {
        let number = self.figures.len() + 1;
        self.by_id.insert(identifier.clone(), self.figures.len());
        self.figures.push(FigureReference {
            identifier,
            number,
            caption,
            kind,
        });
        number
    }
}

/// Number, wrap and caption every figure, then resolve `[[...]]` tokens.
///
/// `base_path` is the post directory relative to the site root; relative
/// sources are rewritten to `/<base_path>/<src>`.
pub fn resolve_figures(doc: &mut Document, base_path: &str, options: &FiguresConfig) -> FigureTable {
    let mut table = FigureTable::default();
    let mut resolver = Resolver {
        base_path,
        options,
        table: &mut table,
    };
    resolver.visit(&mut doc.children);
    replace_refs(&mut doc.children, &table);
    table
}

struct Resolver<'a> {
    base_path: &'a str,
    options: &'a FiguresConfig,
    table: &'a mut FigureTable,
}

impl Resolver<'_> {
    /// Returns the kind of the last figure wrapped directly in `children`.
    fn visit(&mut self, children: &mut [Node]) -> Option<MediaKind> {
        let mut last_kind = None;
        for child in children.iter_mut() {
            let Node::Element(el) = child else { continue };
            if el.tag == "img" {
                if el.attr("id") == Some(self.options.exempt_id.as_str()) {
                    continue;
                }
                let (wrapper, kind) = self.figure(std::mem::replace(el, Element::new("img")));
                *el = wrapper;
                last_kind = Some(kind);
            } else if let Some(kind) = self.visit(&mut el.children)
                && el.tag == "p"
            {
                el.tag = "div".to_string();
                el.attrs = vec![("class".to_string(), format!("{}root", kind.class_prefix()))];
            }
        }
        last_kind
    }

    fn figure(&mut self, mut img: Element) -> (Element, MediaKind) {
        let src = resolve_src(img.attr("src").unwrap_or_default(), self.base_path);
        let identifier = naming::figure_id(&src);
        let caption = img.attr("title").map(String::from);

        let video_suffix = naming::suffix(&src).filter(|s| {
            self.options
                .video_extensions
                .iter()
                .any(|v| v.eq_ignore_ascii_case(s))
        });
        let (media, kind) = match video_suffix {
            Some(suffix) => {
                let source = Element::new("source")
                    .with_attr("src", &src)
                    .with_attr("type", format!("video/{suffix}"));
                let video = Element::new("video")
                    .with_attr("controls", "")
                    .with_child(source);
                (video, MediaKind::Video)
            }
            None => {
                img.set_attr("src", src);
                (img, MediaKind::Image)
            }
        };

        let number = self.table.register(identifier, caption.clone(), kind);
        let prefix = kind.class_prefix();
        let mut wrapper = Element::new("div")
            .with_attr("class", format!("{prefix}div"))
            .with_child(media);
        if let Some(caption) = caption_paragraph(number, caption.as_deref(), prefix) {
            wrapper.children.push(caption.into());
        }
        (wrapper, kind)
    }
}

/// Absent title → `Figure N`; empty title → no caption.
fn caption_paragraph(number: usize, title: Option<&str>, prefix: &str) -> Option<Element> {
    let paragraph = Element::new("p").with_attr("class", format!("{prefix}title"));
    match title {
        None => Some(
            paragraph.with_child(Element::new("b").with_child(Node::text(format!("Figure {number}")))),
        ),
        Some("") => None,
        Some(title) => Some(
            paragraph
                .with_child(Element::new("b").with_child(Node::text(format!("Figure {number}:"))))
                .with_child(Node::text(format!(" {title}"))),
        ),
    }
}

/// Make a figure source absolute against the post directory.
///
/// Absolute paths and URLs with a scheme are returned as written.
pub fn resolve_src(src: &str, base_path: &str) -> String {
    if src.starts_with('/') || src.contains("://") || src.starts_with("data:") {
        return src.to_string();
    }
    let base = base_path.trim_matches('/');
    let src = src.trim_start_matches("./");
    if base.is_empty() || base == "." {
        format!("/{src}")
    } else {
        format!("/{base}/{src}")
    }
}

fn replace_refs(children: &mut Vec<Node>, table: &FigureTable) {
    let mut i = 0;
    while i < children.len() {
        match &mut children[i] {
            Node::Text(text) => {
                if let Some(nodes) = split_refs(text, table) {
                    let count = nodes.len();
                    children.splice(i..=i, nodes);
                    i += count;
                    continue;
                }
            }
            Node::Element(el) => replace_refs(&mut el.children, table),
            Node::Raw(_) => {}
        }
        i += 1;
    }
}

/// Split a text node around known `[[identifier]]` tokens. `None` when the
/// text holds no known token.
fn split_refs(text: &str, table: &FigureTable) -> Option<Vec<Node>> {
    let mut nodes = Vec::new();
    let mut last = 0;
    for caps in REF_TOKEN.captures_iter(text) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(figure) = table.get(id.as_str()) else {
            continue;
        };
        if whole.start() > last {
            nodes.push(Node::text(&text[last..whole.start()]));
        }
        nodes.push(Element::new("i").with_child(Node::text(figure.label())).into());
        last = whole.end();
    }
    if nodes.is_empty() {
        return None;
    }
    if last < text.len() {
        nodes.push(Node::text(&text[last..]));
    }
    Some(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_markdown;

    fn resolve(markdown: &str) -> (String, FigureTable) {
        let mut doc = parse_markdown(markdown);
        let table = resolve_figures(&mut doc, "posts/globe", &FiguresConfig::default());
        (doc.to_html(), table)
    }

    #[test]
    fn figures_numbered_in_document_order() {
        let (_, table) = resolve("![](a.png)\n\n![](b.png)\n\n> ![](c.png)\n");
        let numbers: Vec<(String, usize)> = table
            .figures()
            .iter()
            .map(|f| (f.identifier.clone(), f.number))
            .collect();
        assert_eq!(
            numbers,
            vec![
                ("a".to_string(), 1),
                ("b".to_string(), 2),
                ("c".to_string(), 3)
            ]
        );
    }

    #[test]
    fn image_is_wrapped_and_captioned() {
        let (html, _) = resolve("![A globe](globe.png \"The globe\")");
        assert_eq!(
            html,
            "<div class=\"img-root\"><div class=\"img-div\">\
             <img src=\"/posts/globe/globe.png\" alt=\"A globe\" title=\"The globe\">\
             <p class=\"img-title\"><b>Figure 1:</b> The globe</p>\n</div>\n</div>\n"
        );
    }

    #[test]
    fn absent_title_gives_bare_label() {
        let (html, table) = resolve("![](globe.png)");
        assert!(html.contains("<p class=\"img-title\"><b>Figure 1</b></p>"));
        assert_eq!(table.get("globe").unwrap().caption, None);
    }

    #[test]
    fn empty_title_gives_no_caption_but_is_numbered() {
        let img = Element::new("img")
            .with_attr("src", "a.png")
            .with_attr("title", "");
        let mut doc = Document::new(vec![
            Element::new("p").with_child(img).into(),
            Element::new("p").with_child(Node::text("See [[a]].")).into(),
        ]);
        let table = resolve_figures(&mut doc, "posts/x", &FiguresConfig::default());
        let html = doc.to_html();
        assert!(!html.contains("img-title"));
        assert_eq!(table.len(), 1);
        assert!(html.contains("See <i>Figure 1</i>."));
    }

    #[test]
    fn video_suffix_becomes_video_element() {
        let (html, table) = resolve("![Clip](spin.webm \"Spinning\")");
        assert!(html.starts_with("<div class=\"video-root\"><div class=\"video-div\">"));
        assert!(html.contains(
            "<video controls=\"\"><source src=\"/posts/globe/spin.webm\" type=\"video/webm\"></video>"
        ));
        assert!(html.contains("<p class=\"video-title\"><b>Figure 1:</b> Spinning</p>"));
        assert_eq!(table.get("spin").unwrap().kind, MediaKind::Video);
    }

    #[test]
    fn exempt_logo_is_skipped() {
        let logo = Element::new("img")
            .with_attr("src", "logo.png")
            .with_attr("id", "site-logo");
        let mut doc = Document::new(vec![
            Element::new("p").with_child(logo).into(),
            parse_markdown("![](a.png)").children.remove(0),
        ]);
        let table = resolve_figures(&mut doc, "posts/x", &FiguresConfig::default());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("a").unwrap().number, 1);
        assert!(doc.to_html().starts_with("<p><img src=\"logo.png\" id=\"site-logo\"></p>"));
    }

    #[test]
    fn cross_references_resolved() {
        let (html, _) = resolve("![](a.png)\n\n![](b.png)\n\nSee [[b]] and [[a]], then [[b]] again.");
        assert!(html.contains(
            "<p>See <i>Figure 2</i> and <i>Figure 1</i>, then <i>Figure 2</i> again.</p>"
        ));
    }

    #[test]
    fn unknown_reference_stays_literal() {
        let (html, _) = resolve("![](a.png)\n\nSee [[nope]] and [[a]].");
        assert!(html.contains("<p>See [[nope]] and <i>Figure 1</i>.</p>"));
    }

    #[test]
    fn references_inside_inline_markup() {
        let (html, _) = resolve("![](a.png)\n\n*as in [[a]]*");
        assert!(html.contains("<em>as in <i>Figure 1</i></em>"));
    }

    #[test]
    fn spaces_in_source_become_hyphens() {
        let (html, table) = resolve("![](<Night Sky.png>)\n\n[[Night-Sky]]");
        assert_eq!(table.get("Night-Sky").unwrap().number, 1);
        assert!(html.contains("<i>Figure 1</i>"));
    }

    #[test]
    fn absolute_and_remote_sources_kept() {
        assert_eq!(resolve_src("/static/a.png", "posts/x"), "/static/a.png");
        assert_eq!(
            resolve_src("https://example.com/a.png", "posts/x"),
            "https://example.com/a.png"
        );
        assert_eq!(resolve_src("./a.png", "posts/x"), "/posts/x/a.png");
        assert_eq!(resolve_src("a.png", ""), "/a.png");
    }

    #[test]
    fn no_figures_no_rewrites() {
        let (html, table) = resolve("Text with [[globe]].");
        assert!(table.is_empty());
        assert_eq!(html, "<p>Text with [[globe]].</p>\n");
    }
}
