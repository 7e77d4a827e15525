//! Owned HTML document tree.
//!
//! The transform passes need structural edits that a flat event stream makes
//! awkward: renaming a parent paragraph, moving a `<code>` out of its `<pre>`,
//! splitting a text node around a cross-reference. Markdown is therefore
//! folded once into a small tree of [`Node`]s, transformed in place, and
//! serialized back to HTML.
//!
//! ## Conversion
//!
//! [`parse_markdown`] drives `pulldown-cmark` with GFM tables,
//! strikethrough, task lists and footnotes enabled. HTML written by the
//! author is parsed with `tl` into the same elements, so an `<img>` or `<h2>`
//! in a post takes part in figure numbering and anchoring like its markdown
//! counterpart. Markup the tree can't represent faithfully (comments,
//! `<script>`, `<style>`, inline SVG, a lone opening or closing inline tag)
//! is kept as [`Node::Raw`].
//!
//! Adjacent text events are merged into a single [`Node::Text`], so a token
//! such as `[[globe]]` always lives in one text node even though the parser
//! reports the brackets separately.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, LinkType, Options, Parser, Tag, TagEnd};

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Author elements kept verbatim instead of converted.
const OPAQUE_ELEMENTS: &[&str] = &["script", "style", "svg", "math", "textarea"];

/// Elements followed by a newline when serialized, for readable output.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "pre", "ul", "ol", "li", "blockquote",
    "table", "thead", "tr", "hr", "video",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    /// Markup emitted verbatim (author HTML, highlighter output).
    Raw(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed document: the top-level node list of a post body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Whether this node is an element with the given tag.
    pub fn is(&self, tag: &str) -> bool {
        self.as_element().is_some_and(|el| el.tag == tag)
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
            Node::Raw(_) => {}
        }
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Raw(html) => out.push_str(html),
            Node::Element(el) => el.write_html(out),
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.children.iter().for_each(|c| c.collect_text(&mut out));
        out
    }

    fn write_html(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attrs {
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&self.tag.as_str()) {
            return;
        }

        for child in &self.children {
            child.write_html(out);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
        if BLOCK_ELEMENTS.contains(&self.tag.as_str()) {
            out.push('\n');
        }
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    /// Serialize the tree back to HTML.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            node.write_html(&mut out);
        }
        out
    }

    /// Every element, depth-first, pre-order.
    pub fn elements(&self) -> Vec<&Element> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
            for node in nodes {
                if let Node::Element(el) = node {
                    out.push(el);
                    walk(&el.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.children, &mut out);
        out
    }

    /// Every element with the given tag, depth-first, pre-order.
    pub fn find_all(&self, tag: &str) -> Vec<&Element> {
        self.elements()
            .into_iter()
            .filter(|el| el.tag == tag)
            .collect()
    }

    /// Apply `f` to every element, depth-first, pre-order.
    pub fn for_each_element_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        fn walk(nodes: &mut [Node], f: &mut impl FnMut(&mut Element)) {
            for node in nodes {
                if let Node::Element(el) = node {
                    f(el);
                    walk(&mut el.children, f);
                }
            }
        }
        walk(&mut self.children, f);
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

// ============================================================================
// Author HTML → tree
// ============================================================================

/// Parse an HTML fragment into tree nodes.
///
/// Whitespace-only text between top-level nodes is dropped. Unparseable input
/// comes back as a single [`Node::Raw`].
pub fn parse_html_fragment(html: &str) -> Vec<Node> {
    let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
        return vec![Node::Raw(html.to_string())];
    };
    let parser = dom.parser();
    dom.children()
        .iter()
        .filter_map(|handle| convert_html_node(*handle, parser))
        .filter(|node| !matches!(node, Node::Text(t) if t.trim().is_empty()))
        .collect()
}

fn convert_html_node(handle: tl::NodeHandle, parser: &tl::Parser) -> Option<Node> {
    match handle.get(parser)? {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            if OPAQUE_ELEMENTS.contains(&name.as_str()) {
                return Some(Node::Raw(tag.raw().as_utf8_str().to_string()));
            }

            let mut el = Element::new(name);
            let attributes = tag.attributes();
            for (key, value) in attributes.iter() {
                let value = value.map(|v| decode_entities(&v)).unwrap_or_default();
                el.set_attr(&key.to_lowercase(), value);
            }
            // tl may store id and class apart from the other attributes
            if el.attr("id").is_none()
                && let Some(id) = attributes.id()
            {
                el.set_attr("id", decode_entities(&id.as_utf8_str()));
            }
            if el.attr("class").is_none()
                && let Some(class) = attributes.class()
            {
                el.set_attr("class", decode_entities(&class.as_utf8_str()));
            }

            el.children = tag
                .children()
                .top()
                .iter()
                .filter_map(|child| convert_html_node(*child, parser))
                .collect();
            Some(el.into())
        }
        tl::Node::Raw(bytes) => Some(Node::Text(decode_entities(&bytes.as_utf8_str()))),
        tl::Node::Comment(bytes) => Some(Node::Raw(bytes.as_utf8_str().to_string())),
    }
}

fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Whether an inline HTML event holds a whole element rather than one half
/// of a tag pair split around markdown text.
fn is_complete_inline(html: &str) -> bool {
    let html = html.trim();
    if !html.starts_with('<') || html.starts_with("</") || html.starts_with("<!") {
        return false;
    }
    let name: String = html[1..]
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_lowercase();
    !name.is_empty()
        && (html.ends_with("/>") || VOID_ELEMENTS.contains(&name.as_str()) || html.contains("</"))
}

// ============================================================================
// Markdown → tree
// ============================================================================

/// Parser options used for post bodies.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Convert markdown text into a document tree.
pub fn parse_markdown(markdown: &str) -> Document {
    let mut builder = TreeBuilder::default();
    for event in Parser::new_ext(markdown, markdown_options()) {
        builder.event(event);
    }
    builder.finish()
}

/// Folds pulldown-cmark events into nested elements.
///
/// An element with an empty tag is a fragment: its children are spliced into
/// the parent when it closes. HTML block lines are buffered and parsed as one
/// fragment when the block ends.
#[derive(Default)]
struct TreeBuilder {
    stack: Vec<Element>,
    root: Vec<Node>,
    in_table_head: bool,
    html_block: Option<String>,
}

impl TreeBuilder {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.append(Node::text(text.to_string())),
            Event::Code(code) => {
                self.append(Element::new("code").with_child(Node::text(code.to_string())).into())
            }
            Event::Html(html) => match &mut self.html_block {
                Some(buffer) => buffer.push_str(&html),
                None => self.append_html(&html),
            },
            Event::InlineHtml(html) => {
                if is_complete_inline(&html) {
                    self.append_html(&html);
                } else {
                    self.append(Node::Raw(html.to_string()));
                }
            }
            Event::SoftBreak => self.append(Node::text("\n")),
            Event::HardBreak => self.append(Element::new("br").into()),
            Event::Rule => self.append(Element::new("hr").into()),
            Event::TaskListMarker(checked) => {
                let mut input = Element::new("input")
                    .with_attr("type", "checkbox")
                    .with_attr("disabled", "");
                if checked {
                    input.set_attr("checked", "");
                }
                self.append(input.into());
            }
            Event::FootnoteReference(name) => {
                let link = Element::new("a")
                    .with_attr("href", format!("#fn-{name}"))
                    .with_child(Node::text(name.to_string()));
                self.append(
                    Element::new("sup")
                        .with_attr("class", "footnote-reference")
                        .with_child(link)
                        .into(),
                );
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let element = match tag {
            Tag::Paragraph => Element::new("p"),
            Tag::Heading { level, id, .. } => {
                let mut el = Element::new(heading_tag(level));
                if let Some(id) = id {
                    el.set_attr("id", id.to_string());
                }
                el
            }
            Tag::BlockQuote(_) => Element::new("blockquote"),
            Tag::CodeBlock(kind) => {
                self.stack.push(Element::new("pre"));
                let mut code = Element::new("code");
                if let CodeBlockKind::Fenced(info) = kind
                    && let Some(lang) = info.split_whitespace().next()
                {
                    code.set_attr("class", format!("language-{lang}"));
                }
                code
            }
            Tag::HtmlBlock => {
                self.html_block = Some(String::new());
                return;
            }
            Tag::List(Some(start)) => {
                let mut el = Element::new("ol");
                if start != 1 {
                    el.set_attr("start", start.to_string());
                }
                el
            }
            Tag::List(None) => Element::new("ul"),
            Tag::Item => Element::new("li"),
            Tag::FootnoteDefinition(name) => Element::new("div")
                .with_attr("class", "footnote-definition")
                .with_attr("id", format!("fn-{name}"))
                .with_child(
                    Element::new("sup")
                        .with_attr("class", "footnote-definition-label")
                        .with_child(Node::text(name.to_string())),
                ),
            Tag::Table(_) => Element::new("table"),
            Tag::TableHead => {
                self.in_table_head = true;
                Element::new("tr")
            }
            Tag::TableRow => Element::new("tr"),
            Tag::TableCell => Element::new(if self.in_table_head { "th" } else { "td" }),
            Tag::Emphasis => Element::new("em"),
            Tag::Strong => Element::new("strong"),
            Tag::Strikethrough => Element::new("del"),
            Tag::Link {
                link_type,
                dest_url,
                title,
                ..
            } => {
                let href = match link_type {
                    LinkType::Email => format!("mailto:{dest_url}"),
                    _ => dest_url.to_string(),
                };
                let mut el = Element::new("a").with_attr("href", href);
                if !title.is_empty() {
                    el.set_attr("title", title.to_string());
                }
                el
            }
            Tag::Image {
                dest_url, title, ..
            } => {
                let mut el = Element::new("img").with_attr("src", dest_url.to_string());
                // An empty markdown title means no title was written
                if !title.is_empty() {
                    el.set_attr("title", title.to_string());
                }
                el
            }
            _ => Element::new(""),
        };
        self.stack.push(element);
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::CodeBlock => {
                self.close();
                self.close();
            }
            TagEnd::HtmlBlock => {
                if let Some(block) = self.html_block.take() {
                    self.append_html(&block);
                }
            }
            TagEnd::TableHead => {
                self.in_table_head = false;
                if let Some(row) = self.stack.pop() {
                    self.append(Element::new("thead").with_child(row).into());
                }
            }
            TagEnd::Image => {
                if let Some(mut img) = self.stack.pop() {
                    let alt = img.text_content();
                    img.children.clear();
                    img.attrs.insert(1, ("alt".to_string(), alt));
                    self.append(img.into());
                }
            }
            _ => self.close(),
        }
    }

    fn close(&mut self) {
        if let Some(el) = self.stack.pop() {
            if el.tag.is_empty() {
                for child in el.children {
                    self.append(child);
                }
            } else {
                self.append(el.into());
            }
        }
    }

    fn append_html(&mut self, html: &str) {
        for node in parse_html_fragment(html) {
            self.append(node);
        }
    }

    fn append(&mut self, node: Node) {
        let target = match self.stack.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let Node::Text(text) = &node
            && let Some(Node::Text(prev)) = target.last_mut()
        {
            prev.push_str(text);
            return;
        }
        target.push(node);
    }

    fn finish(mut self) -> Document {
        while !self.stack.is_empty() {
            self.close();
        }
        Document::new(self.root)
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}
