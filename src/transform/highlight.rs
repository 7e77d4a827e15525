//! Code block highlighting.
//!
//! A fenced block comes out of markdown conversion as `<pre><code>`. The
//! `<code>` element is lifted out to sit after its `<pre>` and its content is
//! replaced by the highlighter's markup (which brings its own `<pre>`). The
//! original `<pre>` is dropped once it holds nothing but whitespace.
//!
//! The [`Highlighter`] trait is the seam: [`KeywordHighlighter`] is the
//! built-in implementation, a per-language regex tokenizer emitting
//! Pygments-compatible class names so existing stylesheets keep working.

use crate::document::{Document, Node, escape_text};
use regex::Regex;
use std::sync::LazyLock;

/// Turns source text into highlighted HTML.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, source: &str, language: &str) -> String;
}

/// Highlight every `<pre><code>` block in the document.
///
/// Blocks without a `language-*` class use `default_language`.
pub fn highlight_code_blocks(
    doc: &mut Document,
    highlighter: &dyn Highlighter,
    default_language: &str,
) {
    highlight_children(&mut doc.children, highlighter, default_language);
}

fn highlight_children(children: &mut Vec<Node>, highlighter: &dyn Highlighter, default: &str) {
    let mut i = 0;
    while i < children.len() {
        let Node::Element(el) = &mut children[i] else {
            i += 1;
            continue;
        };
        if el.tag != "pre" {
            highlight_children(&mut el.children, highlighter, default);
            i += 1;
            continue;
        }

        let (codes, rest): (Vec<Node>, Vec<Node>) = std::mem::take(&mut el.children)
            .into_iter()
            .partition(|n| n.is("code"));
        el.children = rest;
        if codes.is_empty() {
            i += 1;
            continue;
        }
        let keep_pre = !el.text_content().trim().is_empty();

        let highlighted: Vec<Node> = codes
            .into_iter()
            .map(|code| highlight_code(code, highlighter, default))
            .collect();
        let count = highlighted.len();
        let insert_at = if keep_pre {
            i + 1
        } else {
            children.remove(i);
            i
        };
        children.splice(insert_at..insert_at, highlighted);
        i = insert_at + count;
    }
}

fn highlight_code(mut node: Node, highlighter: &dyn Highlighter, default: &str) -> Node {
    if let Node::Element(code) = &mut node {
        let language = code
            .attr("class")
            .and_then(|classes| {
                classes
                    .split_whitespace()
                    .find_map(|c| c.strip_prefix("language-"))
            })
            .unwrap_or(default)
            .to_string();
        let source = code.text_content();
        code.children = vec![Node::Raw(highlighter.highlight(&source, &language))];
    }
    node
}

// ============================================================================
// Built-in highlighter
// ============================================================================

struct Grammar {
    names: &'static [&'static str],
    comment: &'static str,
    string: &'static str,
    keywords: &'static [&'static str],
}

const DOUBLE_QUOTED: &str = r#""(?:[^"\\\n]|\\.)*""#;
const EITHER_QUOTED: &str = r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#;

const GRAMMARS: &[Grammar] = &[
    Grammar {
        names: &["python", "py", "python3"],
        comment: r"#[^\n]*",
        string: EITHER_QUOTED,
        keywords: &[
            "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del",
            "elif", "else", "except", "False", "finally", "for", "from", "global", "if",
            "import", "in", "is", "lambda", "None", "nonlocal", "not", "or", "pass", "raise",
            "return", "True", "try", "while", "with", "yield",
        ],
    },
    Grammar {
        names: &["rust", "rs"],
        comment: r"//[^\n]*",
        string: DOUBLE_QUOTED,
        keywords: &[
            "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
            "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod",
            "move", "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super",
            "trait", "true", "type", "unsafe", "use", "where", "while",
        ],
    },
    Grammar {
        names: &["javascript", "js", "typescript", "ts"],
        comment: r"//[^\n]*",
        string: EITHER_QUOTED,
        keywords: &[
            "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
            "delete", "do", "else", "export", "extends", "false", "finally", "for", "function",
            "if", "import", "in", "instanceof", "let", "new", "null", "return", "switch",
            "this", "throw", "true", "try", "typeof", "undefined", "var", "while", "yield",
        ],
    },
    Grammar {
        names: &["c", "cpp", "c++", "glsl"],
        comment: r"//[^\n]*",
        string: DOUBLE_QUOTED,
        keywords: &[
            "break", "case", "char", "const", "continue", "default", "do", "double", "else",
            "enum", "float", "for", "if", "int", "long", "return", "short", "sizeof", "static",
            "struct", "switch", "typedef", "uniform", "unsigned", "void", "while", "vec2",
            "vec3", "vec4",
        ],
    },
    Grammar {
        names: &["bash", "sh", "shell", "console"],
        comment: r"#[^\n]*",
        string: EITHER_QUOTED,
        keywords: &[
            "case", "do", "done", "elif", "else", "esac", "export", "fi", "for", "function",
            "if", "in", "local", "return", "then", "while",
        ],
    },
];

struct CompiledGrammar {
    names: &'static [&'static str],
    tokens: Regex,
}

static COMPILED: LazyLock<Vec<CompiledGrammar>> = LazyLock::new(|| {
    GRAMMARS
        .iter()
        .map(|g| {
            let pattern = format!(
                r"(?P<c>{})|(?P<s>{})|(?P<m>\b\d+(?:\.\d+)?\b)|(?P<k>\b(?:{})\b)",
                g.comment,
                g.string,
                g.keywords.join("|"),
            );
            CompiledGrammar {
                names: g.names,
                tokens: Regex::new(&pattern).expect("invalid highlighter grammar"),
            }
        })
        .collect()
});

/// Regex tokenizer for a handful of common languages.
///
/// Marks comments (`c`), strings (`s`), numbers (`m`) and keywords (`k`).
/// Unknown languages are escaped without markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordHighlighter;

impl KeywordHighlighter {
    fn grammar(language: &str) -> Option<&'static CompiledGrammar> {
        let language = language.to_ascii_lowercase();
        COMPILED
            .iter()
            .find(|g| g.names.contains(&language.as_str()))
    }
}

impl Highlighter for KeywordHighlighter {
    fn highlight(&self, source: &str, language: &str) -> String {
        let mut body = String::with_capacity(source.len() * 2);
        match Self::grammar(language) {
            Some(grammar) => {
                let mut last = 0;
                for caps in grammar.tokens.captures_iter(source) {
                    let Some(whole) = caps.get(0) else { continue };
                    body.push_str(&escape_text(&source[last..whole.start()]));
                    let class = ["c", "s", "m", "k"]
                        .into_iter()
                        .find(|name| caps.name(name).is_some())
                        .unwrap_or("n");
                    body.push_str(&format!(
                        "<span class=\"{class}\">{}</span>",
                        escape_text(whole.as_str())
                    ));
                    last = whole.end();
                }
                body.push_str(&escape_text(&source[last..]));
            }
            None => body.push_str(&escape_text(source)),
        }
        format!("<div class=\"highlight\"><pre>{body}</pre></div>")
    }
}
