//! The boundary between Markdown parsing and indexing.
//!
//! Anything that can produce a flat, nesting-annotated token stream can feed
//! the pipeline. [`CommonMark`] does so by running `comrak` and flattening its
//! AST without recursion.

use comrak::arena_tree::NodeEdge;
use comrak::nodes::{AstNode, ListType, NodeValue};
use comrak::{parse_document, Arena};
use std::panic;
use std::thread;

use crate::options::TokenizerOptions;
use crate::token::{LineSpan, Nesting, Token};

/// Produces the token stream for a normalized document.
///
/// The core trusts the `nesting` field of every token it is given; it never
/// re-derives structure from content.
pub trait Tokenizer {
    /// Tokenize `text`, which has already been through
    /// [`normalize`](crate::normalize).
    fn tokenize(&self, text: &str) -> Vec<Token>;

    /// An upper bound on the nesting depth of the stream `tokenize` would
    /// produce for `text`, if one can be had without tokenizing.  The
    /// pipeline refuses input whose bound exceeds
    /// [`Limits::max_nesting`](crate::Limits::max_nesting) before calling
    /// [`tokenize`](Tokenizer::tokenize).
    fn depth_bound(&self, _text: &str) -> Option<DepthBound> {
        None
    }
}

/// Result of [`Tokenizer::depth_bound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepthBound {
    /// No token stream for the text nests deeper than this.
    pub depth: usize,
    /// 0-based line where the bound is reached.
    pub line: usize,
}

impl<F> Tokenizer for F
where
    F: Fn(&str) -> Vec<Token>,
{
    fn tokenize(&self, text: &str) -> Vec<Token> {
        self(text)
    }
}

/// CommonMark (with the configured GFM extensions) via `comrak`.
///
/// Block containers become `*_open`/`*_close` pairs. Paragraphs, headings and
/// table cells wrap a single flat `inline` token whose `children` hold the
/// inline stream and whose `content` is its plain text. Leaf blocks (code,
/// HTML, rules, front matter) are flat.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommonMark {
    options: TokenizerOptions,
}

impl CommonMark {
    /// A tokenizer with the given extensions enabled.
    pub fn new(options: TokenizerOptions) -> Self {
        CommonMark { options }
    }

    fn comrak_options(&self) -> comrak::Options {
        let mut options = comrak::Options::default();
        options.extension.table = self.options.table;
        options.extension.strikethrough = self.options.strikethrough;
        options.extension.autolink = self.options.autolink;
        options.extension.tasklist = self.options.tasklist;
        options.extension.footnotes = self.options.footnotes;
        if self.options.front_matter {
            options.extension.front_matter_delimiter = Some("---".to_string());
        }
        options
    }
}

/// comrak's block parser recurses once per open container.  Shallow
/// documents are parsed on the calling thread; deeper ones on a thread whose
/// stack is sized for their bound.
const INLINE_DEPTH: usize = 64;
const STACK_BASE: usize = 2 * 1024 * 1024;
const STACK_PER_LEVEL: usize = 32 * 1024;
const STACK_MAX_LEVELS: usize = 32_768;

impl CommonMark {
    fn tokenize_here(&self, text: &str) -> Vec<Token> {
        let arena = Arena::new();
        let options = self.comrak_options();
        let root = parse_document(&arena, text, &options);

        let mut flattener = Flattener::default();
        for edge in root.traverse() {
            match edge {
                NodeEdge::Start(node) => flattener.start(node),
                NodeEdge::End(node) => flattener.end(node),
            }
        }
        flattener.tokens
    }
}

impl Tokenizer for CommonMark {
    fn tokenize(&self, text: &str) -> Vec<Token> {
        let depth = container_depth_bound(text).depth;
        if depth <= INLINE_DEPTH {
            return self.tokenize_here(text);
        }

        let stack_size = STACK_BASE + depth.min(STACK_MAX_LEVELS) * STACK_PER_LEVEL;
        thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("markpass-tokenize".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, || self.tokenize_here(text));
            match spawned {
                Ok(handle) => match handle.join() {
                    Ok(tokens) => tokens,
                    Err(payload) => panic::resume_unwind(payload),
                },
                // No thread to be had; the calling thread's stack is all
                // there is.
                Err(_) => self.tokenize_here(text),
            }
        })
    }

    fn depth_bound(&self, text: &str) -> Option<DepthBound> {
        Some(container_depth_bound(text))
    }
}

/// Upper bound on the block nesting comrak can build from `text`, in tokens.
///
/// A container only stays open on a line that continues it through its
/// prefix, and lazy continuation lines open nothing, so the depth after any
/// line is at most what that line's prefix can pay for: one level per `>`,
/// two (list and item) per list marker, one per footnote label, and one per
/// column of indentation, since every list item needs at least two. One more
/// is added for the leaf block.
///
/// ```
/// # use markpass::container_depth_bound;
/// assert_eq!(container_depth_bound("plain\n").depth, 1);
/// let deep = container_depth_bound("x\n> > > - y\n");
/// assert_eq!((deep.depth, deep.line), (7, 1));
/// ```
pub fn container_depth_bound(text: &str) -> DepthBound {
    let mut bound = DepthBound::default();
    for (line_no, line) in text.split('\n').enumerate() {
        let depth = prefix_depth(line.as_bytes()) + 1;
        if depth > bound.depth {
            bound = DepthBound {
                depth,
                line: line_no,
            };
        }
    }
    bound
}

fn prefix_depth(line: &[u8]) -> usize {
    let spaced = |ix: usize| matches!(line.get(ix), None | Some(b' ' | b'\t'));
    let mut depth = 0;
    let mut ix = 0;
    loop {
        match line.get(ix) {
            Some(b' ') => {
                depth += 1;
                ix += 1;
            }
            Some(b'\t') => {
                depth += 4;
                ix += 1;
            }
            Some(b'>') => {
                depth += 1;
                ix += 1;
                if line.get(ix) == Some(&b' ') {
                    ix += 1;
                }
            }
            Some(b'-' | b'*' | b'+') if spaced(ix + 1) => {
                depth += 2;
                ix += 1;
            }
            Some(b'0'..=b'9') => {
                let digits = line[ix..]
                    .iter()
                    .take(10)
                    .take_while(|b| b.is_ascii_digit())
                    .count();
                let end = ix + digits;
                if digits <= 9 && matches!(line.get(end), Some(b'.' | b')')) && spaced(end + 1) {
                    depth += 2;
                    ix = end + 1;
                } else {
                    break;
                }
            }
            Some(b'[') if line.get(ix + 1) == Some(&b'^') => {
                match line[ix..].windows(2).position(|w| w == b"]:") {
                    Some(close) => {
                        depth += 1;
                        ix += close + 2;
                    }
                    None => break,
                }
            }
            _ => break,
        }
    }
    depth
}

/// What a block node turned into, so its `End` edge can be matched.
enum Emitted {
    Nothing,
    Pair(&'static str, String),
    Skipped,
}

#[derive(Default)]
struct Flattener<'a> {
    tokens: Vec<Token>,
    /// One entry per block node currently started.
    emitted: Vec<Emitted>,
    /// Set while the descendants of an inline-bearing block are ignored.
    skipping: Option<&'a AstNode<'a>>,
    header_row: bool,
}

impl<'a> Flattener<'a> {
    fn start(&mut self, node: &'a AstNode<'a>) {
        if self.skipping.is_some() {
            return;
        }

        let ast = node.data.borrow();
        let map = block_map(ast.sourcepos.start.line, ast.sourcepos.end.line);

        let (kind, tag): (&'static str, String) = match ast.value {
            NodeValue::Document => {
                self.emitted.push(Emitted::Nothing);
                return;
            }
            NodeValue::Paragraph => ("paragraph", "p".to_string()),
            NodeValue::Heading(ref heading) => ("heading", format!("h{}", heading.level)),
            NodeValue::TableCell => {
                if self.header_row {
                    ("th", "th".to_string())
                } else {
                    ("td", "td".to_string())
                }
            }
            NodeValue::BlockQuote => ("blockquote", "blockquote".to_string()),
            NodeValue::List(ref list) => match list.list_type {
                ListType::Bullet => ("bullet_list", "ul".to_string()),
                ListType::Ordered => ("ordered_list", "ol".to_string()),
            },
            NodeValue::Item(..) | NodeValue::TaskItem(..) => ("list_item", "li".to_string()),
            NodeValue::Table(..) => ("table", "table".to_string()),
            NodeValue::TableRow(header) => {
                self.header_row = header;
                ("tr", "tr".to_string())
            }
            NodeValue::FootnoteDefinition(..) => ("footnote", String::new()),
            NodeValue::CodeBlock(ref code) => {
                let token = if code.fenced {
                    Token::new("fence", Nesting::Flat)
                        .with_tag("code")
                        .with_attr("info", code.info.clone())
                } else {
                    Token::new("code_block", Nesting::Flat).with_tag("code")
                };
                self.push_leaf(token.with_content(code.literal.clone()), map, node);
                return;
            }
            NodeValue::HtmlBlock(ref html) => {
                let token = Token::new("html_block", Nesting::Flat).with_content(html.literal.clone());
                self.push_leaf(token, map, node);
                return;
            }
            NodeValue::ThematicBreak => {
                self.push_leaf(Token::new("hr", Nesting::Flat).with_tag("hr"), map, node);
                return;
            }
            NodeValue::FrontMatter(ref raw) => {
                let token = Token::new("front_matter", Nesting::Flat).with_content(raw.clone());
                self.push_leaf(token, map, node);
                return;
            }
            ref other => {
                if node.first_child().is_some() {
                    ("container", node_name(other).to_string())
                } else {
                    let token = Token::new("node", Nesting::Flat).with_tag(node_name(other));
                    self.push_leaf(token, map, node);
                    return;
                }
            }
        };
        let bears_inlines = matches!(
            ast.value,
            NodeValue::Paragraph | NodeValue::Heading(..) | NodeValue::TableCell
        );
        let mut open = Token::new(format!("{}_open", kind), Nesting::Open).with_tag(tag.clone());
        open.map = map;
        if let NodeValue::TaskItem(checked) = ast.value {
            open = open.with_attr("checked", checked.is_some().to_string());
        }
        drop(ast);
        self.tokens.push(open);

        if bears_inlines {
            let (content, children) = flatten_inlines(node);
            let mut inline = Token::new("inline", Nesting::Flat)
                .with_content(content)
                .with_children(children);
            inline.map = map;
            self.tokens.push(inline);
            self.skipping = Some(node);
        }
        self.emitted.push(Emitted::Pair(kind, tag));
    }

    fn end(&mut self, node: &'a AstNode<'a>) {
        match self.skipping {
            Some(skipped) if std::ptr::eq(skipped, node) => self.skipping = None,
            Some(_) => return,
            None => {}
        }

        match self.emitted.pop() {
            Some(Emitted::Pair(kind, tag)) => {
                if kind == "tr" {
                    self.header_row = false;
                }
                self.tokens
                    .push(Token::new(format!("{}_close", kind), Nesting::Close).with_tag(tag));
            }
            Some(Emitted::Nothing) | Some(Emitted::Skipped) | None => {}
        }
    }

    fn push_leaf(&mut self, mut token: Token, map: Option<LineSpan>, node: &'a AstNode<'a>) {
        token.map = map;
        self.tokens.push(token);
        self.emitted.push(Emitted::Skipped);
        if node.first_child().is_some() {
            self.skipping = Some(node);
        }
    }
}

/// Tag for nodes without a dedicated token, named as comrak's XML output
/// names them.
#[allow(unreachable_patterns)]
pub(crate) fn node_name(value: &NodeValue) -> &'static str {
    match value {
        NodeValue::Document => "document",
        NodeValue::BlockQuote => "block_quote",
        NodeValue::FootnoteDefinition(..) => "footnote_definition",
        NodeValue::List(..) => "list",
        NodeValue::DescriptionList => "description_list",
        NodeValue::DescriptionItem(..) => "description_item",
        NodeValue::DescriptionTerm => "description_term",
        NodeValue::DescriptionDetails => "description_details",
        NodeValue::Item(..) => "item",
        NodeValue::CodeBlock(..) => "code_block",
        NodeValue::HtmlBlock(..) => "html_block",
        NodeValue::Paragraph => "paragraph",
        NodeValue::Heading(..) => "heading",
        NodeValue::ThematicBreak => "thematic_break",
        NodeValue::Table(..) => "table",
        NodeValue::TableRow(..) => "table_row",
        NodeValue::TableCell => "table_cell",
        NodeValue::Text(..) => "text",
        NodeValue::SoftBreak => "softbreak",
        NodeValue::LineBreak => "linebreak",
        NodeValue::Image(..) => "image",
        NodeValue::Link(..) => "link",
        NodeValue::Emph => "emph",
        NodeValue::Strong => "strong",
        NodeValue::Code(..) => "code",
        NodeValue::HtmlInline(..) => "html_inline",
        NodeValue::Strikethrough => "strikethrough",
        NodeValue::FrontMatter(..) => "frontmatter",
        NodeValue::TaskItem(..) => "taskitem",
        NodeValue::Superscript => "superscript",
        NodeValue::FootnoteReference(..) => "footnote_reference",
        NodeValue::MultilineBlockQuote(..) => "multiline_block_quote",
        NodeValue::Escaped => "escaped",
        NodeValue::Math(..) => "math",
        NodeValue::WikiLink(..) => "wikilink",
        NodeValue::Underline => "underline",
        NodeValue::SpoileredText => "spoiler",
        NodeValue::EscapedTag(..) => "escaped_tag",
        // Feature-gated in comrak.
        _ => "node",
    }
}

/// comrak lines are 1-based and inclusive; tokens use 0-based half-open.
fn block_map(start: usize, end: usize) -> Option<LineSpan> {
    if start == 0 {
        None
    } else {
        Some(LineSpan::new(start - 1, end))
    }
}

/// Flatten the inline descendants of `block` into a token list, returning the
/// plain text alongside.
fn flatten_inlines<'a>(block: &'a AstNode<'a>) -> (String, Vec<Token>) {
    let mut content = String::new();
    let mut children = Vec::new();
    // Images carry their alt text as content rather than as children.
    let mut image: Option<(&'a AstNode<'a>, usize)> = None;

    for edge in block.traverse() {
        let (node, entering) = match edge {
            NodeEdge::Start(node) => (node, true),
            NodeEdge::End(node) => (node, false),
        };
        if std::ptr::eq(node, block) {
            continue;
        }

        let ast = node.data.borrow();
        if let Some((image_node, token_ix)) = image {
            if std::ptr::eq(image_node, node) {
                if !entering {
                    image = None;
                }
            } else if entering {
                let alt: &mut Token = &mut children[token_ix];
                match ast.value {
                    NodeValue::Text(ref text) => alt.content.push_str(text),
                    NodeValue::Code(ref code) => alt.content.push_str(&code.literal),
                    _ => {}
                }
            }
            continue;
        }

        let line = inline_line(ast.sourcepos.start.line);
        let token = match (&ast.value, entering) {
            (NodeValue::Text(text), true) => {
                content.push_str(text);
                Some(Token::new("text", Nesting::Flat).with_content(text.clone()))
            }
            (NodeValue::SoftBreak, true) => {
                content.push('\n');
                Some(Token::new("softbreak", Nesting::Flat).with_tag("br"))
            }
            (NodeValue::LineBreak, true) => {
                content.push('\n');
                Some(Token::new("hardbreak", Nesting::Flat).with_tag("br"))
            }
            (NodeValue::Code(code), true) => {
                content.push_str(&code.literal);
                Some(
                    Token::new("code_inline", Nesting::Flat)
                        .with_tag("code")
                        .with_content(code.literal.clone()),
                )
            }
            (NodeValue::HtmlInline(html), true) => {
                Some(Token::new("html_inline", Nesting::Flat).with_content(html.clone()))
            }
            (NodeValue::Emph, true) => Some(Token::new("em_open", Nesting::Open).with_tag("em")),
            (NodeValue::Emph, false) => Some(Token::new("em_close", Nesting::Close).with_tag("em")),
            (NodeValue::Strong, true) => {
                Some(Token::new("strong_open", Nesting::Open).with_tag("strong"))
            }
            (NodeValue::Strong, false) => {
                Some(Token::new("strong_close", Nesting::Close).with_tag("strong"))
            }
            (NodeValue::Strikethrough, true) => Some(Token::new("s_open", Nesting::Open).with_tag("s")),
            (NodeValue::Strikethrough, false) => {
                Some(Token::new("s_close", Nesting::Close).with_tag("s"))
            }
            (NodeValue::Link(link), true) => {
                let mut open = Token::new("link_open", Nesting::Open)
                    .with_tag("a")
                    .with_attr("href", link.url.clone());
                if !link.title.is_empty() {
                    open = open.with_attr("title", link.title.clone());
                }
                Some(open)
            }
            (NodeValue::Link(..), false) => Some(Token::new("link_close", Nesting::Close).with_tag("a")),
            (NodeValue::Image(link), true) => {
                let mut flat = Token::new("image", Nesting::Flat)
                    .with_tag("img")
                    .with_attr("src", link.url.clone());
                if !link.title.is_empty() {
                    flat = flat.with_attr("title", link.title.clone());
                }
                image = Some((node, children.len()));
                Some(flat)
            }
            (NodeValue::FootnoteReference(..), true) => {
                Some(Token::new("footnote_ref", Nesting::Flat))
            }
            (other, true) if node.first_child().is_some() => Some(
                Token::new("inline_container_open", Nesting::Open).with_tag(node_name(other)),
            ),
            (other, false) if node.first_child().is_some() => Some(
                Token::new("inline_container_close", Nesting::Close).with_tag(node_name(other)),
            ),
            (other, true) => Some(Token::new("node", Nesting::Flat).with_tag(node_name(other))),
            _ => None,
        };

        if let Some(mut token) = token {
            if entering {
                token.map = line.map(|l| LineSpan::new(l, l + 1));
            }
            children.push(token);
        }
    }

    (content, children)
}

fn inline_line(line: usize) -> Option<usize> {
    line.checked_sub(1)
}
