/*!
 * Markdown to Gemini (gemtext) conversion.
 *
 * Walks the pulldown-cmark event stream and writes line oriented gemtext.
 * Gemtext has no inline links, so links are numbered in the running text
 * and emitted as `=>` lines after the block (or at the end of the
 * document, depending on [`LinkStyle`]).
 */

use std::mem;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};

use crate::links::LinkRewrite;

/// Where link lines are placed.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LinkStyle {
    /// After the paragraph (or top-level list/quote) holding the link.
    #[default]
    Paragraph,
    /// All together at the end of the document.
    AtEnd,
    /// Link text only.
    Off,
}

#[derive(Clone, Copy)]
pub struct GeminiOptions<'a> {
    pub link_style: LinkStyle,
    pub strip_html: bool,
    pub rewrite: Option<&'a dyn LinkRewrite>,
}

impl Default for GeminiOptions<'_> {
    fn default() -> Self {
        Self {
            link_style: LinkStyle::Paragraph,
            strip_html: true,
            rewrite: None,
        }
    }
}

const RULE: &str = "-----";

/// Zero width space, put in front of literal text that would otherwise
/// parse as a gemtext line type.
const GUARD: char = '\u{200B}';

fn looks_like_markup(line: &str) -> bool {
    ["#", "=>", "* ", ">", "```"]
        .iter()
        .any(|marker| line.starts_with(marker))
}

fn guard_fence(line: &str) -> String {
    if line.starts_with("```") {
        format!("{}{}", GUARD, line)
    } else {
        line.to_string()
    }
}

/// Converts a Markdown document to gemtext.
///
/// Blocks are separated by one blank line and the result carries no
/// trailing newline.
pub fn convert(markdown: &str, options: &GeminiOptions<'_>) -> String {
    let parser = Parser::new_ext(
        markdown,
        Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS,
    );
    let mut writer = GeminiWriter::new(options);
    for event in parser {
        writer.event(event);
    }
    writer.finish()
}

enum Open {
    Paragraph,
    Heading(usize),
    Quote,
    Code,
    Html,
    List,
    Item,
    Link,
    Image,
    Other,
}

struct LinkLine {
    url: String,
    text: String,
    /// Footnote number shown in the running text; images have none.
    number: Option<usize>,
}

impl LinkLine {
    fn render(&self, numbered: bool) -> String {
        let label = match (numbered, self.number) {
            (true, Some(n)) if self.text.is_empty() => format!("[{}]", n),
            (true, Some(n)) => format!("[{}] {}", n, self.text),
            _ => self.text.clone(),
        };
        if label.is_empty() {
            format!("=> {}", self.url)
        } else {
            format!("=> {} {}", self.url, label)
        }
    }
}

struct OpenLink {
    url: String,
    text: String,
}

struct GeminiWriter<'o, 'a> {
    options: &'o GeminiOptions<'a>,
    out: Vec<String>,
    stack: Vec<Open>,
    // inline text of the block being built
    line: String,
    // set once the current block holds text outside of links
    plain_text: bool,
    item_marker: bool,
    list_depth: usize,
    quote_depth: usize,
    code: Option<(String, String)>,
    links: Vec<OpenLink>,
    image: Option<OpenLink>,
    pending: Vec<LinkLine>,
    deferred: Vec<LinkLine>,
    counter: usize,
}

impl<'o, 'a> GeminiWriter<'o, 'a> {
    fn new(options: &'o GeminiOptions<'a>) -> Self {
        Self {
            options,
            out: Vec::new(),
            stack: Vec::new(),
            line: String::new(),
            plain_text: false,
            item_marker: false,
            list_depth: 0,
            quote_depth: 0,
            code: None,
            links: Vec::new(),
            image: None,
            pending: Vec::new(),
            deferred: Vec::new(),
            counter: 0,
        }
    }

    fn rewrite(&self, url: &str) -> String {
        match self.options.rewrite {
            Some(hook) => hook.rewrite(url),
            None => url.to_string(),
        }
    }

    fn nested(&self) -> bool {
        self.list_depth + self.quote_depth > 0
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => {
                if let Some(open) = self.stack.pop() {
                    self.end(open);
                }
            }
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.text(&format!("`{}`", code)),
            Event::Html(html) | Event::InlineHtml(html) => {
                if !self.options.strip_html {
                    self.text(&html);
                }
            }
            Event::SoftBreak => self.push_inline(" "),
            Event::HardBreak => self.push_inline("\n"),
            Event::Rule => {
                self.flush_line("");
                self.out.push(RULE.to_string());
                if !self.nested() {
                    self.blank();
                }
            }
            Event::TaskListMarker(done) => self.push_inline(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let open = match tag {
            Tag::Paragraph => Open::Paragraph,
            Tag::Heading { level, .. } => Open::Heading((level as usize).min(3)),
            Tag::BlockQuote(..) => {
                self.flush_line("");
                self.quote_depth += 1;
                Open::Quote
            }
            Tag::CodeBlock(kind) => {
                self.flush_line("");
                let alt = match kind {
                    CodeBlockKind::Fenced(info) => info.trim().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((alt, String::new()));
                Open::Code
            }
            Tag::HtmlBlock => Open::Html,
            Tag::List(_) => {
                self.flush_line("");
                self.list_depth += 1;
                Open::List
            }
            Tag::Item => {
                self.item_marker = true;
                Open::Item
            }
            Tag::Link { dest_url, .. } => {
                let url = self.rewrite(&dest_url);
                self.links.push(OpenLink {
                    url,
                    text: String::new(),
                });
                Open::Link
            }
            Tag::Image { dest_url, .. } => {
                let url = self.rewrite(&dest_url);
                self.image = Some(OpenLink {
                    url,
                    text: String::new(),
                });
                Open::Image
            }
            _ => Open::Other,
        };
        self.stack.push(open);
    }

    fn end(&mut self, open: Open) {
        match open {
            Open::Paragraph => self.end_block("", true),
            Open::Html => self.end_block("", false),
            Open::Heading(level) => self.end_block(&format!("{} ", "#".repeat(level)), false),
            Open::Quote => {
                self.flush_line("");
                self.quote_depth -= 1;
                self.end_container();
            }
            Open::List => {
                self.list_depth -= 1;
                self.end_container();
            }
            Open::Item => {
                self.flush_line("");
                self.item_marker = false;
            }
            Open::Code => {
                if let Some((alt, body)) = self.code.take() {
                    self.out.push(format!("```{}", alt));
                    self.out
                        .extend(body.trim_end_matches('\n').lines().map(guard_fence));
                    self.out.push("```".to_string());
                }
                if !self.nested() {
                    self.blank();
                }
            }
            Open::Link => {
                if let Some(link) = self.links.pop() {
                    if self.options.link_style != LinkStyle::Off {
                        self.counter += 1;
                        self.line.push_str(&format!("[{}]", self.counter));
                        self.pending.push(LinkLine {
                            url: link.url,
                            text: link.text.trim().to_string(),
                            number: Some(self.counter),
                        });
                    }
                }
            }
            Open::Image => {
                if let Some(image) = self.image.take() {
                    self.pending.push(LinkLine {
                        url: image.url,
                        text: image.text.trim().to_string(),
                        number: None,
                    });
                }
            }
            Open::Other => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, body)) = self.code.as_mut() {
            body.push_str(text);
            return;
        }
        if let Some(image) = self.image.as_mut() {
            image.text.push_str(text);
            return;
        }
        if self.links.is_empty() && !text.trim().is_empty() {
            self.plain_text = true;
        }
        self.push_inline(text);
    }

    fn push_inline(&mut self, text: &str) {
        if let Some(link) = self.links.last_mut() {
            link.text.push_str(text);
        }
        self.line.push_str(text);
    }

    fn end_block(&mut self, prefix: &str, paragraph: bool) {
        if self.nested() {
            self.flush_line(prefix);
        } else if paragraph && !self.plain_text && !self.pending.is_empty() {
            // nothing but links: they become the block
            self.line.clear();
            self.counter -= self.pending.iter().filter(|l| l.number.is_some()).count();
            for link in mem::take(&mut self.pending) {
                self.out.push(link.render(false));
            }
            self.blank();
        } else {
            self.flush_line(prefix);
            self.flush_links();
            self.blank();
        }
        self.plain_text = false;
    }

    fn end_container(&mut self) {
        if !self.nested() {
            self.flush_links();
            self.blank();
            self.plain_text = false;
        }
    }

    fn flush_line(&mut self, prefix: &str) {
        let text = mem::take(&mut self.line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        for (i, l) in text.lines().enumerate() {
            let mut out = String::new();
            if self.quote_depth > 0 {
                out.push_str("> ");
            }
            if i == 0 {
                if mem::take(&mut self.item_marker) {
                    out.push_str("* ");
                }
                out.push_str(prefix);
            }
            let l = l.trim();
            if out.is_empty() && looks_like_markup(l) {
                out.push(GUARD);
            }
            out.push_str(l);
            self.out.push(out);
        }
    }

    fn flush_links(&mut self) {
        for link in mem::take(&mut self.pending) {
            if link.number.is_some() && self.options.link_style == LinkStyle::AtEnd {
                self.deferred.push(link);
            } else {
                self.out.push(link.render(true));
            }
        }
    }

    fn blank(&mut self) {
        if matches!(self.out.last(), Some(l) if !l.is_empty()) {
            self.out.push(String::new());
        }
    }

    fn finish(mut self) -> String {
        self.flush_line("");
        self.flush_links();
        if !self.deferred.is_empty() {
            self.blank();
            for link in mem::take(&mut self.deferred) {
                self.out.push(link.render(true));
            }
        }
        while matches!(self.out.last(), Some(l) if l.is_empty()) {
            self.out.pop();
        }
        self.out.join("\n")
    }
}
