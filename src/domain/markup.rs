//! Write-time rendering of post and comment bodies.
//!
//! `body_html` is never edited directly: it is always the output of
//! [`render_html`] for the current `body`, and [`RenderedBody`] is the only
//! way services receive one.

use std::collections::{HashMap, HashSet};

use linkify::{LinkFinder, LinkKind};
use pulldown_cmark::{html, Event, LinkType, Parser, Tag, TagEnd, TextMergeStream};

pub const ALLOWED_TAGS: [&str; 17] = [
    "a",
    "abbr",
    "acronym",
    "b",
    "blockquote",
    "code",
    "em",
    "i",
    "li",
    "ol",
    "pre",
    "strong",
    "ul",
    "h1",
    "h2",
    "h3",
    "p",
];

/// A raw body paired with its derived HTML.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBody {
    body: String,
    body_html: String,
}

impl RenderedBody {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        let body_html = render_html(&body);
        Self { body, body_html }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn body_html(&self) -> &str {
        &self.body_html
    }
}

/// Markdown to HTML, bare URLs turned into links, then reduced to the
/// allow-listed tag set.
pub fn render_html(body: &str) -> String {
    let events = autolink(TextMergeStream::new(Parser::new(body)));
    let mut rendered = String::with_capacity(body.len() * 3 / 2);
    html::push_html(&mut rendered, events.into_iter());
    sanitize(&rendered)
}

fn sanitize(rendered: &str) -> String {
    let tags: HashSet<&str> = ALLOWED_TAGS.into_iter().collect();
    let tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::from([
        ("a", HashSet::from(["href", "title"])),
        ("abbr", HashSet::from(["title"])),
        ("acronym", HashSet::from(["title"])),
    ]);

    ammonia::Builder::default()
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .link_rel(Some("nofollow"))
        .clean(rendered)
        .to_string()
        .trim()
        .to_string()
}

/// Raw HTML elements whose text is never linked.
const OPAQUE_HTML: [&str; 3] = ["a", "code", "pre"];

/// Wraps URLs found in plain text with link events. Text already inside a
/// link, image or code block is left alone, whether written as markdown or
/// as raw HTML.
fn autolink<'a>(events: impl Iterator<Item = Event<'a>>) -> Vec<Event<'a>> {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]);

    let mut out = Vec::new();
    let mut opaque_depth = 0usize;
    for event in events {
        match &event {
            Event::Start(Tag::Link { .. } | Tag::Image { .. } | Tag::CodeBlock(_)) => {
                opaque_depth += 1;
            }
            Event::End(TagEnd::Link | TagEnd::Image | TagEnd::CodeBlock) => {
                opaque_depth = opaque_depth.saturating_sub(1);
            }
            Event::Html(fragment) | Event::InlineHtml(fragment) => {
                opaque_depth = opaque_depth.saturating_add_signed(raw_opaque_delta(fragment));
            }
            _ => {}
        }

        match event {
            Event::Text(text) if opaque_depth == 0 => {
                for span in finder.spans(&text) {
                    let fragment = span.as_str().to_string();
                    match span.kind() {
                        Some(LinkKind::Url) => {
                            out.push(Event::Start(Tag::Link {
                                link_type: LinkType::Autolink,
                                dest_url: fragment.clone().into(),
                                title: "".into(),
                                id: "".into(),
                            }));
                            out.push(Event::Text(fragment.into()));
                            out.push(Event::End(TagEnd::Link));
                        }
                        _ => out.push(Event::Text(fragment.into())),
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Net change in raw `<a>`, `<code>` and `<pre>` nesting across `fragment`.
fn raw_opaque_delta(fragment: &str) -> isize {
    let lower = fragment.to_ascii_lowercase();
    let mut delta = 0isize;
    let mut rest = lower.as_str();
    while let Some(start) = rest.find('<') {
        rest = &rest[start + 1..];
        let (closing, tag) = match rest.strip_prefix('/') {
            Some(tag) => (true, tag),
            None => (false, rest),
        };
        let end = tag
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(tag.len());
        if OPAQUE_HTML.contains(&&tag[..end]) {
            delta += if closing { -1 } else { 1 };
        }
    }
    delta
}
