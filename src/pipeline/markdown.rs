//! Markdown projection: walk the sanitised tree and emit Markdown.
//!
//! Every tag the projector understands maps to one [`Rule`] in a static
//! table; any other tag contributes nothing itself and its children are
//! rendered in order. Text nodes are copied verbatim. Each node renders to
//! its own string and parents concatenate, so any subtree can be rendered
//! and tested on its own.
//!
//! After the walk, runs of three or more newlines collapse to a single blank
//! line and the result is trimmed. Output depends only on the tree.

use crate::pipeline::dom::{Document, Element, Node};
use crate::pipeline::postprocess::finish_markdown;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// How a tag is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Heading(usize),
    Paragraph,
    Link,
    Image,
    Division,
    Table,
    BulletList,
    NumberedList,
    Blockquote,
    Preformatted,
    InlineCode,
    LineBreak,
    ThematicBreak,
    Strong,
    Emphasis,
    Address,
    /// Subtree is not document content.
    Dropped,
}

static RULES: Lazy<HashMap<&'static str, Rule>> = Lazy::new(|| {
    HashMap::from([
        ("h1", Rule::Heading(1)),
        ("h2", Rule::Heading(2)),
        ("h3", Rule::Heading(3)),
        ("h4", Rule::Heading(4)),
        ("h5", Rule::Heading(5)),
        ("h6", Rule::Heading(6)),
        ("p", Rule::Paragraph),
        ("a", Rule::Link),
        ("img", Rule::Image),
        ("div", Rule::Division),
        ("table", Rule::Table),
        ("ul", Rule::BulletList),
        ("ol", Rule::NumberedList),
        ("blockquote", Rule::Blockquote),
        ("pre", Rule::Preformatted),
        ("code", Rule::InlineCode),
        ("br", Rule::LineBreak),
        ("hr", Rule::ThematicBreak),
        ("strong", Rule::Strong),
        ("b", Rule::Strong),
        ("em", Rule::Emphasis),
        ("i", Rule::Emphasis),
        ("address", Rule::Address),
        ("script", Rule::Dropped),
        ("style", Rule::Dropped),
    ])
});

/// Project a whole document to Markdown.
pub fn project(doc: &Document) -> String {
    let raw: String = doc.body.iter().map(render_node).collect();
    finish_markdown(&raw)
}

/// Parse HTML (optionally fenced) and project it to Markdown.
pub fn html_to_markdown(html: &str) -> String {
    project(&Document::parse(html))
}

/// Render one node without the final blank-line collapse and trim.
pub fn render_node(node: &Node) -> String {
    match node {
        Node::Text(t) => t.clone(),
        Node::Element(el) => render_element(el),
    }
}

fn render_element(el: &Element) -> String {
    let Some(rule) = RULES.get(el.tag.as_str()).copied() else {
        return render_children(el);
    };

    match rule {
        Rule::Heading(level) => format!("{} {}\n\n", "#".repeat(level), trimmed_text(el)),
        Rule::Paragraph => format!("{}\n\n", trimmed_text(el)),
        Rule::Link => format!("[{}]({})", trimmed_text(el), el.attr("href").unwrap_or("")),
        Rule::Image => format!(
            "![{}]({})",
            el.attr("alt").unwrap_or(""),
            el.attr("src").unwrap_or("")
        ),
        Rule::Division => {
            let mut out = render_children(el);
            out.push('\n');
            out
        }
        Rule::Table => render_table(el),
        Rule::BulletList => {
            let mut out: String = list_items(el)
                .map(|li| format!("* {}\n", trimmed_text(li)))
                .collect();
            out.push('\n');
            out
        }
        Rule::NumberedList => {
            let mut out: String = list_items(el)
                .enumerate()
                .map(|(i, li)| format!("{}. {}\n", i + 1, trimmed_text(li)))
                .collect();
            out.push('\n');
            out
        }
        Rule::Blockquote => {
            let mut out: String = trimmed_text(el)
                .split('\n')
                .map(|line| format!("> {line}\n"))
                .collect();
            out.push('\n');
            out
        }
        Rule::Preformatted => format!("```\n{}\n```\n\n", trimmed_text(el)),
        Rule::InlineCode => format!("`{}`", trimmed_text(el)),
        Rule::LineBreak => "\n".to_string(),
        Rule::ThematicBreak => "---\n\n".to_string(),
        Rule::Strong => format!("**{}**", trimmed_text(el)),
        Rule::Emphasis => format!("*{}*", trimmed_text(el)),
        Rule::Address => format!("*{}*\n\n", trimmed_text(el)),
        Rule::Dropped => String::new(),
    }
}

fn render_children(el: &Element) -> String {
    el.children.iter().map(render_node).collect()
}

fn trimmed_text(el: &Element) -> String {
    el.text_content().trim().to_string()
}

/// Direct `li` children; nested lists stay inside their item's text.
fn list_items(list: &Element) -> impl Iterator<Item = &Element> {
    list.child_elements().filter(|c| c.tag == "li")
}

// ── Tables ───────────────────────────────────────────────────────────────────

fn render_table(table: &Element) -> String {
    let thead = table.find("thead");
    let headers: Vec<String> = match thead {
        Some(thead) => cell_texts(thead, &["th"]),
        None => table
            .find("tr")
            .map(|row| cell_texts(row, &["th", "td"]))
            .unwrap_or_default(),
    };

    let mut out = String::new();
    if !headers.is_empty() {
        out.push_str(&pipe_row(&headers));
        out.push_str(&pipe_row(&vec!["---".to_string(); headers.len()]));
    }

    // Without a thead, the first row already became the header.
    let skip = usize::from(thead.is_none() && !headers.is_empty());
    for row in body_rows(table).into_iter().skip(skip) {
        let cells = cell_texts(row, &["td", "th"]);
        if !cells.is_empty() {
            out.push_str(&pipe_row(&cells));
        }
    }

    out.push('\n');
    out
}

/// Rows outside `thead`, in document order.
fn body_rows(table: &Element) -> Vec<&Element> {
    let mut rows = Vec::new();
    for section in table.child_elements().filter(|c| c.tag != "thead") {
        if section.tag == "tr" {
            rows.push(section);
        } else {
            rows.extend(section.find_all(&["tr"]));
        }
    }
    rows
}

fn cell_texts(scope: &Element, tags: &[&str]) -> Vec<String> {
    scope.find_all(tags).into_iter().map(trimmed_text).collect()
}

fn pipe_row(cells: &[String]) -> String {
    format!("| {} |\n", cells.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Render the first element of the parsed body.
    fn render_first(html: &str) -> String {
        let doc = Document::parse(html);
        let node = doc
            .body
            .iter()
            .find(|n| matches!(n, Node::Element(_)))
            .expect("an element");
        render_node(node)
    }

    #[test]
    fn headings() {
        assert_eq!(render_first("<h1> Title </h1>"), "# Title\n\n");
        assert_eq!(render_first("<h3>Sub</h3>"), "### Sub\n\n");
        assert_eq!(render_first("<h6>x</h6>"), "###### x\n\n");
    }

    #[test]
    fn paragraph_link_image() {
        assert_eq!(render_first("<p>  hello <b>world</b> </p>"), "hello world\n\n");
        assert_eq!(
            render_first(r#"<a href="https://x.org"> site </a>"#),
            "[site](https://x.org)"
        );
        assert_eq!(render_first("<a>bare</a>"), "[bare]()");
        assert_eq!(
            render_first(r#"<img src="img-1.jpg" alt="fig">"#),
            "![fig](img-1.jpg)"
        );
        assert_eq!(render_first("<img>"), "![]()");
    }

    #[test]
    fn table_with_thead() {
        let html = "<table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table>";
        assert_eq!(
            render_first(html),
            "| A | B |\n| --- | --- |\n| 1 | 2 |\n\n"
        );
    }

    #[test]
    fn table_first_row_becomes_header() {
        let html = "<table><tr><td>Name</td><td>Qty</td></tr><tr><td>x</td><td>3</td></tr><tr><td>y</td><td>4</td></tr></table>";
        assert_eq!(
            render_first(html),
            "| Name | Qty |\n| --- | --- |\n| x | 3 |\n| y | 4 |\n\n"
        );
    }

    #[test]
    fn table_without_header_cells() {
        let html = "<table><thead><tr><td>not th</td></tr></thead><tbody><tr><td>1</td></tr></tbody></table>";
        assert_eq!(render_first(html), "| 1 |\n\n");
    }

    #[test]
    fn lists() {
        assert_eq!(render_first("<ul><li>x</li><li>y</li></ul>"), "* x\n* y\n\n");
        assert_eq!(
            render_first("<ol><li>x</li><li>y</li></ol>"),
            "1. x\n2. y\n\n"
        );
    }

    #[test]
    fn nested_list_items_are_not_direct() {
        let html = "<ul><li>a<ul><li>b</li></ul></li><li>c</li></ul>";
        assert_eq!(render_first(html), "* ab\n* c\n\n");
    }

    #[test]
    fn blockquote_prefixes_every_line() {
        assert_eq!(
            render_first("<blockquote>\n line one\nline two\n</blockquote>"),
            "> line one\n> line two\n\n"
        );
    }

    #[test]
    fn code_and_inline_styles() {
        assert_eq!(render_first("<pre>\nfn main() {}\n</pre>"), "```\nfn main() {}\n```\n\n");
        assert_eq!(render_first("<code> x = 1 </code>"), "`x = 1`");
        assert_eq!(render_first("<strong>s</strong>"), "**s**");
        assert_eq!(render_first("<b>s</b>"), "**s**");
        assert_eq!(render_first("<em>e</em>"), "*e*");
        assert_eq!(render_first("<i>e</i>"), "*e*");
        assert_eq!(render_first("<address>1 Main St</address>"), "*1 Main St*\n\n");
        assert_eq!(render_first("<hr>"), "---\n\n");
        assert_eq!(render_first("<br>"), "\n");
    }

    #[test]
    fn div_recurses_and_appends_newline() {
        assert_eq!(
            render_first("<div>a<b>b</b><img src=\"s\"></div>"),
            "a**b**![](s)\n"
        );
    }

    #[test]
    fn unknown_tags_recurse_without_markup() {
        assert_eq!(render_first("<span>a <em>b</em></span>"), "a *b*");
        assert_eq!(render_first("<section><p>x</p></section>"), "x\n\n");
    }

    #[test]
    fn script_and_style_are_dropped() {
        let md = html_to_markdown("<p>keep</p><script>var x;</script><div><style>p{}</style>t</div>");
        assert_eq!(md, "keep\n\nt");
    }

    #[test]
    fn collapses_blank_lines_and_trims() {
        let md = html_to_markdown("<h1>T</h1><p>a</p><hr><div><p>b</p></div><p>c</p>");
        assert_eq!(md, "# T\n\na\n\n---\n\nb\n\nc");
        assert!(!md.contains("\n\n\n"));
    }

    #[test]
    fn accepts_fenced_html() {
        let md = html_to_markdown("```html\n<html><body>\n<h2>S</h2>\n<p>t</p>\n</body></html>\n```");
        assert_eq!(md, "## S\n\nt");
    }

    #[test]
    fn projection_is_deterministic() {
        let html = "<div><h1>x</h1><table><tr><th>a</th></tr><tr><td>1</td></tr></table></div>";
        assert_eq!(html_to_markdown(html), html_to_markdown(html));
    }
}
