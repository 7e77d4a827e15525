//! Publication date footer.

use crate::document::{Document, Element, Node};

/// Append `Published: <date>` and, when present, `Edited: <date>`.
pub fn add_footer(doc: &mut Document, publish_date: &str, edited_date: Option<&str>) {
    doc.children.push(footer_line("Published", publish_date));
    if let Some(edited) = edited_date {
        doc.children.push(footer_line("Edited", edited));
    }
}

fn footer_line(label: &str, date: &str) -> Node {
    Element::new("p")
        .with_attr("class", "footer")
        .with_child(Node::text(format!("{label}: {date}")))
        .into()
}
