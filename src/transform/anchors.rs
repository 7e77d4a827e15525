//! Header anchoring.

use crate::document::Document;
use crate::naming;
use std::collections::HashSet;

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Give every `h1`..`h6` an `id` derived from its text.
///
/// The first header with a given text keeps the bare id; later duplicates
/// get `-2`, `-3`, ... so every anchor on the page is unique.
pub fn anchor_headers(doc: &mut Document) {
    let mut used: HashSet<String> = HashSet::new();
    doc.for_each_element_mut(&mut |el| {
        if !HEADINGS.contains(&el.tag.as_str()) {
            return;
        }
        let base = naming::anchor_id(&el.text_content());
        let mut id = base.clone();
        let mut n = 2;
        while used.contains(&id) {
            id = format!("{base}-{n}");
            n += 1;
        }
        used.insert(id.clone());
        el.set_attr("id", id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::parse_markdown;

    fn ids(markdown: &str) -> Vec<String> {
        let mut doc = parse_markdown(markdown);
        anchor_headers(&mut doc);
        doc.elements()
            .into_iter()
            .filter_map(|el| el.attr("id").map(String::from))
            .collect()
    }

    #[test]
    fn header_text_becomes_id() {
        assert_eq!(ids("## My Section"), vec!["my-section"]);
    }

    #[test]
    fn all_levels_are_anchored() {
        assert_eq!(
            ids("# One\n\n## Two\n\n###### Six"),
            vec!["one", "two", "six"]
        );
    }

    #[test]
    fn inline_markup_contributes_text() {
        assert_eq!(ids("## The *fast* path"), vec!["the-fast-path"]);
    }

    #[test]
    fn duplicates_get_numeric_suffix() {
        assert_eq!(
            ids("## Notes\n\n## Notes\n\n## Notes"),
            vec!["notes", "notes-2", "notes-3"]
        );
    }

    #[test]
    fn suffix_skips_ids_already_taken() {
        assert_eq!(
            ids("## A-2\n\n## A\n\n## A"),
            vec!["a-2", "a", "a-3"]
        );
    }

    #[test]
    fn non_headers_untouched() {
        assert!(ids("Plain paragraph.").is_empty());
    }
}
