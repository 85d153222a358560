use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::record::Record;

static QUOTE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.quote").unwrap());
static TEXT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span.text").unwrap());
static AUTHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("small.author").unwrap());
static TAG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.tags a.tag").unwrap());

/// Records pulled from one document, plus how many containers were dropped.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    pub dropped: usize,
}

/// Pull one Record out of every quote container in `html`.
///
/// A container without a non-blank `text` or `author` is dropped whole; a
/// partial Record is never produced. Tags may be empty.
pub fn extract(html: &str) -> Extraction {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();

    for container in doc.select(&QUOTE_SEL) {
        match extract_one(container) {
            Some(record) => out.records.push(record),
            None => {
                debug!("Dropping quote container missing text or author");
                out.dropped += 1;
            }
        }
    }

    out
}

fn extract_one(container: ElementRef) -> Option<Record> {
    let text = first_text(container, &TEXT_SEL)?;
    let author = first_text(container, &AUTHOR_SEL)?;
    let tags = container
        .select(&TAG_SEL)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect();

    Some(Record { text, author, tags })
}

fn first_text(container: ElementRef, sel: &Selector) -> Option<String> {
    container
        .select(sel)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}
