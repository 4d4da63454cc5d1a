//! Minimal HTML table extraction for pricing pages
//!
//! Pricing pages are scanned with regular expressions over their tag
//! structure. This is enough for server-rendered `<table>` markup and
//! nothing more; anything client-rendered simply yields no tables.

use regex::Regex;
use std::sync::LazyLock;

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>").unwrap());
static THEAD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<thead\b[^>]*>(.*?)</thead>").unwrap());
static TBODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tbody\b[^>]*>(.*?)</tbody>").unwrap());
static TH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<th\b[^>]*>(.*?)</th>").unwrap());
static TR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static TD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").unwrap());
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<(h2|h3)\b[^>]*>(.*?)</(?:h2|h3)>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A table's header cells and its body rows, all as plain text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Body rows with exactly one cell per header
    pub fn complete_rows(&self) -> impl Iterator<Item = &Vec<String>> {
        self.rows.iter().filter(|r| r.len() == self.headers.len())
    }
}

/// Visible text of an HTML fragment: tags dropped, entities decoded, whitespace collapsed
pub fn text(fragment: &str) -> String {
    let without_tags = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(input: &str) -> String {
    ENTITY_RE
        .replace_all(input, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some(' '),
                    _ => None,
                }
            };
            decoded
                .map(|c| c.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn parse_table(inner: &str) -> Table {
    let headers = THEAD_RE
        .captures(inner)
        .map(|thead| {
            TH_RE
                .captures_iter(&thead[1])
                .map(|th| text(&th[1]))
                .collect()
        })
        .unwrap_or_default();

    let rows = TBODY_RE
        .captures(inner)
        .map(|tbody| {
            TR_RE
                .captures_iter(&tbody[1])
                .map(|tr| TD_RE.captures_iter(&tr[1]).map(|td| text(&td[1])).collect())
                .collect()
        })
        .unwrap_or_default();

    Table { headers, rows }
}

/// Every `<table>` in the document, in document order
pub fn tables(html: &str) -> Vec<Table> {
    TABLE_RE
        .captures_iter(html)
        .map(|caps| parse_table(&caps[1]))
        .collect()
}

/// Each `<h2>`/`<h3>` heading paired with the first table that follows it
///
/// Headings with no table anywhere after them are dropped. Several
/// headings may share one table when no other table sits between them.
pub fn headed_tables(html: &str) -> Vec<(String, Table)> {
    HEADING_RE
        .captures_iter(html)
        .filter_map(|caps| {
            let heading = text(&caps[2]);
            let end = caps.get(0)?.end();
            let table = TABLE_RE.captures(&html[end..])?;
            Some((heading, parse_table(&table[1])))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <h2>GPT-4o</h2>
        <table class="pricing">
          <thead><tr><th>Model</th><th>Input</th><th>Output</th></tr></thead>
          <tbody>
            <tr><td><b>gpt-4o</b></td><td>$2.50&nbsp;/ 1M</td><td>$10.00 / 1M</td></tr>
            <tr><td>broken row</td></tr>
          </tbody>
        </table>
        <h3>Embeddings &amp; more</h3>
        <table>
          <thead><tr><th>Tier</th><th>Price</th></tr></thead>
          <tbody><tr><td>Standard</td><td>$0.02</td></tr></tbody>
        </table>
    "#;

    #[test]
    fn test_text_strips_tags_and_entities() {
        assert_eq!(text("<b>a</b>&amp;<i> b </i>"), "a & b");
        assert_eq!(text("x&#39;s &#x41;"), "x's A");
        assert_eq!(text("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_tables_extracts_headers_and_rows() {
        let tables = tables(PAGE);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].headers, vec!["Model", "Input", "Output"]);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[0].complete_rows().count(), 1);
        assert_eq!(tables[0].rows[0][1], "$2.50 / 1M");
    }

    #[test]
    fn test_headed_tables_pairs_heading_with_next_table() {
        let headed = headed_tables(PAGE);
        assert_eq!(headed.len(), 2);
        assert_eq!(headed[0].0, "GPT-4o");
        assert_eq!(headed[1].0, "Embeddings & more");
        assert_eq!(headed[1].1.headers, vec!["Tier", "Price"]);
    }

    #[test]
    fn test_page_without_tables() {
        assert!(tables("<div id=root></div>").is_empty());
        assert!(headed_tables("<h2>Pricing</h2><p>Loading…</p>").is_empty());
    }
}
