use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Text(Vec<String>),
    List(Vec<Vec<String>>),
}

impl Column {
    fn len(&self) -> usize {
        match self {
            Column::Text(v) => v.len(),
            Column::List(v) => v.len(),
        }
    }
}

/// Columnar view over a loaded sink. Columns are keyed, and therefore
/// ordered, by field name; rows keep sink order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: BTreeMap<String, Column>,
}

impl Table {
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut text = Vec::with_capacity(records.len());
        let mut author = Vec::with_capacity(records.len());
        let mut tags = Vec::with_capacity(records.len());
        for r in records {
            text.push(r.text);
            author.push(r.author);
            tags.push(r.tags);
        }

        let mut columns = BTreeMap::new();
        columns.insert("text".to_string(), Column::Text(text));
        columns.insert("author".to_string(), Column::Text(author));
        columns.insert("tags".to_string(), Column::List(tags));
        Table { columns }
    }

    pub fn len(&self) -> usize {
        self.columns.values().next().map(Column::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }

    fn text_at(&self, name: &str, i: usize) -> Option<String> {
        match self.columns.get(name)? {
            Column::Text(v) => v.get(i).cloned(),
            Column::List(_) => None,
        }
    }

    pub fn row(&self, i: usize) -> Option<Record> {
        let tags = match self.columns.get("tags")? {
            Column::List(v) => v.get(i)?.clone(),
            Column::Text(_) => return None,
        };
        Some(Record {
            text: self.text_at("text", i)?,
            author: self.text_at("author", i)?,
            tags,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.len()).filter_map(move |i| self.row(i))
    }

    /// Fixed-width preview of the first `limit` rows.
    pub fn render(&self, limit: usize) -> String {
        let mut out = format!(
            "{:>3} | {:<20} | {:<30} | {:<50}\n",
            "#", "author", "tags", "text"
        );
        out.push_str(&"-".repeat(112));
        out.push('\n');

        for (i, r) in self.rows().take(limit).enumerate() {
            out.push_str(&format!(
                "{:>3} | {:<20} | {:<30} | {:<50}\n",
                i,
                truncate(&r.author, 20),
                truncate(&r.tags.join(", "), 30),
                truncate(&r.text, 50)
            ));
        }

        out.push_str(&format!("\n[{} rows x {} columns]", self.len(), self.columns.len()));
        out
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}
