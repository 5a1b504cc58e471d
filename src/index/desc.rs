//! Parser for pacman `desc` records.
//!
//! ```text
//! %NAME%
//! foo
//!
//! %VERSION%
//! 1.0-1
//! ```

use std::collections::HashMap;

/// Fields of one `desc` file. Multi-line fields keep every value.
#[derive(Debug, Default)]
pub(crate) struct Desc {
    fields: HashMap<String, Vec<String>>,
}

impl Desc {
    pub(crate) fn parse(content: &str) -> Self {
        let mut fields = HashMap::new();
        let mut current: Option<String> = None;
        let mut values: Vec<String> = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.len() > 2 && line.starts_with('%') && line.ends_with('%') {
                if let Some(field) = current.take() {
                    fields.insert(field, std::mem::take(&mut values));
                }
                current = Some(line[1..line.len() - 1].to_string());
            } else if !line.is_empty() && current.is_some() {
                values.push(line.to_string());
            }
        }
        if let Some(field) = current {
            fields.insert(field, values);
        }

        Self { fields }
    }

    /// First value of `field`.
    pub(crate) fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}
