use serde::{Deserialize, Serialize};

/// One stylized fact under assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Stable identifier, unique within the catalog (`1..=N`).
    pub id: u32,
    /// Section (category) the fact belongs to.
    pub section: String,
    /// The claim itself.
    pub text: String,
    /// File name of the table the fact was loaded from.
    pub source_file: String,
}

impl Fact {
    pub fn new(
        id: u32,
        section: impl Into<String>,
        text: impl Into<String>,
        source_file: impl Into<String>,
    ) -> Self {
        Self {
            id,
            section: section.into(),
            text: text.into(),
            source_file: source_file.into(),
        }
    }

    /// Returns the first `max_chars` characters of the text (for log lines).
    pub fn preview(&self, max_chars: usize) -> &str {
        match self.text.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.text[..idx],
            None => &self.text,
        }
    }
}

/// Converts a table file stem (`energy_allocation`) into a section name (`Energy Allocation`).
pub fn section_name_from_stem(stem: &str) -> String {
    stem.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
