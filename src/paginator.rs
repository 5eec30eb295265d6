//! Page label sequence generator.
//!
//! Turns a start value, a numbering type, a mode and a scope into an ordered
//! sequence of logical page labels and applies it, cyclically, to a slice of
//! page labels. The generator has no side effects beyond the passed-in slice.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const UNCOUNTED_LABEL: &str = "uncounted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationType {
    Arabic,
    Roman,
    Uncounted,
    Freetext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginationMode {
    Pages,
    Columns,
    Foliation,
    Rectoverso,
    RectoversoFoliation,
    DoublePages,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationScope {
    #[serde(rename = "FROMFIRST")]
    FromFirst,
    #[serde(rename = "SELECTED")]
    Selected,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("no pages selected")]
    EmptySelection,
    #[error("'{0}' is not a valid arabic start value")]
    InvalidArabic(String),
    #[error("'{0}' is not a valid roman numeral")]
    InvalidRoman(String),
    #[error("selected page {index} is out of range ({len} pages)")]
    SelectionOutOfRange { index: usize, len: usize },
}

/// One pagination run over a set of pages.
#[derive(Debug, Clone)]
pub struct Paginator {
    kind: PaginationType,
    start_value: String,
    mode: PaginationMode,
    scope: PaginationScope,
    selected: Vec<usize>,
    fictitious: bool,
    separator: String,
}

impl Paginator {
    pub fn new(kind: PaginationType, start_value: impl Into<String>) -> Self {
        Self {
            kind,
            start_value: start_value.into(),
            mode: PaginationMode::Pages,
            scope: PaginationScope::FromFirst,
            selected: Vec::new(),
            fictitious: false,
            separator: " ".to_string(),
        }
    }

    pub fn mode(mut self, mode: PaginationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn scope(mut self, scope: PaginationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn selected(mut self, selected: Vec<usize>) -> Self {
        self.selected = selected;
        self
    }

    pub fn fictitious(mut self, fictitious: bool) -> Self {
        self.fictitious = fictitious;
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Generates the label sequence for `page_count` target pages without applying it.
    pub fn sequence(&self, page_count: usize) -> Result<Vec<String>, PaginationError> {
        self.validate(page_count)?;
        let base = self.base_value()?;
        let count = match self.scope {
            PaginationScope::FromFirst => page_count - self.first_selected(),
            PaginationScope::Selected => self.selected.len(),
        };

        let mut sequence = self.raw_sequence(base, count)?;
        if self.fictitious {
            sequence = sequence.into_iter().map(|label| format!("[{}]", label)).collect();
        }
        Ok(self.post_process(sequence))
    }

    /// Applies the generated sequence to `labels`, wrapping when the sequence is exhausted.
    pub fn run(&self, labels: &mut [String]) -> Result<(), PaginationError> {
        let sequence = self.sequence(labels.len())?;
        if sequence.is_empty() {
            return Ok(());
        }
        match self.scope {
            PaginationScope::FromFirst => {
                let first = self.first_selected();
                for (offset, label) in labels[first..].iter_mut().enumerate() {
                    *label = sequence[offset % sequence.len()].clone();
                }
            }
            PaginationScope::Selected => {
                for (offset, &index) in self.selected.iter().enumerate() {
                    labels[index] = sequence[offset % sequence.len()].clone();
                }
            }
        }
        Ok(())
    }

    // Pagination from the first page starts at the lowest selected position.
    fn first_selected(&self) -> usize {
        self.selected.iter().copied().min().unwrap_or(0)
    }

    fn validate(&self, page_count: usize) -> Result<(), PaginationError> {
        if self.selected.is_empty() {
            return Err(PaginationError::EmptySelection);
        }
        if let Some(&index) = self.selected.iter().find(|&&i| i >= page_count) {
            return Err(PaginationError::SelectionOutOfRange { index, len: page_count });
        }
        Ok(())
    }

    fn base_value(&self) -> Result<i64, PaginationError> {
        match self.kind {
            PaginationType::Arabic => self
                .start_value
                .trim()
                .parse::<i64>()
                .map_err(|_| PaginationError::InvalidArabic(self.start_value.clone())),
            PaginationType::Roman => roman::parse(self.start_value.trim())
                .map(i64::from)
                .ok_or_else(|| PaginationError::InvalidRoman(self.start_value.clone())),
            PaginationType::Uncounted | PaginationType::Freetext => Ok(1),
        }
    }

    fn increment(&self) -> i64 {
        match self.mode {
            PaginationMode::Columns | PaginationMode::DoublePages => 2,
            _ => 1,
        }
    }

    // Spans `count * increment` values of the number line starting at `base`.
    // Columns label every second value, double pages label all of them in pairs.
    fn raw_sequence(&self, base: i64, count: usize) -> Result<Vec<String>, PaginationError> {
        match self.kind {
            PaginationType::Uncounted => Ok(vec![UNCOUNTED_LABEL.to_string()]),
            PaginationType::Freetext => Ok(vec![self.start_value.clone()]),
            PaginationType::Arabic | PaginationType::Roman => {
                let end = i64::try_from(count)
                    .ok()
                    .and_then(|count| count.checked_mul(self.increment()))
                    .and_then(|span| base.checked_add(span))
                    .ok_or_else(|| match self.kind {
                        PaginationType::Roman => PaginationError::InvalidRoman(self.start_value.clone()),
                        _ => PaginationError::InvalidArabic(self.start_value.clone()),
                    })?;
                let step = if self.mode == PaginationMode::Columns { 2 } else { 1 };
                let lowercase = self.kind == PaginationType::Roman
                    && self.start_value.chars().any(|c| c.is_ascii_lowercase());
                Ok((base..end)
                    .step_by(step)
                    .map(|value| match self.kind {
                        PaginationType::Roman => {
                            let numeral = roman::format(value.max(1) as u32);
                            if lowercase {
                                numeral.to_lowercase()
                            } else {
                                numeral
                            }
                        }
                        _ => value.to_string(),
                    })
                    .collect())
            }
        }
    }

    fn post_process(&self, sequence: Vec<String>) -> Vec<String> {
        let textual = matches!(self.kind, PaginationType::Uncounted | PaginationType::Freetext);
        match self.mode {
            PaginationMode::Pages | PaginationMode::Columns => sequence,
            PaginationMode::DoublePages => match self.kind {
                PaginationType::Uncounted => sequence,
                PaginationType::Freetext => scrunch(&duplicate(sequence), &self.separator),
                _ => scrunch(&sequence, &self.separator),
            },
            PaginationMode::Foliation | PaginationMode::Rectoverso | PaginationMode::RectoversoFoliation => {
                if textual {
                    return sequence;
                }
                let mut sequence = duplicate(sequence);
                if self.mode != PaginationMode::Foliation {
                    sequence = sequence
                        .into_iter()
                        .enumerate()
                        .map(|(i, label)| format!("{}{}", label, if i % 2 == 0 { "r" } else { "v" }))
                        .collect();
                }
                if self.mode == PaginationMode::RectoversoFoliation {
                    sequence.remove(0);
                    sequence = scrunch(&sequence, &self.separator);
                }
                sequence
            }
        }
    }
}

fn duplicate(sequence: Vec<String>) -> Vec<String> {
    sequence.into_iter().flat_map(|label| [label.clone(), label]).collect()
}

fn scrunch(sequence: &[String], separator: &str) -> Vec<String> {
    sequence
        .chunks(2)
        .map(|pair| match pair {
            [first, second] => format!("{}{}{}", first, separator, second),
            [single] => single.clone(),
            _ => String::new(),
        })
        .collect()
}

/// Roman numeral conversion used for page labels.
pub mod roman {
    const NUMERALS: [(u32, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    /// Formats a positive number as an upper-case roman numeral. Values above 3999
    /// repeat `M`.
    pub fn format(mut value: u32) -> String {
        let mut out = String::new();
        for &(weight, numeral) in NUMERALS.iter() {
            while value >= weight {
                out.push_str(numeral);
                value -= weight;
            }
        }
        out
    }

    /// Parses a roman numeral (either case). Only canonical spellings are accepted,
    /// so `IIII` or `IC` yield `None`.
    pub fn parse(input: &str) -> Option<u32> {
        if input.is_empty() {
            return None;
        }
        let upper = input.to_ascii_uppercase();
        let mut total: u32 = 0;
        let mut previous = 0;
        for c in upper.chars().rev() {
            let value = match c {
                'I' => 1,
                'V' => 5,
                'X' => 10,
                'L' => 50,
                'C' => 100,
                'D' => 500,
                'M' => 1000,
                _ => return None,
            };
            if value < previous {
                total = total.checked_sub(value)?;
            } else {
                total = total.checked_add(value)?;
                previous = value;
            }
        }
        if total == 0 || format(total) != upper {
            return None;
        }
        Some(total)
    }
}
