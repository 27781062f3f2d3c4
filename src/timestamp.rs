use regex::Regex;

use crate::parsers::message::TimestampText;

/// Outcome of classifying one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Year(String),
    /// The message has no timestamp element
    NoTimestamp,
    /// A timestamp exists but none of the date patterns matched
    Unmatched,
}

/// Maps timestamp text to a four-digit year.
///
/// Patterns are tried in order and the first match wins:
///
/// 1. `DD-Mon-YY` (`15-Jan-23`)
/// 2. `DD/MM/YYYY` (`15/01/2023`)
/// 3. `DD Month YYYY` (`15 January 2023`)
/// 4. `Month DD, YYYY` (`January 15, 2023`)
///
/// Two-digit years below 50 are read as 20xx, the rest as 19xx.
/// The classifier is immutable after construction and shared by all workers.
#[derive(Debug, Clone)]
pub struct YearClassifier {
    patterns: Vec<Regex>,
}

impl YearClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        // Year is always capture group 3
        let patterns = vec![
            // A two-digit year may run straight into text ("23PM") but not into more digits
            Regex::new(r"\b(\d{1,2})-(\w+)-(\d{2})(?:\D|$)")?,
            Regex::new(r"(\d{1,2})/(\d{2})/(\d{4})")?,
            Regex::new(r"(\d{1,2})\s+(\w+)\s+(\d{4})")?,
            Regex::new(r"(\w+)\s+(\d{1,2}),\s+(\d{4})")?,
        ];
        Ok(Self { patterns })
    }

    /// Year for a piece of timestamp text, if any pattern matches
    pub fn classify(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            re.captures(text)
                .and_then(|caps| caps.get(3))
                .and_then(|year| normalize_year(year.as_str()))
        })
    }

    /// Classify a message's timestamp element.
    ///
    /// The visible text is tried first, then the `title` attribute.
    pub fn classify_timestamp(&self, timestamp: Option<&TimestampText>) -> Classification {
        let Some(ts) = timestamp else {
            return Classification::NoTimestamp;
        };

        self.classify(&ts.text)
            .or_else(|| ts.title.as_deref().and_then(|title| self.classify(title)))
            .map(Classification::Year)
            .unwrap_or(Classification::Unmatched)
    }
}

/// Expand a matched year to four digits.
///
/// Returns `None` for anything that is not two or four ASCII digits.
pub fn normalize_year(year: &str) -> Option<String> {
    if !year.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match year.len() {
        4 => Some(year.to_string()),
        2 => {
            let value: u8 = year.parse().ok()?;
            let century = if value < 50 { "20" } else { "19" };
            Some(format!("{}{}", century, year))
        }
        _ => None,
    }
}
