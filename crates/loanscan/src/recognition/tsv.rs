//! Word rows from Tesseract's TSV output.

use super::RawWord;
use crate::types::BoundingBox;

/// TSV `level` value of word rows.
pub const TSV_WORD_LEVEL: u32 = 5;

/// Columns in a complete TSV row.
pub const TSV_MIN_FIELDS: usize = 12;

/// Extract word-level rows from Tesseract TSV output.
///
/// The header line, rows of other levels, short rows and rows without text are
/// skipped. Confidence is left on the engine's 0-100 scale; rows Tesseract marks
/// with `-1` are kept so the caller decides what to discard.
pub fn parse_tsv_words(tsv_data: &str) -> Vec<RawWord> {
    let mut words = Vec::new();

    for (line_num, line) in tsv_data.lines().enumerate() {
        if line_num == 0 {
            continue;
        }

        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < TSV_MIN_FIELDS {
            continue;
        }

        let level = fields[0].trim().parse::<u32>().unwrap_or(0);
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let text = fields[11].trim();
        if text.is_empty() {
            continue;
        }

        words.push(RawWord {
            text: text.to_string(),
            confidence: fields[10].trim().parse::<f64>().unwrap_or(-1.0),
            bbox: BoundingBox::new(
                fields[6].trim().parse().unwrap_or(0),
                fields[7].trim().parse().unwrap_or(0),
                fields[8].trim().parse().unwrap_or(0),
                fields[9].trim().parse().unwrap_or(0),
            ),
        });
    }

    words
}
