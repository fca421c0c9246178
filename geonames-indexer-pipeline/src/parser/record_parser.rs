//! Tab-separated record parser.

use crate::errors::ParseError;
use geonames_indexer_shared::RawRecord;

/// Splits delimited lines into `RawRecord`s.
///
/// Empty fields are preserved: consecutive delimiters produce empty strings,
/// never a collapsed field. GeoNames dumps are unquoted, so quoting is off by
/// default and a `"` is an ordinary character. With quoting enabled a field
/// that starts with the quote character runs to the matching closing quote,
/// and a doubled quote inside it stands for one literal quote.
#[derive(Debug, Clone)]
pub struct RecordParser {
    delimiter: char,
    quote: Option<char>,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            quote: None,
        }
    }
}

impl RecordParser {
    /// Create a tab-separated parser without quoting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable quoted fields using `quote` as the quote character.
    pub fn with_quote(mut self, quote: char) -> Self {
        self.quote = Some(quote);
        self
    }

    /// Use a delimiter other than tab.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Parse one line. A trailing `\n` or `\r\n` is ignored.
    pub fn parse(&self, line: &[u8]) -> Result<RawRecord, ParseError> {
        let line = strip_line_ending(line);
        let text = std::str::from_utf8(line).map_err(|e| ParseError::InvalidEncoding(e.to_string()))?;

        let fields = match self.quote {
            None => text.split(self.delimiter).map(str::to_string).collect(),
            Some(quote) => self.split_quoted(text, quote)?,
        };

        Ok(RawRecord::new(fields))
    }

    fn split_quoted(&self, text: &str, quote: char) -> Result<Vec<String>, ParseError> {
        let mut fields = Vec::new();
        let mut chars = text.char_indices().peekable();

        loop {
            let mut field = String::new();

            match chars.peek() {
                Some(&(start, c)) if c == quote => {
                    chars.next();
                    loop {
                        match chars.next() {
                            Some((_, c)) if c == quote => {
                                if matches!(chars.peek(), Some(&(_, next)) if next == quote) {
                                    chars.next();
                                    field.push(quote);
                                } else {
                                    break;
                                }
                            }
                            Some((_, c)) => field.push(c),
                            None => {
                                return Err(ParseError::malformed(format!(
                                    "unterminated quoted field starting at byte {}",
                                    start
                                )))
                            }
                        }
                    }

                    match chars.next() {
                        None => {
                            fields.push(field);
                            return Ok(fields);
                        }
                        Some((_, c)) if c == self.delimiter => fields.push(field),
                        Some((position, c)) => {
                            return Err(ParseError::malformed(format!(
                                "unexpected {:?} after closing quote at byte {}",
                                c, position
                            )))
                        }
                    }
                }
                _ => loop {
                    match chars.next() {
                        Some((_, c)) if c == self.delimiter => {
                            fields.push(field);
                            break;
                        }
                        Some((_, c)) => field.push(c),
                        None => {
                            fields.push(field);
                            return Ok(fields);
                        }
                    }
                },
            }
        }
    }
}

/// Drop a trailing `\n` and a `\r` before it.
pub(crate) fn strip_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geonames_indexer_shared::fields;

    const PARIS: &str = "1\tParis\tParis\t\t48.8566\t2.3522\tP\tPPLC\tFR\t\t11\t\t\t\t2148000\t35\t42\tEurope/Paris\t2023-01-01\n";

    #[test]
    fn test_parse_full_record() {
        let record = RecordParser::new().parse(PARIS.as_bytes()).unwrap();

        assert_eq!(record.len(), fields::COUNT);
        assert_eq!(record.field(fields::GEONAME_ID), "1");
        assert_eq!(record.field(fields::ALTERNATE_NAMES), "");
        assert_eq!(record.field(fields::TIMEZONE), "Europe/Paris");
        assert_eq!(record.field(fields::MODIFICATION_DATE), "2023-01-01");
    }

    #[test]
    fn test_consecutive_delimiters_preserved() {
        let record = RecordParser::new().parse(b"a\t\t\tb").unwrap();
        assert_eq!(record.fields(), &["a", "", "", "b"]);
    }

    #[test]
    fn test_crlf_stripped() {
        let record = RecordParser::new().parse(b"a\tb\r\n").unwrap();
        assert_eq!(record.fields(), &["a", "b"]);
    }

    #[test]
    fn test_short_line_accepted() {
        let record = RecordParser::new().parse(b"42\tSomewhere").unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.field(fields::POPULATION), "");
    }

    #[test]
    fn test_quote_is_literal_by_default() {
        let record = RecordParser::new().parse(b"1\t\"Quoted\" name\tx").unwrap();
        assert_eq!(record.field(1), "\"Quoted\" name");
    }

    #[test]
    fn test_invalid_utf8() {
        let result = RecordParser::new().parse(b"1\t\xff\xfe");
        assert!(matches!(result, Err(ParseError::InvalidEncoding(_))));
    }

    #[test]
    fn test_quoted_fields() {
        let parser = RecordParser::new().with_quote('"');
        let record = parser.parse(b"1\t\"tab\there\"\t\"say \"\"hi\"\"\"\t").unwrap();

        assert_eq!(record.fields(), &["1", "tab\there", "say \"hi\"", ""]);
    }

    #[test]
    fn test_unterminated_quote_is_malformed() {
        let parser = RecordParser::new().with_quote('"');
        let result = parser.parse(b"1\t\"never closed\tx");

        assert!(matches!(result, Err(ParseError::MalformedLine(_))));
    }

    #[test]
    fn test_garbage_after_closing_quote_is_malformed() {
        let parser = RecordParser::new().with_quote('"');
        let result = parser.parse(b"1\t\"a\"b\tx");

        assert!(matches!(result, Err(ParseError::MalformedLine(_))));
    }

    #[test]
    fn test_custom_delimiter() {
        let record = RecordParser::new().with_delimiter(',').parse(b"a,b,,c").unwrap();
        assert_eq!(record.fields(), &["a", "b", "", "c"]);
    }
}
