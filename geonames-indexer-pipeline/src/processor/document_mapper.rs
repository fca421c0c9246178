//! Document mapper implementation.
//!
//! Transforms positional GeoNames records into `GeonameDocument` structures
//! for indexing.

use crate::errors::MappingError;
use geonames_indexer_shared::{fields, GeoPoint, GeonameDocument, MultiValue, RawRecord};

/// A field that could not be parsed and was replaced by its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldWarning {
    /// Document attribute name.
    pub field: &'static str,
    /// The source value that was rejected.
    pub value: String,
    /// Why it was rejected.
    pub reason: String,
}

/// Result of mapping one record.
#[derive(Debug, Clone)]
pub struct MappedDocument {
    pub document: GeonameDocument,
    /// Soft problems found while mapping; the document is still valid.
    pub warnings: Vec<FieldWarning>,
}

/// Maps raw records into documents.
///
/// The mapper is responsible for:
/// - Parsing the id, which must be valid since it is the upsert key
/// - Coercing numeric and coordinate fields, defaulting to zero on failure
/// - Splitting multi-valued fields, omitting them when the source is empty
/// - Trimming the remaining string fields
#[derive(Debug, Clone)]
pub struct DocumentMapper {
    multi_value_delimiter: char,
}

impl Default for DocumentMapper {
    fn default() -> Self {
        Self {
            multi_value_delimiter: ',',
        }
    }
}

impl DocumentMapper {
    /// Create a mapper that splits multi-valued fields on commas.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a single record.
    ///
    /// # Returns
    ///
    /// * `Ok(MappedDocument)` - The document, with any coercion warnings
    /// * `Err(MappingError::InvalidId)` - If the id column is not a non-negative integer
    pub fn map(&self, raw: &RawRecord) -> Result<MappedDocument, MappingError> {
        let id = Self::parse_id(raw.field(fields::GEONAME_ID))?;
        let mut warnings = Vec::new();

        let location = GeoPoint::new(
            Self::parse_coordinate("location.lat", raw.field(fields::LATITUDE), &mut warnings),
            Self::parse_coordinate("location.lon", raw.field(fields::LONGITUDE), &mut warnings),
        );

        let text = |index: usize| raw.field(index).trim().to_string();

        let document = GeonameDocument {
            id,
            name: text(fields::NAME),
            ascii_name: text(fields::ASCII_NAME),
            alternate_names: MultiValue::split(
                raw.field(fields::ALTERNATE_NAMES),
                self.multi_value_delimiter,
            ),
            location,
            feature_class: text(fields::FEATURE_CLASS),
            feature_code: text(fields::FEATURE_CODE),
            country_code: text(fields::COUNTRY_CODE),
            cc2: MultiValue::split(raw.field(fields::CC2), self.multi_value_delimiter),
            admin1_code: text(fields::ADMIN1_CODE),
            admin2_code: text(fields::ADMIN2_CODE),
            admin3_code: text(fields::ADMIN3_CODE),
            admin4_code: text(fields::ADMIN4_CODE),
            population: Self::parse_integer("population", raw.field(fields::POPULATION), &mut warnings),
            elevation: Self::parse_integer("elevation", raw.field(fields::ELEVATION), &mut warnings),
            dem: Self::parse_integer("dem", raw.field(fields::DEM), &mut warnings),
            timezone: text(fields::TIMEZONE),
            modification_date: text(fields::MODIFICATION_DATE),
        };

        Ok(MappedDocument { document, warnings })
    }

    fn parse_id(value: &str) -> Result<u64, MappingError> {
        value
            .trim()
            .parse::<u64>()
            .map_err(|e| MappingError::InvalidId {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Empty integer fields are common in dumps and default silently.
    fn parse_integer(field: &'static str, value: &str, warnings: &mut Vec<FieldWarning>) -> i64 {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return 0;
        }

        match trimmed.parse::<i64>() {
            Ok(parsed) => parsed,
            Err(e) => {
                warnings.push(FieldWarning {
                    field,
                    value: value.to_string(),
                    reason: e.to_string(),
                });
                0
            }
        }
    }

    fn parse_coordinate(field: &'static str, value: &str, warnings: &mut Vec<FieldWarning>) -> f64 {
        let reason = match value.trim().parse::<f64>() {
            Ok(parsed) if parsed.is_finite() => return parsed,
            Ok(_) => "not a finite number".to_string(),
            Err(e) => e.to_string(),
        };

        warnings.push(FieldWarning {
            field,
            value: value.to_string(),
            reason,
        });
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(line: &str) -> RawRecord {
        RawRecord::new(line.split('\t').map(str::to_string).collect())
    }

    const PARIS: &str = "1\tParis\tParis\t\t48.8566\t2.3522\tP\tPPLC\tFR\t\t11\t\t\t\t2148000\t35\t42\tEurope/Paris\t2023-01-01";

    #[test]
    fn test_map_full_record() {
        let mapped = DocumentMapper::new().map(&record(PARIS)).unwrap();
        let doc = mapped.document;

        assert_eq!(doc.id, 1);
        assert_eq!(doc.name, "Paris");
        assert_eq!(doc.ascii_name, "Paris");
        assert!(doc.alternate_names.is_none());
        assert_eq!(doc.location, GeoPoint::new(48.8566, 2.3522));
        assert_eq!(doc.feature_class, "P");
        assert_eq!(doc.feature_code, "PPLC");
        assert_eq!(doc.country_code, "FR");
        assert!(doc.cc2.is_none());
        assert_eq!(doc.admin1_code, "11");
        assert_eq!(doc.admin2_code, "");
        assert_eq!(doc.population, 2148000);
        assert_eq!(doc.elevation, 35);
        assert_eq!(doc.dem, 42);
        assert_eq!(doc.timezone, "Europe/Paris");
        assert_eq!(doc.modification_date, "2023-01-01");
        assert!(mapped.warnings.is_empty());
    }

    #[test]
    fn test_id_matches_first_field() {
        let mapper = DocumentMapper::new();
        for id in [0u64, 7, 2988507, u64::from(u32::MAX) + 1] {
            let line = format!("{}\tName", id);
            assert_eq!(mapper.map(&record(&line)).unwrap().document.id, id);
        }
    }

    #[test]
    fn test_invalid_id_is_fatal() {
        let mapper = DocumentMapper::new();
        for id in ["", "abc", "-1", "1.5"] {
            let line = format!("{}\tName", id);
            let result = mapper.map(&record(&line));
            assert!(
                matches!(result, Err(MappingError::InvalidId { .. })),
                "expected {:?} to be rejected",
                id
            );
        }
    }

    #[test]
    fn test_multi_values_split() {
        let line = "5\tName\tName\tLutetia, Paname,Parigi\t0\t0\tP\tPPL\tFR\tMC,AD";
        let doc = DocumentMapper::new().map(&record(line)).unwrap().document;

        assert_eq!(
            doc.alternate_names.unwrap().values(),
            &["Lutetia", "Paname", "Parigi"]
        );
        assert_eq!(doc.cc2.unwrap().values(), &["MC", "AD"]);
    }

    #[test]
    fn test_numeric_defaults() {
        let line = "5\tName\tName\t\t0\t0\tP\tPPL\tFR\t\t\t\t\t\tmany\t\tn/a";
        let mapped = DocumentMapper::new().map(&record(line)).unwrap();

        assert_eq!(mapped.document.population, 0);
        assert_eq!(mapped.document.elevation, 0);
        assert_eq!(mapped.document.dem, 0);

        let fields: Vec<&str> = mapped.warnings.iter().map(|w| w.field).collect();
        assert_eq!(fields, vec!["population", "dem"]);
    }

    #[test]
    fn test_bad_coordinates_default_to_zero() {
        let line = "5\tName\tName\t\tnorth\tNaN";
        let mapped = DocumentMapper::new().map(&record(line)).unwrap();

        assert_eq!(mapped.document.location, GeoPoint::new(0.0, 0.0));
        assert_eq!(mapped.warnings.len(), 2);
        assert_eq!(mapped.warnings[0].field, "location.lat");
        assert_eq!(mapped.warnings[1].reason, "not a finite number");
    }

    #[test]
    fn test_strings_trimmed() {
        let line = " 9 \t  Spaced Name  \tSpaced\t\t1\t2\t P ";
        let doc = DocumentMapper::new().map(&record(line)).unwrap().document;

        assert_eq!(doc.id, 9);
        assert_eq!(doc.name, "Spaced Name");
        assert_eq!(doc.feature_class, "P");
    }
}
