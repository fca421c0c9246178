//! The indexable GeoNames document.

use serde::{Deserialize, Serialize};

/// A geographic point, serialized in the `{ "lat": .., "lon": .. }` object
/// form accepted by `geo_point` fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// A multi-valued string attribute that is never empty.
///
/// Fields such as `alternateNames` are either absent from a document or hold
/// at least one value; an empty array attribute is never produced. Use
/// `Option<MultiValue>` for such fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct MultiValue(Vec<String>);

impl MultiValue {
    /// Split `source` on `delimiter`, trimming each piece and dropping empty
    /// ones. Returns `None` when no value remains.
    pub fn split(source: &str, delimiter: char) -> Option<Self> {
        let values: Vec<String> = source
            .split(delimiter)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect();

        Self::from_values(values)
    }

    /// Wrap `values`, returning `None` if there are none.
    pub fn from_values(values: Vec<String>) -> Option<Self> {
        if values.is_empty() {
            None
        } else {
            Some(Self(values))
        }
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; provided for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for MultiValue {
    type Error = &'static str;

    fn try_from(values: Vec<String>) -> Result<Self, Self::Error> {
        Self::from_values(values).ok_or("multi-valued field must not be empty")
    }
}

impl From<MultiValue> for Vec<String> {
    fn from(value: MultiValue) -> Self {
        value.0
    }
}

/// Document stored in the search index for one GeoNames record.
///
/// `id` is the upsert key: re-importing the same source record replaces the
/// stored document instead of creating a second one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeonameDocument {
    #[serde(rename = "geonameId")]
    pub id: u64,
    pub name: String,
    pub ascii_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_names: Option<MultiValue>,
    pub location: GeoPoint,
    pub feature_class: String,
    pub feature_code: String,
    pub country_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc2: Option<MultiValue>,
    pub admin1_code: String,
    pub admin2_code: String,
    pub admin3_code: String,
    pub admin4_code: String,
    pub population: i64,
    pub elevation: i64,
    pub dem: i64,
    pub timezone: String,
    /// Kept verbatim; the index mapping types it as a date. Omitted when
    /// the column is empty, since a `date` field rejects `""`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub modification_date: String,
}

/// Bytes spent on keys, punctuation and numbers of a serialized document.
const FIXED_OVERHEAD_BYTES: usize = 384;

impl GeonameDocument {
    /// Create a document with the given id and name and every other field
    /// empty or zero.
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ascii_name: String::new(),
            alternate_names: None,
            location: GeoPoint::default(),
            feature_class: String::new(),
            feature_code: String::new(),
            country_code: String::new(),
            cc2: None,
            admin1_code: String::new(),
            admin2_code: String::new(),
            admin3_code: String::new(),
            admin4_code: String::new(),
            population: 0,
            elevation: 0,
            dem: 0,
            timezone: String::new(),
            modification_date: String::new(),
        }
    }

    /// Rough size of the document's JSON body in bytes.
    ///
    /// Used to bound bulk request sizes without serializing every document
    /// twice. Overestimates slightly for short documents.
    pub fn estimated_size(&self) -> usize {
        let multi = |value: &Option<MultiValue>| {
            value
                .as_ref()
                .map(|v| v.values().iter().map(|s| s.len() + 3).sum::<usize>())
                .unwrap_or(0)
        };

        FIXED_OVERHEAD_BYTES
            + self.name.len()
            + self.ascii_name.len()
            + multi(&self.alternate_names)
            + self.feature_class.len()
            + self.feature_code.len()
            + self.country_code.len()
            + multi(&self.cc2)
            + self.admin1_code.len()
            + self.admin2_code.len()
            + self.admin3_code.len()
            + self.admin4_code.len()
            + self.timezone.len()
            + self.modification_date.len()
    }
}
