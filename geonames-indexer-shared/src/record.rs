//! Raw positional records.

/// Positions of the columns in a GeoNames dump line.
///
/// See the `geoname` table description in the GeoNames export readme.
pub mod fields {
    pub const GEONAME_ID: usize = 0;
    pub const NAME: usize = 1;
    pub const ASCII_NAME: usize = 2;
    pub const ALTERNATE_NAMES: usize = 3;
    pub const LATITUDE: usize = 4;
    pub const LONGITUDE: usize = 5;
    pub const FEATURE_CLASS: usize = 6;
    pub const FEATURE_CODE: usize = 7;
    pub const COUNTRY_CODE: usize = 8;
    pub const CC2: usize = 9;
    pub const ADMIN1_CODE: usize = 10;
    pub const ADMIN2_CODE: usize = 11;
    pub const ADMIN3_CODE: usize = 12;
    pub const ADMIN4_CODE: usize = 13;
    pub const POPULATION: usize = 14;
    pub const ELEVATION: usize = 15;
    pub const DEM: usize = 16;
    pub const TIMEZONE: usize = 17;
    pub const MODIFICATION_DATE: usize = 18;

    /// Number of columns in a complete record.
    pub const COUNT: usize = 19;
}

/// One input line split into its fields.
///
/// Any number of fields is accepted. Positions past the end of the record
/// read as empty strings, so a truncated line behaves as if its trailing
/// fields were present but empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    fields: Vec<String>,
}

impl RawRecord {
    /// Create a record from already split fields.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// The field at `index`, or `""` if the record is shorter than that.
    pub fn field(&self, index: usize) -> &str {
        self.fields.get(index).map(String::as_str).unwrap_or("")
    }

    /// Number of fields actually present.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All present fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Re-join the record with tabs, for failure reports.
    pub fn to_line(&self) -> String {
        self.fields.join("\t")
    }
}

impl From<Vec<String>> for RawRecord {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}
