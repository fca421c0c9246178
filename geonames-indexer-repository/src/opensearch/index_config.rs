//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for a GeoNames index.

use serde_json::{json, Value};

/// Get the index settings and mappings for a GeoNames index.
///
/// The configuration includes:
/// - **text** fields with the `standard` analyzer for the place names
/// - **geo_point** for the location
/// - **keyword** fields for codes used in filters and aggregations
/// - **date** for the modification date
///
/// `alternateNames` and `cc2` are multi-valued; OpenSearch has no separate
/// array type, so they are mapped like their single-valued counterparts.
pub fn geonames_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "geonameId": { "type": "integer" },
                "name": { "type": "text", "analyzer": "standard" },
                "asciiName": { "type": "text", "analyzer": "standard" },
                "alternateNames": { "type": "text", "analyzer": "standard" },
                "location": { "type": "geo_point" },
                "featureClass": { "type": "keyword" },
                "featureCode": { "type": "keyword" },
                "countryCode": { "type": "keyword" },
                "cc2": { "type": "keyword" },
                "admin1Code": { "type": "keyword" },
                "admin2Code": { "type": "keyword" },
                "admin3Code": { "type": "keyword" },
                "admin4Code": { "type": "keyword" },
                "population": { "type": "integer" },
                "elevation": { "type": "integer" },
                "dem": { "type": "integer" },
                "timezone": { "type": "keyword" },
                "modificationDate": { "type": "date" }
            }
        }
    })
}
