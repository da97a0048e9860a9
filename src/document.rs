//! Record-to-document projection.
//!
//! [`to_document`] is a pure, total function: every field of the output has
//! a defined value for every valid record. The defaulting rules are the
//! persisted-state contract of the collection — optional text collapses to
//! `""`, missing price to `0.0`, and timestamps to epoch seconds with `0`
//! standing in for missing or unparsable values (which sort oldest under the
//! collection's default sort).

use chrono::DateTime;

use crate::models::{ServiceDocument, ServiceRecord};

pub fn to_document(record: &ServiceRecord) -> ServiceDocument {
    ServiceDocument {
        id: record.id.to_string(),
        title: record.title.clone(),
        description: record.description.clone().unwrap_or_default(),
        category: record.category.clone(),
        location: record.location.clone().unwrap_or_default(),
        capacity: record.capacity.clone().unwrap_or_default(),
        technical_specs: record.technical_specs.clone().unwrap_or_default(),
        supplier_id: record.supplier_id.to_string(),
        supplier_name: record.supplier_name.clone().unwrap_or_default(),
        price_per_day: record.price_per_day.unwrap_or(0.0),
        created_at: parse_epoch(record.created_at.as_deref()),
    }
}

fn parse_epoch(timestamp: Option<&str>) -> i64 {
    timestamp
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}
