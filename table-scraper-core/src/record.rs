//! Product record as written to the output file.

use serde::{Deserialize, Serialize};

/// Number of cells a fully rendered product row carries.
pub const EXPECTED_COLUMNS: usize = 9;

/// Column holding the rating `span`.
pub const RATING_COLUMN: usize = 7;

/// One product row. Field order is the serialized key order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Last Updated")]
    pub last_updated: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Material")]
    pub material: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Weight (kg)")]
    pub weight_kg: String,
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "Rating")]
    pub rating: f64,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
}

impl Record {
    /// Build a record from trimmed cell texts and an already-parsed rating.
    ///
    /// Callers guarantee `cells.len() >= EXPECTED_COLUMNS`.
    pub fn from_cells(cells: &[String], rating: f64) -> Self {
        let cell = |i: usize| cells[i].trim().to_string();
        Self {
            id: cell(0),
            last_updated: cell(1),
            category: cell(2),
            material: cell(3),
            price: cell(4),
            weight_kg: cell(5),
            item: cell(6),
            rating,
            manufacturer: cell(8),
        }
    }
}
