use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a listing is for sale or for rent
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum OfferType {
    Sale,
    Rent,
}

impl OfferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferType::Sale => "sale",
            OfferType::Rent => "rent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sale" => Some(OfferType::Sale),
            "rent" => Some(OfferType::Rent),
            _ => None,
        }
    }
}

impl fmt::Display for OfferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Location information for a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// One listing as returned by the listings endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySummary {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub price: Option<u64>,
    #[serde(default)]
    pub rooms: Option<u8>,
    #[serde(default)]
    pub total_area: Option<f64>,
    #[serde(default)]
    pub floor: Option<i32>,
    #[serde(default)]
    pub total_floors: Option<i32>,
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub repair: Option<String>,
    #[serde(default)]
    pub offer_type: Option<OfferType>,
    #[serde(default)]
    pub listing_type: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PropertySummary {
    pub fn price_per_sqm(&self) -> Option<f64> {
        match (self.price, self.total_area) {
            (Some(price), Some(area)) if area > 0.0 => Some(price as f64 / area),
            _ => None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.location.latitude.is_some() && self.location.longitude.is_some()
    }
}

/// Page envelope returned by the listings endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageEnvelope {
    #[serde(default)]
    pub data: Vec<PropertySummary>,
    pub current_page: u32,
    pub last_page: u32,
    pub total: u64,
    #[serde(default)]
    pub next_page_url: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

impl PageEnvelope {
    /// The server signals exhaustion with a null `next_page_url` or by
    /// reaching `last_page`; either one is enough.
    pub fn has_next(&self) -> bool {
        self.next_page_url.is_some() && self.current_page < self.last_page
    }
}

/// One fetched batch owned by the pager
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: u32,
    pub items: Vec<PropertySummary>,
    pub total: u64,
    pub has_next: bool,
}

impl Page {
    pub fn from_envelope(index: u32, envelope: PageEnvelope) -> Self {
        let has_next = envelope.has_next();
        Self {
            index,
            total: envelope.total,
            items: envelope.data,
            has_next,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_listing_with_flat_location_fields() {
        let json = r#"{
            "id": 7,
            "title": "2-room flat near the park",
            "price": 95000,
            "rooms": 2,
            "total_area": 54.5,
            "floor": 3,
            "city": "Tashkent",
            "district": "Yunusabad",
            "offer_type": "sale",
            "created_at": "2024-05-01T10:00:00Z",
            "unknown_field": true
        }"#;

        let listing: PropertySummary = serde_json::from_str(json).unwrap();
        assert_eq!(listing.id, 7);
        assert_eq!(listing.rooms, Some(2));
        assert_eq!(listing.location.city.as_deref(), Some("Tashkent"));
        assert_eq!(listing.location.district.as_deref(), Some("Yunusabad"));
        assert_eq!(listing.offer_type, Some(OfferType::Sale));
        assert!(listing.created_at.is_some());
        assert!(listing.images.is_empty());
        assert!(!listing.has_coordinates());
    }

    #[test]
    fn envelope_exhaustion_signals() {
        let mut envelope = PageEnvelope {
            data: vec![],
            current_page: 1,
            last_page: 3,
            total: 60,
            next_page_url: Some("/api/properties?page=2".to_string()),
            per_page: Some(20),
        };
        assert!(envelope.has_next());

        envelope.next_page_url = None;
        assert!(!envelope.has_next());

        envelope.next_page_url = Some("/api/properties?page=4".to_string());
        envelope.current_page = 3;
        assert!(!envelope.has_next());
    }

    #[test]
    fn price_per_sqm_needs_positive_area() {
        let listing: PropertySummary =
            serde_json::from_str(r#"{"id": 1, "price": 100000, "total_area": 50.0}"#).unwrap();
        assert_eq!(listing.price_per_sqm(), Some(2000.0));

        let listing: PropertySummary =
            serde_json::from_str(r#"{"id": 1, "price": 100000, "total_area": 0.0}"#).unwrap();
        assert_eq!(listing.price_per_sqm(), None);
    }
}
