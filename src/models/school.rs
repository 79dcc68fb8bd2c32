//! School record model as returned by the directory listing endpoint.

use serde::{Deserialize, Deserializer, Serialize};

/// A single school from the directory listing
///
/// Every field is optional on the wire. The backend is loose about types, so
/// numbers are accepted wherever a string is expected and normalized to text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolRecord {
    /// Stable school identifier, the join key for detail lookups
    #[serde(rename = "sekolah_id", default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    /// School name
    #[serde(rename = "nama", default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    /// Street address
    #[serde(rename = "alamat_jalan", default, deserialize_with = "lenient_string")]
    pub address: Option<String>,

    /// Regency or city (kabupaten/kota)
    #[serde(rename = "kabupaten", default, deserialize_with = "lenient_string")]
    pub locality: Option<String>,

    /// Province
    #[serde(rename = "provinsi", default, deserialize_with = "lenient_string")]
    pub region: Option<String>,

    /// Education level code (TK, KB, SD, ...)
    #[serde(
        rename = "bentuk_pendidikan",
        default,
        deserialize_with = "lenient_string"
    )]
    pub category: Option<String>,
}

impl SchoolRecord {
    /// Create a record with an identifier and a name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Set the category code
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the locality and region
    pub fn with_location(mut self, locality: impl Into<String>, region: impl Into<String>) -> Self {
        self.locality = Some(locality.into());
        self.region = Some(region.into());
        self
    }

    /// The identifier, if present and non-blank
    pub fn identifier(&self) -> Option<&str> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// One page of the directory listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResponse {
    /// Total number of matching records reported by the backend
    #[serde(default)]
    pub total: Option<u64>,

    /// Records on this page
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Vec<SchoolRecord>,
}

impl PageResponse {
    /// Create a page response
    pub fn new(total: u64, data: Vec<SchoolRecord>) -> Self {
        Self {
            total: Some(total),
            data,
        }
    }

    /// The authoritative total for pagination.
    ///
    /// Falls back to the number of records on the page when the backend
    /// omits `total`.
    pub fn effective_total(&self) -> u64 {
        self.total.unwrap_or(self.data.len() as u64)
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| scalar_to_string(&v)))
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Render a JSON scalar as trimmed text; `None` for null, blanks and containers
pub fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    let text = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_from_wire_names() {
        let record: SchoolRecord = serde_json::from_value(json!({
            "sekolah_id": "ABC-1",
            "nama": "TK Pertiwi",
            "alamat_jalan": "Jl. Merdeka 1",
            "kabupaten": "Kota Bandung",
            "provinsi": "Jawa Barat",
            "bentuk_pendidikan": "TK",
            "npsn": "20219999"
        }))
        .unwrap();

        assert_eq!(record.identifier(), Some("ABC-1"));
        assert_eq!(record.name.as_deref(), Some("TK Pertiwi"));
        assert_eq!(record.locality.as_deref(), Some("Kota Bandung"));
        assert_eq!(record.category.as_deref(), Some("TK"));
    }

    #[test]
    fn test_record_lenient_fields() {
        let record: SchoolRecord = serde_json::from_value(json!({
            "sekolah_id": 12345,
            "nama": null,
            "alamat_jalan": "   ",
            "kabupaten": {"nested": true}
        }))
        .unwrap();

        assert_eq!(record.identifier(), Some("12345"));
        assert!(record.name.is_none());
        assert!(record.address.is_none());
        assert!(record.locality.is_none());
        assert!(record.region.is_none());
    }

    #[test]
    fn test_blank_identifier() {
        let record = SchoolRecord {
            id: Some("  ".to_string()),
            ..Default::default()
        };
        assert_eq!(record.identifier(), None);
    }

    #[test]
    fn test_page_response_null_data() {
        let page: PageResponse = serde_json::from_value(json!({"total": 5, "data": null})).unwrap();
        assert_eq!(page.total, Some(5));
        assert!(page.data.is_empty());
    }

    #[test]
    fn test_effective_total_fallback() {
        let page: PageResponse = serde_json::from_value(json!({
            "data": [{"sekolah_id": "a"}, {"sekolah_id": "b"}]
        }))
        .unwrap();
        assert_eq!(page.total, None);
        assert_eq!(page.effective_total(), 2);
    }
}
