//! Document record submitted through the gate.
//!
//! These are plain data aggregates. The gate never inspects them; they only
//! flow from the codec to the sink.

use serde::{Deserialize, Serialize};

/// Participant description attached to a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Tax id of the participant filing the document
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

/// A single product entry of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Certificate document id
    #[serde(default)]
    pub certificate_document: Option<String>,
    /// Certificate document date
    #[serde(default)]
    pub certificate_document_date: Option<String>,
    /// Certificate document number
    #[serde(default)]
    pub certificate_document_number: Option<String>,
    /// Tax id of the product owner
    pub owner_inn: String,
    /// Tax id of the product producer
    pub producer_inn: String,
    /// Production date
    pub production_date: String,
    /// Commodity classification code
    pub tnved_code: String,
    /// Unit identification code
    #[serde(default)]
    pub uit_code: Option<String>,
    /// Unit package identification code
    #[serde(default)]
    pub uitu_code: Option<String>,
}

/// A goods-introduction document.
///
/// # Example
/// ```
/// use admission_gate::Document;
///
/// let json = r#"{
///     "doc_id": "d-1", "doc_status": "NEW", "doc_type": "LP_INTRODUCE_GOODS",
///     "owner_inn": "1", "participant_inn": "2", "producer_inn": "3",
///     "production_date": "2020-01-23", "production_type": "OWN",
///     "reg_date": "2020-01-23", "reg_number": "r-1"
/// }"#;
/// let document: Document = serde_json::from_str(json).unwrap();
/// assert_eq!(document.doc_id, "d-1");
/// assert!(document.products.is_empty());
/// assert!(!document.import_request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Participant description
    #[serde(default)]
    pub description: Option<Description>,
    /// Document id
    pub doc_id: String,
    /// Document status
    pub doc_status: String,
    /// Document type
    pub doc_type: String,
    /// Whether the goods are imported
    #[serde(rename = "importRequest", default)]
    pub import_request: bool,
    /// Tax id of the owner
    pub owner_inn: String,
    /// Tax id of the participant
    pub participant_inn: String,
    /// Tax id of the producer
    pub producer_inn: String,
    /// Production date
    pub production_date: String,
    /// Production type
    pub production_type: String,
    /// Product entries, in submission order
    #[serde(default)]
    pub products: Vec<Product>,
    /// Registration date
    pub reg_date: String,
    /// Registration number
    pub reg_number: String,
}

impl Document {
    /// Participant tax id from the description, if present.
    pub fn description_inn(&self) -> Option<&str> {
        self.description
            .as_ref()
            .map(|description| description.participant_inn.as_str())
    }
}
