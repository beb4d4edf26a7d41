use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Web presence of a business, serialized as the human-readable status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum WebPresence {
    #[serde(rename = "No Website")]
    NoWebsite,
    #[serde(rename = "Directory Only")]
    DirectoryOnly,
    #[serde(rename = "Has Website")]
    HasWebsite,
}

impl WebPresence {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebPresence::NoWebsite => "No Website",
            WebPresence::DirectoryOnly => "Directory Only",
            WebPresence::HasWebsite => "Has Website",
        }
    }
}

impl fmt::Display for WebPresence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A qualifying business waiting for its outreach message.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub rating: Option<f64>,
    pub reviews: Option<u64>,
    pub status: WebPresence,
    pub url: Option<String>,
}

impl Candidate {
    pub fn into_lead(self, sales_pitch: String) -> Lead {
        Lead {
            business_name: self.name,
            address: self.address,
            phone: self.phone,
            rating: self.rating,
            reviews: self.reviews,
            current_status: self.status,
            detected_url: self.url,
            sales_pitch,
        }
    }
}

/// One output record: a business prospect and the message drafted for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Lead {
    /// Business name as listed on Google Maps
    pub business_name: String,
    /// Street address, if listed
    pub address: Option<String>,
    /// Phone number, if listed
    pub phone: Option<String>,
    /// Average rating (0-5), if listed
    pub rating: Option<f64>,
    /// Number of reviews, if listed
    pub reviews: Option<u64>,
    /// "No Website", "Directory Only" or "Has Website"
    pub current_status: WebPresence,
    /// The website field of the listing, when it had one
    pub detected_url: Option<String>,
    /// Outreach message, AI-written or from the fallback template
    pub sales_pitch: String,
}
