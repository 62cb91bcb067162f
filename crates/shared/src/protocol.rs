//! JSON shapes exchanged with the REST backend.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Page, Record},
    error::FieldViolation,
};

/// Every successful response is wrapped as `{statusCode, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub status_code: u16,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContent<T> {
    pub content: Vec<T>,
    pub total_pages: u32,
    pub total_elements: u64,
}

impl<T> From<PageContent<T>> for Page<T> {
    fn from(value: PageContent<T>) -> Self {
        Self {
            items: value.content,
            total_pages: value.total_pages,
            total_elements: value.total_elements,
        }
    }
}

/// Body of a non-2xx response. Every field is optional because not every
/// failure path on the server fills them in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<FieldViolation>,
}

pub type RecordPage = PageContent<Record>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub department: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}
