use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Delivery lifecycle of a sent email record.
/// NOTE: Use db_type = "Text" for SQLite compatibility.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EmailStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Queued => "queued",
            EmailStatus::Scheduled => "scheduled",
            EmailStatus::Sent => "sent",
            EmailStatus::Delivered => "delivered",
            EmailStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(EmailStatus::Queued),
            "scheduled" => Some(EmailStatus::Scheduled),
            "sent" => Some(EmailStatus::Sent),
            "delivered" => Some(EmailStatus::Delivered),
            "failed" => Some(EmailStatus::Failed),
            _ => None,
        }
    }

    /// Statuses the dispatch loops are allowed to move forward
    pub fn awaiting_dispatch() -> [EmailStatus; 2] {
        [EmailStatus::Queued, EmailStatus::Scheduled]
    }
}

/// Verification state of a claimed sending domain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum CustomDomainStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "verified")]
    Verified,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

impl Display for CustomDomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl CustomDomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomDomainStatus::Pending => "pending",
            CustomDomainStatus::Verified => "verified",
            CustomDomainStatus::Failed => "failed",
            CustomDomainStatus::Disabled => "disabled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CustomDomainStatus::Pending),
            "verified" => Some(CustomDomainStatus::Verified),
            "failed" => Some(CustomDomainStatus::Failed),
            "disabled" => Some(CustomDomainStatus::Disabled),
            _ => None,
        }
    }

    /// Statuses the verification loop keeps polling
    pub fn awaiting_verification() -> [CustomDomainStatus; 2] {
        [CustomDomainStatus::Pending, CustomDomainStatus::Failed]
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EmailAddressType {
    #[sea_orm(string_value = "temporary")]
    Temporary,
    #[sea_orm(string_value = "persistent")]
    Persistent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
pub enum EmailAddressStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "expired")]
    Expired,
    #[sea_orm(string_value = "disabled")]
    Disabled,
}

impl EmailAddressType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailAddressType::Temporary => "temporary",
            EmailAddressType::Persistent => "persistent",
        }
    }
}

impl EmailAddressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailAddressStatus::Active => "active",
            EmailAddressStatus::Expired => "expired",
            EmailAddressStatus::Disabled => "disabled",
        }
    }
}

/// One DNS record a verification provider asks the domain owner to publish.
/// Stored as an element of the `custom_domains.dns_records` JSON array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u16>,
}

impl DnsRecord {
    pub fn new(record_type: &str, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            record_type: record_type.to_string(),
            name: name.into(),
            value: value.into(),
            ttl: None,
            priority: None,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = Some(priority);
        self
    }
}
