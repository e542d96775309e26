pub mod types;

pub mod custom_domains;
pub mod email_addresses;
pub mod rate_limits;
pub mod sent_emails;

pub mod prelude {
    pub use super::custom_domains::Entity as CustomDomains;
    pub use super::email_addresses::Entity as EmailAddresses;
    pub use super::rate_limits::Entity as RateLimits;
    pub use super::sent_emails::Entity as SentEmails;
}
