//! DNS validation of a custom domain's required records
//!
//! Holds no state of its own: every call resolves live DNS and compares it to
//! the records stored on the domain, so it is safe to call concurrently and
//! from the request path.

use async_trait::async_trait;
use chrono::Utc;
use futures::future::join_all;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use mayl_core::DBDateTime;
use mayl_entities::custom_domains;
use mayl_entities::types::DnsRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::errors::EmailError;

pub const SUMMARY_ALL_PRESENT: &str = "All DNS records are properly configured";
pub const SUMMARY_NONE_FOUND: &str =
    "DNS records not found - please add the required records to your DNS";

/// Raw resolver access, one method per supported record type.
///
/// A name with no records of the requested type answers `Ok(vec![])`; only
/// resolver failures are errors.
#[async_trait]
pub trait DnsLookup: Send + Sync {
    async fn cname(&self, name: &str) -> Result<Vec<String>, EmailError>;
    async fn txt(&self, name: &str) -> Result<Vec<String>, EmailError>;
    /// `(preference, exchange)` pairs
    async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>, EmailError>;
}

/// Live lookups through Cloudflare's public resolvers
pub struct HickoryDnsLookup {
    resolver: TokioAsyncResolver,
}

impl Default for HickoryDnsLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl HickoryDnsLookup {
    pub fn new() -> Self {
        let mut options = ResolverOpts::default();
        options.try_tcp_on_error = true;
        options.use_hosts_file = false;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::cloudflare(), options);

        Self { resolver }
    }

    fn empty_or_error<T>(name: &str, e: ResolveError) -> Result<Vec<T>, EmailError> {
        match e.kind() {
            ResolveErrorKind::NoRecordsFound { .. } => {
                debug!("No records found for {}", name);
                Ok(Vec::new())
            }
            _ => Err(EmailError::Dns(e.to_string())),
        }
    }
}

#[async_trait]
impl DnsLookup for HickoryDnsLookup {
    async fn cname(&self, name: &str) -> Result<Vec<String>, EmailError> {
        match self.resolver.lookup(name, RecordType::CNAME).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .filter_map(|record| record.as_cname())
                .map(|cname| cname.to_string())
                .collect()),
            Err(e) => Self::empty_or_error(name, e),
        }
    }

    async fn txt(&self, name: &str) -> Result<Vec<String>, EmailError> {
        match self.resolver.txt_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|record| {
                    // Long TXT values arrive split into 255-byte character strings
                    record
                        .txt_data()
                        .iter()
                        .map(|data| String::from_utf8_lossy(data).to_string())
                        .collect::<String>()
                })
                .collect()),
            Err(e) => Self::empty_or_error(name, e),
        }
    }

    async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>, EmailError> {
        match self.resolver.mx_lookup(name).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| (mx.preference(), mx.exchange().to_string()))
                .collect()),
            Err(e) => Self::empty_or_error(name, e),
        }
    }
}

/// Result of checking one required record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnsRecordCheck {
    pub record_type: String,
    pub record_name: String,
    pub expected_value: String,
    /// The matching value, or every value found joined with `"; "`
    pub actual_value: String,
    pub is_present: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DnsRecordCheck {
    fn pending(record: &DnsRecord) -> Self {
        Self {
            record_type: record.record_type.clone(),
            record_name: record.name.clone(),
            expected_value: record.value.clone(),
            actual_value: String::new(),
            is_present: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DnsValidationResult {
    pub domain: String,
    pub all_records_present: bool,
    pub results: Vec<DnsRecordCheck>,
    /// Human-readable propagation summary
    pub summary: String,
    pub checked_at: DBDateTime,
}

impl DnsValidationResult {
    pub fn missing_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_present).count()
    }
}

/// Compare DNS values case-insensitively, ignoring quotes, surrounding
/// whitespace and a trailing root dot
fn normalize(value: &str) -> String {
    value
        .trim()
        .trim_matches('"')
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

fn summarize(results: &[DnsRecordCheck]) -> String {
    let missing = results.iter().filter(|r| !r.is_present).count();
    if missing == 0 {
        SUMMARY_ALL_PRESENT.to_string()
    } else if missing == results.len() {
        SUMMARY_NONE_FOUND.to_string()
    } else {
        format!(
            "{} of {} DNS records are configured correctly",
            results.len() - missing,
            results.len()
        )
    }
}

#[derive(Clone)]
pub struct DnsValidator {
    lookup: Arc<dyn DnsLookup>,
}

impl Default for DnsValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DnsValidator {
    pub fn new() -> Self {
        Self::with_lookup(Arc::new(HickoryDnsLookup::new()))
    }

    pub fn with_lookup(lookup: Arc<dyn DnsLookup>) -> Self {
        Self { lookup }
    }

    /// Validate the records stored on `domain` against live DNS
    pub async fn validate(
        &self,
        domain: &custom_domains::Model,
    ) -> Result<DnsValidationResult, EmailError> {
        let records = domain.required_dns_records()?;
        Ok(self.validate_records(&domain.domain, &records).await)
    }

    /// An empty record list counts as fully present
    pub async fn validate_records(
        &self,
        domain: &str,
        records: &[DnsRecord],
    ) -> DnsValidationResult {
        let results = join_all(records.iter().map(|record| self.check_record(record))).await;
        let all_records_present = results.iter().all(|r| r.is_present);
        let summary = summarize(&results);

        debug!("DNS validation for {}: {}", domain, summary);

        DnsValidationResult {
            domain: domain.to_string(),
            all_records_present,
            results,
            summary,
            checked_at: Utc::now(),
        }
    }

    async fn check_record(&self, record: &DnsRecord) -> DnsRecordCheck {
        let mut check = DnsRecordCheck::pending(record);

        match record.record_type.to_ascii_uppercase().as_str() {
            "CNAME" => match self.lookup.cname(&record.name).await {
                Ok(found) => Self::match_values(&mut check, "CNAME", &found),
                Err(e) => check.error = Some(format!("DNS lookup failed: {}", e)),
            },
            "TXT" => match self.lookup.txt(&record.name).await {
                Ok(found) => Self::match_values(&mut check, "TXT", &found),
                Err(e) => check.error = Some(format!("DNS lookup failed: {}", e)),
            },
            "MX" => match self.lookup.mx(&record.name).await {
                Ok(found) => Self::match_mx(&mut check, record.priority, &found),
                Err(e) => check.error = Some(format!("DNS lookup failed: {}", e)),
            },
            _ => {
                check.error = Some(format!("Unsupported record type: {}", record.record_type));
            }
        }

        check
    }

    fn match_values(check: &mut DnsRecordCheck, kind: &str, found: &[String]) {
        let expected = normalize(&check.expected_value);

        if let Some(hit) = found.iter().find(|value| normalize(value) == expected) {
            check.is_present = true;
            check.actual_value = hit.clone();
            return;
        }

        check.actual_value = found.join("; ");
        check.error = Some(format!(
            "{} record not found: expected {}, found {}",
            kind, check.expected_value, check.actual_value
        ));
    }

    fn match_mx(check: &mut DnsRecordCheck, priority: Option<u16>, found: &[(u16, String)]) {
        let expected = normalize(&check.expected_value);

        let hit = found.iter().find(|(preference, exchange)| {
            normalize(exchange) == expected && priority.map_or(true, |p| p == *preference)
        });

        if let Some((_, exchange)) = hit {
            check.is_present = true;
            check.actual_value = exchange.clone();
            return;
        }

        check.actual_value = found
            .iter()
            .map(|(preference, exchange)| format!("{} {}", preference, exchange))
            .collect::<Vec<_>>()
            .join("; ");
        check.error = Some(format!(
            "MX record not found: expected {}, found {}",
            check.expected_value, check.actual_value
        ));
    }
}

/// Canned DNS answers for tests
#[cfg(test)]
#[derive(Default)]
pub struct StaticDnsLookup {
    cnames: std::collections::HashMap<String, Vec<String>>,
    txts: std::collections::HashMap<String, Vec<String>>,
    mxs: std::collections::HashMap<String, Vec<(u16, String)>>,
    failing: std::collections::HashSet<String>,
    pub lookups: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl StaticDnsLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cname(mut self, name: &str, value: &str) -> Self {
        self.cnames
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_txt(mut self, name: &str, value: &str) -> Self {
        self.txts
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    pub fn with_mx(mut self, name: &str, preference: u16, exchange: &str) -> Self {
        self.mxs
            .entry(name.to_string())
            .or_default()
            .push((preference, exchange.to_string()));
        self
    }

    pub fn with_failure(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Publish every record exactly as required
    pub fn serving(records: &[DnsRecord]) -> Self {
        records.iter().fold(Self::new(), |lookup, record| {
            match record.record_type.as_str() {
                "CNAME" => lookup.with_cname(&record.name, &record.value),
                "TXT" => lookup.with_txt(&record.name, &record.value),
                "MX" => lookup.with_mx(&record.name, record.priority.unwrap_or(10), &record.value),
                _ => lookup,
            }
        })
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn answer<T: Clone>(
        &self,
        map: &std::collections::HashMap<String, Vec<T>>,
        name: &str,
    ) -> Result<Vec<T>, EmailError> {
        self.lookups
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.failing.contains(name) {
            return Err(EmailError::Dns(format!("SERVFAIL for {}", name)));
        }
        Ok(map.get(name).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
#[async_trait]
impl DnsLookup for StaticDnsLookup {
    async fn cname(&self, name: &str) -> Result<Vec<String>, EmailError> {
        self.answer(&self.cnames, name)
    }

    async fn txt(&self, name: &str) -> Result<Vec<String>, EmailError> {
        self.answer(&self.txts, name)
    }

    async fn mx(&self, name: &str) -> Result<Vec<(u16, String)>, EmailError> {
        self.answer(&self.mxs, name)
    }
}
