use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoAddressAvailable,
    GeocodingFailed,
    UpdateFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::NoAddressAvailable => "no address available",
            FailureReason::GeocodingFailed => "geocoding failed",
            FailureReason::UpdateFailed => "update failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdatedService {
    pub customer_id: u64,
    pub customer_name: String,
    pub service_id: u64,
    pub address: String,
    pub coordinate: Coordinate,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedService {
    pub customer_id: u64,
    pub customer_name: String,
    pub service_id: u64,
    pub address: Option<String>,
    pub reason: FailureReason,
}

/// Counters and per-service outcomes of one sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub customers_scanned: usize,
    pub customers_failed: usize,
    pub processed: usize,
    pub updated: usize,
    pub skipped: usize,
    pub updated_services: Vec<UpdatedService>,
    pub failed_services: Vec<FailedService>,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            customers_scanned: 0,
            customers_failed: 0,
            processed: 0,
            updated: 0,
            skipped: 0,
            updated_services: Vec::new(),
            failed_services: Vec::new(),
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn record_already_located(&mut self) {
        self.skipped += 1;
    }

    pub fn record_updated(&mut self, service: UpdatedService) {
        self.updated += 1;
        self.updated_services.push(service);
    }

    /// Address and geocoding misses count as skips; refused updates do not.
    pub fn record_failed(&mut self, service: FailedService) {
        if service.reason != FailureReason::UpdateFailed {
            self.skipped += 1;
        }
        self.failed_services.push(service);
    }

    pub fn failures_for(&self, reason: FailureReason) -> usize {
        self.failed_services
            .iter()
            .filter(|failed| failed.reason == reason)
            .count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Customers scanned: {}", self.customers_scanned)?;
        if self.customers_failed > 0 {
            writeln!(
                f,
                "Customers whose services could not be listed: {}",
                self.customers_failed
            )?;
        }
        writeln!(f, "Total active services processed: {}", self.processed)?;
        writeln!(f, "Services updated with coordinates: {}", self.updated)?;
        writeln!(f, "Services skipped: {}", self.skipped)?;

        if !self.updated_services.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Services Successfully Updated ===")?;
            for service in &self.updated_services {
                writeln!(f, "Customer: {}", service.customer_name)?;
                writeln!(f, "  Service ID: {}", service.service_id)?;
                writeln!(f, "  Address: {}", service.address)?;
                writeln!(
                    f,
                    "  Coordinates: {} (via {})",
                    service.coordinate, service.provider
                )?;
                writeln!(f, "---")?;
            }
        }

        if !self.failed_services.is_empty() {
            writeln!(f)?;
            writeln!(f, "=== Services That Could Not Be Updated ===")?;
            for service in &self.failed_services {
                writeln!(f, "Customer: {}", service.customer_name)?;
                writeln!(f, "  Service ID: {}", service.service_id)?;
                writeln!(
                    f,
                    "  Address: {}",
                    service.address.as_deref().unwrap_or("N/A")
                )?;
                writeln!(f, "  Reason: {}", service.reason)?;
                writeln!(f, "---")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(reason: FailureReason, address: Option<&str>) -> FailedService {
        FailedService {
            customer_id: 1,
            customer_name: "Aroha Ltd".into(),
            service_id: 5,
            address: address.map(str::to_string),
            reason,
        }
    }

    #[test]
    fn refused_updates_are_not_counted_as_skips() {
        let mut summary = RunSummary::start();
        summary.record_already_located();
        summary.record_failed(failed(FailureReason::NoAddressAvailable, None));
        summary.record_failed(failed(FailureReason::GeocodingFailed, Some("x")));
        summary.record_failed(failed(FailureReason::UpdateFailed, Some("x")));

        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.failed_services.len(), 3);
        assert_eq!(summary.failures_for(FailureReason::UpdateFailed), 1);
    }

    #[test]
    fn report_lists_counts_and_details() {
        let mut summary = RunSummary::start();
        summary.processed = 2;
        summary.record_updated(UpdatedService {
            customer_id: 1,
            customer_name: "Aroha Ltd".into(),
            service_id: 4,
            address: "12 Main St, Wellington".into(),
            coordinate: Coordinate::new(-41.28, 174.77),
            provider: "nominatim".into(),
        });
        summary.record_failed(failed(FailureReason::NoAddressAvailable, None));

        let report = summary.finish().to_string();
        assert!(report.contains("Total active services processed: 2"));
        assert!(report.contains("Services updated with coordinates: 1"));
        assert!(report.contains("Services skipped: 1"));
        assert!(report.contains("Coordinates: -41.28,174.77 (via nominatim)"));
        assert!(report.contains("Address: N/A"));
        assert!(report.contains("Reason: no address available"));
    }
}
