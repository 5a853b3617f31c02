use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::address::resolve_address;
use crate::crm::CrmGateway;
use crate::errors::AppResult;
use crate::geocode::{GeocodingPolicy, Resolution};
use crate::model::{CustomerRecord, ServiceRecord};
use crate::summary::{FailedService, FailureReason, RunSummary, UpdatedService};

const ACTIVE_STATUS: &str = "active";

/// Walks active customers and their active services, filling in missing markers.
pub struct SyncOrchestrator {
    crm: Arc<dyn CrmGateway>,
    policy: GeocodingPolicy,
}

impl SyncOrchestrator {
    pub fn new(crm: Arc<dyn CrmGateway>, policy: GeocodingPolicy) -> Self {
        Self { crm, policy }
    }

    /// Only a failed customer listing aborts the run; everything else is
    /// recorded in the summary.
    pub async fn run(&self) -> AppResult<RunSummary> {
        let mut summary = RunSummary::start();

        let customers = self.crm.list_customers(ACTIVE_STATUS).await?;
        if customers.is_empty() {
            info!("no active customers found");
            return Ok(summary.finish());
        }
        info!(count = customers.len(), "found active customers");

        for customer in &customers {
            summary.customers_scanned += 1;
            let services = match self.crm.list_internet_services(customer.id).await {
                Ok(services) => services,
                Err(err) => {
                    warn!(%err, customer_id = customer.id, "could not list internet services; skipping customer");
                    summary.customers_failed += 1;
                    continue;
                }
            };

            if services
                .iter()
                .any(|service| service.is_active() && !service.has_marker())
            {
                info!(
                    customer_id = customer.id,
                    name = %customer.name,
                    login = %customer.login,
                    "customer has services without coordinates"
                );
            }

            for service in services.iter().filter(|service| service.is_active()) {
                summary.processed += 1;
                self.sync_service(customer, service, &mut summary).await;
            }
        }

        Ok(summary.finish())
    }

    async fn sync_service(
        &self,
        customer: &CustomerRecord,
        service: &ServiceRecord,
        summary: &mut RunSummary,
    ) {
        if service.has_marker() {
            debug!(service_id = service.id, marker = %service.geo.marker, "already has coordinates");
            summary.record_already_located();
            return;
        }

        let failed = |address: Option<String>, reason: FailureReason| FailedService {
            customer_id: customer.id,
            customer_name: customer.name.clone(),
            service_id: service.id,
            address,
            reason,
        };

        let Some(address) = resolve_address(customer, service) else {
            info!(service_id = service.id, ipv4 = %service.ipv4, "skipped: no address available for geocoding");
            summary.record_failed(failed(None, FailureReason::NoAddressAvailable));
            return;
        };
        if service.geo.address.is_empty() {
            info!(service_id = service.id, %address, "no service address; using customer address");
        } else {
            info!(service_id = service.id, %address, "geocoding service address");
        }

        let (coordinate, provider) = match self.policy.geocode(&address).await {
            Resolution::Resolved {
                coordinate,
                provider,
            } => (coordinate, provider),
            Resolution::Unresolved => {
                warn!(service_id = service.id, %address, "all geocoding providers failed");
                summary.record_failed(failed(
                    Some(address.to_string()),
                    FailureReason::GeocodingFailed,
                ));
                return;
            }
        };

        let marker = coordinate.to_marker();
        let updated = match self
            .crm
            .update_geo_marker(customer.id, service.id, &marker)
            .await
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!(%err, service_id = service.id, "geo marker update failed");
                false
            }
        };

        if updated {
            info!(service_id = service.id, %marker, "geo marker updated");
            summary.record_updated(UpdatedService {
                customer_id: customer.id,
                customer_name: customer.name.clone(),
                service_id: service.id,
                address: address.to_string(),
                coordinate,
                provider: provider.to_string(),
            });
        } else {
            summary.record_failed(failed(Some(address.to_string()), FailureReason::UpdateFailed));
        }
    }
}
