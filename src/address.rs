use crate::model::{CustomerRecord, ResolvedAddress, ServiceRecord};

/// Picks the geocoding query for a service.
///
/// The service's own `geo.address` wins and is returned verbatim. Otherwise the
/// customer's street and city are joined, but only when both are present.
pub fn resolve_address(
    customer: &CustomerRecord,
    service: &ServiceRecord,
) -> Option<ResolvedAddress> {
    if !service.geo.address.is_empty() {
        return Some(ResolvedAddress::new(service.geo.address.clone()));
    }

    if customer.street.is_empty() || customer.city.is_empty() {
        return None;
    }
    Some(ResolvedAddress::new(format!(
        "{}, {}",
        customer.street, customer.city
    )))
}
