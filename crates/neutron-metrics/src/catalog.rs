//! Built-in catalog of networking metrics.

use crate::{
    collectors::{
        AGENT_STATES, FLOATING_IPS, NETWORKS, NETWORK_IP_AVAILABILITIES, PORTS, ROUTERS,
        SECURITY_GROUPS, SUBNETS,
    },
    descriptors::MetricDescriptor,
    validation::assert_catalog,
};

/// Default prefix of exported metric names.
pub const DEFAULT_PREFIX: &str = "openstack_neutron";

const REGION: &[&str] = &["region_name"];

const IP_AVAILABILITY_LABELS: &[&str] = &[
    "network_id",
    "network_name",
    "ip_version",
    "cidr",
    "subnet_name",
    "project_id",
    "region_name",
];

/// Networking metrics in the order of their exposition.
///
/// Metrics without a collector are emitted by the collector of another metric in the same group.
pub const NEUTRON_METRICS: &[MetricDescriptor] = &[
    MetricDescriptor::gauge("floating_ips", "Number of floating IPs", REGION)
        .with_collector(FLOATING_IPS),
    MetricDescriptor::gauge(
        "floating_ips_associated_not_active",
        "Number of floating IPs associated with a private IP, but not active",
        REGION,
    ),
    MetricDescriptor::gauge(
        "floating_ip",
        "Floating IP",
        &[
            "id",
            "floating_network_id",
            "router_id",
            "status",
            "project_id",
            "floating_ip_address",
            "region_name",
        ],
    ),
    MetricDescriptor::gauge(
        "network",
        "Network with its provider attributes",
        &[
            "id",
            "name",
            "admin_state_up",
            "status",
            "tenant_id",
            "project_id",
            "region_name",
            "type",
            "physical_network",
            "seg_id",
        ],
    )
    .with_collector(NETWORKS),
    MetricDescriptor::gauge("networks", "Number of networks", REGION),
    MetricDescriptor::gauge("security_groups", "Number of security groups", REGION)
        .with_collector(SECURITY_GROUPS),
    MetricDescriptor::gauge("subnets", "Number of subnets", REGION).with_collector(SUBNETS),
    MetricDescriptor::gauge(
        "port",
        "Port with its binding attributes",
        &[
            "uuid",
            "network_id",
            "mac_address",
            "device_owner",
            "status",
            "binding_vif_type",
            "admin_state_up",
            "device_id",
            "region_name",
        ],
    )
    .with_collector(PORTS),
    MetricDescriptor::gauge("ports", "Number of ports", REGION),
    MetricDescriptor::gauge("ports_no_ips", "Number of active ports without IPs", REGION),
    MetricDescriptor::gauge(
        "ports_lb_not_active",
        "Number of load balancer ports that are not active",
        REGION,
    ),
    MetricDescriptor::gauge(
        "router",
        "Router",
        &[
            "id",
            "name",
            "project_id",
            "admin_state_up",
            "status",
            "external_network_id",
            "region_name",
        ],
    ),
    MetricDescriptor::gauge("routers", "Number of routers", REGION).with_collector(ROUTERS),
    MetricDescriptor::gauge("routers_not_active", "Number of routers that are not active", REGION),
    MetricDescriptor::gauge(
        "l3_agent_of_router",
        "L3 agent hosting a router (1 if the agent is alive)",
        &[
            "router_id",
            "l3_agent_id",
            "ha_state",
            "agent_alive",
            "agent_admin_up",
            "agent_host",
            "region_name",
        ],
    ),
    MetricDescriptor::counter(
        "agent_state",
        "State of a networking agent (1 if alive, 0 otherwise)",
        &["id", "hostname", "service", "adminState", "region_name"],
    )
    .with_collector(AGENT_STATES),
    MetricDescriptor::gauge(
        "network_ip_availabilities_total",
        "Total number of IPs in a subnet",
        IP_AVAILABILITY_LABELS,
    )
    .with_collector(NETWORK_IP_AVAILABILITIES),
    MetricDescriptor::gauge(
        "network_ip_availabilities_used",
        "Number of used IPs in a subnet",
        IP_AVAILABILITY_LABELS,
    ),
];

const _: () = assert_catalog(NEUTRON_METRICS);

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn collectors_are_distinct() {
        let collectors: Vec<_> = NEUTRON_METRICS
            .iter()
            .filter_map(|descriptor| Some(descriptor.collector?.name()))
            .collect();
        assert_eq!(
            collectors,
            [
                "floating_ips",
                "networks",
                "security_groups",
                "subnets",
                "ports",
                "routers",
                "agent_states",
                "network_ip_availabilities"
            ]
        );
        let unique: HashSet<_> = collectors.iter().collect();
        assert_eq!(unique.len(), collectors.len());
    }

    #[test]
    fn help_has_no_trailing_period() {
        // `prometheus-client` appends a period itself.
        for descriptor in NEUTRON_METRICS {
            assert!(!descriptor.help.ends_with('.'), "{}", descriptor.name);
        }
    }
}
