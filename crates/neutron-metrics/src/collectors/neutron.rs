//! Collectors for networking resources.

use super::{CollectContext, CollectError};
use crate::{
    api::{ListFilters, ResourceKind},
    descriptors::Collector,
    emit::Emitter,
    fetch::{fetch_all, fetch_joined},
    resources::{
        Agent, FloatingIp, L3Agent, Network, NetworkIpAvailability, Port, Router, SecurityGroup,
        Subnet,
    },
};

/// Status of a resource that is up and running.
const ACTIVE: &str = "ACTIVE";
/// Device owner of load balancer (Octavia / LBaaS v2) ports.
const LOAD_BALANCER_OWNER: &str = "neutron:LOADBALANCERV2";

pub(crate) const FLOATING_IPS: Collector = Collector::new("floating_ips", floating_ips);
pub(crate) const NETWORKS: Collector = Collector::new("networks", networks);
pub(crate) const SECURITY_GROUPS: Collector = Collector::new("security_groups", security_groups);
pub(crate) const SUBNETS: Collector = Collector::new("subnets", subnets);
pub(crate) const PORTS: Collector = Collector::new("ports", ports);
pub(crate) const ROUTERS: Collector = Collector::new("routers", routers);
pub(crate) const AGENT_STATES: Collector = Collector::new("agent_states", agent_states);
pub(crate) const NETWORK_IP_AVAILABILITIES: Collector =
    Collector::new("network_ip_availabilities", network_ip_availabilities);

fn bool_label(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

#[allow(clippy::cast_precision_loss)] // resource counts are far below 2^52
fn count(value: usize) -> f64 {
    value as f64
}

fn parse_number(
    kind: &ResourceKind,
    field: &'static str,
    value: &str,
) -> Result<f64, CollectError> {
    value.parse().map_err(|source| CollectError::ParseNumber {
        kind: kind.clone(),
        field,
        value: value.to_owned(),
        source,
    })
}

/// Counts floating IPs and those associated with a private IP, but not active.
fn floating_ips(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let region = ctx.region();
    let fips: Vec<FloatingIp> =
        fetch_all(ctx.api(), &ResourceKind::FloatingIps, &ListFilters::none())?;

    let mut associated_not_active = 0;
    for fip in &fips {
        emitter.emit(
            "floating_ip",
            1.0,
            &[
                &fip.id,
                &fip.floating_network_id,
                &fip.router_id,
                &fip.status,
                &fip.project_id,
                &fip.floating_ip_address,
                region,
            ],
        );
        if !fip.fixed_ip.is_empty() && fip.status != ACTIVE {
            associated_not_active += 1;
        }
    }

    emitter.emit("floating_ips", count(fips.len()), &[region]);
    emitter.emit(
        "floating_ips_associated_not_active",
        count(associated_not_active),
        &[region],
    );
    Ok(())
}

/// Reports networks together with their provider attributes.
fn networks(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let region = ctx.region();
    let networks =
        fetch_joined::<Network>(ctx.api(), &ResourceKind::Networks, &ListFilters::none())?;

    for network in &networks {
        emitter.emit(
            "network",
            1.0,
            &[
                &network.id,
                &network.name,
                bool_label(network.admin_state_up),
                &network.status,
                &network.tenant_id,
                &network.project_id,
                region,
                &network.network_type,
                &network.physical_network,
                &network.segmentation_id,
            ],
        );
    }
    emitter.emit("networks", count(networks.len()), &[region]);
    Ok(())
}

fn security_groups(
    ctx: &CollectContext<'_>,
    emitter: &mut Emitter<'_>,
) -> Result<(), CollectError> {
    let groups: Vec<SecurityGroup> =
        fetch_all(ctx.api(), &ResourceKind::SecurityGroups, &ListFilters::none())?;
    emitter.emit("security_groups", count(groups.len()), &[ctx.region()]);
    Ok(())
}

fn subnets(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let subnets: Vec<Subnet> = fetch_all(ctx.api(), &ResourceKind::Subnets, &ListFilters::none())?;
    emitter.emit("subnets", count(subnets.len()), &[ctx.region()]);
    Ok(())
}

/// Reports ports together with their binding attributes, and counts active ports without IPs
/// and inactive load balancer ports.
fn ports(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let region = ctx.region();
    let ports = fetch_joined::<Port>(ctx.api(), &ResourceKind::Ports, &ListFilters::none())?;

    let mut no_ips = 0;
    let mut lb_not_active = 0;
    for port in &ports {
        if port.status == ACTIVE && port.fixed_ips.is_empty() {
            no_ips += 1;
        }
        if port.device_owner == LOAD_BALANCER_OWNER && port.status != ACTIVE {
            lb_not_active += 1;
        }

        emitter.emit(
            "port",
            1.0,
            &[
                &port.id,
                &port.network_id,
                &port.mac_address,
                &port.device_owner,
                &port.status,
                &port.vif_type,
                bool_label(port.admin_state_up),
                &port.device_id,
                region,
            ],
        );
    }

    emitter.emit("ports", count(ports.len()), &[region]);
    emitter.emit("ports_lb_not_active", count(lb_not_active), &[region]);
    emitter.emit("ports_no_ips", count(no_ips), &[region]);
    Ok(())
}

/// Reports routers and the L3 agents hosting them. Requires an additional request per router.
fn routers(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let region = ctx.region();
    let routers: Vec<Router> = fetch_all(ctx.api(), &ResourceKind::Routers, &ListFilters::none())?;

    let mut not_active = 0;
    for router in &routers {
        if router.status != ACTIVE {
            not_active += 1;
        }

        let agents_kind = ResourceKind::RouterL3Agents {
            router_id: router.id.clone(),
        };
        let agents: Vec<L3Agent> = fetch_all(ctx.api(), &agents_kind, &ListFilters::none())?;
        for agent in &agents {
            emitter.emit(
                "l3_agent_of_router",
                flag(agent.alive),
                &[
                    &router.id,
                    &agent.id,
                    &agent.ha_state,
                    bool_label(agent.alive),
                    bool_label(agent.admin_state_up),
                    &agent.host,
                    region,
                ],
            );
        }

        emitter.emit(
            "router",
            1.0,
            &[
                &router.id,
                &router.name,
                &router.project_id,
                bool_label(router.admin_state_up),
                &router.status,
                &router.gateway_info.network_id,
                region,
            ],
        );
    }

    emitter.emit("routers", count(routers.len()), &[region]);
    emitter.emit("routers_not_active", count(not_active), &[region]);
    Ok(())
}

/// Reports liveness of networking agents.
fn agent_states(ctx: &CollectContext<'_>, emitter: &mut Emitter<'_>) -> Result<(), CollectError> {
    let region = ctx.region();
    let agents: Vec<Agent> = fetch_all(ctx.api(), &ResourceKind::Agents, &ListFilters::none())?;

    for agent in &agents {
        let generated_id;
        let id = if agent.id.is_empty() {
            generated_id = ctx
                .generate_id()
                .map_err(|source| CollectError::IdGeneration {
                    kind: ResourceKind::Agents,
                    source,
                })?;
            tracing::trace!(
                host = %agent.host,
                binary = %agent.binary,
                id = %generated_id,
                "Generated substitute ID for agent without ID"
            );
            &generated_id
        } else {
            &agent.id
        };
        let admin_state = if agent.admin_state_up { "up" } else { "down" };

        emitter.emit(
            "agent_state",
            flag(agent.alive),
            &[id, &agent.host, &agent.binary, admin_state, region],
        );
    }
    Ok(())
}

/// Reports total and used IPs for each subnet.
fn network_ip_availabilities(
    ctx: &CollectContext<'_>,
    emitter: &mut Emitter<'_>,
) -> Result<(), CollectError> {
    const KIND: ResourceKind = ResourceKind::NetworkIpAvailabilities;

    let region = ctx.region();
    let availabilities: Vec<NetworkIpAvailability> =
        fetch_all(ctx.api(), &KIND, &ListFilters::none())?;

    for network in &availabilities {
        let project_id = if network.project_id.is_empty() {
            &network.tenant_id
        } else {
            &network.project_id
        };

        for subnet in &network.subnets {
            let ip_version = subnet.ip_version.to_string();
            let labels: [&str; 7] = [
                &network.network_id,
                &network.network_name,
                &ip_version,
                &subnet.cidr,
                &subnet.subnet_name,
                project_id,
                region,
            ];

            let total_ips = parse_number(&KIND, "total_ips", &subnet.total_ips)?;
            emitter.emit("network_ip_availabilities_total", total_ips, &labels);
            let used_ips = parse_number(&KIND, "used_ips", &subnet.used_ips)?;
            emitter.emit("network_ip_availabilities_used", used_ips, &labels);
        }
    }
    Ok(())
}
