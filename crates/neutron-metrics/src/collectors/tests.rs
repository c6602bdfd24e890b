//! Tests for networking collectors.

use assert_matches::assert_matches;
use serde_json::{json, Value};

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use super::*;
use crate::{
    api::FixtureApi,
    catalog::{DEFAULT_PREFIX, NEUTRON_METRICS},
    descriptors::{Collector, MetricDescriptor, VersionGate},
    emit::Emitter,
    engine::default_id_generator,
    fetch::FetchErrorKind,
    format::Format,
    registry::Registry,
    sink::{Sample, ScrapeSink},
};

const REGION: &str = "RegionOne";

fn registry() -> Registry {
    Registry::register(
        NEUTRON_METRICS,
        DEFAULT_PREFIX,
        &VersionGate::any(),
        &|_: &MetricDescriptor| false,
    )
    .unwrap()
}

fn run_collector(collector: Collector, api: &FixtureApi) -> Result<ScrapeSink, CollectError> {
    run_collector_with(collector, api, Arc::new(default_id_generator))
}

fn run_collector_with(
    collector: Collector,
    api: &FixtureApi,
    id_generator: IdGenerator,
) -> Result<ScrapeSink, CollectError> {
    let registry = registry();
    let ctx = CollectContext::new(api, REGION, &id_generator);
    let mut emitter = Emitter::new(&registry);
    collector.run(&ctx, &mut emitter)?;

    let sink = ScrapeSink::default();
    emitter.commit(&sink);
    Ok(sink)
}

fn single_value(sink: &ScrapeSink, name: &str) -> f64 {
    let samples = sink.samples(name);
    assert_eq!(samples.len(), 1, "{name}: {samples:?}");
    assert_eq!(samples[0].labels, [("region_name", REGION.to_owned())]);
    samples[0].value
}

fn encoded_samples(sink: &ScrapeSink) -> Vec<String> {
    let mut buffer = String::new();
    sink.encode(&mut buffer, Format::Prometheus).unwrap();
    buffer
        .lines()
        .filter(|line| !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

fn label_values(sample: &Sample) -> Vec<&str> {
    sample.labels.iter().map(|(_, value)| value.as_str()).collect()
}

#[test]
fn floating_ips_scenario() {
    let fips = vec![
        json!({
            "id": "fip-1",
            "floating_network_id": "public",
            "floating_ip_address": "172.24.4.10",
            "fixed_ip_address": "10.0.0.5",
            "router_id": "router-1",
            "status": "DOWN",
            "project_id": "project",
        }),
        json!({ "id": "fip-2", "fixed_ip_address": null, "status": "ACTIVE" }),
        json!({ "id": "fip-3", "fixed_ip_address": "10.0.0.9", "status": "ACTIVE" }),
    ];
    let api = FixtureApi::new(2).with_records(&ResourceKind::FloatingIps, fips);
    let sink = run_collector(FLOATING_IPS, &api).unwrap();

    assert_eq!(single_value(&sink, "floating_ips"), 3.0);
    assert_eq!(single_value(&sink, "floating_ips_associated_not_active"), 1.0);

    let samples = sink.samples("floating_ip");
    assert_eq!(samples.len(), 3);
    assert!(samples.iter().all(|sample| sample.value == 1.0));
    assert_eq!(
        label_values(&samples[0]),
        ["fip-1", "public", "router-1", "DOWN", "project", "172.24.4.10", REGION]
    );
    assert_eq!(
        samples[1].labels[0],
        ("id", "fip-2".to_owned()),
        "{samples:?}"
    );
}

#[test]
fn floating_ip_predicate() {
    let cases = [
        ("10.0.0.1", "DOWN", true),
        ("10.0.0.1", "ERROR", true),
        ("10.0.0.1", "ACTIVE", false),
        ("", "DOWN", false),
        ("", "ACTIVE", false),
    ];
    for (fixed_ip, status, is_counted) in cases {
        let fip = json!({ "id": "fip", "fixed_ip_address": fixed_ip, "status": status });
        let api = FixtureApi::new(0).with_records(&ResourceKind::FloatingIps, vec![fip]);
        let sink = run_collector(FLOATING_IPS, &api).unwrap();
        let expected = if is_counted { 1.0 } else { 0.0 };
        assert_eq!(
            single_value(&sink, "floating_ips_associated_not_active"),
            expected,
            "{fixed_ip:?}, {status:?}"
        );
    }
}

#[test]
fn networks_with_provider_attributes() {
    let networks: Vec<_> = (0..5)
        .map(|i| {
            json!({
                "id": format!("net-{i}"),
                "name": format!("network {i}"),
                "admin_state_up": i % 2 == 0,
                "status": "ACTIVE",
                "tenant_id": "tenant",
                "project_id": "project",
                "provider:network_type": "vlan",
                "provider:physical_network": "physnet1",
                "provider:segmentation_id": 100 + i,
            })
        })
        .chain([json!({ "id": "net-plain", "name": "plain" })])
        .collect();
    let api = FixtureApi::new(2).with_records(&ResourceKind::Networks, networks);
    let sink = run_collector(NETWORKS, &api).unwrap();

    assert_eq!(single_value(&sink, "networks"), 6.0);
    let samples = sink.samples("network");
    assert_eq!(samples.len(), 6);
    assert_eq!(
        label_values(&samples[1]),
        [
            "net-1", "network 1", "false", "ACTIVE", "tenant", "project", REGION, "vlan",
            "physnet1", "101"
        ]
    );
    assert_eq!(
        label_values(&samples[5]),
        ["net-plain", "plain", "false", "", "", "", REGION, "", "", ""]
    );
}

#[test]
fn network_names_are_escaped_on_encoding() {
    let network = json!({
        "id": "n1",
        "name": "a\"b\\c\nd",
        "admin_state_up": true,
        "status": "ACTIVE",
    });
    let api = FixtureApi::new(0).with_records(&ResourceKind::Networks, vec![network]);
    let sink = run_collector(NETWORKS, &api).unwrap();
    assert_eq!(label_values(&sink.samples("network")[0])[1], "a\"b\\c\nd");

    let lines = encoded_samples(&sink);
    assert_eq!(lines.len(), 2, "{lines:#?}");
    let network_line = lines
        .iter()
        .find(|line| line.starts_with("openstack_neutron_network{"))
        .unwrap();
    assert!(
        network_line.starts_with(
            r#"openstack_neutron_network{id="n1",name="a\"b\\c\nd",admin_state_up="true","#
        ),
        "{network_line}"
    );
    assert!(network_line.ends_with(" 1.0"), "{network_line}");
}

#[test]
fn counting_security_groups_and_subnets() {
    let api = FixtureApi::new(0)
        .with_pages(
            &ResourceKind::SecurityGroups,
            vec![
                vec![json!({ "id": "a" }), json!({ "id": "b" })],
                vec![json!({ "id": "c" })],
                vec![],
            ],
        )
        .with_records(&ResourceKind::Subnets, vec![]);

    let sink = run_collector(SECURITY_GROUPS, &api).unwrap();
    assert_eq!(single_value(&sink, "security_groups"), 3.0);
    let sink = run_collector(SUBNETS, &api).unwrap();
    assert_eq!(single_value(&sink, "subnets"), 0.0);
}

#[test]
fn port_predicates_are_independent() {
    let ports = vec![
        // Neither predicate
        json!({
            "id": "p1",
            "status": "ACTIVE",
            "fixed_ips": [{ "subnet_id": "s", "ip_address": "10.0.0.3" }],
            "device_owner": "compute:nova",
        }),
        // No IPs only
        json!({ "id": "p2", "status": "ACTIVE", "fixed_ips": [] }),
        // LB not active only
        json!({
            "id": "p3",
            "status": "DOWN",
            "fixed_ips": [],
            "device_owner": "neutron:LOADBALANCERV2",
        }),
        // Active LB port without IPs: only "no IPs"
        json!({
            "id": "p4",
            "status": "ACTIVE",
            "device_owner": "neutron:LOADBALANCERV2",
        }),
        json!({
            "id": "p5",
            "status": "BUILD",
            "fixed_ips": [{ "subnet_id": "s", "ip_address": "10.0.0.4" }],
            "device_owner": "neutron:LOADBALANCERV2",
            "binding:vif_type": "ovs",
            "binding:host_id": "compute-1",
            "admin_state_up": true,
            "mac_address": "fa:16:3e:00:00:05",
            "network_id": "net",
            "device_id": "lb",
        }),
    ];
    let api = FixtureApi::new(3).with_records(&ResourceKind::Ports, ports);
    let sink = run_collector(PORTS, &api).unwrap();

    assert_eq!(single_value(&sink, "ports"), 5.0);
    assert_eq!(single_value(&sink, "ports_no_ips"), 2.0);
    assert_eq!(single_value(&sink, "ports_lb_not_active"), 2.0);

    let samples = sink.samples("port");
    assert_eq!(samples.len(), 5);
    assert_eq!(
        label_values(&samples[4]),
        [
            "p5",
            "net",
            "fa:16:3e:00:00:05",
            "neutron:LOADBALANCERV2",
            "BUILD",
            "ovs",
            "true",
            "lb",
            REGION
        ]
    );
}

fn router_api() -> FixtureApi {
    let routers = vec![
        json!({
            "id": "r1",
            "name": "router-1",
            "status": "ACTIVE",
            "admin_state_up": true,
            "project_id": "project",
            "external_gateway_info": { "network_id": "public", "enable_snat": true },
        }),
        json!({
            "id": "r2",
            "name": "router-2",
            "status": "ERROR",
            "admin_state_up": false,
            "external_gateway_info": null,
        }),
    ];
    let agents = vec![
        json!({
            "id": "agent-1",
            "host": "net-1",
            "alive": true,
            "admin_state_up": true,
            "ha_state": "active",
        }),
        json!({
            "id": "agent-2",
            "host": "net-2",
            "alive": false,
            "admin_state_up": true,
            "ha_state": "standby",
        }),
    ];

    FixtureApi::new(1)
        .with_records(&ResourceKind::Routers, routers)
        .with_records(&l3_agents("r1"), agents)
}

fn l3_agents(router_id: &str) -> ResourceKind {
    ResourceKind::RouterL3Agents {
        router_id: router_id.to_owned(),
    }
}

#[test]
fn routers_with_l3_agents() {
    let api = router_api();
    let sink = run_collector(ROUTERS, &api).unwrap();

    assert_eq!(single_value(&sink, "routers"), 2.0);
    assert_eq!(single_value(&sink, "routers_not_active"), 1.0);
    assert_eq!(api.request_count(&l3_agents("r1")), 2);
    assert_eq!(api.request_count(&l3_agents("r2")), 1);

    let routers = sink.samples("router");
    assert_eq!(routers.len(), 2);
    assert_eq!(
        label_values(&routers[0]),
        ["r1", "router-1", "project", "true", "ACTIVE", "public", REGION]
    );
    assert_eq!(
        label_values(&routers[1]),
        ["r2", "router-2", "", "false", "ERROR", "", REGION]
    );

    let agents = sink.samples("l3_agent_of_router");
    assert_eq!(agents.len(), 2);
    assert_eq!(agents[0].value, 1.0);
    assert_eq!(
        label_values(&agents[0]),
        ["r1", "agent-1", "active", "true", "true", "net-1", REGION]
    );
    assert_eq!(agents[1].value, 0.0);
    assert_eq!(label_values(&agents[1])[3], "false");
}

#[test]
fn router_secondary_fetch_failure_aborts_collector() {
    let api = router_api().with_failing_page(&l3_agents("r2"), 0);
    let err = run_collector(ROUTERS, &api).unwrap_err();

    assert_eq!(*err.resource_kind(), l3_agents("r2"));
    assert_matches!(&err, CollectError::Fetch(err) if matches!(err.kind(), FetchErrorKind::Api(_)));
    assert!(err.to_string().contains("L3 agents of router `r2`"), "{err}");
}

#[test]
fn agent_states() {
    let agents = vec![
        json!({
            "id": "agent-1",
            "host": "net-1",
            "binary": "neutron-l3-agent",
            "alive": true,
            "admin_state_up": true,
        }),
        json!({
            "id": "agent-2",
            "host": "net-2",
            "binary": "neutron-dhcp-agent",
            "alive": false,
            "admin_state_up": false,
        }),
    ];
    let api = FixtureApi::new(0).with_records(&ResourceKind::Agents, agents);
    let sink = run_collector(AGENT_STATES, &api).unwrap();

    let samples = sink.samples("agent_state");
    assert_eq!(samples.len(), 2);
    assert_eq!(samples[0].value, 1.0);
    assert_eq!(
        label_values(&samples[0]),
        ["agent-1", "net-1", "neutron-l3-agent", "up", REGION]
    );
    assert_eq!(samples[1].value, 0.0);
    assert_eq!(
        label_values(&samples[1]),
        ["agent-2", "net-2", "neutron-dhcp-agent", "down", REGION]
    );
}

#[test]
fn duplicate_agents_do_not_accumulate_state() {
    let agent = json!({
        "id": "a",
        "host": "h",
        "binary": "b",
        "alive": true,
        "admin_state_up": true,
    });
    let api = FixtureApi::new(0).with_records(&ResourceKind::Agents, vec![agent.clone(), agent]);
    let sink = run_collector(AGENT_STATES, &api).unwrap();
    assert_eq!(sink.samples("agent_state").len(), 2);

    assert_eq!(
        encoded_samples(&sink),
        [
            "openstack_neutron_agent_state{id=\"a\",hostname=\"h\",service=\"b\",adminState=\"up\",\
             region_name=\"RegionOne\"} 1.0"
        ]
    );
}

fn agents_without_ids() -> FixtureApi {
    let agents = vec![
        json!({ "id": "", "host": "net-1", "alive": true }),
        json!({ "host": "net-2", "alive": true }),
        json!({ "id": null, "host": "net-3", "alive": false }),
        json!({ "id": "agent-4", "host": "net-4", "alive": true }),
    ];
    FixtureApi::new(0).with_records(&ResourceKind::Agents, agents)
}

#[test]
fn generating_missing_agent_ids() {
    let counter = Arc::new(AtomicUsize::new(0));
    let generator_counter = Arc::clone(&counter);
    let id_generator: IdGenerator = Arc::new(move || {
        let idx = generator_counter.fetch_add(1, Ordering::Relaxed);
        Ok(format!("generated-{idx}"))
    });

    let sink = run_collector_with(AGENT_STATES, &agents_without_ids(), id_generator).unwrap();
    assert_eq!(counter.load(Ordering::Relaxed), 3);
    let ids: Vec<_> = sink
        .samples("agent_state")
        .iter()
        .map(|sample| sample.labels[0].1.clone())
        .collect();
    assert_eq!(ids, ["generated-0", "generated-1", "generated-2", "agent-4"]);
}

#[test]
fn default_generator_produces_unique_ids() {
    let sink = run_collector(AGENT_STATES, &agents_without_ids()).unwrap();
    let ids: HashSet<_> = sink
        .samples("agent_state")
        .iter()
        .map(|sample| sample.labels[0].1.clone())
        .collect();
    assert_eq!(ids.len(), 4);
    assert!(ids.iter().all(|id| !id.is_empty()));
}

#[test]
fn id_generation_failure_aborts_collector() {
    let id_generator: IdGenerator = Arc::new(|| Err(IdGenerationError::new("entropy exhausted")));
    let err = run_collector_with(AGENT_STATES, &agents_without_ids(), id_generator).unwrap_err();
    assert_eq!(*err.resource_kind(), ResourceKind::Agents);
    assert_matches!(err, CollectError::IdGeneration { .. });
    assert!(err.to_string().contains("entropy exhausted"), "{err}");
}

fn ip_availability(total_ips: Value) -> Value {
    json!({
        "network_id": "net",
        "network_name": "private",
        "tenant_id": "tenant",
        "project_id": "",
        "total_ips": 253,
        "used_ips": 3,
        "subnet_ip_availability": [
            {
                "subnet_id": "s4",
                "subnet_name": "private-v4",
                "cidr": "10.0.0.0/24",
                "ip_version": 4,
                "total_ips": total_ips,
                "used_ips": "3",
            },
        ],
    })
}

#[test]
fn network_ip_availabilities() {
    let mut network = ip_availability(json!("253"));
    network["subnet_ip_availability"]
        .as_array_mut()
        .unwrap()
        .push(json!({
            "subnet_id": "s6",
            "subnet_name": "private-v6",
            "cidr": "fd00::/64",
            "ip_version": 6,
            "total_ips": 18_446_744_073_709_551_615_u64,
            "used_ips": 2,
        }));
    let other = json!({
        "network_id": "other",
        "network_name": "other",
        "tenant_id": "tenant",
        "project_id": "project",
        "subnet_ip_availability": [],
    });
    let api = FixtureApi::new(0)
        .with_records(&ResourceKind::NetworkIpAvailabilities, vec![network, other]);
    let sink = run_collector(NETWORK_IP_AVAILABILITIES, &api).unwrap();

    let total = sink.samples("network_ip_availabilities_total");
    assert_eq!(total.len(), 2);
    assert_eq!(total[0].value, 253.0);
    // `project_id` falls back to `tenant_id`
    assert_eq!(
        label_values(&total[0]),
        ["net", "private", "4", "10.0.0.0/24", "private-v4", "tenant", REGION]
    );
    assert_eq!(label_values(&total[1])[2], "6");
    assert!(total[1].value > 1.8e19);

    let used = sink.samples("network_ip_availabilities_used");
    let used: Vec<_> = used.iter().map(|sample| sample.value).collect();
    assert_eq!(used, [3.0, 2.0]);
}

#[test]
fn unparsable_ip_count_aborts_collector() {
    let api = FixtureApi::new(0).with_records(
        &ResourceKind::NetworkIpAvailabilities,
        vec![ip_availability(json!("abc"))],
    );
    let err = run_collector(NETWORK_IP_AVAILABILITIES, &api).unwrap_err();
    assert_matches!(
        &err,
        CollectError::ParseNumber { field: "total_ips", value, .. } if value == "abc"
    );
    assert_eq!(*err.resource_kind(), ResourceKind::NetworkIpAvailabilities);
}

#[test]
fn fetch_errors_identify_resource_kind() {
    let api = FixtureApi::new(0)
        .with_records(&ResourceKind::Subnets, vec![json!({ "id": "s" })])
        .with_failing_page(&ResourceKind::Subnets, 0);
    let err = run_collector(SUBNETS, &api).unwrap_err();
    assert_eq!(*err.resource_kind(), ResourceKind::Subnets);
    assert!(err.to_string().contains("subnets"), "{err}");
}
