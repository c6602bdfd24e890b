//! Typed records of networking resources.
//!
//! Records are deserialized leniently: `null` string fields are read as empty strings, and numeric
//! fields that the API may return either as numbers or as strings are kept in textual form.

// Record fields mirror the networking API.
#![allow(missing_docs)]

use serde::{Deserialize, Deserializer};

use crate::join::{Extension, Join};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn textual<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Textual {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Textual>::deserialize(deserializer)? {
        Some(Textual::Text(text)) => text,
        Some(Textual::Number(number)) => number.to_string(),
        None => String::new(),
    })
}

/// Floating IP.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FloatingIp {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub floating_network_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub floating_ip_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub port_id: String,
    /// Private IP the floating IP is associated with; empty if the floating IP is not associated.
    #[serde(rename = "fixed_ip_address", deserialize_with = "null_as_default")]
    pub fixed_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub router_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
}

/// Network without extension attributes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Network {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_state_up: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subnets: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub shared: bool,
}

/// Provider extension of a network.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkProviderExt {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "provider:network_type", deserialize_with = "null_as_default")]
    pub network_type: String,
    #[serde(rename = "provider:physical_network", deserialize_with = "null_as_default")]
    pub physical_network: String,
    /// Segmentation ID (e.g., VLAN ID or VNI). Kept in textual form.
    #[serde(rename = "provider:segmentation_id", deserialize_with = "textual")]
    pub segmentation_id: String,
}

impl Extension for NetworkProviderExt {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

/// Network joined with its provider extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkWithProvider {
    pub id: String,
    pub name: String,
    pub admin_state_up: bool,
    pub status: String,
    pub subnets: Vec<String>,
    pub tenant_id: String,
    pub project_id: String,
    pub shared: bool,
    pub network_type: String,
    pub physical_network: String,
    pub segmentation_id: String,
}

impl Join for Network {
    type Extension = NetworkProviderExt;
    type Joined = NetworkWithProvider;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn join(self, extension: NetworkProviderExt) -> NetworkWithProvider {
        NetworkWithProvider {
            id: self.id,
            name: self.name,
            admin_state_up: self.admin_state_up,
            status: self.status,
            subnets: self.subnets,
            tenant_id: self.tenant_id,
            project_id: self.project_id,
            shared: self.shared,
            network_type: extension.network_type,
            physical_network: extension.physical_network,
            segmentation_id: extension.segmentation_id,
        }
    }
}

/// Security group.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
}

/// Subnet.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Subnet {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cidr: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_version: u8,
    #[serde(deserialize_with = "null_as_default")]
    pub gateway_ip: String,
    #[serde(deserialize_with = "null_as_default")]
    pub enable_dhcp: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
}

/// Fixed IP of a port.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FixedIp {
    #[serde(deserialize_with = "null_as_default")]
    pub subnet_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_address: String,
}

/// Port without extension attributes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Port {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_state_up: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub mac_address: String,
    #[serde(deserialize_with = "null_as_default")]
    pub fixed_ips: Vec<FixedIp>,
    #[serde(deserialize_with = "null_as_default")]
    pub device_owner: String,
    #[serde(deserialize_with = "null_as_default")]
    pub device_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
}

/// Port binding extension of a port.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PortBindingExt {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "binding:host_id", deserialize_with = "null_as_default")]
    pub host_id: String,
    #[serde(rename = "binding:vif_type", deserialize_with = "null_as_default")]
    pub vif_type: String,
    #[serde(rename = "binding:vnic_type", deserialize_with = "null_as_default")]
    pub vnic_type: String,
}

impl Extension for PortBindingExt {
    fn resource_id(&self) -> &str {
        &self.id
    }
}

/// Port joined with its binding extension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortWithBinding {
    pub id: String,
    pub network_id: String,
    pub name: String,
    pub admin_state_up: bool,
    pub status: String,
    pub mac_address: String,
    pub fixed_ips: Vec<FixedIp>,
    pub device_owner: String,
    pub device_id: String,
    pub tenant_id: String,
    pub project_id: String,
    pub host_id: String,
    pub vif_type: String,
    pub vnic_type: String,
}

impl Join for Port {
    type Extension = PortBindingExt;
    type Joined = PortWithBinding;

    fn resource_id(&self) -> &str {
        &self.id
    }

    fn join(self, extension: PortBindingExt) -> PortWithBinding {
        PortWithBinding {
            id: self.id,
            network_id: self.network_id,
            name: self.name,
            admin_state_up: self.admin_state_up,
            status: self.status,
            mac_address: self.mac_address,
            fixed_ips: self.fixed_ips,
            device_owner: self.device_owner,
            device_id: self.device_id,
            tenant_id: self.tenant_id,
            project_id: self.project_id,
            host_id: extension.host_id,
            vif_type: extension.vif_type,
            vnic_type: extension.vnic_type,
        }
    }
}

/// External gateway of a router.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct GatewayInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub network_id: String,
    pub enable_snat: Option<bool>,
}

/// Router.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Router {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_state_up: bool,
    #[serde(rename = "external_gateway_info", deserialize_with = "null_as_default")]
    pub gateway_info: GatewayInfo,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
}

/// L3 agent hosting a router.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct L3Agent {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_state_up: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub alive: bool,
    /// HA state of the router on this agent (`active` / `standby`); empty for non-HA routers.
    #[serde(deserialize_with = "null_as_default")]
    pub ha_state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub binary: String,
}

/// Networking agent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Agent {
    #[serde(deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub agent_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub binary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(deserialize_with = "null_as_default")]
    pub topic: String,
    #[serde(deserialize_with = "null_as_default")]
    pub availability_zone: String,
    #[serde(deserialize_with = "null_as_default")]
    pub admin_state_up: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub alive: bool,
}

/// IP availability of a single subnet. IP counts may exceed `u64` for IPv6 subnets, so they
/// are kept in textual form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SubnetIpAvailability {
    #[serde(deserialize_with = "null_as_default")]
    pub subnet_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subnet_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub cidr: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ip_version: u8,
    #[serde(deserialize_with = "textual")]
    pub total_ips: String,
    #[serde(deserialize_with = "textual")]
    pub used_ips: String,
}

/// IP availability of a network.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkIpAvailability {
    #[serde(deserialize_with = "null_as_default")]
    pub network_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub network_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tenant_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub project_id: String,
    #[serde(rename = "subnet_ip_availability", deserialize_with = "null_as_default")]
    pub subnets: Vec<SubnetIpAvailability>,
    #[serde(deserialize_with = "textual")]
    pub total_ips: String,
    #[serde(deserialize_with = "textual")]
    pub used_ips: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn nulls_are_read_as_defaults() {
        let fip: FloatingIp = serde_json::from_value(json!({
            "id": "fip",
            "fixed_ip_address": null,
            "router_id": null,
            "status": "DOWN",
        }))
        .unwrap();
        assert_eq!(fip.id, "fip");
        assert_eq!(fip.fixed_ip, "");
        assert_eq!(fip.router_id, "");
        assert_eq!(fip.status, "DOWN");

        let router: Router = serde_json::from_value(json!({
            "id": "r",
            "external_gateway_info": null,
        }))
        .unwrap();
        assert_eq!(router.gateway_info, GatewayInfo::default());
    }

    #[test]
    fn numeric_fields_are_kept_textual() {
        let ext: NetworkProviderExt = serde_json::from_value(json!({
            "id": "net",
            "provider:network_type": "vlan",
            "provider:segmentation_id": 100,
        }))
        .unwrap();
        assert_eq!(ext.segmentation_id, "100");
        assert_eq!(ext.physical_network, "");

        let ext: NetworkProviderExt = serde_json::from_value(json!({
            "provider:segmentation_id": null,
        }))
        .unwrap();
        assert_eq!(ext.segmentation_id, "");

        let subnet: SubnetIpAvailability = serde_json::from_value(json!({
            "total_ips": 18_446_744_073_709_551_615_u64,
            "used_ips": "3",
        }))
        .unwrap();
        assert_eq!(subnet.total_ips, "18446744073709551615");
        assert_eq!(subnet.used_ips, "3");
    }

    #[test]
    fn reading_nested_records() {
        let port: Port = serde_json::from_value(json!({
            "id": "p",
            "fixed_ips": [{ "subnet_id": "s", "ip_address": "10.0.0.3" }],
            "binding:vif_type": "ovs",
        }))
        .unwrap();
        assert_eq!(port.fixed_ips.len(), 1);
        assert_eq!(port.fixed_ips[0].ip_address, "10.0.0.3");

        let availability: NetworkIpAvailability = serde_json::from_value(json!({
            "network_id": "n",
            "subnet_ip_availability": [{ "subnet_id": "s", "ip_version": 4 }],
        }))
        .unwrap();
        assert_eq!(availability.subnets[0].ip_version, 4);
        assert_eq!(availability.subnets[0].total_ips, "");
    }
}
