//! Text rendering of the network overview
//!
//! The network description is read from YAML; nothing is probed. The view
//! lists each interface with its IPv4 state and hardware, the default
//! routes, and the additional actions that make sense for the interfaces
//! present.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yml::Value;

use crate::error::CliError;

const IFNAME_PADDING: usize = 8;
const IFNAME_MAX_WIDTH: usize = 20;
const VENDOR_WIDTH: usize = 15;
const MODEL_WIDTH: usize = 20;
const NO_INTERFACES: &str = "No network interfaces detected.";
const NO_IPV6: &str = "No IPv6 connection";

/// One network interface as described by the network model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    pub name: String,
    pub ip: Option<String>,
    pub ip_method: Option<String>,
    pub subnets: Option<String>,
    pub hwaddr: Option<String>,
    pub vendor: String,
    pub model: String,
    pub speed: Option<String>,
    /// Enslaved to a bond
    pub bond_slave: bool,
    /// Part of a bond, as master or slave
    pub bonded: bool,
    /// Whether the user configured this interface
    pub configured: bool,
    /// The action applying this interface's configuration
    pub action: Option<Value>,
}

/// Kernel default route for one address family
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultRoute {
    pub gateway: Option<String>,
    pub interface: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    pub ipv4: Option<DefaultRoute>,
    pub ipv6: Option<DefaultRoute>,
}

/// An entry of the additional options menu
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub signal: String,
}

/// Everything the network overview shows
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkModel {
    pub interfaces: Vec<Interface>,
    /// Gateway chosen by the user, overriding the kernel's IPv4 route
    pub default_gateway: Option<String>,
    pub routes: Routes,
    pub menu: Vec<MenuEntry>,
    /// Actions that set the default route
    pub default_route: Vec<Value>,
}

impl NetworkModel {
    /// Load a network description
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid
    /// network description.
    pub async fn load(path: &Path) -> Result<Self, CliError> {
        let contents = tokio::fs::read_to_string(path).await?;
        serde_yml::from_str(&contents)
            .map_err(|e| CliError::Network(format!("{}: {e}", path.display())))
    }

    fn is_bonded(&self, name: &str) -> bool {
        self.interfaces
            .iter()
            .any(|iface| iface.name == name && iface.bonded)
    }
}

/// First line of `text` wrapped at `width` columns, breaking long words
fn first_wrapped_line(text: &str, width: usize) -> String {
    let mut line = String::new();
    for word in text.split_whitespace() {
        if line.is_empty() {
            if word.chars().count() > width {
                return word.chars().take(width).collect();
            }
            line.push_str(word);
        } else if line.chars().count() + 1 + word.chars().count() <= width {
            line.push(' ');
            line.push_str(word);
        } else {
            break;
        }
    }
    line
}

fn is_unknown(text: &str) -> bool {
    text.to_lowercase().starts_with("unknown")
}

fn ipv4_line(iface: &Interface) -> String {
    let mut line = String::new();
    if let Some(ip) = iface.ip.as_deref().filter(|ip| !ip.is_empty()) {
        line.push_str(ip);
    }
    if let Some(method) = iface.ip_method.as_deref().filter(|m| !m.is_empty()) {
        line.push_str(&format!(" ({method}) "));
    }
    if let Some(subnets) = iface.subnets.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!("from {subnets} "));
    }
    line.trim().to_string()
}

fn hardware_line(iface: &Interface) -> String {
    let mut line = String::new();
    if let Some(hwaddr) = iface.hwaddr.as_deref().filter(|h| !h.is_empty()) {
        line.push_str(&format!("{hwaddr} "));
    }
    if iface.bond_slave {
        line.push_str("(Bonded) ");
    }
    if !iface.vendor.is_empty() && !is_unknown(&iface.vendor) {
        line.push_str(&format!("{} ", first_wrapped_line(&iface.vendor, VENDOR_WIDTH)));
    }
    if !iface.model.is_empty() && !is_unknown(&iface.model) {
        line.push_str(&format!("{} ", first_wrapped_line(&iface.model, MODEL_WIDTH)));
    }
    if let Some(speed) = iface.speed.as_deref().filter(|s| !s.is_empty()) {
        line.push_str(&format!("({speed})"));
    }
    line.trim_end().to_string()
}

fn route_source(route: Option<&DefaultRoute>) -> String {
    let Some(route) = route else {
        return "is unset".to_string();
    };
    match (&route.gateway, &route.interface) {
        (Some(gateway), _) => format!("via {gateway}"),
        (None, Some(interface)) => format!("through interface {interface}"),
        (None, None) => String::new(),
    }
}

/// The rendered network overview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkView {
    /// Interface rows: name column and detail column
    pub rows: Vec<(String, String)>,
    /// Width of the interface name column
    pub name_width: usize,
    pub routes: Vec<String>,
    pub options: Vec<String>,
}

impl NetworkView {
    #[must_use]
    pub fn new(model: &NetworkModel) -> Self {
        let mut rows = Vec::new();
        for iface in &model.interfaces {
            tracing::debug!(name = %iface.name, ip = ?iface.ip, "interface");
            rows.push((iface.name.clone(), ipv4_line(iface)));
            rows.push((String::new(), NO_IPV6.to_string()));
            rows.push((String::new(), hardware_line(iface)));
        }

        let name_width = model
            .interfaces
            .iter()
            .map(|iface| iface.name.chars().count())
            .max()
            .map_or(IFNAME_PADDING, |longest| {
                (IFNAME_PADDING + longest).min(IFNAME_MAX_WIDTH)
            });

        Self {
            rows,
            name_width,
            routes: Self::route_lines(model),
            options: Self::menu_options(model),
        }
    }

    fn route_lines(model: &NetworkModel) -> Vec<String> {
        if model.interfaces.is_empty() {
            return Vec::new();
        }
        let ipv4 = match &model.default_gateway {
            Some(gateway) => format!("via {gateway}"),
            None => route_source(model.routes.ipv4.as_ref()),
        };
        let ipv6 = route_source(model.routes.ipv6.as_ref());
        vec![
            format!("  IPv4 default route {ipv4}."),
            format!("  IPv6 default route {ipv6}."),
        ]
    }

    fn menu_options(model: &NetworkModel) -> Vec<String> {
        let interfaces = model.interfaces.len();
        let not_bonded = model
            .interfaces
            .iter()
            .filter(|iface| !model.is_bonded(&iface.name))
            .count();

        model
            .menu
            .iter()
            .filter(|entry| {
                if entry.signal.contains(":set-default-route") && interfaces < 2 {
                    tracing::debug!("skipping default route option (only one nic)");
                    return false;
                }
                if entry.signal.contains(":bond-interfaces") && not_bonded < 2 {
                    tracing::debug!("skipping bonding option (not enough available nics)");
                    return false;
                }
                true
            })
            .map(|entry| entry.label.clone())
            .collect()
    }

    /// Interface section as text lines
    #[must_use]
    pub fn body_lines(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return vec![NO_INTERFACES.to_string()];
        }
        self.rows
            .iter()
            .map(|(name, detail)| {
                format!("{name:<width$}  {detail}", width = self.name_width)
                    .trim_end()
                    .to_string()
            })
            .collect()
    }
}

/// Actions produced by accepting the network configuration: configured
/// interfaces first, then the default route
///
/// # Errors
///
/// Returns an error if the actions cannot be rendered as YAML for the log.
pub fn done(model: &NetworkModel) -> Result<Vec<Value>, CliError> {
    let mut actions: Vec<Value> = model
        .interfaces
        .iter()
        .filter(|iface| iface.configured)
        .filter_map(|iface| iface.action.clone())
        .collect();
    actions.extend(model.default_route.iter().cloned());

    let yaml = serde_yml::to_string(&actions)
        .map_err(|e| CliError::Network(format!("cannot render actions: {e}")))?;
    tracing::debug!("Configured Network Actions:\n{yaml}");
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL: &str = r#"
interfaces:
  - name: ens3
    ip: 192.168.122.10
    ip_method: dhcp
    subnets: 192.168.122.0/24
    hwaddr: "52:54:00:12:34:56"
    vendor: Red Hat, Inc. Virtio network device
    model: Virtio network device with a long name
    speed: 1000 Mb/s
    configured: true
    action:
      type: physical
      name: ens3
  - name: enp0s25
    vendor: Unknown vendor
    model: unknown
    bond_slave: true
    bonded: true
routes:
  ipv4:
    gateway: 192.168.122.1
  ipv6:
    interface: ens3
menu:
  - label: Set default route
    signal: "menu:network:main:set-default-route"
  - label: Bond interfaces
    signal: "menu:network:main:bond-interfaces"
default_route:
  - type: route
    gateway: 192.168.122.1
"#;

    fn model() -> NetworkModel {
        serde_yml::from_str(MODEL).unwrap()
    }

    #[test]
    fn interface_rows_describe_address_and_hardware() {
        let view = NetworkView::new(&model());
        assert_eq!(
            view.rows[0],
            (
                "ens3".to_string(),
                "192.168.122.10 (dhcp) from 192.168.122.0/24".to_string()
            )
        );
        assert_eq!(view.rows[1].1, "No IPv6 connection");
        assert_eq!(
            view.rows[2].1,
            "52:54:00:12:34:56 Red Hat, Inc. Virtio network (1000 Mb/s)"
        );
        assert_eq!(view.rows[5].1, "(Bonded)");
        assert_eq!(view.name_width, 15);
    }

    #[test]
    fn name_column_is_capped() {
        let mut model = model();
        model.interfaces[0].name = "a-very-long-interface-name".to_string();
        assert_eq!(NetworkView::new(&model).name_width, 20);
    }

    #[test]
    fn wrapping_keeps_the_first_line() {
        assert_eq!(first_wrapped_line("Intel Corporation", 15), "Intel");
        assert_eq!(first_wrapped_line("Realtek", 15), "Realtek");
        assert_eq!(first_wrapped_line("Supercalifragilistic", 15), "Supercalifragil");
    }

    #[test]
    fn default_routes_prefer_the_chosen_gateway() {
        let mut model = model();
        let view = NetworkView::new(&model);
        assert_eq!(
            view.routes,
            vec![
                "  IPv4 default route via 192.168.122.1.".to_string(),
                "  IPv6 default route through interface ens3.".to_string(),
            ]
        );

        model.default_gateway = Some("10.0.0.1".to_string());
        model.routes = Routes::default();
        let view = NetworkView::new(&model);
        assert_eq!(view.routes[0], "  IPv4 default route via 10.0.0.1.");
        assert_eq!(view.routes[1], "  IPv6 default route is unset.");
    }

    #[test]
    fn menu_hides_options_that_need_more_interfaces() {
        let mut model = model();
        // only ens3 is free to bond
        assert_eq!(NetworkView::new(&model).options, vec!["Set default route"]);

        model.interfaces.truncate(1);
        assert!(NetworkView::new(&model).options.is_empty());

        model.interfaces.push(Interface {
            name: "ens4".to_string(),
            ..Interface::default()
        });
        assert_eq!(
            NetworkView::new(&model).options,
            vec!["Set default route", "Bond interfaces"]
        );
    }

    #[test]
    fn no_interfaces_gives_a_placeholder() {
        let view = NetworkView::new(&NetworkModel::default());
        assert_eq!(view.body_lines(), vec![NO_INTERFACES.to_string()]);
        assert!(view.routes.is_empty());
    }

    #[test]
    fn done_lists_interface_actions_before_routes() {
        let actions = done(&model()).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0]["type"].as_str(), Some("physical"));
        assert_eq!(actions[1]["type"].as_str(), Some("route"));
    }
}
