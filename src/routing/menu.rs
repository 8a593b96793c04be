//! Main menu descriptor consumed by the UI layer.

use serde::Serialize;

use crate::routing::{Captures, Router, RoutingError};

const MAIN_MENU: &[(&str, &str)] = &[
    ("index", "Machines"),
    ("groups", "Groups"),
    ("mbu", "Business units"),
    ("probes", "Probes"),
];

/// A labelled navigation entry pointing at a route name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub route: &'static str,
    pub label: &'static str,
}

impl MenuItem {
    /// The entry's link on a console mounted at `mount`.
    pub fn href(&self, router: &Router, mount: &str) -> Result<String, RoutingError> {
        router.href(mount, self.route, &Captures::new())
    }
}

/// Inventory main menu, in display order.
pub fn main_menu() -> Vec<MenuItem> {
    MAIN_MENU
        .iter()
        .map(|&(route, label)| MenuItem { route, label })
        .collect()
}
