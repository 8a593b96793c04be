//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes in declaration order
//! - Look up the matching route for a request path
//! - Build paths from route names (reverse routing)
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) ordered scan; the table is small and order carries meaning
//! - Explicit NotFound rather than silent default

use std::collections::HashSet;

use crate::routing::pattern::{Captures, PathPattern};
use crate::routing::RoutingError;
use crate::views::View;

/// The inventory route table.
///
/// More specific templates come before overlapping general ones:
/// `machine_events` must stay ahead of `machine`, whose token capture
/// would otherwise swallow the `/events` suffix.
const INVENTORY_ROUTES: &[(&str, View, &str)] = &[
    ("/", View::Index, "index"),
    ("/groups/", View::Groups, "groups"),
    ("/groups/{group_id:int}/machines/", View::GroupMachines, "group_machines"),
    ("/business_units/", View::Mbu, "mbu"),
    ("/business_units/review_merge/", View::ReviewMbuMerge, "review_mbu_merge"),
    ("/business_units/merge/", View::MergeMbu, "merge_mbu"),
    ("/business_units/create/", View::CreateMbu, "create_mbu"),
    ("/business_units/{pk:int}/update/", View::UpdateMbu, "update_mbu"),
    ("/business_units/{pk:int}/machines/", View::MbuMachines, "mbu_machines"),
    ("/business_units/{pk:int}/api_enrollment/", View::MbuApiEnrollment, "mbu_api_enrollment"),
    ("/machine/{serial_number:token}/events/", View::MachineEvents, "machine_events"),
    ("/machine/{serial_number:token}/", View::Machine, "machine"),
    ("/probes/", View::Probes, "probes"),
    ("/probes/{probe_key:text}/", View::Probe, "probe"),
];

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub view: View,
    pub pattern: PathPattern,
}

/// Result of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    pub captures: Captures,
}

/// Ordered, immutable route table.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Build a router from `(template, view, name)` triples, keeping their order.
    pub fn new<'a, I>(table: I) -> Result<Self, RoutingError>
    where
        I: IntoIterator<Item = (&'a str, View, &'a str)>,
    {
        let mut seen = HashSet::new();
        let mut routes = Vec::new();

        for (template, view, name) in table {
            if !seen.insert(name.to_string()) {
                return Err(RoutingError::DuplicateName(name.to_string()));
            }
            routes.push(Route {
                name: name.to_string(),
                view,
                pattern: PathPattern::parse(template)?,
            });
        }

        tracing::debug!(routes = routes.len(), "Route table compiled");
        Ok(Self { routes })
    }

    /// The inventory console route table.
    pub fn inventory() -> Result<Self, RoutingError> {
        Self::new(INVENTORY_ROUTES.iter().copied())
    }

    /// Find the first route matching `path`.
    pub fn resolve(&self, path: &str) -> Result<RouteMatch<'_>, RoutingError> {
        self.routes
            .iter()
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|captures| RouteMatch { route, captures })
            })
            .ok_or_else(|| RoutingError::NotFound {
                path: path.to_string(),
            })
    }

    /// Build the path of route `name` from `captures`.
    ///
    /// The path is in decoded form and always resolves back to `name`; a
    /// capture value that would land on an earlier route is rejected.
    pub fn reverse(&self, name: &str, captures: &Captures) -> Result<String, RoutingError> {
        let route = self
            .get(name)
            .ok_or_else(|| RoutingError::UnknownRoute(name.to_string()))?;
        let path = route.pattern.build(name, captures)?;

        let matched = self.resolve(&path)?;
        if matched.route.name != route.name {
            return Err(RoutingError::Shadowed {
                route: route.name.clone(),
                path,
                by: matched.route.name.clone(),
            });
        }
        Ok(path)
    }

    /// Link to route `name` under `mount`, capture values percent-encoded.
    pub fn href(
        &self,
        mount: &str,
        name: &str,
        captures: &Captures,
    ) -> Result<String, RoutingError> {
        self.reverse(name, captures)?;
        let route = self
            .get(name)
            .ok_or_else(|| RoutingError::UnknownRoute(name.to_string()))?;
        Ok(format!("{mount}{}", route.pattern.build_encoded(name, captures)?))
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Routes in declaration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::pattern::CaptureKind;

    fn router() -> Router {
        Router::inventory().unwrap()
    }

    fn sample_captures(route: &Route, token: &str, text: &str) -> Captures {
        route
            .pattern
            .captures()
            .fold(Captures::new(), |caps, (name, kind)| {
                let value = match kind {
                    CaptureKind::Digits => "42",
                    CaptureKind::Token => token,
                    CaptureKind::Text => text,
                };
                caps.with(name, value)
            })
    }

    #[test]
    fn test_table_order_and_names() {
        let names: Vec<_> = router().routes().iter().map(|r| r.name.clone()).collect();
        assert_eq!(
            names,
            [
                "index",
                "groups",
                "group_machines",
                "mbu",
                "review_mbu_merge",
                "merge_mbu",
                "create_mbu",
                "update_mbu",
                "mbu_machines",
                "mbu_api_enrollment",
                "machine_events",
                "machine",
                "probes",
                "probe",
            ]
        );
    }

    #[test]
    fn test_every_route_round_trips() {
        let router = router();
        for route in router.routes() {
            let captures = sample_captures(route, "C02XK0ABJGH5", "some probe name");
            let path = router.reverse(&route.name, &captures).unwrap();
            let matched = router.resolve(&path).unwrap();
            assert_eq!(matched.route.name, route.name, "path {path}");
            assert_eq!(matched.route.view, route.view);
            assert_eq!(matched.captures, captures);
        }
    }

    #[test]
    fn test_reverse_never_yields_another_route() {
        let router = router();
        for (token, text) in [("ABC/events", "a/b c"), ("a/events/b", "x/events")] {
            for route in router.routes() {
                let captures = sample_captures(route, token, text);
                match router.reverse(&route.name, &captures) {
                    Ok(path) => {
                        let matched = router.resolve(&path).unwrap();
                        assert_eq!(matched.route.name, route.name, "path {path}");
                    }
                    Err(RoutingError::Shadowed { route: name, .. }) => {
                        assert_eq!(name, route.name)
                    }
                    Err(e) => panic!("{}: {e}", route.name),
                }
            }
        }
    }

    #[test]
    fn test_reverse_rejects_shadowed_path() {
        let router = router();
        let caps = Captures::new().with("serial_number", "ABC/events");
        match router.reverse("machine", &caps) {
            Err(RoutingError::Shadowed { route, path, by }) => {
                assert_eq!(route, "machine");
                assert_eq!(path, "/machine/ABC/events/");
                assert_eq!(by, "machine_events");
            }
            other => panic!("expected a shadowed path, got {other:?}"),
        }

        // A slash elsewhere in the serial still reaches `machine`.
        let caps = Captures::new().with("serial_number", "a/events/b");
        let path = router.reverse("machine", &caps).unwrap();
        assert_eq!(router.resolve(&path).unwrap().route.name, "machine");
    }

    #[test]
    fn test_href_under_mount() {
        let router = router();
        let caps = Captures::new().with("probe_key", "some probe name");
        assert_eq!(
            router.href("/inventory", "probe", &caps).unwrap(),
            "/inventory/probes/some%20probe%20name/"
        );
        assert_eq!(router.href("", "groups", &Captures::new()).unwrap(), "/groups/");
        let shadowed = Captures::new().with("serial_number", "X/events");
        assert!(matches!(
            router.href("/inventory", "machine", &shadowed),
            Err(RoutingError::Shadowed { .. })
        ));
    }

    #[test]
    fn test_machine_events_before_machine() {
        let router = router();
        let m = router.resolve("/machine/ABC123/events/").unwrap();
        assert_eq!(m.route.name, "machine_events");
        assert_eq!(m.captures.get("serial_number"), Some("ABC123"));

        let m = router.resolve("/machine/ABC123/").unwrap();
        assert_eq!(m.route.name, "machine");
        assert_eq!(m.captures.get("serial_number"), Some("ABC123"));
    }

    #[test]
    fn test_machine_serial_with_slash() {
        let router = router();
        let m = router.resolve("/machine/a/events/b/").unwrap();
        assert_eq!(m.route.name, "machine");
        assert_eq!(m.captures.get("serial_number"), Some("a/events/b"));
    }

    #[test]
    fn test_numeric_pk() {
        let router = router();
        let m = router.resolve("/business_units/42/update/").unwrap();
        assert_eq!(m.route.name, "update_mbu");
        assert_eq!(m.captures.parse::<i64>("pk").unwrap(), 42);

        assert!(matches!(
            router.resolve("/business_units/abc/update/"),
            Err(RoutingError::NotFound { .. })
        ));
    }

    #[test]
    fn test_static_business_unit_paths() {
        let router = router();
        for (path, name) in [
            ("/business_units/", "mbu"),
            ("/business_units/review_merge/", "review_mbu_merge"),
            ("/business_units/merge/", "merge_mbu"),
            ("/business_units/create/", "create_mbu"),
            ("/business_units/7/machines/", "mbu_machines"),
            ("/business_units/7/api_enrollment/", "mbu_api_enrollment"),
        ] {
            assert_eq!(router.resolve(path).unwrap().route.name, name, "{path}");
        }
    }

    #[test]
    fn test_probe_key_with_spaces() {
        let router = router();
        let m = router.resolve("/probes/some probe name/").unwrap();
        assert_eq!(m.route.name, "probe");
        assert_eq!(m.captures.get("probe_key"), Some("some probe name"));
    }

    #[test]
    fn test_no_match() {
        let router = router();
        for path in ["", "/missing/", "/groups", "/groups/x/machines/", "/machine//"] {
            assert!(
                matches!(router.resolve(path), Err(RoutingError::NotFound { .. })),
                "{path:?} should not match"
            );
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let table = [("/a/", View::Index, "dup"), ("/b/", View::Groups, "dup")];
        assert!(matches!(Router::new(table), Err(RoutingError::DuplicateName(n)) if n == "dup"));
    }

    #[test]
    fn test_reverse_unknown_route() {
        assert!(matches!(
            router().reverse("nope", &Captures::new()),
            Err(RoutingError::UnknownRoute(_))
        ));
    }

    #[test]
    fn test_reverse_rejects_bad_capture() {
        let caps = Captures::new().with("serial_number", "has space");
        assert!(matches!(
            router().reverse("machine", &caps),
            Err(RoutingError::InvalidCapture { .. })
        ));
    }
}
