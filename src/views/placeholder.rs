//! Stand-in view implementation.
//!
//! Answers with a JSON description of the routed request so the console can
//! run before real views are plugged in.

use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::routing::{main_menu, CaptureKind, Captures};
use crate::views::{Handler, View, ViewError, ViewRequest};

#[derive(Serialize)]
struct MenuLink {
    label: &'static str,
    href: String,
}

#[derive(Serialize)]
struct ViewDescription<'a> {
    view: View,
    route: &'a str,
    method: &'a str,
    request_id: &'a str,
    captures: &'a Captures,
    menu: Vec<MenuLink>,
}

/// Describes the routed request as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderHandler;

impl PlaceholderHandler {
    /// Methods the placeholder answers for `view`.
    pub fn allowed_methods(view: View) -> Vec<Method> {
        let mut methods = vec![Method::GET, Method::HEAD];
        if Self::accepts_form(view) {
            methods.push(Method::POST);
        }
        methods
    }

    fn accepts_form(view: View) -> bool {
        matches!(
            view,
            View::ReviewMbuMerge
                | View::MergeMbu
                | View::CreateMbu
                | View::UpdateMbu
                | View::MbuApiEnrollment
        )
    }
}

impl Handler for PlaceholderHandler {
    fn handle(&self, request: &ViewRequest<'_>) -> Result<Response, ViewError> {
        let method = request.method;
        let allowed = Self::allowed_methods(request.view);
        if !allowed.contains(method) {
            return Err(ViewError::MethodNotAllowed {
                method: method.clone(),
                allowed,
            });
        }

        // The router only checks the digit class; make sure ids fit.
        if let Some(route) = request.router.get(request.route_name) {
            for (name, kind) in route.pattern.captures() {
                if kind == CaptureKind::Digits {
                    request.captures.parse::<i64>(name)?;
                }
            }
        }

        let menu = main_menu()
            .into_iter()
            .map(|item| {
                item.href(request.router, request.mount_path)
                    .map(|href| MenuLink { label: item.label, href })
                    .map_err(|e| ViewError::Internal(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let body = ViewDescription {
            view: request.view,
            route: request.route_name,
            method: method.as_str(),
            request_id: request.request_id,
            captures: request.captures,
            menu,
        };
        Ok(Json(body).into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::Router;
    use axum::http::StatusCode;

    fn handle(router: &Router, path: &str, method: Method) -> Result<Response, ViewError> {
        let matched = router.resolve(path).unwrap();
        PlaceholderHandler.handle(&ViewRequest {
            view: matched.route.view,
            route_name: &matched.route.name,
            captures: &matched.captures,
            method: &method,
            request_id: "req-1",
            router,
            mount_path: "/inventory",
        })
    }

    #[test]
    fn test_describes_match() {
        let router = Router::inventory().unwrap();
        let response = handle(&router, "/groups/3/machines/", Method::GET).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_oversized_pk_is_bad_capture() {
        let router = Router::inventory().unwrap();
        let err = handle(&router, "/business_units/123456789012345678901234/update/", Method::GET)
            .unwrap_err();
        assert!(matches!(err, ViewError::BadCapture(_)));
    }

    #[test]
    fn test_post_only_on_form_views() {
        let router = Router::inventory().unwrap();
        assert!(handle(&router, "/business_units/create/", Method::POST).is_ok());
        match handle(&router, "/probes/", Method::POST) {
            Err(ViewError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, [Method::GET, Method::HEAD]);
            }
            other => panic!("expected 405, got {other:?}"),
        }
        match handle(&router, "/business_units/7/update/", Method::DELETE) {
            Err(ViewError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, [Method::GET, Method::HEAD, Method::POST]);
            }
            other => panic!("expected 405, got {other:?}"),
        }
    }
}
