//! End-to-end dispatch through a live console.

use std::time::Duration;

use serde_json::Value;

mod common;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_routes_reach_their_views() {
    let (addr, shutdown, handle) = common::start_console("/inventory").await;
    let client = client();

    for (path, route, view) in [
        ("/inventory/", "index", "Index"),
        ("/inventory/groups/12/machines/", "group_machines", "GroupMachines"),
        ("/inventory/business_units/42/update/", "update_mbu", "UpdateMbu"),
        ("/inventory/machine/ABC123/events/", "machine_events", "MachineEvents"),
        ("/inventory/machine/ABC123/", "machine", "Machine"),
        ("/inventory/probes/some%20probe%20name/", "probe", "Probe"),
    ] {
        let res = client.get(format!("http://{addr}{path}")).send().await.unwrap();
        assert_eq!(res.status(), 200, "{path}");
        assert!(res.headers().contains_key("x-request-id"));
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["route"], route, "{path}");
        assert_eq!(body["view"], view, "{path}");
    }

    let body: Value = client
        .get(format!("http://{addr}/inventory/probes/some%20probe%20name/"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["captures"]["probe_key"], "some probe name");
    assert_eq!(body["menu"][2]["href"], "/inventory/business_units/");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_menu_links_are_served() {
    for mount in ["/inventory", ""] {
        let (addr, shutdown, handle) = common::start_console(mount).await;
        let client = client();

        let body: Value = client
            .get(format!("http://{addr}{mount}/"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let menu = body["menu"].as_array().unwrap();
        assert_eq!(menu.len(), 4);

        for item in menu {
            let href = item["href"].as_str().unwrap();
            assert!(href.starts_with(&format!("{mount}/")), "{href}");
            let res = client.get(format!("http://{addr}{href}")).send().await.unwrap();
            assert_eq!(res.status(), 200, "menu link {href} under {mount:?}");
        }

        shutdown.trigger();
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_method_not_allowed_lists_view_methods() {
    let (addr, shutdown, handle) = common::start_console("/inventory").await;

    let res = client()
        .post(format!("http://{addr}/inventory/probes/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "GET, HEAD");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_unmatched_paths_are_not_found() {
    let (addr, shutdown, handle) = common::start_console("/inventory").await;
    let client = client();

    for path in ["/inventory/business_units/abc/update/", "/inventory/nope/", "/groups/"] {
        let res = client.get(format!("http://{addr}{path}")).send().await.unwrap();
        assert_eq!(res.status(), 404, "{path}");
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["error"], "not_found");
    }

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (addr, shutdown, handle) = common::start_console("").await;

    let res = client()
        .delete(format!("http://{addr}/probes/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 405);

    let res = client()
        .post(format!("http://{addr}/business_units/create/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
