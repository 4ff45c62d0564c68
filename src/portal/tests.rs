use http::{Method, StatusCode};

use super::*;
use crate::{
    config::Config,
    security::SecurityGate,
    state::{self, AppState, SharedState},
    storage::{MemoryStore, Storage},
};

struct FakeDevice {
    heap: usize,
}

impl DeviceInfo for FakeDevice {
    fn uptime_secs(&self) -> u64 {
        42
    }

    fn free_heap(&self) -> usize {
        self.heap
    }

    fn clients(&self) -> Vec<ClientInfo> {
        vec![ClientInfo {
            mac: "AA:BB:CC:DD:EE:FF".to_string(),
            rssi: -40,
        }]
    }
}

type TestService = PortalService<MemoryStore, FakeDevice>;

fn service_with_heap(heap: usize) -> (TestService, SharedState<MemoryStore>) {
    let st = state::shared(AppState::load(Storage::new(MemoryStore::new())));
    let svc = PortalService::new(st.clone(), SecurityGate::default(), FakeDevice { heap });
    (svc, st)
}

fn service() -> (TestService, SharedState<MemoryStore>) {
    service_with_heap(100_000)
}

fn admin(method: Method, uri: &str) -> PortalRequest {
    PortalRequest::new(method, uri).with_basic_auth("admin", "beacon")
}

fn body(resp: &PortalResponse) -> String {
    String::from_utf8_lossy(&resp.body).into_owned()
}

#[test]
fn basic_auth_header_parsing() {
    let req = PortalRequest::new(Method::GET, "/").with_basic_auth("user", "p:ss");
    let header = req.authorization.unwrap();
    assert_eq!(parse_basic_auth(&header), Some(("user".to_string(), "p:ss".to_string())));
    assert_eq!(parse_basic_auth("Bearer abc"), None);
    assert_eq!(parse_basic_auth("Basic !!!"), None);
}

#[test]
fn root_redirects_foreign_hosts() {
    let (mut svc, _) = service();
    let resp = svc.handle(&PortalRequest::new(Method::GET, "/").with_host("example.com"), 0);
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.header_value("location"), Some(PORTAL_URL));

    let resp = svc.handle(&PortalRequest::new(Method::GET, "/"), 0);
    assert_eq!(resp.status, StatusCode::FOUND);
    assert_eq!(resp.header_value("location"), Some(PORTAL_URL));

    let resp = svc.handle(&PortalRequest::new(Method::GET, "/").with_host(PORTAL_IP_STR), 0);
    assert_eq!(resp.status, StatusCode::OK);
    assert!(body(&resp).contains("View on GitHub"));
}

#[test]
fn detection_and_unknown_paths_bounce_to_portal() {
    let (mut svc, _) = service();
    for path in ["/generate_204", "/hotspot-detect.html", "/connecttest.txt", "/nope?x=1"] {
        let resp = svc.handle(&PortalRequest::new(Method::GET, path), 0);
        assert_eq!(resp.status, StatusCode::FOUND, "{}", path);
    }
}

#[test]
fn public_data_prefers_deep_link() {
    let (mut svc, st) = service();
    let get = PortalRequest::new(Method::GET, "/api/public_data");

    let v: serde_json::Value = serde_json::from_slice(&svc.handle(&get, 0).body).unwrap();
    assert_eq!(v["redirectUrl"], Config::default().redirect_url);

    {
        let mut s = state::lock(&st);
        s.identities = crate::identity::parse_list("Connect Me!!!|https://deep.example");
    }
    let v: serde_json::Value = serde_json::from_slice(&svc.handle(&get, 0).body).unwrap();
    assert_eq!(v["redirectUrl"], "https://deep.example");

    {
        let mut s = state::lock(&st);
        s.identities.clear();
        s.config.redirect_url.clear();
    }
    let v: serde_json::Value = serde_json::from_slice(&svc.handle(&get, 0).body).unwrap();
    assert_eq!(v["redirectUrl"], "https://google.com");
}

#[test]
fn public_endpoints_skip_the_gate() {
    let (mut svc, _) = service();
    for _ in 0..10 {
        let resp = svc.handle(&PortalRequest::new(Method::GET, "/api/public_data"), 0);
        assert_eq!(resp.status, StatusCode::OK);
    }
    assert_eq!(svc.gate().session().last_request, None);
}

#[test]
fn content_is_escaped() {
    let (mut svc, st) = service();
    state::lock(&st).config.advertising_headline = "<script>x</script>".to_string();
    let resp = svc.handle(&PortalRequest::new(Method::GET, "/content"), 0);
    assert!(body(&resp).contains("&lt;script&gt;"));
}

#[test]
fn admin_requires_credentials() {
    let (mut svc, _) = service();
    let resp = svc.handle(&PortalRequest::new(Method::GET, "/admin"), 0);
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert!(resp.header_value("WWW-Authenticate").is_some());
    assert_eq!(resp.header_value("X-Frame-Options"), Some("DENY"));

    let resp = svc.handle(&admin(Method::GET, "/admin"), 200);
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.content_type, "text/html");
}

#[test]
fn lockout_hides_credential_check() {
    let (mut svc, _) = service();
    let mut now = 1_000;
    for _ in 0..5 {
        let bad = PortalRequest::new(Method::GET, "/api/data").with_basic_auth("admin", "wrong");
        assert_eq!(svc.handle(&bad, now).status, StatusCode::UNAUTHORIZED);
        now += 150;
    }

    let resp = svc.handle(&admin(Method::GET, "/api/data"), now);
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body(&resp), "Too many failed attempts. Try again later.");

    let later = now + crate::security::LOCKOUT_DURATION_MS;
    let resp = svc.handle(&admin(Method::GET, "/api/data"), later);
    assert_eq!(resp.status, StatusCode::OK);
}

#[test]
fn rapid_requests_are_rate_limited() {
    let (mut svc, _) = service();
    assert_eq!(svc.handle(&admin(Method::GET, "/api/data"), 500).status, StatusCode::OK);
    let resp = svc.handle(&admin(Method::GET, "/api/data"), 550);
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body(&resp), "Too many requests. Slow down.");
}

#[test]
fn data_reports_status_and_config() {
    let (mut svc, st) = service();
    state::lock(&st).packets_per_second = 77;
    let resp = svc.handle(&admin(Method::GET, "/api/data"), 0);
    let v: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(v["uptime"], 42);
    assert_eq!(v["clientCount"], 1);
    assert_eq!(v["packetsPerSecond"], 77);
    assert_eq!(v["ssidCount"], 50);
    assert_eq!(v["beaconInterval"], 100);
    assert!(v["ssids"].as_str().unwrap().starts_with("Mom Use This One\n"));
}

#[test]
fn save_config_validates_and_persists() {
    let (mut svc, st) = service();

    let bad = admin(Method::POST, "/api/save_config").with_body(r#"{"wifiChannel":20}"#);
    assert_eq!(svc.handle(&bad, 0).status, StatusCode::BAD_REQUEST);

    let garbage = admin(Method::POST, "/api/save_config").with_body(r#"{"wpa2":"yes"}"#);
    assert_eq!(svc.handle(&garbage, 200).status, StatusCode::BAD_REQUEST);

    let empty = admin(Method::POST, "/api/save_config");
    assert_eq!(svc.handle(&empty, 400).status, StatusCode::BAD_REQUEST);

    let ok = admin(Method::POST, "/api/save_config")
        .with_body(r#"{"wpa2":true,"advertisingHeadline":"Hello \"there\""}"#);
    let resp = svc.handle(&ok, 600);
    assert_eq!(resp.status, StatusCode::OK);

    let mut s = state::lock(&st);
    assert!(s.config.wpa2);
    assert_eq!(s.config.advertising_headline, "Hello \"there\"");
    let stored = s.storage.load_config();
    assert_eq!(stored, s.config);
}

#[test]
fn save_config_refused_on_low_memory() {
    let (mut svc, _) = service_with_heap(1_000);
    let req = admin(Method::POST, "/api/save_config").with_body(r#"{"wpa2":true}"#);
    assert_eq!(svc.handle(&req, 0).status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn portal_html_refused_on_low_memory() {
    let (mut svc, st) = service_with_heap(1_000);
    let req = admin(Method::POST, "/api/save_portal_html").with_body("<h1>x</h1>");
    let resp = svc.handle(&req, 0);
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body(&resp), "Low memory");
    assert!(!state::lock(&st).storage.has_custom_portal());
}

#[test]
fn save_ssids_replaces_rotation() {
    let (mut svc, st) = service();
    let req = admin(Method::POST, "/api/save_ssids")
        .with_body("Free Wifi\nTotally Legit|https://x.example\n");
    let resp = svc.handle(&req, 0);
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(state::lock(&st).identities.len(), 2);

    let huge = admin(Method::POST, "/api/save_ssids").with_body(vec![b'a'; MAX_SSID_LIST_LEN + 1]);
    assert_eq!(svc.handle(&huge, 200).status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(state::lock(&st).identities.len(), 2);
}

#[test]
fn export_then_import_restores_everything() {
    let (mut svc, st) = service();
    let save = admin(Method::POST, "/api/save_ssids").with_body("One\nTwo|http://two");
    svc.handle(&save, 0);

    let export = svc.handle(&admin(Method::GET, "/api/export"), 200);
    assert_eq!(export.status, StatusCode::OK);
    assert!(export.header_value("Content-Disposition").unwrap().contains("attachment"));

    let (mut other, other_st) = service();
    let import = admin(Method::POST, "/api/import").with_body(export.body.clone());
    assert_eq!(other.handle(&import, 0).status, StatusCode::OK);

    let a = state::lock(&st);
    let b = state::lock(&other_st);
    assert_eq!(a.config, b.config);
    assert_eq!(a.identities, b.identities);
}

#[test]
fn import_rejects_unknown_fields() {
    let (mut svc, _) = service();
    let req = admin(Method::POST, "/api/import").with_body(r#"{"enableBLE":true}"#);
    assert_eq!(svc.handle(&req, 0).status, StatusCode::BAD_REQUEST);
}

#[test]
fn reboot_sets_action() {
    let (mut svc, _) = service();
    let resp = svc.handle(&admin(Method::POST, "/api/reboot"), 0);
    assert_eq!(resp.action, Action::Reboot);

    // wrong method never reaches the handler
    let resp = svc.handle(&admin(Method::GET, "/api/reboot"), 200);
    assert_eq!(resp.action, Action::None);
    assert_eq!(resp.status, StatusCode::FOUND);
}

#[test]
fn custom_portal_html_flow() {
    let (mut svc, st) = service();
    state::lock(&st).config.use_custom_portal = true;

    let resp = svc.handle(&PortalRequest::new(Method::GET, "/content"), 0);
    assert!(body(&resp).contains("ESP Beacon Spam"));

    let save = admin(Method::POST, "/api/save_portal_html").with_body("<h1>Custom</h1>");
    assert_eq!(svc.handle(&save, 0).status, StatusCode::OK);
    let resp = svc.handle(&PortalRequest::new(Method::GET, "/content"), 0);
    assert_eq!(body(&resp), "<h1>Custom</h1>");

    let get = svc.handle(&admin(Method::GET, "/api/portal_html"), 200);
    assert_eq!(body(&get), "<h1>Custom</h1>");

    let reset = svc.handle(&admin(Method::POST, "/api/reset_portal_html"), 400);
    assert_eq!(reset.status, StatusCode::OK);
    let resp = svc.handle(&PortalRequest::new(Method::GET, "/content"), 0);
    assert!(body(&resp).contains("ESP Beacon Spam"));
}

#[test]
fn clients_listing() {
    let (mut svc, _) = service();
    let resp = svc.handle(&admin(Method::GET, "/api/clients"), 0);
    let v: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(v["total"], 1);
    assert_eq!(v["clients"][0]["rssi"], -40);
}
