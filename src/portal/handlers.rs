//! HTTP route handlers
//!
//! Platform free: the device server and the tests both feed
//! [`PortalRequest`]s in and send [`PortalResponse`]s out.

use base64::Engine;
use http::{Method, StatusCode};
use serde::Serialize;

use super::{html, PORTAL_IP_STR, PORTAL_URL};
use crate::{
    config::{ConfigError, ConfigUpdate},
    identity,
    security::{Decision, SecurityGate},
    state::{self, SharedState},
    storage::KvStore,
};

pub const MAX_SSID_LIST_LEN: usize = 20_000;
pub const MAX_PORTAL_HTML_LEN: usize = 16 * 1024;
const MIN_HEAP_CONFIG: usize = 2_000;
const MIN_HEAP_SSIDS: usize = 5_000;
const FALLBACK_REDIRECT: &str = "https://google.com";

/// OS connectivity probes. All of them get bounced to the portal so the
/// sign-in sheet pops up.
const DETECTION_PATHS: &[&str] = &[
    // Apple
    "/hotspot-detect.html",
    "/library/test/success.html",
    "/captive.apple.com",
    "/captive.apple.com/hotspot-detect.html",
    // Android, Chrome, Samsung, Xiaomi
    "/generate_204",
    "/gen_204",
    "/mobile/status.php",
    "/connectivity-check.html",
    "/connectivitycheck/gstatic/generate_204",
    "/clients3.google.com/generate_204",
    "/check_network.html",
    "/connectivitycheck.android.com/generate_204",
    "/connect/wifi_portal.html",
    "/chrome/generate_204",
    // Windows
    "/ncsi.txt",
    "/connecttest.txt",
    "/redirect",
    "/fwlink",
    "/msftconnecttest.com/connecttest.txt",
    "/www.msftconnecttest.com/connecttest.txt",
    "/ipv6.msftconnecttest.com/connecttest.txt",
    "/www.msftncsi.com/ncsi.txt",
    // Firefox
    "/success.txt",
    "/canonical.html",
    "/detectportal.firefox.com/success.txt",
];

#[derive(Debug, Clone)]
pub struct PortalRequest {
    pub method: Method,
    /// Path without query string.
    pub path: String,
    pub host: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl PortalRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        let path = uri.split('?').next().unwrap_or("/").to_string();
        Self {
            method,
            path,
            host: None,
            authorization: None,
            body: Vec::new(),
        }
    }

    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn with_basic_auth(mut self, user: &str, pass: &str) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
        self.authorization = Some(format!("Basic {}", token));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Restart once the response has been flushed.
    Reboot,
}

#[derive(Debug, Clone)]
pub struct PortalResponse {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
    pub action: Action,
}

impl PortalResponse {
    pub fn new(status: StatusCode, content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type,
            headers: Vec::new(),
            body: body.into(),
            action: Action::None,
        }
    }

    pub fn text(status: StatusCode, body: &str) -> Self {
        Self::new(status, "text/plain", body)
    }

    pub fn html(body: impl Into<Vec<u8>>) -> Self {
        Self::new(StatusCode::OK, "text/html", body)
    }

    pub fn json<T: Serialize>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(StatusCode::OK, "application/json", body),
            Err(e) => Self::text(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("encode error: {}", e),
            ),
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::new(StatusCode::FOUND, "text/plain", Vec::new())
            .header("Location", location)
            .no_cache()
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn no_cache(self) -> Self {
        self.header("Cache-Control", "no-cache, no-store, must-revalidate")
            .header("Pragma", "no-cache")
            .header("Expires", "0")
    }

    fn security_headers(self) -> Self {
        self.header("X-Content-Type-Options", "nosniff")
            .header("X-Frame-Options", "DENY")
            .header("X-XSS-Protection", "1; mode=block")
            .no_cache()
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub mac: String,
    pub rssi: i8,
}

/// Facts about the device that only the platform knows.
pub trait DeviceInfo {
    fn uptime_secs(&self) -> u64;
    fn free_heap(&self) -> usize;
    fn clients(&self) -> Vec<ClientInfo>;
}

/// Splits `Basic base64(user:pass)`.
pub fn parse_basic_auth(header: &str) -> Option<(String, String)> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(token.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

pub struct PortalService<S, D> {
    state: SharedState<S>,
    gate: SecurityGate,
    device: D,
}

impl<S: KvStore, D: DeviceInfo> PortalService<S, D> {
    pub fn new(state: SharedState<S>, gate: SecurityGate, device: D) -> Self {
        Self { state, gate, device }
    }

    pub fn gate(&self) -> &SecurityGate {
        &self.gate
    }

    pub fn handle(&mut self, req: &PortalRequest, now: u32) -> PortalResponse {
        let get = req.method == Method::GET;
        let post = req.method == Method::POST;

        match req.path.as_str() {
            "/" => self.handle_root(req),
            "/content" => self.handle_content(),
            "/api/public_data" => self.handle_public_data(),
            "/api/redirect" => self.handle_redirect(),

            "/admin" if get => self.gated(req, now, |_, _| PortalResponse::html(html::ADMIN_HTML)),
            "/api/data" if get => self.gated(req, now, |s, _| s.handle_data()),
            "/api/save_config" if post => self.gated(req, now, |s, r| s.handle_save_config(r)),
            "/api/save_ssids" if post => self.gated(req, now, |s, r| s.handle_save_ssids(r)),
            "/api/reboot" if post => self.gated(req, now, |_, _| {
                log::info!("Reboot requested from admin");
                let mut resp = PortalResponse::text(StatusCode::OK, "Rebooting...");
                resp.action = Action::Reboot;
                resp
            }),
            "/api/clients" if get => self.gated(req, now, |s, _| s.handle_clients()),
            "/api/export" if get => self.gated(req, now, |s, _| s.handle_export()),
            "/api/import" if post => self.gated(req, now, |s, r| s.handle_import(r)),
            "/api/portal_html" if get => self.gated(req, now, |s, _| s.handle_portal_html()),
            "/api/save_portal_html" if post => {
                self.gated(req, now, |s, r| s.handle_save_portal_html(r))
            }
            "/api/reset_portal_html" if post => {
                self.gated(req, now, |s, _| s.handle_reset_portal_html())
            }

            path => {
                if DETECTION_PATHS.contains(&path) {
                    log::debug!("Captive probe {}", path);
                }
                PortalResponse::redirect(PORTAL_URL)
            }
        }
    }

    /// Runs `f` only when the lockout, rate limit and credentials allow it.
    fn gated<F>(&mut self, req: &PortalRequest, now: u32, f: F) -> PortalResponse
    where
        F: FnOnce(&mut Self, &PortalRequest) -> PortalResponse,
    {
        let state = &self.state;
        let decision = self.gate.authorize(now, || {
            let Some((user, pass)) = req.authorization.as_deref().and_then(parse_basic_auth) else {
                return false;
            };
            let st = state::lock(state);
            user == st.config.admin_user && pass == st.config.admin_pass
        });

        let resp = match decision {
            Decision::Allowed => f(self, req),
            Decision::LockedOut => PortalResponse::text(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many failed attempts. Try again later.",
            ),
            Decision::RateLimited => {
                PortalResponse::text(StatusCode::TOO_MANY_REQUESTS, "Too many requests. Slow down.")
            }
            Decision::BadCredentials => {
                log::warn!(
                    "Admin auth failed on {} ({} failures)",
                    req.path,
                    self.gate.session().failed_attempts
                );
                PortalResponse::text(StatusCode::UNAUTHORIZED, "Unauthorized")
                    .header("WWW-Authenticate", "Basic realm=\"Login Required\"")
            }
        };
        resp.security_headers()
    }

    fn redirect_url(&self) -> String {
        let st = state::lock(&self.state);
        identity::deep_link(&st.identities, &st.config.ap_name)
            .map(str::to_string)
            .filter(|u| !u.is_empty())
            .or_else(|| Some(st.config.redirect_url.clone()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| FALLBACK_REDIRECT.to_string())
    }

    fn handle_root(&self, req: &PortalRequest) -> PortalResponse {
        if req.host.as_deref() != Some(PORTAL_IP_STR) {
            return PortalResponse::redirect(PORTAL_URL);
        }

        let url = self.redirect_url();
        let st = state::lock(&self.state);
        let button = (!st.config.disable_button)
            .then(|| (st.config.button_text.as_str(), url.as_str()));
        PortalResponse::html(html::portal_page(button, st.config.auto_redirect_delay)).no_cache()
    }

    fn handle_content(&self) -> PortalResponse {
        let st = state::lock(&self.state);
        if st.config.use_custom_portal {
            match st.storage.load_custom_portal() {
                Ok(Some(page)) => return PortalResponse::html(page).no_cache(),
                Ok(None) => {}
                Err(e) => {
                    log::error!("Failed to read custom portal: {:?}", e);
                    return PortalResponse::text(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "File Open Error",
                    );
                }
            }
        }
        PortalResponse::html(html::default_content(
            &st.config.advertising_headline,
            &st.config.advertising_description,
        ))
        .no_cache()
    }

    fn handle_public_data(&self) -> PortalResponse {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct PublicData<'a> {
            advertising_headline: &'a str,
            advertising_description: &'a str,
            button_text: &'a str,
            auto_redirect_delay: u32,
            redirect_url: &'a str,
        }

        let url = self.redirect_url();
        let st = state::lock(&self.state);
        PortalResponse::json(&PublicData {
            advertising_headline: &st.config.advertising_headline,
            advertising_description: &st.config.advertising_description,
            button_text: &st.config.button_text,
            auto_redirect_delay: st.config.auto_redirect_delay,
            redirect_url: &url,
        })
    }

    fn handle_redirect(&self) -> PortalResponse {
        let url = {
            let st = state::lock(&self.state);
            if st.config.redirect_url.is_empty() {
                "http://google.com".to_string()
            } else {
                st.config.redirect_url.clone()
            }
        };
        PortalResponse::html(html::redirect_page(&url))
    }

    fn handle_data(&self) -> PortalResponse {
        let st = state::lock(&self.state);
        let mut data = match serde_json::to_value(&st.config) {
            Ok(v) => v,
            Err(e) => {
                return PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        };
        data["uptime"] = self.device.uptime_secs().into();
        data["freeHeap"] = self.device.free_heap().into();
        data["clientCount"] = self.device.clients().len().into();
        data["packetsPerSecond"] = st.packets_per_second.into();
        data["ssidCount"] = st.identities.len().into();
        data["ssids"] = identity::to_text(&st.identities).into();
        PortalResponse::json(&data)
    }

    fn low_memory(&self, min: usize) -> bool {
        let free = self.device.free_heap();
        if free < min {
            log::warn!("Refusing update, free heap {} < {}", free, min);
            return true;
        }
        false
    }

    fn apply_update(&self, req: &PortalRequest, allow_ssids: bool) -> Result<(), PortalResponse> {
        let update: ConfigUpdate = serde_json::from_slice(&req.body).map_err(|e| {
            PortalResponse::text(StatusCode::BAD_REQUEST, &format!("Invalid config: {}", e))
        })?;

        let mut st = state::lock(&self.state);
        let mut config = st.config.clone();
        config.apply(&update).map_err(|e| match e {
            ConfigError::Invalid { .. } => {
                PortalResponse::text(StatusCode::BAD_REQUEST, &e.to_string())
            }
            e => PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        })?;

        st.storage.save_config(&config).map_err(|e| {
            log::error!("Failed to save config: {:?}", e);
            PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save config")
        })?;
        st.config = config;

        if let (true, Some(ssids)) = (allow_ssids, &update.ssids) {
            let list = st.storage.save_identities(ssids).map_err(|e| {
                log::error!("Failed to save identities: {:?}", e);
                PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save SSIDs")
            })?;
            st.identities = list;
        }
        Ok(())
    }

    fn handle_save_config(&mut self, req: &PortalRequest) -> PortalResponse {
        if self.low_memory(MIN_HEAP_CONFIG) {
            return PortalResponse::text(StatusCode::SERVICE_UNAVAILABLE, "Low memory");
        }
        if req.body.is_empty() {
            return PortalResponse::text(StatusCode::BAD_REQUEST, "Missing data");
        }
        match self.apply_update(req, false) {
            Ok(()) => {
                log::info!("Config saved");
                PortalResponse::text(StatusCode::OK, "Config Saved! Reboot to apply changes.")
            }
            Err(resp) => resp,
        }
    }

    fn handle_save_ssids(&mut self, req: &PortalRequest) -> PortalResponse {
        if self.low_memory(MIN_HEAP_SSIDS) {
            return PortalResponse::text(
                StatusCode::SERVICE_UNAVAILABLE,
                "Device low on memory, please reboot",
            );
        }
        if req.body.len() > MAX_SSID_LIST_LEN {
            return PortalResponse::text(StatusCode::PAYLOAD_TOO_LARGE, "SSID list too large");
        }
        let Ok(raw) = std::str::from_utf8(&req.body) else {
            return PortalResponse::text(StatusCode::BAD_REQUEST, "SSID list is not UTF-8");
        };

        let mut st = state::lock(&self.state);
        match st.storage.save_identities(raw) {
            Ok(list) => {
                let count = list.len();
                st.identities = list;
                log::info!("Identity list replaced, {} entries", count);
                PortalResponse::text(
                    StatusCode::OK,
                    &format!("SSIDs saved! {} networks active.", count),
                )
            }
            Err(e) => {
                log::error!("Failed to save identities: {:?}", e);
                PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save SSIDs")
            }
        }
    }

    fn handle_clients(&self) -> PortalResponse {
        #[derive(Serialize)]
        struct Clients {
            clients: Vec<ClientInfo>,
            total: usize,
        }
        let clients = self.device.clients();
        PortalResponse::json(&Clients {
            total: clients.len(),
            clients,
        })
    }

    fn handle_export(&self) -> PortalResponse {
        let st = state::lock(&self.state);
        let mut export = ConfigUpdate::from(&st.config);
        export.ssids = Some(identity::to_text(&st.identities));
        PortalResponse::json(&export)
            .header("Content-Disposition", "attachment; filename=\"beacon_config.json\"")
    }

    fn handle_import(&mut self, req: &PortalRequest) -> PortalResponse {
        if self.low_memory(MIN_HEAP_SSIDS) {
            return PortalResponse::text(StatusCode::SERVICE_UNAVAILABLE, "Low memory");
        }
        if req.body.len() > MAX_SSID_LIST_LEN + 4096 {
            return PortalResponse::text(StatusCode::PAYLOAD_TOO_LARGE, "Import too large");
        }
        match self.apply_update(req, true) {
            Ok(()) => {
                log::info!("Config imported");
                PortalResponse::text(StatusCode::OK, "Config imported! Reboot to apply changes.")
            }
            Err(resp) => resp,
        }
    }

    fn handle_portal_html(&self) -> PortalResponse {
        let st = state::lock(&self.state);
        match st.storage.load_custom_portal() {
            Ok(Some(page)) => PortalResponse::new(StatusCode::OK, "text/plain", page),
            Ok(None) => PortalResponse::new(
                StatusCode::OK,
                "text/plain",
                html::default_content(
                    &st.config.advertising_headline,
                    &st.config.advertising_description,
                ),
            ),
            Err(e) => PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }

    fn handle_save_portal_html(&mut self, req: &PortalRequest) -> PortalResponse {
        if self.low_memory(MIN_HEAP_SSIDS) {
            return PortalResponse::text(StatusCode::SERVICE_UNAVAILABLE, "Low memory");
        }
        if req.body.is_empty() {
            return PortalResponse::text(StatusCode::BAD_REQUEST, "Missing html");
        }
        if req.body.len() > MAX_PORTAL_HTML_LEN {
            return PortalResponse::text(StatusCode::PAYLOAD_TOO_LARGE, "HTML too large");
        }
        let Ok(page) = std::str::from_utf8(&req.body) else {
            return PortalResponse::text(StatusCode::BAD_REQUEST, "HTML is not UTF-8");
        };

        let mut st = state::lock(&self.state);
        match st.storage.save_custom_portal(page) {
            Ok(()) => PortalResponse::text(StatusCode::OK, "Portal HTML saved"),
            Err(e) => {
                log::error!("Failed to save portal html: {:?}", e);
                PortalResponse::text(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to save portal HTML",
                )
            }
        }
    }

    fn handle_reset_portal_html(&mut self) -> PortalResponse {
        let mut st = state::lock(&self.state);
        match st.storage.delete_custom_portal() {
            Ok(()) => PortalResponse::text(StatusCode::OK, "Portal HTML reset to default"),
            Err(e) => PortalResponse::text(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
        }
    }
}
