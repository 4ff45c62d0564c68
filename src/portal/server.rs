//! SoftAP and HTTP server on the device

use std::sync::{Arc, Mutex};

use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    http::{
        server::{Configuration, EspHttpConnection, EspHttpServer, Request},
        Method,
    },
    io::{Read, Write},
    ipv4::{self, Mask, Subnet},
    netif::{EspNetif, NetifConfiguration, NetifStack},
    wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, Configuration as WifiConfig, EspWifi,
        WifiDriver,
    },
};

use super::{Action, DeviceInfo, PortalRequest, PortalService, MAX_SSID_LIST_LEN};
use crate::{clock::Clock, config::Config, storage::KvStore};

const AP_IP: ipv4::Ipv4Addr = ipv4::Ipv4Addr::new(192, 168, 4, 1);
const AP_NETMASK: Mask = Mask(24);
const MAX_CONNECTIONS: u16 = 4;
/// Largest body accepted from a client. Import carries config plus the list.
const MAX_BODY_LEN: usize = MAX_SSID_LIST_LEN + 4096;
const REBOOT_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

pub struct CaptivePortal {
    _wifi: BlockingWifi<EspWifi<'static>>,
    _server: EspHttpServer<'static>,
}

impl CaptivePortal {
    pub fn start<S, D>(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        config: &Config,
        service: PortalService<S, D>,
        clock: Clock,
    ) -> anyhow::Result<Self>
    where
        S: KvStore + Send + 'static,
        D: DeviceInfo + Send + 'static,
    {
        let wifi = Self::start_ap(modem, sysloop, config)?;
        log::info!(
            "SoftAP started: {:?} on channel {}{}",
            config.ap_name,
            config.wifi_channel,
            if config.hide_ap { " (hidden)" } else { "" }
        );

        let server = Self::start_http_server(Arc::new(Mutex::new(service)), clock)?;
        log::info!("HTTP server started on {}:80", AP_IP);

        Ok(Self {
            _wifi: wifi,
            _server: server,
        })
    }

    fn start_ap(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        config: &Config,
    ) -> anyhow::Result<BlockingWifi<EspWifi<'static>>> {
        // the portal answers DNS itself
        let ap_netif_config = NetifConfiguration {
            ip_configuration: Some(ipv4::Configuration::Router(ipv4::RouterConfiguration {
                subnet: Subnet {
                    gateway: AP_IP,
                    mask: AP_NETMASK,
                },
                dhcp_enabled: true,
                dns: Some(AP_IP),
                secondary_dns: None,
            })),
            ..NetifConfiguration::wifi_default_router()
        };
        let ap_netif = EspNetif::new_with_conf(&ap_netif_config)?;

        let driver = WifiDriver::new(modem, sysloop.clone(), None)?;
        let sta_netif = EspNetif::new(NetifStack::Sta)?;

        let esp_wifi = EspWifi::wrap_all(driver, sta_netif, ap_netif)?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;

        let ap_config = AccessPointConfiguration {
            ssid: config
                .ap_name
                .as_str()
                .try_into()
                .map_err(|_| anyhow::anyhow!("AP name too long: {:?}", config.ap_name))?,
            ssid_hidden: config.hide_ap,
            channel: config.wifi_channel,
            auth_method: AuthMethod::None,
            max_connections: MAX_CONNECTIONS,
            ..Default::default()
        };

        wifi.set_configuration(&WifiConfig::AccessPoint(ap_config))?;
        wifi.start()?;

        Ok(wifi)
    }

    fn start_http_server<S, D>(
        service: Arc<Mutex<PortalService<S, D>>>,
        clock: Clock,
    ) -> anyhow::Result<EspHttpServer<'static>>
    where
        S: KvStore + Send + 'static,
        D: DeviceInfo + Send + 'static,
    {
        let config = Configuration {
            stack_size: 10240,
            max_uri_handlers: 4,
            uri_match_wildcard: true,
            ..Default::default()
        };

        let mut server = EspHttpServer::new(&config)?;

        // every route is resolved by the service, unknown paths included
        for method in [Method::Get, Method::Post] {
            let service = service.clone();
            server.fn_handler::<anyhow::Error, _>("/*", method, move |req| {
                handle(req, method, &service, &clock)
            })?;
        }

        Ok(server)
    }
}

fn handle<S, D>(
    mut req: Request<&mut EspHttpConnection<'_>>,
    method: Method,
    service: &Arc<Mutex<PortalService<S, D>>>,
    clock: &Clock,
) -> anyhow::Result<()>
where
    S: KvStore,
    D: DeviceInfo,
{
    let method = match method {
        Method::Post => http::Method::POST,
        _ => http::Method::GET,
    };

    let mut portal_req = PortalRequest::new(method, req.uri());
    portal_req.host = req.header("Host").map(str::to_string);
    portal_req.authorization = req.header("Authorization").map(str::to_string);

    let content_len = req.content_len().unwrap_or(0) as usize;
    if content_len > MAX_BODY_LEN {
        log::warn!("Rejecting {} byte body on {}", content_len, portal_req.path);
        req.into_response(413, None, &[("Content-Type", "text/plain")])?
            .write_all(b"Request too large")?;
        return Ok(());
    }
    if content_len > 0 {
        let mut body = vec![0; content_len];
        let mut read = 0;
        while read < content_len {
            let n = req.read(&mut body[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }
        body.truncate(read);
        portal_req.body = body;
    }

    let resp = {
        let mut service = service.lock().unwrap_or_else(|e| e.into_inner());
        service.handle(&portal_req, clock.now_ms())
    };
    log::debug!("{} {} -> {}", portal_req.method, portal_req.path, resp.status);

    let mut headers: Vec<(&str, &str)> = Vec::with_capacity(resp.headers.len() + 1);
    headers.push(("Content-Type", resp.content_type));
    headers.extend(resp.headers.iter().map(|(k, v)| (*k, v.as_str())));

    let mut out = req.into_response(resp.status.as_u16(), None, &headers)?;
    out.write_all(&resp.body)?;
    out.flush()?;

    if resp.action == Action::Reboot {
        std::thread::spawn(|| {
            std::thread::sleep(REBOOT_DELAY);
            unsafe { esp_idf_svc::sys::esp_restart() }
        });
    }

    Ok(())
}
