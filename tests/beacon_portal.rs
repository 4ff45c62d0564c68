use std::time::Duration;

use beaconkit::{
    frame::MacAddress,
    portal::{ClientInfo, DeviceInfo, PortalRequest, PortalService},
    radio::RecordingRadio,
    scheduler::{BeaconScheduler, SchedulerSettings},
    security::SecurityGate,
    state::{self, AppState},
    storage::{FileStore, Storage},
};
use http::{Method, StatusCode};

struct Device;

impl DeviceInfo for Device {
    fn uptime_secs(&self) -> u64 {
        1
    }

    fn free_heap(&self) -> usize {
        64 * 1024
    }

    fn clients(&self) -> Vec<ClientInfo> {
        Vec::new()
    }
}

fn admin(method: Method, uri: &str) -> PortalRequest {
    PortalRequest::new(method, uri).with_basic_auth("admin", "beacon")
}

#[test]
fn new_identity_list_is_broadcast_on_next_tick() {
    let dir = tempfile::tempdir().unwrap();
    let st = state::shared(AppState::load(Storage::new(FileStore::open(dir.path()).unwrap())));
    let mut portal = PortalService::new(st.clone(), SecurityGate::default(), Device);

    let settings = SchedulerSettings {
        batch_size: 2,
        burst_count: 1,
        burst_spacing: Duration::ZERO,
        ..SchedulerSettings::from_config(&state::lock(&st).config)
    };
    let mut scheduler = BeaconScheduler::new(settings, MacAddress([0x02, 0, 0, 0, 0, 0]));
    let mut radio = RecordingRadio::new();
    scheduler.start(&mut radio, 0).unwrap();

    scheduler.poll(0, &state::lock(&st).identities, &mut radio);
    assert_eq!(radio.ssids(), vec!["Mom Use This One", "Abraham Linksys"]);

    let resp = portal.handle(
        &admin(Method::POST, "/api/save_ssids").with_body("Guest\nLobby|https://lobby.example\n"),
        50,
    );
    assert_eq!(resp.status, StatusCode::OK);

    radio.frames.clear();
    scheduler.poll(100, &state::lock(&st).identities, &mut radio);
    // the cursor was past the end of the shorter list
    assert_eq!(radio.ssids(), vec!["Guest", "Lobby"]);

    // survives a restart
    drop(portal);
    drop(st);
    let st = state::shared(AppState::load(Storage::new(FileStore::open(dir.path()).unwrap())));
    let names: Vec<String> = state::lock(&st).identities.iter().map(|i| i.name.clone()).collect();
    assert_eq!(names, vec!["Guest", "Lobby"]);
}

#[test]
fn locked_out_admin_cannot_change_identities() {
    let st = state::shared(AppState::load(Storage::new(beaconkit::storage::MemoryStore::new())));
    let mut portal = PortalService::new(st.clone(), SecurityGate::default(), Device);

    let mut now = 0;
    for _ in 0..5 {
        let bad = PortalRequest::new(Method::POST, "/api/save_ssids")
            .with_basic_auth("admin", "guess")
            .with_body("Pwned");
        assert_eq!(portal.handle(&bad, now).status, StatusCode::UNAUTHORIZED);
        now += 200;
    }

    let resp = portal.handle(&admin(Method::POST, "/api/save_ssids").with_body("Pwned"), now);
    assert_eq!(resp.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(state::lock(&st).identities.len(), 50);
}
