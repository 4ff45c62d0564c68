//! Main loop: beacon polling and the captive DNS responder on one
//! current-thread runtime.

use std::future::Future;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;

use crate::{
    clock::Clock,
    dns,
    portal::PORTAL_IP,
    radio::Radio,
    scheduler::BeaconScheduler,
    state::{self, SharedState},
    storage::KvStore,
};

/// How often the scheduler is polled. Well below the smallest useful beacon
/// interval.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Runs until `shutdown` completes, then hands the radio back.
pub async fn run<S, R>(
    state: SharedState<S>,
    mut scheduler: BeaconScheduler,
    mut radio: R,
    clock: Clock,
    dns_socket: Option<UdpSocket>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<R>
where
    S: KvStore,
    R: Radio,
{
    scheduler.start(&mut radio, clock.now_ms())?;

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut query = [0u8; dns::MAX_MESSAGE_LEN];
    let mut answer = [0u8; dns::MAX_MESSAGE_LEN];

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("Service stopping, {:?}", scheduler);
                return Ok(radio);
            }
            _ = poll.tick() => {
                let mut st = state::lock(&state);
                let outcome = scheduler.poll(clock.now_ms(), &st.identities, &mut radio);
                if let Some(rate) = outcome.rate {
                    st.packets_per_second = rate;
                }
            }
            r = recv_query(dns_socket.as_ref(), &mut query) => {
                let (len, peer) = match r {
                    Ok(r) => r,
                    Err(e) => {
                        log::warn!("DNS recv error: {:?}", e);
                        continue;
                    }
                };
                let Some(n) = dns::build_response(&query[..len], PORTAL_IP, &mut answer) else {
                    log::debug!("Ignoring malformed DNS packet from {}", peer);
                    continue;
                };
                if let Some(socket) = &dns_socket {
                    if let Err(e) = socket.send_to(&answer[..n], peer).await {
                        log::warn!("DNS send to {} failed: {:?}", peer, e);
                    }
                }
            }
        }
    }
}

async fn recv_query(
    socket: Option<&UdpSocket>,
    buf: &mut [u8],
) -> std::io::Result<(usize, std::net::SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame::MacAddress,
        radio::RecordingRadio,
        scheduler::SchedulerSettings,
        state::AppState,
        storage::{MemoryStore, Storage},
    };

    fn setup() -> (SharedState<MemoryStore>, BeaconScheduler) {
        let st = state::shared(AppState::load(Storage::new(MemoryStore::new())));
        let settings = SchedulerSettings {
            burst_spacing: Duration::ZERO,
            ..SchedulerSettings::from_config(&state::lock(&st).config)
        };
        let scheduler = BeaconScheduler::new(settings, MacAddress([2, 0, 0, 0, 0, 0]));
        (st, scheduler)
    }

    #[tokio::test]
    async fn beacons_flow_without_dns() {
        let (st, scheduler) = setup();
        let radio = run(
            st.clone(),
            scheduler,
            RecordingRadio::new(),
            Clock::new(),
            None,
            tokio::time::sleep(Duration::from_millis(250)),
        )
        .await
        .unwrap();

        assert!(!radio.frames.is_empty());
        assert_eq!(radio.ssids()[0], "Mom Use This One");
        assert_eq!(radio.channel_changes[0], 1);
    }

    #[tokio::test]
    async fn dns_queries_resolve_to_portal() {
        let (st, scheduler) = setup();
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let query: &[u8] = &[
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, //
            7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0, //
            0x00, 0x01, 0x00, 0x01,
        ];

        let ask = async {
            client.send_to(query, server_addr).await.unwrap();
            let mut buf = [0u8; 512];
            let (n, _) = client.recv_from(&mut buf).await.unwrap();
            buf[..n].to_vec()
        };

        let (reply, _) = tokio::join!(ask, async {
            run(
                st,
                scheduler,
                RecordingRadio::new(),
                Clock::new(),
                Some(server),
                tokio::time::sleep(Duration::from_millis(300)),
            )
            .await
            .unwrap()
        });

        assert_eq!(&reply[..2], &[0x12, 0x34]);
        assert_eq!(&reply[reply.len() - 4..], &[192, 168, 4, 1]);
    }
}
