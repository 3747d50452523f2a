//! End-to-end: two peers dialing each other over loopback reach ESTABLISHED
//! and exchange a route, mirroring the speaker's two-peer handshake and
//! originate-and-advertise scenarios.

use octavius_bgp_rib::AdjRibIn;
use octavius_bgp_route::fake::InMemoryRouteTable;
use octavius_bgpd::{
    config::PeerConfig,
    fsm::{
        FsmState,
        PeerFsm,
    },
    speaker::Speaker,
};
use std::{
    net::Ipv4Addr,
    sync::Arc,
    time::Duration,
};

#[tokio::test(flavor = "multi_thread")]
async fn two_peers_reach_established_and_exchange_a_route() {
    let a_config = PeerConfig::parse("64512 127.0.0.1 64513 127.0.0.2 active 10.100.220.0/24").unwrap();
    let b_config = PeerConfig::parse("64513 127.0.0.2 64512 127.0.0.1 passive").unwrap();

    let a_lookup = InMemoryRouteTable::new(vec!["10.100.220.0/24".parse().unwrap()]);
    let a_installer = Arc::new(InMemoryRouteTable::default());
    let b_installer = Arc::new(InMemoryRouteTable::default());

    let a_speaker = Speaker::new(a_config.local_as, a_config.local_ip, &a_config.originate, &a_lookup).await.unwrap();
    let b_speaker = Speaker::new(b_config.local_as, b_config.local_ip, &b_config.originate, &InMemoryRouteTable::default()).await.unwrap();

    let a = a_speaker.peer(a_config, a_installer.clone());
    let b = b_speaker.peer(b_config, b_installer.clone());

    let mut a_state = a.subscribe();
    let mut b_state = b.subscribe();

    // B listens first; A dials shortly after.
    let b_task = tokio::spawn(async move { b.run().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let a_task = tokio::spawn(async move { a.run().await });

    // Wait for both sessions to reach ESTABLISHED rather than just letting
    // the tasks run for a while - a fixed sleep would pass even if the
    // handshake silently stalled in OPEN_SENT/OPEN_CONFIRM.
    tokio::time::timeout(Duration::from_secs(5), a_state.wait_for(|state| *state == FsmState::Established))
        .await
        .expect("peer A timed out before reaching ESTABLISHED")
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), b_state.wait_for(|state| *state == FsmState::Established))
        .await
        .expect("peer B timed out before reaching ESTABLISHED")
        .unwrap();
    assert!(!a_task.is_finished(), "peer A exited right after reaching ESTABLISHED");
    assert!(!b_task.is_finished(), "peer B exited right after reaching ESTABLISHED");

    // Peer A originated 10.100.220.0/24 and advertised it to B once both
    // sides were ESTABLISHED; B's FIB installer should have recorded it
    // with A's address as next hop.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let installed = b_installer.installed_routes();
    assert_eq!(installed, vec![("10.100.220.0/24".parse().unwrap(), Ipv4Addr::new(127, 0, 0, 1))]);

    a_task.abort();
    b_task.abort();
}

#[tokio::test]
async fn fsm_starts_in_idle() {
    let config = PeerConfig::parse("64512 127.0.0.1 64513 127.0.0.2 active").unwrap();
    let installer = InMemoryRouteTable::default();
    let speaker = Speaker::new(config.local_as, config.local_ip, &config.originate, &InMemoryRouteTable::default()).await.unwrap();
    let fsm: PeerFsm<InMemoryRouteTable> = speaker.peer(config, installer);
    let _ = AdjRibIn::new();
    assert_eq!(fsm.state(), FsmState::Idle);
}
