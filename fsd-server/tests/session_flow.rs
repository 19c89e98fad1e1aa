//! End-to-end protocol tests against a live server on a loopback socket:
//! login, queries, the challenge chain, proximity routing, kills and
//! callsign collisions.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use fsd_server::auth::{jwt, MemoryDirectory, UserRecord};
use fsd_server::config::ServerConfig;
use fsd_server::server::Server;
use fsd_server::session::connection;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const SILENCE_WINDOW: Duration = Duration::from_millis(300);

/// vPilot client id, matching the well-known obfuscation key.
const CLIENT_ID: &str = "88e4";
const CLIENT_CHALLENGE: &str = "30984979d8caed23";

async fn start_server() -> std::net::SocketAddr {
    connection::set_always_immediate(true);

    let directory = MemoryDirectory::new();
    directory.insert(UserRecord {
        cid: 1000000,
        password: "12345".into(),
        network_rating: 1,
        pilot_rating: 0,
    });
    directory.insert(UserRecord {
        cid: 1000001,
        password: "12345".into(),
        network_rating: 1,
        pilot_rating: 0,
    });
    directory.insert(UserRecord {
        cid: 1000011,
        password: "hunter2".into(),
        network_rating: 11,
        pilot_rating: 0,
    });

    let mut config = ServerConfig::default();
    config.listen = vec!["127.0.0.1:0".into()];
    config.admin_listen = "127.0.0.1:0".into();
    config.jwt_secret = Some("integration-secret".into());

    let server = Server::bind(config, Arc::new(directory)).await.unwrap();
    let addr = server.local_addrs()[0];
    tokio::spawn(server.run());
    addr
}

struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .unwrap();
        self.writer.flush().await.unwrap();
    }

    /// Next packet, CRLF stripped. Panics on timeout or EOF.
    async fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a packet")
            .unwrap();
        assert!(n > 0, "connection closed");
        line.trim_end_matches("\r\n").to_owned()
    }

    /// Asserts the connection has been closed by the server.
    async fn expect_eof(&mut self) {
        let mut line = String::new();
        let n = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for EOF")
            .unwrap();
        assert_eq!(n, 0, "expected EOF, got {line:?}");
    }

    /// Asserts nothing arrives for a short window.
    async fn expect_silence(&mut self) {
        let mut line = String::new();
        let result = timeout(SILENCE_WINDOW, self.reader.read_line(&mut line)).await;
        assert!(result.is_err(), "expected silence, got {line:?}");
    }

    /// Runs the full pilot login: greeting, `$ID`, `#AP`.
    async fn login_pilot(
        addr: std::net::SocketAddr,
        callsign: &str,
        cid: u32,
        password: &str,
    ) -> Self {
        let mut client = Self::connect(addr).await;
        let greeting = client.recv().await;
        assert!(
            greeting.starts_with("$DISERVER:CLIENT:"),
            "unexpected greeting {greeting:?}"
        );
        client
            .send(&format!(
                "$ID{callsign}:SERVER:{CLIENT_ID}:vPilot:3:8:{cid}:WIN-1234:{CLIENT_CHALLENGE}"
            ))
            .await;
        client
            .send(&format!(
                "#AP{callsign}:SERVER:{cid}:{password}:1:101:1:Test Pilot KBOS"
            ))
            .await;
        client
    }

    /// Runs the full controller login: greeting, `$ID`, `#AA`.
    async fn login_atc(
        addr: std::net::SocketAddr,
        callsign: &str,
        cid: u32,
        password: &str,
        rating: i32,
    ) -> Self {
        let mut client = Self::connect(addr).await;
        client.recv().await;
        client
            .send(&format!(
                "$ID{callsign}:SERVER:{CLIENT_ID}:vPilot:3:8:{cid}:WIN-1234:{CLIENT_CHALLENGE}"
            ))
            .await;
        client
            .send(&format!(
                "#AA{callsign}:SERVER:Test Controller:{cid}:{password}:{rating}:101"
            ))
            .await;
        client
    }

    /// A ping round trip, proving every earlier packet has been handled.
    async fn barrier(&mut self, callsign: &str) {
        self.send(&format!("$PI{callsign}:SERVER:0")).await;
        assert_eq!(self.recv().await, format!("$POSERVER:{callsign}:0"));
    }

    async fn send_position(&mut self, callsign: &str, lat: f64, lon: f64) {
        self.send(&format!(
            "@N:{callsign}:1200:1:{lat:.6}:{lon:.6}:16:0:4177408112:336"
        ))
        .await;
    }
}

#[tokio::test]
async fn login_then_ping_echo() {
    let addr = start_server().await;
    let mut client = TestClient::login_pilot(addr, "N123", 1000000, "12345").await;

    client.send("$PIN123:SERVER:123456").await;
    assert_eq!(client.recv().await, "$POSERVER:N123:123456");
}

#[tokio::test]
async fn ip_query_reports_peer_address() {
    let addr = start_server().await;
    let mut client = TestClient::login_pilot(addr, "N124", 1000000, "12345").await;

    client.send("$CQN124:SERVER:IP").await;
    assert_eq!(client.recv().await, "$CRSERVER:N124:IP:127.0.0.1");
}

#[tokio::test]
async fn bad_password_closes_with_error() {
    let addr = start_server().await;
    let mut client = TestClient::connect(addr).await;
    client.recv().await;
    client
        .send(&format!(
            "$IDN125:SERVER:{CLIENT_ID}:vPilot:3:8:1000000:WIN-1234:{CLIENT_CHALLENGE}"
        ))
        .await;
    client
        .send("#APN125:SERVER:1000000:wrong-password:1:101:1:Test Pilot")
        .await;

    let err = client.recv().await;
    assert!(err.starts_with("$ERSERVER:N125:006:"), "got {err:?}");
    client.expect_eof().await;
}

#[tokio::test]
async fn challenge_chain_matches_known_vectors() {
    let addr = start_server().await;
    let mut client = TestClient::login_pilot(addr, "N126", 1000000, "12345").await;

    // First round against the published vPilot obfuscation vectors.
    client.send("$ZCN126:SERVER:de6acb8e").await;
    assert_eq!(
        client.recv().await,
        "$ZRSERVER:N126:f8ee97157f66455ed6108fccef6ccf5f"
    );
    let counter = client.recv().await;
    assert!(counter.starts_with("$ZCSERVER:N126:"), "got {counter:?}");

    // Second round exercises the state advance between rounds.
    client.send("$ZCN126:SERVER:65b479573b0e").await;
    assert_eq!(
        client.recv().await,
        "$ZRSERVER:N126:8953f545c4e0ffd20943ad89b8ddd087"
    );
}

#[tokio::test]
async fn positions_reach_nearby_pilots_only() {
    let addr = start_server().await;
    let mut a = TestClient::login_pilot(addr, "AAL1", 1000000, "12345").await;
    let mut b = TestClient::login_pilot(addr, "BAW2", 1000001, "12345").await;

    // A sees B's join announcement.
    let announcement = a.recv().await;
    assert!(announcement.starts_with("#APBAW2:"), "got {announcement:?}");

    // Both park in the same cell, far enough apart that send-fast stays
    // off. A's first report lands before B is placed anywhere, so only
    // B's answer is relayed back.
    a.send_position("AAL1", 45.0, 45.3).await;
    a.barrier("AAL1").await;
    b.send_position("BAW2", 45.0, 45.0).await;
    let relayed = a.recv().await;
    assert_eq!(relayed, "@N:BAW2:1200:1:45.000000:45.000000:16:0:4177408112:336");
    a.send_position("AAL1", 45.0, 45.3).await;
    let relayed = b.recv().await;
    assert!(relayed.starts_with("@N:AAL1:"), "got {relayed:?}");

    // B moves to the other side of the world and stops hearing A.
    b.send_position("BAW2", -45.0, -45.0).await;
    b.barrier("BAW2").await;
    a.send_position("AAL1", 45.0, 45.3).await;
    a.barrier("AAL1").await;
    b.expect_silence().await;
}

#[tokio::test]
async fn kill_requires_supervisor_rating() {
    let addr = start_server().await;
    let mut target = TestClient::login_pilot(addr, "TGT1", 1000000, "12345").await;
    let mut observer = TestClient::login_pilot(addr, "OBS1", 1000001, "12345").await;
    target.recv().await; // observer's join announcement

    // An observer's kill is dropped silently, target stays connected.
    observer.send("$!!OBS1:TGT1:go away").await;
    observer.expect_silence().await;
    target.send("$PITGT1:SERVER:1").await;
    assert_eq!(target.recv().await, "$POSERVER:TGT1:1");

    let mut sup = TestClient::login_pilot(addr, "SUP9", 1000011, "hunter2").await;
    target.recv().await; // sup's join announcement
    sup.send("$!!SUP9:TGT1:terms of use").await;
    assert_eq!(sup.recv().await, "#TMSERVER:SUP9:killed TGT1");
    assert_eq!(target.recv().await, "$!!SUP9:TGT1:terms of use");
    target.expect_eof().await;
}

#[tokio::test]
async fn duplicate_callsign_is_rejected() {
    let addr = start_server().await;
    let mut first = TestClient::login_pilot(addr, "N123", 1000000, "12345").await;

    let mut second = TestClient::login_pilot(addr, "N123", 1000001, "12345").await;
    let err = second.recv().await;
    assert!(err.starts_with("$ERSERVER:N123:001:"), "got {err:?}");
    second.expect_eof().await;

    // The original session is unaffected.
    first.send("$PIN123:SERVER:2").await;
    assert_eq!(first.recv().await, "$POSERVER:N123:2");
}

#[tokio::test]
async fn text_message_routes_to_recipient() {
    let addr = start_server().await;
    let mut a = TestClient::login_pilot(addr, "DAL3", 1000000, "12345").await;
    let mut b = TestClient::login_pilot(addr, "UAL4", 1000001, "12345").await;
    a.recv().await; // join announcement

    a.send("#TMDAL3:UAL4:traffic in sight").await;
    assert_eq!(b.recv().await, "#TMDAL3:UAL4:traffic in sight");

    a.send("#TMDAL3:NOBODY:anyone there").await;
    let err = a.recv().await;
    assert!(err.starts_with("$ERSERVER:DAL3:007:NOBODY:"), "got {err:?}");
}

#[tokio::test]
async fn token_login_requires_fsd_token_type() {
    let addr = start_server().await;
    let secret = b"integration-secret";

    // An admin-channel token signed with the shared secret is not a logon.
    let service_token = jwt::sign(
        &serde_json::json!({
            "token_type": "fsd_service",
            "cid": 1000099,
            "network_rating": 12,
        }),
        secret,
    )
    .unwrap();
    let mut client = TestClient::connect(addr).await;
    client.recv().await;
    client
        .send(&format!(
            "$IDADM1:SERVER:{CLIENT_ID}:vPilot:3:8:1000099:WIN-1234:{CLIENT_CHALLENGE}"
        ))
        .await;
    client
        .send(&format!(
            "#APADM1:SERVER:1000099:{service_token}:1:101:1:Test Pilot"
        ))
        .await;
    let err = client.recv().await;
    assert!(err.starts_with("$ERSERVER:ADM1:006:"), "got {err:?}");
    client.expect_eof().await;

    // The `fsd` token type logs in at the rating its claims carry.
    let fsd_token = jwt::sign(
        &serde_json::json!({
            "token_type": "fsd",
            "cid": 1000099,
            "network_rating": 3,
            "pilot_rating": 1,
        }),
        secret,
    )
    .unwrap();
    let mut client = TestClient::login_pilot(addr, "N130", 1000099, &fsd_token).await;
    client.barrier("N130").await;
}

#[tokio::test]
async fn departure_broadcast_names_the_server() {
    let addr = start_server().await;
    let mut a = TestClient::login_pilot(addr, "AAL1", 1000000, "12345").await;
    let b = TestClient::login_pilot(addr, "BAW2", 1000001, "12345").await;
    let announcement = a.recv().await;
    assert!(announcement.starts_with("#APBAW2:"), "got {announcement:?}");

    drop(b);
    assert_eq!(a.recv().await, "#DPBAW2:SERVER:1000001");
}

#[tokio::test]
async fn atc_query_answers_by_facility() {
    let addr = start_server().await;
    let mut pilot = TestClient::login_pilot(addr, "N123", 1000000, "12345").await;
    let mut atc = TestClient::login_atc(addr, "BOS_TWR", 1000011, "hunter2", 11).await;
    pilot.recv().await; // join announcement

    // Logged in but not yet on a position: facility 0 answers N.
    pilot.send("$CQN123:SERVER:ATC:BOS_TWR").await;
    assert_eq!(pilot.recv().await, "$CRSERVER:N123:ATC:N:BOS_TWR");

    atc.send("%BOS_TWR:118700:4:50:11:42.360000:-71.060000:0")
        .await;
    atc.barrier("BOS_TWR").await;
    pilot.send("$CQN123:SERVER:ATC:BOS_TWR").await;
    assert_eq!(pilot.recv().await, "$CRSERVER:N123:ATC:Y:BOS_TWR");

    pilot.send("$CQN123:SERVER:ATC:GHOST").await;
    let err = pilot.recv().await;
    assert!(err.starts_with("$ERSERVER:N123:007:GHOST:"), "got {err:?}");
}

#[tokio::test]
async fn flight_plan_query_reports_unassigned_beacon() {
    let addr = start_server().await;
    let mut pilot = TestClient::login_pilot(addr, "N123", 1000000, "12345").await;
    pilot.send("$FPN123:SERVER:I:B738:420:KBOS").await;
    pilot.barrier("N123").await;

    let mut atc = TestClient::login_atc(addr, "BOS_TWR", 1000011, "hunter2", 11).await;
    atc.send("$CQBOS_TWR:SERVER:FP:N123").await;
    assert_eq!(atc.recv().await, "$FPN123:*A:I:B738:420:KBOS");
    // No beacon assigned yet: the code line still arrives, carrying 0.
    assert_eq!(atc.recv().await, "#PCSERVER:BOS_TWR:CCP:BC:N123:0");
}

#[tokio::test]
async fn send_fast_toggles_with_peer_distance() {
    let addr = start_server().await;
    let mut a = TestClient::login_pilot(addr, "AAL1", 1000000, "12345").await;
    let mut b = TestClient::login_pilot(addr, "BAW2", 1000001, "12345").await;
    a.recv().await; // join announcement

    a.send_position("AAL1", 45.0, 45.0).await;
    a.barrier("AAL1").await;

    // First report measures the neighbor at under a nautical mile; the
    // toggle fires on the report after the measurement.
    b.send_position("BAW2", 45.0, 45.02).await;
    b.send_position("BAW2", 45.0, 45.02).await;
    assert_eq!(b.recv().await, "$SFSERVER:BAW2:1");

    // Drifting past five nautical miles turns it back off, again one
    // report behind the measurement.
    b.send_position("BAW2", 45.0, 45.3).await;
    b.send_position("BAW2", 45.0, 45.3).await;
    assert_eq!(b.recv().await, "$SFSERVER:BAW2:0");
}
