//! Integration tests for the BLE → Wi-Fi provisioning flow.
//!
//! A scripted central fragments messages exactly as a phone would and
//! writes them into the node's GATT server; the node's replies travel
//! back through its own sender.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use blsync::app::service::{CRED_KEY, CRED_NAMESPACE, NodeService};
use blsync::app::events::AppEvent;
use blsync::config::{NodeConfig, ProtocolConfig};
use blsync::events::Event;
use blsync::gatt::Notifier;
use blsync::protocol::fragment::Fragmenter;
use blsync::protocol::{
    AckTimer, Command, DataId, Frame, Message, MessageKind, ProHandler, ProtectKey, Receiver,
};
use blsync::provisioning::WifiState;
use blsync::{Error, ProError};
use futures_lite::future::block_on;

use crate::mock_hw::{MockPlatform, PlatformCall, RecordingSink};

const SSID: &str = "home-net";
const PASSWORD: &str = "hunter22!";

// ── Scripted central ──────────────────────────────────────────

struct Central {
    seq: u8,
    mtu: usize,
    key: Option<ProtectKey>,
}

impl Central {
    fn new(mtu: usize) -> Self {
        Self {
            seq: 0,
            mtu,
            key: None,
        }
    }

    fn packets(&mut self, msg: &Message) -> Vec<Vec<u8>> {
        let mut body = msg.body();
        if let Some(key) = &self.key {
            key.seal(msg.kind, &mut body);
        }
        let plan = Fragmenter::new(body, msg.kind, self.mtu, self.key.is_some(), true).unwrap();
        (0..plan.count())
            .map(|i| {
                let seq = self.seq;
                self.seq = self.seq.wrapping_add(1);
                plan.packet(i, seq, false)
            })
            .collect()
    }
}

struct Session {
    node: NodeService,
    hw: MockPlatform,
    sink: RecordingSink,
    central: Central,
    now: u64,
}

impl Session {
    fn connected() -> Self {
        let mut node = NodeService::new(NodeConfig::default()).unwrap();
        let mut hw = MockPlatform::new();
        let mut sink = RecordingSink::new();
        node.start(&mut hw, &mut sink);
        node.handle_event(Event::BleConnected, &mut hw, &mut sink);
        node.server_mut().on_ccc_write(&[0x01, 0x00]).unwrap();
        Self {
            node,
            hw,
            sink,
            central: Central::new(23),
            now: 0,
        }
    }

    fn write(&mut self, packet: &[u8]) -> blsync::Result<Option<[u8; 7]>> {
        self.node
            .on_gatt_write(packet, self.now, &mut self.hw, &mut self.sink)
    }

    /// Deliver `msg`, asserting every packet is acked with its own seq.
    fn send(&mut self, msg: &Message) {
        for packet in self.central.packets(msg) {
            let sent_seq = packet[1];
            let ack = self.write(&packet).unwrap().expect("packet not acked");
            let frame = Frame::decode(&ack).unwrap();
            assert_eq!(frame.header.seq, sent_seq);
        }
    }

    fn provision(&mut self) {
        self.send(&Message::data(DataId::Ssid, SSID.as_bytes()));
        self.send(&Message::data(DataId::Password, PASSWORD.as_bytes()));
        self.send(&Message::command(Command::Connect));
    }
}

// ── Credentials ───────────────────────────────────────────────

#[test]
fn credentials_connect_and_persist() {
    let mut s = Session::connected();
    s.provision();

    assert_eq!(s.hw.connects(), vec![(SSID.to_string(), PASSWORD.to_string())]);
    assert!(s.hw.has_key(CRED_NAMESPACE, CRED_KEY));
    assert!(s.node.is_provisioned());
    assert!(s.sink.contains(&AppEvent::CredentialsStored));
    assert!(s.sink.contains(&AppEvent::WifiStateChanged(WifiState::Connected)));
}

#[test]
fn stored_credentials_survive_restart() {
    let mut s = Session::connected();
    s.provision();

    let mut hw = s.hw;
    hw.calls.clear();
    hw.state = WifiState::Idle;
    let mut sink = RecordingSink::new();
    let mut rebooted = NodeService::new(NodeConfig::default()).unwrap();
    rebooted.start(&mut hw, &mut sink);

    assert_eq!(hw.connects(), vec![(SSID.to_string(), PASSWORD.to_string())]);
    assert!(rebooted.is_provisioned());
    assert_eq!(sink.events[0], AppEvent::Started { provisioned: true });
}

#[test]
fn connect_without_ssid_does_nothing() {
    let mut s = Session::connected();
    s.send(&Message::command(Command::Connect));

    assert!(s.hw.connects().is_empty());
    assert!(!s.node.is_provisioned());
}

#[test]
fn oversized_ssid_is_rejected_but_acked() {
    let mut s = Session::connected();
    s.send(&Message::data(DataId::Ssid, &[b'x'; 33]));
    s.send(&Message::command(Command::Connect));

    assert!(s.hw.connects().is_empty());
}

#[test]
fn failed_join_is_reported_and_not_stored() {
    let mut s = Session::connected();
    s.hw.connect_result = Err(blsync::app::ports::WifiError::AuthFailed);
    s.provision();

    assert!(!s.hw.has_key(CRED_NAMESPACE, CRED_KEY));
    assert!(!s.node.is_provisioned());
    assert!(s.sink.contains(&AppEvent::Failed("connect")));
}

#[test]
fn zigbee_link_key_is_staged() {
    let mut s = Session::connected();
    let key = [0x5a; 16];
    s.send(&Message::data(DataId::ZigbeeLinkKey, &key));
    assert_eq!(s.node.server().handler().link_key(), Some(&key));
}

// ── Requests with replies ─────────────────────────────────────

#[test]
fn get_state_reply_is_queued() {
    let mut s = Session::connected();
    s.provision();
    s.send(&Message::command(Command::GetState));

    let reply = s.node.take_outbound().unwrap();
    assert_eq!(reply, Message::data(DataId::State, &[2, 10, 0, 0, 7]));
    assert!(s.node.take_outbound().is_none());
}

#[test]
fn scan_request_queues_results() {
    let mut s = Session::connected();
    s.hw.scan_results = vec![MockPlatform::ap("alpha", -40), MockPlatform::ap("beta", -70)];
    s.send(&Message::command(Command::Scan));

    assert_eq!(s.hw.count(&PlatformCall::Scan), 1);
    assert!(s.sink.contains(&AppEvent::ScanComplete(2)));
    let msg = s.node.take_outbound().unwrap();
    assert_eq!(msg.id, DataId::ScanResults as u8);
    assert_eq!(msg.data[0], 2);
    assert_eq!(&msg.data[1..7], &[5, b'a', b'l', b'p', b'h', b'a']);
}

#[test]
fn clear_command_erases_credentials() {
    let mut s = Session::connected();
    s.provision();
    s.send(&Message::command(Command::ClearCredentials));

    assert!(!s.hw.has_key(CRED_NAMESPACE, CRED_KEY));
    assert!(!s.node.is_provisioned());
    assert_eq!(s.hw.count(&PlatformCall::Disconnect), 1);
    assert!(s.sink.contains(&AppEvent::CredentialsCleared));
}

// ── Transport behaviour ───────────────────────────────────────

#[test]
fn write_before_connect_is_rejected() {
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    let mut hw = MockPlatform::new();
    let mut sink = RecordingSink::new();
    let packet = Central::new(23).packets(&Message::command(Command::GetState));

    let result = node.on_gatt_write(&packet[0], 0, &mut hw, &mut sink);
    assert_eq!(result, Err(Error::Proto(ProError::NotConnected)));
}

#[test]
fn malformed_packet_gets_no_ack() {
    let mut s = Session::connected();
    // Version 3 in the top bits.
    let result = s.write(&[0xC0, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00]);
    assert!(matches!(result, Err(Error::Proto(ProError::Malformed(_)))));
}

#[test]
fn retransmitted_fragment_is_reacked_once_applied() {
    let mut s = Session::connected();
    let plan = Fragmenter::new(
        Message::data(DataId::Ssid, b"a-network-name-long-enough").body(),
        MessageKind::Data,
        23,
        false,
        true,
    )
    .unwrap();
    assert!(plan.count() > 1);

    // First copy's ack is "lost"; the central retries with a fresh seq.
    s.write(&plan.packet(0, 10, false)).unwrap();
    let ack = s.write(&plan.packet(0, 11, true)).unwrap().unwrap();
    assert_eq!(Frame::decode(&ack).unwrap().header.seq, 11);

    for i in 1..plan.count() {
        s.write(&plan.packet(i, 11 + i as u8, false)).unwrap();
    }
    s.send(&Message::command(Command::Connect));
    assert_eq!(s.hw.connects()[0].0, "a-network-name-long-enough");
}

#[test]
fn later_retry_of_middle_fragment_is_acked() {
    const LONG_SSID: &[u8] = b"a-much-longer-network-name-here";
    let mut s = Session::connected();
    let plan = Fragmenter::new(
        Message::data(DataId::Ssid, LONG_SSID).body(),
        MessageKind::Data,
        23,
        false,
        true,
    )
    .unwrap();
    assert_eq!(plan.count(), 3);

    s.write(&plan.packet(0, 20, false)).unwrap();
    // Fragment 1 lands, its ack and the first retry (seq 22) are lost.
    s.write(&plan.packet(1, 21, false)).unwrap();
    let ack = s.write(&plan.packet(1, 23, true)).unwrap().unwrap();
    assert_eq!(Frame::decode(&ack).unwrap().header.seq, 23);

    s.write(&plan.packet(2, 24, false)).unwrap();
    s.send(&Message::command(Command::Connect));
    assert_eq!(s.hw.connects()[0].0.as_bytes(), LONG_SSID);
}

#[test]
fn retry_of_rejected_message_is_not_acked() {
    let mut s = Session::connected();
    s.node.server_mut().set_key(Some(ProtectKey::new([7; 32])));

    let mut body = Message::command(Command::Scan).body();
    ProtectKey::new([8; 32]).seal(MessageKind::Command, &mut body);
    let plan = Fragmenter::new(body, MessageKind::Command, 23, true, true).unwrap();

    assert_eq!(
        s.write(&plan.packet(0, 30, false)),
        Err(Error::Proto(ProError::Integrity))
    );
    assert_eq!(
        s.write(&plan.packet(0, 31, true)),
        Err(Error::Proto(ProError::Integrity))
    );
    assert_eq!(s.hw.count(&PlatformCall::Scan), 0);
}

#[test]
fn disconnect_discards_partial_message() {
    let mut s = Session::connected();
    let packets = s.central.packets(&Message::data(DataId::Ssid, b"a-network-name-long-enough"));
    s.write(&packets[0]).unwrap();

    s.node.handle_event(Event::BleDisconnected, &mut s.hw, &mut s.sink);
    s.node.handle_event(Event::BleConnected, &mut s.hw, &mut s.sink);
    s.node.server_mut().on_ccc_write(&[0x01, 0x00]).unwrap();

    let result = s.write(&packets[1]);
    assert!(matches!(result, Err(Error::Proto(ProError::Malformed(_)))));
    assert!(s.sink.contains(&AppEvent::CentralDisconnected));
}

#[test]
fn reassembly_window_expires() {
    let mut s = Session::connected();
    let packets = s.central.packets(&Message::data(DataId::Ssid, b"a-network-name-long-enough"));
    s.write(&packets[0]).unwrap();

    s.now = u64::from(ProtocolConfig::default().reassembly_timeout_ms) + 1;
    assert_eq!(s.write(&packets[1]), Err(Error::Proto(ProError::Timeout)));
}

#[test]
fn protected_session_verifies_tags() {
    let key = ProtectKey::new([7; 32]);
    let mut s = Session::connected();
    s.node.server_mut().set_key(Some(key.clone()));
    s.central.key = Some(key);
    s.provision();
    assert_eq!(s.hw.connects().len(), 1);

    s.central.key = Some(ProtectKey::new([8; 32]));
    let packets = s.central.packets(&Message::command(Command::Scan));
    let last = packets.last().unwrap();
    for packet in &packets[..packets.len() - 1] {
        s.write(packet).unwrap();
    }
    assert_eq!(s.write(last), Err(Error::Proto(ProError::Integrity)));
    assert_eq!(s.hw.count(&PlatformCall::Scan), 0);
}

// ── Node → central ────────────────────────────────────────────

struct NoWait;

impl AckTimer for NoWait {
    async fn sleep(&self, _duration: Duration) {}
}

#[derive(Default)]
struct Inbox(Vec<(MessageKind, u8, Vec<u8>)>);

impl ProHandler for Inbox {
    fn on_command(&mut self, id: u8, data: &[u8]) -> Option<Message> {
        self.0.push((MessageKind::Command, id, data.to_vec()));
        None
    }

    fn on_data(&mut self, id: u8, data: &[u8]) -> Option<Message> {
        self.0.push((MessageKind::Data, id, data.to_vec()));
        None
    }
}

/// Delivers node notifications to the central and writes its acks back.
struct ToCentral {
    node: Rc<RefCell<NodeService>>,
    hw: Rc<RefCell<MockPlatform>>,
    central: Rc<RefCell<Receiver<Inbox>>>,
}

impl Notifier for ToCentral {
    type Error = Error;

    fn notify(&mut self, value: &[u8]) -> Result<(), Error> {
        let outcome = self.central.borrow_mut().on_packet(value, 0)?;
        if let Some(ack) = outcome.ack {
            self.node.borrow_mut().on_gatt_write(
                &ack,
                0,
                &mut *self.hw.borrow_mut(),
                &mut RecordingSink::new(),
            )?;
        }
        Ok(())
    }
}

#[test]
fn scan_results_reach_the_central() {
    let mut s = Session::connected();
    s.node.server_mut().on_mtu_exchange(40);
    s.hw.scan_results = (0..4)
        .map(|i| MockPlatform::ap(&format!("network-{i}"), -40 - i))
        .collect();
    s.send(&Message::command(Command::Scan));

    let node = Rc::new(RefCell::new(s.node));
    let hw = Rc::new(RefCell::new(s.hw));
    let central = Rc::new(RefCell::new(Receiver::new(
        &ProtocolConfig::default(),
        Inbox::default(),
    )));
    let (mut tx, mut link) = {
        let n = node.borrow();
        let notifier = ToCentral {
            node: node.clone(),
            hw: hw.clone(),
            central: central.clone(),
        };
        (n.server().sender(NoWait), n.server().link(notifier))
    };

    let msg = node.borrow_mut().take_outbound().unwrap();
    block_on(tx.send(&mut link, &msg)).unwrap();

    let central = central.borrow();
    let inbox = &central.handler().0;
    assert_eq!(inbox.len(), 1);
    let (kind, id, data) = &inbox[0];
    assert_eq!((*kind, *id), (MessageKind::Data, DataId::ScanResults as u8));
    assert_eq!(data, &msg.data);
}

#[test]
fn unsubscribed_central_gets_nothing() {
    let mut s = Session::connected();
    s.node.server_mut().on_ccc_write(&[0x00, 0x00]).unwrap();

    let central = Rc::new(RefCell::new(Receiver::new(
        &ProtocolConfig::default(),
        Inbox::default(),
    )));
    let node = Rc::new(RefCell::new(s.node));
    let notifier = ToCentral {
        node: node.clone(),
        hw: Rc::new(RefCell::new(s.hw)),
        central: central.clone(),
    };
    let (mut tx, mut link) = {
        let n = node.borrow();
        (n.server().sender(NoWait), n.server().link(notifier))
    };

    let result = block_on(tx.send(&mut link, &Message::data(DataId::State, &[0; 5])));
    assert_eq!(result, Err(ProError::Link));
    assert!(central.borrow().handler().0.is_empty());
}
