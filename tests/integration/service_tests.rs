//! Integration tests for `NodeService` with mock adapters.
//!
//! Exercises button gestures, advertising policy, mesh models and the
//! console command path end to end through the port traits.

use blsync::app::commands::{AppCommand, CommandReply};
use blsync::app::events::AppEvent;
use blsync::app::service::{CRED_KEY, CRED_NAMESPACE, NodeService};
use blsync::cli;
use blsync::config::NodeConfig;
use blsync::drivers::button::ButtonEvent;
use blsync::events::Event;
use blsync::mesh::level::{OP_GEN_LEVEL_SET, OP_GEN_LEVEL_STATUS};
use blsync::mesh::onoff::{OP_GEN_ONOFF_SET, OP_GEN_ONOFF_STATUS};
use blsync::mesh::{MeshMessage, MsgCtx};
use blsync::provisioning::{WifiCredentials, WifiState};

use crate::mock_hw::{MockPlatform, PlatformCall, RecordingSink};

const CTX: MsgCtx = MsgCtx {
    src: 0x0042,
    dst: 0x0100,
    app_idx: 0,
};

fn started() -> (NodeService, MockPlatform, RecordingSink) {
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    let mut hw = MockPlatform::new();
    let mut sink = RecordingSink::new();
    node.start(&mut hw, &mut sink);
    (node, hw, sink)
}

fn store_credentials(hw: &mut MockPlatform, ssid: &str) {
    let creds = WifiCredentials {
        ssid: ssid.try_into().unwrap(),
        password: "password1".try_into().unwrap(),
        bssid: None,
    };
    let blob = postcard::to_allocvec(&creds).unwrap();
    hw.store
        .insert(format!("{}::{}", CRED_NAMESPACE, CRED_KEY), blob);
}

// ── Startup ───────────────────────────────────────────────────

#[test]
fn unprovisioned_start_stays_idle() {
    let (node, hw, sink) = started();
    assert!(!node.is_provisioned());
    assert!(hw.calls.is_empty());
    assert_eq!(sink.events, vec![AppEvent::Started { provisioned: false }]);
}

#[test]
fn corrupt_credentials_are_ignored() {
    let mut hw = MockPlatform::new();
    hw.store
        .insert(format!("{}::{}", CRED_NAMESPACE, CRED_KEY), vec![0xFF; 3]);
    let mut sink = RecordingSink::new();
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    node.start(&mut hw, &mut sink);

    assert!(!node.is_provisioned());
    assert!(hw.connects().is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let mut config = NodeConfig::default();
    config.protocol.ack_timeout_ms = 0;
    assert!(NodeService::new(config).is_err());
}

// ── Button gestures ───────────────────────────────────────────

#[test]
fn long_press_starts_advertising_once() {
    let (mut node, mut hw, mut sink) = started();
    node.handle_event(Event::Button(ButtonEvent::LongPress), &mut hw, &mut sink);
    node.handle_event(Event::Button(ButtonEvent::LongPress), &mut hw, &mut sink);

    assert!(hw.advertising);
    assert_eq!(hw.count(&PlatformCall::StartAdvertising), 1);
    assert!(sink.contains(&AppEvent::ProvisioningStarted));
}

#[test]
fn advertising_failure_is_reported() {
    let (mut node, mut hw, mut sink) = started();
    hw.advertising_fails = true;
    node.handle_event(Event::Button(ButtonEvent::LongPress), &mut hw, &mut sink);

    assert!(!hw.advertising);
    assert!(sink.contains(&AppEvent::Failed("advertising")));
}

#[test]
fn long_long_press_clears_credentials() {
    let mut hw = MockPlatform::new();
    store_credentials(&mut hw, "office");
    let mut sink = RecordingSink::new();
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    node.start(&mut hw, &mut sink);
    assert!(node.is_provisioned());
    assert_eq!(hw.connects()[0].0, "office");

    node.handle_event(Event::Button(ButtonEvent::LongLongPress), &mut hw, &mut sink);

    assert!(!node.is_provisioned());
    assert!(!hw.has_key(CRED_NAMESPACE, CRED_KEY));
    assert_eq!(hw.count(&PlatformCall::Disconnect), 1);
    assert!(sink.contains(&AppEvent::CredentialsCleared));
    assert!(sink.contains(&AppEvent::WifiStateChanged(WifiState::Disconnected)));
}

#[test]
fn short_press_toggles_onoff() {
    let (mut node, mut hw, mut sink) = started();
    node.handle_event(Event::Button(ButtonEvent::ShortPress), &mut hw, &mut sink);
    assert!(node.mesh().onoff.present());
    assert!(sink.contains(&AppEvent::MeshChanged { onoff: true, level: 0 }));

    node.handle_event(Event::Button(ButtonEvent::ShortPress), &mut hw, &mut sink);
    assert!(!node.mesh().onoff.present());
}

// ── Advertising policy ────────────────────────────────────────

#[test]
fn provisioning_complete_stops_advertising() {
    let (mut node, mut hw, mut sink) = started();
    node.handle_event(Event::Button(ButtonEvent::LongPress), &mut hw, &mut sink);
    node.handle_event(Event::ProvisioningComplete, &mut hw, &mut sink);

    assert!(!hw.advertising);
    assert!(sink.contains(&AppEvent::ProvisioningStopped));
}

#[test]
fn link_loss_is_reported_on_tick() {
    let mut hw = MockPlatform::new();
    store_credentials(&mut hw, "office");
    let mut sink = RecordingSink::new();
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    node.start(&mut hw, &mut sink);
    sink.clear();

    hw.state = WifiState::Disconnected;
    node.tick(100, &mut hw, &mut sink);
    node.tick(200, &mut hw, &mut sink);

    assert_eq!(
        sink.events,
        vec![AppEvent::WifiStateChanged(WifiState::Disconnected)]
    );
}

#[test]
fn central_connect_and_disconnect_are_reported() {
    let (mut node, mut hw, mut sink) = started();
    node.handle_event(Event::BleConnected, &mut hw, &mut sink);
    assert!(node.server().state().is_connected());
    node.handle_event(Event::BleDisconnected, &mut hw, &mut sink);
    assert!(!node.server().state().is_connected());

    assert!(sink.contains(&AppEvent::CentralConnected));
    assert!(sink.contains(&AppEvent::CentralDisconnected));
}

// ── Mesh ──────────────────────────────────────────────────────

#[test]
fn mesh_onoff_set_replies_with_status() {
    let (mut node, _hw, mut sink) = started();
    let msg = MeshMessage {
        opcode: OP_GEN_ONOFF_SET,
        ctx: CTX,
        payload: &[0x01, 0x07],
    };
    let reply = node.on_mesh_message(&msg, 0, &mut sink).unwrap();

    assert_eq!(reply.opcode, OP_GEN_ONOFF_STATUS);
    assert_eq!(reply.dst, CTX.src);
    assert_eq!(reply.payload.as_slice(), &[0x01]);
    assert!(sink.contains(&AppEvent::MeshChanged { onoff: true, level: 0 }));
}

#[test]
fn mesh_level_transition_completes_on_tick() {
    let (mut node, mut hw, mut sink) = started();
    // 1000 in 10 steps of 100 ms, no delay.
    let [lo, hi] = 1000i16.to_le_bytes();
    let msg = MeshMessage {
        opcode: OP_GEN_LEVEL_SET,
        ctx: CTX,
        payload: &[lo, hi, 0x01, 0x0A, 0x00],
    };
    let reply = node.on_mesh_message(&msg, 0, &mut sink).unwrap();
    assert_eq!(reply.opcode, OP_GEN_LEVEL_STATUS);
    assert_eq!(node.mesh().level.target(), 1000);

    node.tick(500, &mut hw, &mut sink);
    let halfway = node.mesh().level.present();
    assert!(halfway > 0 && halfway < 1000, "halfway = {halfway}");

    node.tick(1000, &mut hw, &mut sink);
    assert_eq!(node.mesh().level.present(), 1000);
    assert!(sink.contains(&AppEvent::MeshChanged {
        onoff: false,
        level: 1000
    }));
}

// ── Console commands ──────────────────────────────────────────

#[test]
fn commands_report_state() {
    let mut hw = MockPlatform::new();
    store_credentials(&mut hw, "office");
    let mut sink = RecordingSink::new();
    let mut node = NodeService::new(NodeConfig::default()).unwrap();
    node.start(&mut hw, &mut sink);

    let reply = node.handle_command(AppCommand::ShowState, &mut hw, &mut sink);
    assert_eq!(
        reply,
        CommandReply::State {
            wifi: WifiState::Connected,
            ip: [10, 0, 0, 7],
            provisioned: true,
            advertising: false,
        }
    );
}

#[test]
fn cli_lines_drive_the_service() {
    let (mut node, mut hw, mut sink) = started();
    let mut run = |line: &str| {
        cli::dispatch(line, |cmd| node.handle_command(cmd, &mut hw, &mut sink))
    };

    assert_eq!(run("mesh_onoff_set 1").unwrap(), "onoff=1");
    assert_eq!(run("mesh_onoff_get").unwrap(), "onoff=1");
    assert_eq!(run("mesh_level_set -300").unwrap(), "level=-300");
    assert_eq!(run("mesh_level_get").unwrap(), "level=-300");
    assert_eq!(run("blsync_clear").unwrap(), "ok");
    assert!(run("mesh_level_set high").is_err());
}
