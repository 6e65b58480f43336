//! blsync host simulator.
//!
//! Runs a provisioning central and a node in one process, joined by an
//! in-memory GATT link, on a single-threaded executor.
//!
//! ```text
//! ┌──────────────────────────┐  write char   ┌──────────────────────────┐
//! │  Central                 │ ────────────▶ │  NodeService             │
//! │  Sender · Receiver       │               │  BlsyncServer · MeshNode │
//! │                          │ ◀──────────── │  Sender (outbox)         │
//! └──────────────────────────┘    notify     └────────────┬─────────────┘
//!                                                         │ port traits
//!                                                         ▼
//!                                              SimPlatform · LogEventSink
//! ```
//!
//! Usage: `blsync-sim [board.json]`

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result, bail};
use embedded_hal::digital::{ErrorType, InputPin};
use log::{error, info, warn};

use blsync::adapters::log_sink::LogEventSink;
use blsync::adapters::sim::SimPlatform;
use blsync::adapters::time::MonotonicClock;
use blsync::app::ports::{AdvertisingPort, WifiPort};
use blsync::app::service::NodeService;
use blsync::board::{BoardConfig, MacReader, MacSource};
use blsync::cli;
use blsync::config::{NodeConfig, ProtocolConfig};
use blsync::drivers::button::ButtonDriver;
use blsync::events::{Event, drain_events, push_event};
use blsync::gatt::Notifier;
use blsync::mesh::{MeshMessage, MsgCtx};
use blsync::mesh::onoff::OP_GEN_ONOFF_SET;
use blsync::protocol::{
    AckSlot, Command, DataId, Link, Message, MessageKind, ProHandler, ReactorTimer, Receiver,
    Sender,
};
use blsync::provisioning::WifiState;

const LAB_SSID: &str = "blsync-lab";
const LAB_PASSWORD: &str = "correct-horse";
const CENTRAL_MTU: u16 = 64;

type Shared<T> = Rc<RefCell<T>>;

// ── Central side ──────────────────────────────────────────────

/// What the central has heard from the node.
#[derive(Default)]
struct CentralView {
    received: Vec<(MessageKind, u8, Vec<u8>)>,
}

impl ProHandler for CentralView {
    fn on_command(&mut self, id: u8, data: &[u8]) -> Option<Message> {
        self.received.push((MessageKind::Command, id, data.to_vec()));
        None
    }

    fn on_data(&mut self, id: u8, data: &[u8]) -> Option<Message> {
        self.received.push((MessageKind::Data, id, data.to_vec()));
        None
    }
}

/// Everything both ends of the simulated link touch.
#[derive(Clone)]
struct Air {
    node: Shared<NodeService>,
    platform: Shared<SimPlatform>,
    central: Shared<Receiver<CentralView>>,
    central_ack: Arc<AckSlot>,
    clock: MonotonicClock,
}

impl Air {
    /// Deliver a packet to the node's write characteristic and route its ack
    /// back to the central.
    fn write_to_node(&self, packet: &[u8]) -> blsync::Result<()> {
        let now = self.clock.now_ms();
        let ack = self.node.borrow_mut().on_gatt_write(
            packet,
            now,
            &mut *self.platform.borrow_mut(),
            &mut LogEventSink,
        )?;
        if let Some(ack) = ack {
            let outcome = self.central.borrow_mut().on_packet(&ack, now)?;
            if let Some(seq) = outcome.acked {
                self.central_ack.signal(seq);
            }
        }
        Ok(())
    }

    /// Deliver a node notification to the central and write back its ack.
    fn notify_central(&self, packet: &[u8]) -> blsync::Result<()> {
        let now = self.clock.now_ms();
        let outcome = self.central.borrow_mut().on_packet(packet, now)?;
        if let Some(ack) = outcome.ack {
            self.write_to_node(&ack)?;
        }
        Ok(())
    }
}

/// Central → node, through the write characteristic.
struct CentralLink(Air);

impl Link for CentralLink {
    type Error = blsync::Error;

    fn notify(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        self.0.write_to_node(packet)
    }

    fn mtu(&self) -> usize {
        usize::from(CENTRAL_MTU)
    }
}

/// Node → central, as GATT notifications.
struct AirNotifier(Air);

impl Notifier for AirNotifier {
    type Error = blsync::Error;

    fn notify(&mut self, value: &[u8]) -> Result<(), Self::Error> {
        self.0.notify_central(value)
    }
}

// ── Simulated peripherals ─────────────────────────────────────

/// Button level driven by the simulation script.
#[derive(Clone)]
struct SimPin(Rc<Cell<bool>>);

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

/// MAC storage with blank eFuses and a factory-programmed address.
struct SimMacStore;

impl MacReader for SimMacStore {
    fn read_mac(&mut self, source: MacSource) -> Option<[u8; 6]> {
        match source {
            MacSource::Efuse => Some([0; 6]),
            MacSource::Flash => None,
            MacSource::Factory => Some([0x18, 0xb9, 0x05, 0x12, 0x34, 0x56]),
        }
    }
}

// ── Boot ──────────────────────────────────────────────────────

fn load_board() -> Result<BoardConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(BoardConfig::default());
    };
    let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let board = BoardConfig::from_json(&json).map_err(blsync::Error::from)?;
    info!("Board description loaded from {}", path);
    Ok(board)
}

/// Hold the board's button for `hold_ms` of simulated time, ticking the
/// driver every 10 ms, and queue whatever gestures it reports.
fn press_button(board: &BoardConfig, config: &NodeConfig, hold_ms: u64) {
    const TICK_MS: u64 = 10;
    let (pin_no, active_low, timing) = board.button().unwrap_or((0, true, config.button));
    let released = active_low;
    let level = Rc::new(Cell::new(released));
    let mut button = ButtonDriver::new(SimPin(level.clone()), active_low, timing);
    info!("Button: GPIO{} held for {} ms", pin_no, hold_ms);

    level.set(!released);
    button.on_edge();
    let mut now = 0;
    while now <= hold_ms + u64::from(timing.long_long_press_ms) {
        if now >= hold_ms {
            level.set(released);
        }
        if let Some(gesture) = button.tick(now) {
            push_event(Event::Button(gesture));
        }
        if now > hold_ms && button.is_idle() {
            break;
        }
        now += TICK_MS;
    }
}

fn drain(air: &Air) {
    drain_events(|event| {
        air.node
            .borrow_mut()
            .handle_event(event, &mut *air.platform.borrow_mut(), &mut LogEventSink);
    });
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  blsync-sim v{}                   ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 1. Board and identity ─────────────────────────────────
    let board = match load_board() {
        Ok(board) => board,
        Err(e) => {
            error!("Board configuration rejected: {:#}; halting", e);
            return Err(e);
        }
    };
    let mac = board
        .resolve_mac(&mut SimMacStore)
        .map_err(blsync::Error::from)?;
    info!(
        "MAC {:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x} country={}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5], board.country_code
    );

    // ── 2. Platform and service ───────────────────────────────
    let config = NodeConfig::default();
    let mut platform = SimPlatform::new();
    platform.add_network(LAB_SSID, LAB_PASSWORD, -42, 6);
    platform.add_network("guest", "", -71, 11);

    let mut node = NodeService::new(config.clone())?;
    node.start(&mut platform, &mut LogEventSink);

    let central_cfg = ProtocolConfig::default();
    let air = Air {
        node: Rc::new(RefCell::new(node)),
        platform: Rc::new(RefCell::new(platform)),
        central: Rc::new(RefCell::new(Receiver::new(&central_cfg, CentralView::default()))),
        central_ack: Arc::new(AckSlot::new()),
        clock: MonotonicClock::new(),
    };

    // ── 3. Long press: start advertising ──────────────────────
    press_button(&board, &config, u64::from(config.button.long_press_start_ms + 500));
    drain(&air);
    if !air.platform.borrow().is_advertising() {
        bail!("node did not start advertising");
    }

    // ── 4. Central connects and subscribes ────────────────────
    push_event(Event::BleConnected);
    drain(&air);
    {
        let mut node = air.node.borrow_mut();
        node.server_mut().on_mtu_exchange(CENTRAL_MTU);
        node.server_mut()
            .on_ccc_write(&[0x01, 0x00])
            .map_err(blsync::Error::from)?;
    }

    // ── 5. Provisioning session ───────────────────────────────
    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let session = executor.spawn(provision(air.clone(), central_cfg));
    futures_lite::future::block_on(executor.run(session))?;

    // ── 6. Results ────────────────────────────────────────────
    for (kind, id, data) in &air.central.borrow().handler().received {
        match (kind, DataId::from_id(*id)) {
            (MessageKind::Data, Some(DataId::State)) if data.len() == 5 => info!(
                "Central: node state={:?} ip={}.{}.{}.{}",
                WifiState::from_id(data[0]),
                data[1],
                data[2],
                data[3],
                data[4]
            ),
            _ => info!("Central: {:?} 0x{:02x} ({} bytes)", kind, id, data.len()),
        }
    }

    // ── 7. Mesh and console ───────────────────────────────────
    let ctx = MsgCtx {
        src: 0x0001,
        dst: 0x0100,
        app_idx: 0,
    };
    let set = MeshMessage {
        opcode: OP_GEN_ONOFF_SET,
        ctx,
        payload: &[0x01, 0x2a],
    };
    let now = air.clock.now_ms();
    let reply = air.node.borrow_mut().on_mesh_message(&set, now, &mut LogEventSink);
    if let Some(reply) = reply {
        info!("Mesh: status to 0x{:04x}: {:02x?}", reply.dst, reply.to_pdu().as_slice());
    }

    for line in ["blsync_state", "mesh_onoff_get", "mesh_level_set 1200", "mesh_level_get"] {
        let out = cli::dispatch(line, |cmd| {
            air.node
                .borrow_mut()
                .handle_command(cmd, &mut *air.platform.borrow_mut(), &mut LogEventSink)
        });
        match out {
            Ok(text) => info!("> {}\n{}", line, text),
            Err(e) => warn!("> {}: {}", line, e),
        }
    }

    push_event(Event::BleDisconnected);
    drain(&air);

    let node = air.node.borrow();
    info!(
        "Done: provisioned={} wifi={:?}",
        node.is_provisioned(),
        air.platform.borrow().state().0
    );
    if !node.is_provisioned() {
        bail!("provisioning did not complete");
    }
    Ok(())
}

/// Central script: credentials, `Connect`, then `GetState`. Node replies
/// are flushed after every central message.
async fn provision(air: Air, config: ProtocolConfig) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let mut central = Sender::new(&config, air.central_ack.clone(), stop, ReactorTimer);
    let mut uplink = CentralLink(air.clone());

    let (mut node_tx, mut downlink) = {
        let node = air.node.borrow();
        (
            node.server().sender(ReactorTimer),
            node.server().link(AirNotifier(air.clone())),
        )
    };

    let script = [
        Message::data(DataId::Ssid, LAB_SSID.as_bytes()),
        Message::data(DataId::Password, LAB_PASSWORD.as_bytes()),
        Message::command(Command::Connect),
        Message::command(Command::GetState),
    ];
    for msg in &script {
        central
            .send(&mut uplink, msg)
            .await
            .map_err(blsync::Error::from)
            .with_context(|| format!("central send {:?} 0x{:02x}", msg.kind, msg.id))?;
        flush_outbox(&air, &mut node_tx, &mut downlink).await?;
        drain(&air);
    }
    Ok(())
}

async fn flush_outbox<L: Link>(
    air: &Air,
    tx: &mut Sender<ReactorTimer>,
    link: &mut L,
) -> Result<()> {
    loop {
        let next = air.node.borrow_mut().take_outbound();
        let Some(msg) = next else {
            return Ok(());
        };
        tx.send(link, &msg).await.map_err(blsync::Error::from)?;
    }
}
