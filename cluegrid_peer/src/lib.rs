// cluegrid_peer — the application-facing stack for one peer.
//
// `PeerSession` wires the protocol, net, lobby, and game crates behind the
// entry points the host application calls, and is driven entirely by that
// application's main loop: one `tick` per frame, plus the rendezvous
// service's change/membership/promotion callbacks. The vendor adapters
// (`AttributeStore`, `PacketRelay`, `HintSource`) stay owned by the caller.
//
// `CoordinatorConfig` holds every tunable (team capacity, debounce and
// retry windows, board composition), JSON-loadable with per-field defaults.

pub mod config;
pub mod session;

pub use config::CoordinatorConfig;
pub use session::PeerSession;
