// cluegrid_net — packet-relay side of the Cluegrid coordination stack.
//
// Three pieces, all driven from the session layer's single cooperative tick:
// - `relay.rs`:     `PacketRelay`, the adapter trait over the rendezvous
//                   vendor's point-to-point datagram service, plus RPC
//                   send/broadcast helpers.
// - `pump.rs`:      `PacketPump`, the per-tick non-blocking drain that
//                   decodes frames, enforces the logical-channel filter,
//                   and yields typed `InboundEvent`s.
// - `handshake.rs`: `ClientHandshake` / `HostHandshake`, the state machines
//                   that validate a channel before game traffic is trusted.
//
// Nothing in this crate owns a thread or reads the clock; timestamps come
// in as arguments and all I/O is non-blocking polling. That keeps every
// state machine deterministic under the integration harness.

pub mod handshake;
pub mod pump;
pub mod relay;

pub use handshake::{ClientHandshake, HostHandshake};
pub use pump::{InboundEvent, PacketPump};
pub use relay::{PacketRelay, broadcast_rpc, send_rpc};
