// Session context passed to every coordinator.
//
// There is no implicit "manager" singleton: whether this peer is the host
// is a plain value, and host migration is swapping that value and
// re-deriving host-local state from the current attribute snapshot — the
// coordinators themselves are not re-instantiated.

use cluegrid_protocol::types::PeerId;

/// Whether this peer currently holds the authoritative role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

impl Role {
    pub fn is_host(self) -> bool {
        matches!(self, Role::Host)
    }
}

/// Identity and role of the local peer within one lobby session.
#[derive(Clone, Debug)]
pub struct LobbyContext {
    pub self_id: PeerId,
    pub role: Role,
}

impl LobbyContext {
    pub fn new(self_id: PeerId, role: Role) -> Self {
        Self { self_id, role }
    }

    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }
}
