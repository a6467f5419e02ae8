//! ---
//! rbus_section: "04-node-runtime"
//! rbus_subsection: "module"
//! rbus_type: "source"
//! rbus_scope: "code"
//! rbus_description: "Protocol state machine for a single bus node."
//! rbus_version: "v0.1.0"
//! rbus_owner: "tbd"
//! ---
//! Role arbitration.
//!
//! The arbiter is the only writer of the node role. Directives are advisory
//! and unacknowledged: two nodes given conflicting host commands at the same
//! time both end up ACTIVE (or both PASSIVE) until the next directive. That
//! window is reported by the node as a role conflict and is not corrected
//! here.

use rbus_common::Role;
use rbus_proto::RoleDirective;

/// Where a role directive came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveSource {
    Host,
    Peer,
}

impl DirectiveSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveSource::Host => "host",
            DirectiveSource::Peer => "peer",
        }
    }
}

/// Result of applying one directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleTransition {
    pub from: Role,
    pub to: Role,
    pub source: DirectiveSource,
    /// Directive the peer must receive. Only host directives are
    /// propagated; peer directives are never re-forwarded.
    pub notify_peer: Option<RoleDirective>,
}

impl RoleTransition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Holder of the local role.
#[derive(Debug, Clone)]
pub struct RoleArbiter {
    role: Role,
    transitions: u64,
}

impl RoleArbiter {
    pub fn new(initial: Role) -> Self {
        Self {
            role: initial,
            transitions: 0,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_active(&self) -> bool {
        self.role.is_active()
    }

    /// Number of applied directives that changed the role.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Host asked this node to change role. The peer is always told to take
    /// the complementary role, even when the local role is unchanged.
    pub fn apply_host(&mut self, directive: RoleDirective) -> RoleTransition {
        let target = directive.target_role();
        let mut transition = self.set(target, DirectiveSource::Host);
        transition.notify_peer = Some(RoleDirective::for_role(target.complement()));
        transition
    }

    /// The peer pushed a directive over the bus.
    pub fn apply_peer(&mut self, directive: RoleDirective) -> RoleTransition {
        self.set(directive.target_role(), DirectiveSource::Peer)
    }

    fn set(&mut self, to: Role, source: DirectiveSource) -> RoleTransition {
        let from = self.role;
        self.role = to;
        if from != to {
            self.transitions += 1;
        }
        RoleTransition {
            from,
            to,
            source,
            notify_peer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_directive_changes_role_and_notifies_peer() {
        let mut arbiter = RoleArbiter::new(Role::Active);
        let transition = arbiter.apply_host(RoleDirective::SetSlave);
        assert_eq!(arbiter.role(), Role::Passive);
        assert!(transition.changed());
        assert_eq!(transition.notify_peer, Some(RoleDirective::SetMaster));
        assert_eq!(arbiter.transitions(), 1);
    }

    #[test]
    fn peer_directive_is_not_forwarded() {
        let mut arbiter = RoleArbiter::new(Role::Passive);
        let transition = arbiter.apply_peer(RoleDirective::SetMaster);
        assert_eq!(arbiter.role(), Role::Active);
        assert_eq!(transition.source, DirectiveSource::Peer);
        assert_eq!(transition.notify_peer, None);
    }

    #[test]
    fn repeated_host_directive_still_reasserts_peer_role() {
        let mut arbiter = RoleArbiter::new(Role::Active);
        let transition = arbiter.apply_host(RoleDirective::SetMaster);
        assert!(!transition.changed());
        assert_eq!(transition.notify_peer, Some(RoleDirective::SetSlave));
        assert_eq!(arbiter.transitions(), 0);
    }

    #[test]
    fn complementary_directives_leave_exactly_one_active() {
        let mut a = RoleArbiter::new(Role::Active);
        let mut b = RoleArbiter::new(Role::Passive);
        let sent = a.apply_host(RoleDirective::SetSlave).notify_peer;
        b.apply_peer(sent.expect("directive for peer"));
        assert_ne!(a.role(), b.role());
        assert!(b.is_active());
    }
}
