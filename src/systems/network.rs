//! Systems bridging world network actions with the transport.
//!
//! Order within a frame:
//! 1. [`poll_network_actions`] drains actions received by the transport.
//! 2. Authority handling reads them and may write [`OutgoingAction`]s.
//! 3. [`forward_outgoing_actions`] sends those out and
//!    [`loopback_outgoing_actions`] queues them as incoming
//!    from this peer, so they apply locally on the next frame.
//! 4. [`update_bevy_outgoing_actions`] and [`update_bevy_incoming_actions`]
//!    run last and age both queues.

use bevy_ecs::prelude::*;

use crate::components::networkobject::Owner;
use crate::events::network::{ActionSender, IncomingAction, OutgoingAction};
use crate::resources::networkbridge::NetworkBridge;
use crate::resources::session::NetworkSession;

/// Drain actions received by the transport into `Messages<IncomingAction>`.
pub fn poll_network_actions(bridge: Res<NetworkBridge>, mut writer: MessageWriter<IncomingAction>) {
    writer.write_batch(bridge.rx_in.try_iter());
}

pub fn update_bevy_incoming_actions(mut msgs: ResMut<Messages<IncomingAction>>) {
    msgs.update();
}

pub fn update_bevy_outgoing_actions(mut msgs: ResMut<Messages<OutgoingAction>>) {
    msgs.update();
}

/// Hand outgoing actions to the transport. Send errors mean the transport is
/// gone and are ignored.
pub fn forward_outgoing_actions(bridge: Res<NetworkBridge>, mut reader: MessageReader<OutgoingAction>) {
    for action in reader.read() {
        let _ = bridge.tx_out.send(action.clone());
    }
}

/// Re-queue outgoing actions as incoming actions sent by this peer.
pub fn loopback_outgoing_actions(
    session: Res<NetworkSession>,
    mut reader: MessageReader<OutgoingAction>,
    mut writer: MessageWriter<IncomingAction>,
) {
    for outgoing in reader.read() {
        let user = outgoing
            .on_behalf_of
            .clone()
            .unwrap_or_else(|| Owner::User(session.local_user.clone()));
        writer.write(IncomingAction {
            from: ActionSender {
                user,
                peer: session.local_peer.clone(),
            },
            action: outgoing.action.clone(),
        });
    }
}
