//! Bridge between the ECS world and the network transport.
//!
//! The transport itself lives outside the crate. It receives the ends returned
//! by [`setup_network_bridge`]: actions arriving from remote peers are pushed
//! into [`NetworkTransport::tx_in`], and actions this peer dispatches are read
//! from [`NetworkTransport::rx_out`].

use bevy_ecs::prelude::*;
use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::events::network::{IncomingAction, OutgoingAction};

#[derive(Resource)]
pub struct NetworkBridge {
    /// Outbound actions (ECS -> transport).
    pub tx_out: Sender<OutgoingAction>,
    /// Inbound actions (transport -> ECS).
    pub rx_in: Receiver<IncomingAction>,
}

/// Transport side of a [`NetworkBridge`].
pub struct NetworkTransport {
    pub tx_in: Sender<IncomingAction>,
    pub rx_out: Receiver<OutgoingAction>,
}

/// Register the bridge and the action message queues.
pub fn setup_network_bridge(world: &mut World) -> NetworkTransport {
    let (tx_in, rx_in) = unbounded::<IncomingAction>();
    let (tx_out, rx_out) = unbounded::<OutgoingAction>();

    world.insert_resource(NetworkBridge { tx_out, rx_in });
    world.insert_resource(Messages::<IncomingAction>::default());
    world.insert_resource(Messages::<OutgoingAction>::default());

    NetworkTransport { tx_in, rx_out }
}
