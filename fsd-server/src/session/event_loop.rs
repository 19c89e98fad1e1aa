//! The per-session event loop: inbound packets from the connection,
//! mailbox deliveries from other sessions, and the single-shot kill lane.

use std::sync::Arc;

use tracing::debug;

use super::{Session, SessionChannels};
use crate::handlers;
use crate::post_office::Address;
use crate::server::ServerState;

pub async fn run(state: Arc<ServerState>, session: Arc<Session>, mut channels: SessionChannels) {
    let cancel = session.connection().cancellation();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,

            packet = session.connection().read_packet() => {
                let Some(packet) = packet else { return };
                match handlers::dispatch(&state, &session, &packet) {
                    Ok(outcome) => {
                        for reply in outcome.replies {
                            session.connection().write_packet(reply, true).await;
                        }
                        for mail in outcome.mail {
                            state.post_office.send_mail(&mail);
                        }
                        if outcome.disconnect {
                            session.connection().cancel();
                            return;
                        }
                    }
                    Err(err) => {
                        let err = err.addressed(session.callsign());
                        debug!(callsign = %session.callsign(), %err, "rejected packet");
                        session.connection().write_packet(err.serialize(), true).await;
                    }
                }
            }

            // Mail from peers rides the coalesced write path.
            delivery = channels.mailbox_rx.recv() => {
                let Some(packet) = delivery else { return };
                session.connection().write_packet(packet, false).await;
            }

            kill = channels.kill_rx.recv() => {
                if let Some(packet) = kill {
                    session.connection().write_packet(packet, true).await;
                }
                session.connection().cancel();
                return;
            }
        }
    }
}
