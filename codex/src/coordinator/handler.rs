//! Logins, disconnections and phase-aware dispatch of inbound messages.

use super::Coordinator;
use crate::{
    game::{
        entities::{GENERAL_CHANNEL, PlayerIdentity},
        functional,
        rules::{RuleError, RulesEngine},
        state_machine::{Phase, TurnAdvance},
    },
    net::{
        connection::{ConnectionId, SharedConnection},
        messages::{Message, Payload},
    },
    session::JoinOutcome,
};

pub(super) fn login_reply(nickname_accepted: bool, connection_established: bool) -> Message {
    Message::from_server(Payload::LoginReply {
        nickname_accepted,
        connection_established,
    })
}

impl<R: RulesEngine> Coordinator<R> {
    pub(super) fn on_join(&mut self, raw: &str, connection: SharedConnection) {
        if !connection.is_alive() {
            log::debug!("Ignoring login as {raw} from closed connection {}", connection.id());
            return;
        }
        if let Some(current) = self.registry.identity_of(connection.id()) {
            log::warn!("Connection {} is already logged in as {current}", connection.id());
            return;
        }

        let phase = self.state.phase();
        if phase == Phase::Lobby && self.lobby_is_full() {
            log::info!("Rejecting {raw}: the lobby is full");
            connection.send(Message::error("The lobby is full, try again for the next match."));
            connection.send(login_reply(false, false));
            connection.disconnect();
            return;
        }

        match self.registry.join(raw, connection.clone(), phase) {
            Ok(JoinOutcome::Admitted(identity)) => self.admit(identity, &connection),
            Ok(JoinOutcome::Reconnected(identity)) => self.on_reconnect(identity, &connection),
            Err(error) => {
                log::info!("Login as {raw:?} rejected: {error}");
                connection.send(Message::error(error.to_string()));
                connection.send(login_reply(false, !error.is_terminal()));
                if error.is_terminal() {
                    connection.disconnect();
                }
            }
        }
    }

    fn on_reconnect(&mut self, identity: PlayerIdentity, connection: &SharedConnection) {
        log::info!("{identity} reconnected");
        connection.send(login_reply(true, true));
        self.registry
            .broadcast(&Message::generic(format!("Player reconnected: {identity}")));
        connection.send(Message::from_server(Payload::GameRoomRequest));
        self.broadcast_players_list();
        self.broadcast_public_state();
        connection.send(Message::from_server(Payload::ReconnectedManuscript {
            records: self.state.history_for(&identity),
            identity,
        }));

        if self.state.is_suspended() && self.registry.online_count() >= 2 {
            self.state.set_suspended(false);
            log::info!("Match resumed");
            self.registry.broadcast(&Message::generic("Game resumed."));
            self.settle_skipped_draw();
            self.next_turn();
        }
    }

    pub(super) fn on_disconnect(&mut self, connection: ConnectionId) {
        let phase = self.state.phase();
        let Some(departure) = self.registry.leave(connection, phase) else {
            log::debug!("Connection {connection} closed before logging in");
            return;
        };
        let identity = departure.identity;
        log::info!("{identity} disconnected during {phase}");
        self.registry
            .broadcast(&Message::generic(format!("Player {identity} disconnected.")));

        if phase == Phase::Lobby {
            self.leave_lobby(&identity);
            return;
        }

        let online = self.registry.online_count();
        if online == 0 {
            self.abandon();
        } else if functional::should_suspend(phase, online) {
            self.state.set_suspended(true);
            log::info!("Match suspended with one player online");
            self.registry.broadcast(&Message::generic(
                "Game suspended: waiting for another player to reconnect.",
            ));
        } else if self.state.is_active(&identity) && matches!(phase, Phase::Play | Phase::Draw) {
            self.settle_skipped_draw();
            match self.state.next_turn(|player| self.registry.is_online(player)) {
                TurnAdvance::Next(seat) => {
                    let next = &self.state.players()[seat];
                    self.registry.broadcast(&Message::generic(format!(
                        "Since {identity} is disconnected, the next player is: {next}"
                    )));
                    self.begin_turn(seat);
                }
                TurnAdvance::EndMatch => self.end_match(),
                TurnAdvance::NobodyOnline => self.abandon(),
            }
        }
    }

    pub(super) fn on_inbound(&mut self, connection: ConnectionId, message: Message) {
        if message.is_ping() {
            return;
        }
        let Some(identity) = self.registry.identity_of(connection) else {
            log::warn!("Ignoring {message} from connection {connection} that never logged in");
            return;
        };
        if !identity.matches(&message.sender) {
            log::warn!("Ignoring {message}: connection belongs to {identity}");
            return;
        }
        if self.state.is_suspended() {
            log::debug!("Match suspended, ignoring {message}");
            return;
        }

        let phase = self.state.phase();
        let active = self.state.is_active(&identity);
        let kind = message.kind();
        match (phase, message.payload) {
            (_, Payload::ChatMessage { to, text, .. }) => self.chat(&identity, to, text),

            (Phase::Lobby, Payload::ColorRequest { color }) => self.claim_color(&identity, &color),
            (Phase::Lobby, Payload::PlayersNumberReply { count }) => {
                self.set_players_number(&identity, count);
            }
            (
                Phase::Lobby,
                Payload::SecretStartingResponse {
                    secret_target,
                    starting_front,
                },
            ) => self.choose_starting(&identity, secret_target, starting_front),

            (
                Phase::Play,
                Payload::PlaceCardResponse {
                    slot,
                    row,
                    col,
                    front,
                },
            ) if active => self.place(&identity, slot, row, col, front),
            (Phase::Draw, Payload::DrawCardResponse { choice }) if active => {
                self.draw(&identity, choice);
            }
            (Phase::Play, Payload::DrawCardResponse { .. }) if active => {
                self.reject(&identity, &RuleError::PlaceFirst, Payload::PlaceCardRequest);
            }
            (Phase::Draw, Payload::PlaceCardResponse { .. }) if active => {
                self.reject(&identity, &RuleError::DrawFirst, Payload::DrawCardRequest);
            }
            (
                Phase::Play | Phase::Draw,
                Payload::PlaceCardResponse { .. } | Payload::DrawCardResponse { .. },
            ) => {
                log::warn!(
                    "{identity} sent {kind} but it is {}'s turn",
                    self.state
                        .active_player()
                        .map_or("nobody".to_string(), ToString::to_string)
                );
            }

            (phase, _) => log::warn!("Ignoring {kind} from {identity} during {phase}"),
        }
    }

    /// Report a rule violation to the offending player and ask again.
    pub(super) fn reject(&self, identity: &PlayerIdentity, error: &RuleError, retry: Payload) {
        log::debug!("{identity}: {error}");
        self.registry.send_to(identity, Message::error(error.to_string()));
        self.registry.send_to(identity, Message::from_server(retry));
    }

    fn chat(&self, sender: &PlayerIdentity, to: String, text: String) {
        let general = to.eq_ignore_ascii_case(GENERAL_CHANNEL);
        let message = Message::new(
            sender.as_str(),
            Payload::ChatMessage {
                from: sender.to_string(),
                to: to.clone(),
                text,
            },
        );

        if general {
            self.registry.broadcast_except(sender, &message);
            return;
        }

        let delivered = PlayerIdentity::parse(&to)
            .map(|recipient| self.registry.send_to(&recipient, message))
            .unwrap_or(false);
        if !delivered {
            self.registry
                .send_to(sender, Message::error(format!("Player {to} is not online.")));
        }
    }

    fn abandon(&mut self) {
        log::warn!("Everyone left during {}, abandoning the match", self.state.phase());
        self.reset();
    }
}
