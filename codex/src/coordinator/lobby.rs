//! Lobby protocol: colors, target player count, starting choices and
//! the start of the match.

use rand::Rng;

use super::{Coordinator, handler::login_reply};
use crate::{
    game::{
        entities::{CardId, CardPlacementRecord, Color, PlayerIdentity},
        rules::RulesEngine,
    },
    net::{
        connection::SharedConnection,
        messages::{Message, Payload},
    },
};

fn color_list(colors: &[Color]) -> String {
    colors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl<R: RulesEngine> Coordinator<R> {
    /// No seat left for a newcomer: the target count, or the configured
    /// maximum while no target is set, is already reached.
    pub(super) fn lobby_is_full(&self) -> bool {
        let target = self.state.target_players().unwrap_or(self.config.max_players);
        self.state.players().len() >= target
    }

    pub(super) fn admit(&mut self, identity: PlayerIdentity, connection: &SharedConnection) {
        if let Err(error) = self.rules.add_player(&identity) {
            log::warn!("Rules refused {identity}: {error}");
            self.registry.remove(&identity);
            connection.send(Message::error(error.to_string()));
            connection.send(login_reply(false, true));
            return;
        }
        self.state.admit(identity.clone());
        log::info!(
            "{identity} joined the lobby ({} waiting)",
            self.state.players().len()
        );

        connection.send(login_reply(true, true));
        connection.send(Message::generic(format!(
            "Welcome {identity}! Choose a color: {}",
            color_list(&self.rules.available_colors())
        )));
    }

    /// A player left before the match started: forget them entirely.
    pub(super) fn leave_lobby(&mut self, identity: &PlayerIdentity) {
        let was_host = self.state.is_host(identity);
        self.rules.remove_player(identity);
        self.state.remove(identity);

        if was_host && self.state.target_players().is_none() {
            if let Some(host) = self.state.host().cloned() {
                log::info!("{host} is the new lobby host");
                self.registry
                    .send_to(&host, Message::from_server(Payload::PlayersNumberRequest));
            }
        }
        self.try_start();
    }

    pub(super) fn claim_color(&mut self, identity: &PlayerIdentity, raw: &str) {
        let claimed = raw
            .parse::<Color>()
            .map_err(|error| log::debug!("{identity}: {error}"))
            .and_then(|color| {
                self.rules
                    .claim_color(identity, color)
                    .map_err(|error| log::debug!("{identity}: {error}"))
            })
            .is_ok();

        self.registry.send_to(
            identity,
            Message::from_server(Payload::ColorResponse {
                accepted: claimed,
                available: self.rules.available_colors(),
            }),
        );
        if !claimed {
            return;
        }

        if self.state.is_host(identity) && self.state.target_players().is_none() {
            self.registry
                .send_to(identity, Message::from_server(Payload::PlayersNumberRequest));
        }
        self.request_starting_choice(identity);
    }

    fn request_starting_choice(&self, identity: &PlayerIdentity) {
        if let Some(options) = self.rules.starting_options(identity) {
            self.registry.send_to(
                identity,
                Message::from_server(Payload::SecretStartingRequest {
                    starting_card: options.starting_card,
                    targets: options.targets,
                }),
            );
        }
    }

    pub(super) fn set_players_number(&mut self, identity: &PlayerIdentity, count: u8) {
        if !self.state.is_host(identity) {
            log::warn!("{identity} tried to set the player count but is not the host");
            return;
        }
        if let Some(target) = self.state.target_players() {
            log::warn!("{identity} tried to change the player count, already {target}");
            return;
        }

        let count = usize::from(count);
        let admitted = self.state.players().len();
        if !self.config.accepts_target(count, admitted) {
            let min = self.config.min_players.max(admitted);
            self.registry.send_to(
                identity,
                Message::error(format!(
                    "The number of players must be between {min} and {}.",
                    self.config.max_players
                )),
            );
            self.registry
                .send_to(identity, Message::from_server(Payload::PlayersNumberRequest));
            return;
        }

        self.state.set_target_players(count);
        log::info!("{identity} set the match to {count} players");
        self.broadcast_players_connected();
        self.try_start();
    }

    pub(super) fn choose_starting(
        &mut self,
        identity: &PlayerIdentity,
        secret_target: CardId,
        starting_front: bool,
    ) {
        match self
            .rules
            .choose_starting(identity, secret_target, starting_front)
        {
            Ok(placed) => {
                self.state
                    .record(CardPlacementRecord::new(identity.clone(), placed));
                self.registry
                    .send_to(identity, Message::from_server(Payload::WaitingRoomRequest));
                self.broadcast_players_connected();
                self.try_start();
            }
            Err(error) => {
                log::debug!("{identity}: {error}");
                self.registry.send_to(identity, Message::error(error.to_string()));
                self.request_starting_choice(identity);
            }
        }
    }

    fn broadcast_players_connected(&self) {
        let admitted = self.state.players().len();
        let text = match self.state.target_players() {
            Some(target) => format!("Players connected: {admitted}/{target}"),
            None => format!("Players connected: {admitted}"),
        };
        self.registry.broadcast(&Message::generic(text));
    }

    /// Close the lobby once the target is met and every player is ready.
    pub(super) fn try_start(&mut self) {
        let Some(target) = self.state.target_players() else {
            return;
        };
        let players = self.state.players();
        let ready = players.len() == target
            && self.registry.online_count() == target
            && players.iter().all(|player| self.rules.is_ready(player));
        if ready {
            self.start_match();
        }
    }

    fn start_match(&mut self) {
        let first = rand::rng().random_range(0..self.state.players().len());
        self.state.start(first);
        self.rules.start_match();
        log::info!(
            "Match started: {}",
            self.state
                .players()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        self.registry
            .broadcast(&Message::from_server(Payload::GameRoomRequest));
        self.broadcast_players_list();
        self.begin_turn(0);
    }

    pub(super) fn broadcast_players_list(&self) {
        self.registry.broadcast(&Message::from_server(Payload::PlayersList {
            players: self.state.players().to_vec(),
        }));
    }
}
