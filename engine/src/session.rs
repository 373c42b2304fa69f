//! Game Session (§4.D): identity, roster, config, private-game metadata,
//! and host controls. `Session` is the unit the server keeps one mutex
//! per instance of (§4.E) — everything here is plain data and pure
//! methods, no I/O, no async.

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

use crate::hand::HandContext;
use crate::errors::{EngineError, EngineResult};
use crate::player::{Player, PlayerStatus, VisibleHoleCards};

/// Excludes `I O 0 1`, which read ambiguously in a 5-char code (§6).
pub const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const JOIN_CODE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameCategory {
    Cash,
    Casual,
    Private,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub small_blind: u64,
    pub big_blind: u64,
    pub starting_stack: u64,
    pub max_players: u8,
    pub turn_timer_ms: u64,
    pub phase_transition_delay_ms: u64,
    pub runout_delay_ms: u64,
    pub bot_fill_after_ms: u64,
    pub category: GameCategory,
}

impl GameConfig {
    /// §8 scenario defaults: 6-max, sb=1, bb=2, starting stack 200.
    pub fn cash_default() -> Self {
        GameConfig {
            small_blind: 1,
            big_blind: 2,
            starting_stack: 200,
            max_players: 6,
            turn_timer_ms: 30_000,
            phase_transition_delay_ms: 1_000,
            runout_delay_ms: 800,
            bot_fill_after_ms: 20_000,
            category: GameCategory::Cash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Waiting,
    Starting,
    Active,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingRequestKind {
    Join,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    pub user_id: String,
    pub display_name: String,
    pub kind: PendingRequestKind,
    pub requested_at_ms: i64,
}

/// A session's full state (§3 Session). `hand_context` is rewritten at
/// the start of every hand; `players`/`config`/admin metadata persist
/// across hands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub game_id: String,
    pub join_code: Option<String>,
    pub status: SessionStatus,
    pub players: Vec<Player>,
    pub spectators: Vec<String>,
    pub pending_requests: Vec<PendingRequest>,
    pub host_id: Option<String>,
    pub is_private: bool,
    pub is_paused: bool,
    pub config: GameConfig,
    pub hand_context: HandContext,
    pub hand_history: Vec<String>,
    pub created_at_ms: i64,
    pub last_activity_ms: i64,
    /// Monotonic counter handing out `Player.seated_at` values in join order.
    next_seat_seq: u64,
    /// §4.C failure semantics: set once an engine invariant check fails.
    /// A quarantined session accepts no further mutating actions; only a
    /// human operator can dissolve it.
    pub quarantined: bool,
}

impl Session {
    pub fn new_private(game_id: impl Into<String>, host_id: impl Into<String>, config: GameConfig, now_ms: i64) -> Self {
        Session {
            game_id: game_id.into(),
            join_code: Some(generate_join_code()),
            status: SessionStatus::Waiting,
            players: Vec::new(),
            spectators: Vec::new(),
            pending_requests: Vec::new(),
            host_id: Some(host_id.into()),
            is_private: true,
            is_paused: false,
            config,
            hand_context: HandContext::new_empty(),
            hand_history: Vec::new(),
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
            next_seat_seq: 0,
            quarantined: false,
        }
    }

    pub fn new_matched(game_id: impl Into<String>, config: GameConfig, now_ms: i64) -> Self {
        Session {
            game_id: game_id.into(),
            join_code: None,
            status: SessionStatus::Starting,
            players: Vec::new(),
            spectators: Vec::new(),
            pending_requests: Vec::new(),
            host_id: None,
            is_private: false,
            is_paused: false,
            config,
            hand_context: HandContext::new_empty(),
            hand_history: Vec::new(),
            created_at_ms: now_ms,
            last_activity_ms: now_ms,
            next_seat_seq: 0,
            quarantined: false,
        }
    }

    /// Hands out the next join-order sequence for a newly seated player
    /// (§4.D host succession: succession goes to the longest-seated
    /// player, which seat number alone cannot tell you once seats are
    /// vacated and reused).
    fn next_seated_at(&mut self) -> u64 {
        self.next_seat_seq += 1;
        self.next_seat_seq
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_activity_ms = now_ms;
    }

    pub fn record_history(&mut self, line: impl Into<String>) {
        self.hand_history.push(line.into());
    }

    fn occupied_seats(&self) -> std::collections::HashSet<u8> {
        self.players
            .iter()
            .filter(|p| !matches!(p.status, PlayerStatus::Left | PlayerStatus::Removed))
            .map(|p| p.seat)
            .collect()
    }

    fn first_open_seat(&self) -> Option<u8> {
        let taken = self.occupied_seats();
        (1..=self.config.max_players).find(|s| !taken.contains(s))
    }

    pub fn player_by_id(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_by_id_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    /// §4.D `addPlayers(list)`: assigns unique seats, rejecting a full table.
    pub fn add_players(&mut self, joins: Vec<(String, String, u64)>) -> EngineResult<()> {
        for (id, display_name, stack) in joins {
            let seat = self.first_open_seat().ok_or(EngineError::InvalidAction)?;
            let mut player = Player::new_seated(id, display_name, seat, stack);
            player.seated_at = self.next_seated_at();
            self.players.push(player);
        }
        Ok(())
    }

    /// §4.D `requestSeat(user)`.
    pub fn request_seat(&mut self, user_id: impl Into<String>, display_name: impl Into<String>, now_ms: i64) -> EngineResult<()> {
        let user_id = user_id.into();
        if self.player_by_id(&user_id).is_some() {
            return Err(EngineError::AlreadySeated);
        }
        if self.pending_requests.iter().any(|r| r.user_id == user_id) {
            return Err(EngineError::AlreadyRequested);
        }
        self.pending_requests.push(PendingRequest {
            user_id,
            display_name: display_name.into(),
            kind: PendingRequestKind::Join,
            requested_at_ms: now_ms,
        });
        Ok(())
    }

    fn require_host(&self, caller_id: &str) -> EngineResult<()> {
        if !self.is_private {
            return Err(EngineError::Unauthorized);
        }
        match &self.host_id {
            Some(h) if h == caller_id => Ok(()),
            _ => Err(EngineError::Unauthorized),
        }
    }

    /// §4.D `APPROVE`: seats the guest at the first empty seat with
    /// `WAITING_FOR_NEXT_HAND` and the configured starting stack.
    pub fn approve(&mut self, caller_id: &str, user_id: &str) -> EngineResult<()> {
        self.require_host(caller_id)?;
        let idx = self
            .pending_requests
            .iter()
            .position(|r| r.user_id == user_id)
            .ok_or(EngineError::InvalidAction)?;
        let req = self.pending_requests.remove(idx);
        let seat = self.first_open_seat().ok_or(EngineError::InvalidAction)?;
        let mut player = Player::new_seated(req.user_id, req.display_name, seat, self.config.starting_stack);
        player.status = PlayerStatus::WaitingForNextHand;
        player.seated_at = self.next_seated_at();
        self.players.push(player);
        Ok(())
    }

    pub fn reject(&mut self, caller_id: &str, user_id: &str) -> EngineResult<()> {
        self.require_host(caller_id)?;
        let before = self.pending_requests.len();
        self.pending_requests.retain(|r| r.user_id != user_id);
        if self.pending_requests.len() == before {
            return Err(EngineError::InvalidAction);
        }
        Ok(())
    }

    /// §4.D `KICK`. Marks the player `REMOVED`; seat frees on the next
    /// `addPlayers`/`approve` lookup. Triggers host succession if the
    /// host was kicked.
    pub fn kick(&mut self, caller_id: &str, target_seat: u8) -> EngineResult<u8> {
        self.require_host(caller_id)?;
        let player = self
            .players
            .iter_mut()
            .find(|p| p.seat == target_seat)
            .ok_or(EngineError::InvalidAction)?;
        player.status = PlayerStatus::Removed;
        let removed_id = player.id.clone();
        self.maybe_transfer_host(&removed_id);
        Ok(target_seat)
    }

    pub fn set_stack(&mut self, caller_id: &str, seat: u8, amount: u64) -> EngineResult<()> {
        self.require_host(caller_id)?;
        let player = self.players.iter_mut().find(|p| p.seat == seat).ok_or(EngineError::InvalidAction)?;
        player.stack = amount;
        Ok(())
    }

    /// §4.D `SET_BLINDS`: takes effect starting with the next hand (callers
    /// must not invoke this mid-hand in a way that changes the current
    /// `HandContext`; this only rewrites `config`).
    pub fn set_blinds(&mut self, caller_id: &str, small_blind: u64, big_blind: u64) -> EngineResult<()> {
        self.require_host(caller_id)?;
        if !(small_blind > 0 && small_blind <= big_blind) {
            return Err(EngineError::InvalidAction);
        }
        self.config.small_blind = small_blind;
        self.config.big_blind = big_blind;
        Ok(())
    }

    /// §4.D `PAUSE`: clears the current actor's deadline but preserves
    /// their turn. The ticker is expected to skip deadline enforcement
    /// while `is_paused`.
    pub fn pause(&mut self, caller_id: &str) -> EngineResult<()> {
        self.require_host(caller_id)?;
        self.is_paused = true;
        self.hand_context.action_deadline_ms = None;
        Ok(())
    }

    /// §4.D `RESUME`: the caller is expected to reissue a fresh deadline
    /// for the current actor (via `table::refresh_deadline`) right after.
    pub fn resume(&mut self, caller_id: &str) -> EngineResult<()> {
        self.require_host(caller_id)?;
        self.is_paused = false;
        Ok(())
    }

    /// §4.D `host_self_seat`: only while the host isn't already seated and
    /// a seat is open.
    pub fn host_self_seat(&mut self, host_id: &str, display_name: impl Into<String>) -> EngineResult<()> {
        if self.host_id.as_deref() != Some(host_id) {
            return Err(EngineError::Unauthorized);
        }
        if self.player_by_id(host_id).is_some() {
            return Err(EngineError::AlreadySeated);
        }
        let seat = self.first_open_seat().ok_or(EngineError::InvalidAction)?;
        let mut player = Player::new_seated(host_id, display_name, seat, self.config.starting_stack);
        player.is_host = true;
        player.status = PlayerStatus::WaitingForNextHand;
        player.seated_at = self.next_seated_at();
        self.players.push(player);
        Ok(())
    }

    /// §4.D "Host succession": if the host left/was removed, transfer to
    /// the longest-seated remaining non-bot player; otherwise the caller
    /// should finish the game. "Longest-seated" is join order
    /// (`Player.seated_at`), not seat number — a later-joining player can
    /// end up in a lower-numbered seat that an earlier player vacated.
    pub fn maybe_transfer_host(&mut self, possibly_departed_id: &str) -> bool {
        if self.host_id.as_deref() != Some(possibly_departed_id) {
            return false;
        }
        let still_present = self
            .players
            .iter()
            .any(|p| p.id == possibly_departed_id && !matches!(p.status, PlayerStatus::Left | PlayerStatus::Removed));
        if still_present {
            return false;
        }
        let successor = self
            .players
            .iter()
            .filter(|p| !p.is_bot && !matches!(p.status, PlayerStatus::Left | PlayerStatus::Removed))
            .min_by_key(|p| p.seated_at)
            .map(|p| p.id.clone());
        match successor {
            Some(id) => {
                for p in self.players.iter_mut() {
                    p.is_host = p.id == id;
                }
                self.host_id = Some(id);
                false
            }
            None => {
                self.host_id = None;
                true // no successor: caller should finish the game
            }
        }
    }

    /// §4.D reveal: a player may expose one of their two hole cards at
    /// showdown.
    pub fn reveal(&mut self, player_id: &str, index: u8) -> EngineResult<crate::cards::Card> {
        if index > 1 {
            return Err(EngineError::InvalidAction);
        }
        let player = self.player_by_id_mut(player_id).ok_or(EngineError::NotInGame)?;
        let card = player.hole_cards.ok_or(EngineError::InvalidAction)?[index as usize];
        player.revealed[index as usize] = true;
        Ok(card)
    }

    /// §4.D spectator view + per-player view: hole cards are hidden unless
    /// they belong to `viewer_id`, or have been revealed at showdown.
    pub fn visible_hole_cards(&self, player: &Player, viewer_id: Option<&str>) -> VisibleHoleCards {
        if Some(player.id.as_str()) == viewer_id {
            if let Some(hole) = player.hole_cards {
                return VisibleHoleCards::Cards(hole);
            }
            return VisibleHoleCards::Hidden;
        }
        match player.hole_cards {
            Some(hole) => {
                let showdown = matches!(self.hand_context.current_phase, crate::hand::Phase::Showdown | crate::hand::Phase::Complete);
                if player.revealed[0] && player.revealed[1] {
                    VisibleHoleCards::Cards(hole)
                } else if player.revealed[0] || player.revealed[1] {
                    // §4.D reveal(index) is per-card: showing one card must be
                    // independently visible rather than waiting on the other.
                    VisibleHoleCards::Partial([
                        if player.revealed[0] { Some(hole[0]) } else { None },
                        if player.revealed[1] { Some(hole[1]) } else { None },
                    ])
                } else if player.folded && !showdown {
                    VisibleHoleCards::Hidden
                } else {
                    VisibleHoleCards::Masked
                }
            }
            None => VisibleHoleCards::Hidden,
        }
    }

    pub fn seated_with_chips(&self) -> usize {
        self.players.iter().filter(|p| p.can_play_next_hand()).count()
    }
}

/// Generates a 5-char join code from the unambiguous alphabet (§6).
/// Uniqueness across non-finished sessions is the registry's job, not
/// this function's — callers retry on collision (§4.G step 3).
pub fn generate_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| *JOIN_CODE_ALPHABET.choose(&mut rng).expect("alphabet is nonempty") as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GameConfig {
        GameConfig::cash_default()
    }

    #[test]
    fn join_code_uses_unambiguous_alphabet_and_length() {
        let code = generate_join_code();
        assert_eq!(code.len(), JOIN_CODE_LEN);
        for c in code.bytes() {
            assert!(JOIN_CODE_ALPHABET.contains(&c));
        }
        assert!(!code.contains(['I', 'O', '0', '1']));
    }

    #[test]
    fn approve_seats_guest_as_waiting_for_next_hand() {
        let mut session = Session::new_private("g1", "host", config(), 0);
        session.request_seat("guest", "Guest", 0).unwrap();
        session.approve("host", "guest").unwrap();
        let p = session.player_by_id("guest").unwrap();
        assert_eq!(p.status, PlayerStatus::WaitingForNextHand);
        assert_eq!(p.stack, config().starting_stack);
    }

    #[test]
    fn non_host_admin_action_is_unauthorized() {
        let mut session = Session::new_private("g1", "host", config(), 0);
        let err = session.set_blinds("intruder", 1, 2).unwrap_err();
        assert_eq!(err, EngineError::Unauthorized);
    }

    #[test]
    fn host_succession_picks_longest_seated_non_bot() {
        let mut session = Session::new_private("g1", "host", config(), 0);
        session.add_players(vec![("host".into(), "Host".into(), 200), ("p2".into(), "P2".into(), 200)]).unwrap();
        session.players[0].is_host = true;
        session.kick("host", 999).ok(); // no-op seat, ensures require_host path unaffected
        let finished = session.maybe_transfer_host("host");
        // host player record still has status Seated (kick targeted seat 999), so
        // "still_present" short-circuits and no transfer happens.
        assert!(!finished);
        assert_eq!(session.host_id.as_deref(), Some("host"));

        session.players[0].status = PlayerStatus::Left;
        let finished = session.maybe_transfer_host("host");
        assert!(!finished);
        assert_eq!(session.host_id.as_deref(), Some("p2"));
    }

    /// Host succession goes by join order, not seat number: a later
    /// arrival can end up occupying a lower-numbered seat than an
    /// earlier one once a seat is vacated and reused.
    #[test]
    fn host_succession_uses_join_order_even_when_seat_numbers_disagree() {
        let mut session = Session::new_private("g1", "host", config(), 0);
        session.add_players(vec![("host".into(), "Host".into(), 200), ("early".into(), "Early".into(), 200)]).unwrap();
        session.players[0].is_host = true;
        // "early" later moves into seat 1 (e.g. after the original seat-1
        // occupant left and they took it), while "late" joins afterward
        // and lands in the now-lower-numbered seat 2.
        session.players.iter_mut().find(|p| p.id == "early").unwrap().seat = 1;
        session.add_players(vec![("late".into(), "Late".into(), 200)]).unwrap();

        session.players[0].status = PlayerStatus::Left;
        session.maybe_transfer_host("host");
        // "early" joined before "late" even though "late" now sits in the
        // lower-numbered seat; succession must still pick "early".
        assert_eq!(session.host_id.as_deref(), Some("early"));
    }

    #[test]
    fn revealing_one_hole_card_is_independently_visible() {
        let mut session = Session::new_private("g1", "host", config(), 0);
        session.add_players(vec![("a".into(), "A".into(), 200)]).unwrap();
        let player = session.player_by_id_mut("a").unwrap();
        player.hole_cards = Some([
            crate::cards::Card { rank: crate::cards::Rank::Ace, suit: crate::cards::Suit::Spades },
            crate::cards::Card { rank: crate::cards::Rank::King, suit: crate::cards::Suit::Hearts },
        ]);

        session.reveal("a", 0).unwrap();
        let player = session.player_by_id("a").unwrap().clone();
        match session.visible_hole_cards(&player, None) {
            VisibleHoleCards::Partial([Some(_), None]) => {}
            other => panic!("expected partial reveal of index 0 only, got {other:?}"),
        }
    }
}
