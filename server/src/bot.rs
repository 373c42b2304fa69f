//! Bot decision policy (§5: "invoked from under the mutex ... must be
//! deterministic given context and return within a few milliseconds").
//! The policy itself is out of scope beyond this contract; `HeuristicBot`
//! is a playable default, not the production policy.

use holdem_engine::betting;
use holdem_engine::hand::HandContext;
use holdem_engine::player::Player;
use holdem_engine::Action;

pub trait BotPolicy: Send + Sync {
    fn decide(&self, players: &[Player], ctx: &HandContext, actor_seat: u8) -> Action;
}

/// Checks when free, calls anything up to a third of its stack, shoves
/// when a call would leave less than that behind, folds otherwise. No
/// bluffing, no raising — deterministic and cheap, as the contract
/// requires.
pub struct HeuristicBot;

impl BotPolicy for HeuristicBot {
    fn decide(&self, players: &[Player], ctx: &HandContext, actor_seat: u8) -> Action {
        let Some(player) = players.iter().find(|p| p.seat == actor_seat) else {
            return Action::Fold;
        };
        let owed = betting::to_call(players, ctx, player);
        if owed == 0 {
            return Action::Check;
        }
        if owed >= player.stack {
            return Action::AllIn;
        }
        if owed <= player.stack / 3 {
            Action::Call
        } else {
            Action::Fold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::hand::HandContext;

    fn ctx_with(seats: Vec<u8>) -> HandContext {
        let mut ctx = HandContext::new_empty();
        ctx.seats_in_hand = seats;
        ctx.current_actor_seat = Some(1);
        ctx
    }

    #[test]
    fn checks_with_nothing_to_call() {
        let bot = HeuristicBot;
        let players = vec![Player::new_seated("bot1", "Bot 1", 1, 200)];
        let ctx = ctx_with(vec![1]);
        assert!(matches!(bot.decide(&players, &ctx, 1), Action::Check));
    }

    #[test]
    fn folds_a_large_bet() {
        let bot = HeuristicBot;
        let mut players = vec![Player::new_seated("bot1", "Bot 1", 1, 90), Player::new_seated("p2", "P2", 2, 200)];
        players[1].current_bet = 80;
        let ctx = ctx_with(vec![1, 2]);
        assert!(matches!(bot.decide(&players, &ctx, 1), Action::Fold));
    }

    #[test]
    fn shoves_when_a_call_would_strip_the_stack() {
        let bot = HeuristicBot;
        let mut players = vec![Player::new_seated("bot1", "Bot 1", 1, 10), Player::new_seated("p2", "P2", 2, 200)];
        players[1].current_bet = 10;
        let ctx = ctx_with(vec![1, 2]);
        assert!(matches!(bot.decide(&players, &ctx, 1), Action::AllIn));
    }
}
