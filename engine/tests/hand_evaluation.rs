use holdem_engine::cards::parse_card as pc;
use holdem_engine::eval::{evaluate_hand, HandRank};

fn hole(a: &str, b: &str) -> [holdem_engine::cards::Card; 2] {
    [pc(a).unwrap(), pc(b).unwrap()]
}

fn board(cards: &[&str]) -> Vec<holdem_engine::cards::Card> {
    cards.iter().map(|s| pc(s).unwrap()).collect()
}

#[test]
fn royal_flush() {
    let eval = evaluate_hand(&hole("Ah", "Kh"), &board(&["Qh", "Jh", "Th", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::RoyalFlush);
}

#[test]
fn straight_flush() {
    let eval = evaluate_hand(&hole("9s", "8s"), &board(&["7s", "6s", "5s", "Kd", "Qc"])).unwrap();
    assert_eq!(eval.rank, HandRank::StraightFlush);
    assert_eq!(eval.kickers[0], holdem_engine::cards::Rank::Nine);
}

#[test]
fn four_of_a_kind() {
    let eval = evaluate_hand(&hole("Ah", "Ad"), &board(&["Ac", "As", "Kh", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::FourOfAKind);
    assert_eq!(eval.kickers, vec![holdem_engine::cards::Rank::Ace, holdem_engine::cards::Rank::King]);
}

#[test]
fn full_house() {
    let eval = evaluate_hand(&hole("Kh", "Kd"), &board(&["Kc", "Qs", "Qh", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::FullHouse);
    assert_eq!(eval.kickers, vec![holdem_engine::cards::Rank::King, holdem_engine::cards::Rank::Queen]);
}

#[test]
fn flush_ranks_by_descending_kickers() {
    let eval = evaluate_hand(&hole("Ah", "Th"), &board(&["Kh", "Qh", "Jd", "2h", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::Flush);
    assert_eq!(
        eval.kickers,
        vec![
            holdem_engine::cards::Rank::Ace,
            holdem_engine::cards::Rank::King,
            holdem_engine::cards::Rank::Queen,
            holdem_engine::cards::Rank::Ten,
            holdem_engine::cards::Rank::Two,
        ]
    );
}

#[test]
fn straight() {
    let eval = evaluate_hand(&hole("Th", "9d"), &board(&["8c", "7s", "6h", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::Straight);
    assert_eq!(eval.kickers[0], holdem_engine::cards::Rank::Ten);
}

#[test]
fn wheel_straight_ranks_five_high() {
    let eval = evaluate_hand(&hole("Ah", "2d"), &board(&["3c", "4s", "5h", "Kd", "Qc"])).unwrap();
    assert_eq!(eval.rank, HandRank::Straight);
    assert_eq!(eval.kickers[0], holdem_engine::cards::Rank::Five);
}

#[test]
fn three_of_a_kind() {
    let eval = evaluate_hand(&hole("Jh", "Jd"), &board(&["Jc", "Ts", "9h", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::ThreeOfAKind);
    assert_eq!(
        eval.kickers,
        vec![holdem_engine::cards::Rank::Jack, holdem_engine::cards::Rank::Ten, holdem_engine::cards::Rank::Nine]
    );
}

#[test]
fn two_pair_kicker_breaks_tie() {
    let community = board(&["Ah", "Ad", "Kc", "7c", "2s"]);
    let better = evaluate_hand(&hole("Qd", "3c"), &community).unwrap();
    let worse = evaluate_hand(&hole("Jd", "4c"), &community).unwrap();
    assert_eq!(better.rank, HandRank::TwoPair);
    assert_eq!(worse.rank, HandRank::TwoPair);
    assert!(better > worse);
}

#[test]
fn one_pair() {
    let eval = evaluate_hand(&hole("Ah", "Ad"), &board(&["Kc", "Qs", "Jh", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::OnePair);
}

#[test]
fn high_card() {
    let eval = evaluate_hand(&hole("Ah", "Kd"), &board(&["Qc", "Js", "9h", "2d", "3c"])).unwrap();
    assert_eq!(eval.rank, HandRank::HighCard);
    assert_eq!(
        eval.kickers,
        vec![
            holdem_engine::cards::Rank::Ace,
            holdem_engine::cards::Rank::King,
            holdem_engine::cards::Rank::Queen,
            holdem_engine::cards::Rank::Jack,
            holdem_engine::cards::Rank::Nine,
        ]
    );
}

#[test]
fn invalid_hand_rejects_duplicate_cards() {
    let err = evaluate_hand(&hole("Ah", "Ah"), &board(&["Kc", "7c", "2s", "3d", "4h"])).unwrap_err();
    assert_eq!(err, holdem_engine::errors::EngineError::InvalidHand);
}
