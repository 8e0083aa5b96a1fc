//! The fixed deck table shared by client and server.
//!
//! Every room is created with one [`DeckType`] and only accepts votes drawn
//! from that deck's cards. The table is part of the wire contract: both sides
//! compile it in, and [`DECK_TABLE_VERSION`] is bumped whenever a deck is
//! added or changed.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the deck table. Bump on any change to the card sets below.
pub const DECK_TABLE_VERSION: u32 = 1;

/// A single card a user can vote with.
///
/// Cards are either numeric (estimation points) or a label — the `"?"`
/// sentinel for "no idea", or a t-shirt size. `#[serde(untagged)]` makes a
/// numeric card serialize as a bare JSON number and a label as a bare string,
/// which is exactly what the client renders and echoes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CardValue {
    /// A numeric estimation card. Enters the average.
    Number(f64),
    /// A non-numeric card ("?", "XS", …). Excluded from the average.
    Label(String),
}

impl CardValue {
    /// Returns the numeric value, or `None` for label cards.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Label(_) => None,
        }
    }
}

impl fmt::Display for CardValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Label(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for CardValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for CardValue {
    fn from(s: &str) -> Self {
        Self::Label(s.to_string())
    }
}

/// The fixed enumeration of deck types a room can be created with.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DeckType {
    Fibonacci,
    ModifiedFibonacci,
    Tshirt,
}

/// One deck: a display name and its ordered card set.
#[derive(Debug, Clone, PartialEq)]
pub struct Deck {
    /// Human-readable deck name, shown in the room UI.
    pub name: &'static str,
    /// The permissible vote values, in display order.
    pub cards: Vec<CardValue>,
}

impl DeckType {
    /// Returns the full deck for this type.
    pub fn deck(&self) -> Deck {
        match self {
            Self::Fibonacci => Deck {
                name: "Fibonacci",
                cards: cards(
                    &[0.0, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 55.0, 89.0],
                    &["?"],
                ),
            },
            Self::ModifiedFibonacci => Deck {
                name: "Modified Fibonacci",
                cards: cards(
                    &[0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 40.0, 100.0],
                    &["?"],
                ),
            },
            Self::Tshirt => Deck {
                name: "T-Shirt Sizes",
                cards: cards(&[], &["XS", "S", "M", "L", "XL", "XXL", "?"]),
            },
        }
    }

    /// Returns `true` if `value` is a card in this deck.
    pub fn contains(&self, value: &CardValue) -> bool {
        self.deck().cards.iter().any(|c| c == value)
    }
}

impl fmt::Display for DeckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fibonacci => write!(f, "fibonacci"),
            Self::ModifiedFibonacci => write!(f, "modified-fibonacci"),
            Self::Tshirt => write!(f, "tshirt"),
        }
    }
}

/// Builds a card list from numeric values followed by labels.
fn cards(numbers: &[f64], labels: &[&str]) -> Vec<CardValue> {
    numbers
        .iter()
        .map(|n| CardValue::Number(*n))
        .chain(labels.iter().map(|s| CardValue::Label((*s).to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deck_type_serializes_as_kebab_case() {
        assert_eq!(
            serde_json::to_string(&DeckType::ModifiedFibonacci).unwrap(),
            "\"modified-fibonacci\""
        );
        assert_eq!(
            serde_json::to_string(&DeckType::Tshirt).unwrap(),
            "\"tshirt\""
        );
    }

    #[test]
    fn test_deck_type_deserializes_from_kebab_case() {
        let deck: DeckType = serde_json::from_str("\"fibonacci\"").unwrap();
        assert_eq!(deck, DeckType::Fibonacci);
    }

    #[test]
    fn test_card_value_number_serializes_as_bare_number() {
        let json = serde_json::to_string(&CardValue::Number(0.5)).unwrap();
        assert_eq!(json, "0.5");
    }

    #[test]
    fn test_card_value_label_serializes_as_bare_string() {
        let json = serde_json::to_string(&CardValue::from("XL")).unwrap();
        assert_eq!(json, "\"XL\"");
    }

    #[test]
    fn test_card_value_deserializes_untagged() {
        let n: CardValue = serde_json::from_str("13").unwrap();
        assert_eq!(n, CardValue::Number(13.0));

        let s: CardValue = serde_json::from_str("\"?\"").unwrap();
        assert_eq!(s, CardValue::from("?"));
    }

    #[test]
    fn test_fibonacci_deck_matches_contract() {
        let deck = DeckType::Fibonacci.deck();
        assert_eq!(deck.name, "Fibonacci");
        assert_eq!(deck.cards.len(), 12);
        assert_eq!(deck.cards[0], CardValue::Number(0.0));
        assert_eq!(deck.cards[10], CardValue::Number(89.0));
        assert_eq!(deck.cards[11], CardValue::from("?"));
    }

    #[test]
    fn test_modified_fibonacci_contains_half_point() {
        assert!(DeckType::ModifiedFibonacci.contains(&CardValue::Number(0.5)));
        assert!(!DeckType::Fibonacci.contains(&CardValue::Number(0.5)));
    }

    #[test]
    fn test_tshirt_deck_is_all_labels_plus_unknown() {
        let deck = DeckType::Tshirt.deck();
        assert!(deck.cards.iter().all(|c| c.as_number().is_none()));
        assert!(DeckType::Tshirt.contains(&CardValue::from("XL")));
        assert!(DeckType::Tshirt.contains(&CardValue::from("?")));
    }

    #[test]
    fn test_contains_rejects_out_of_deck_values() {
        assert!(!DeckType::Fibonacci.contains(&CardValue::Number(4.0)));
        assert!(!DeckType::Tshirt.contains(&CardValue::from("XXXL")));
        assert!(!DeckType::Tshirt.contains(&CardValue::Number(1.0)));
    }

    #[test]
    fn test_unknown_card_is_not_numeric() {
        assert_eq!(CardValue::from("?").as_number(), None);
        assert_eq!(CardValue::Number(21.0).as_number(), Some(21.0));
    }
}
