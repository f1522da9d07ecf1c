// Board layout: which card belongs to which category.
//
// Every peer deals the board locally from the shared session seed — there
// is no board-exchange RPC. The deal is fully determined by
// `(seed, composition)`: the starting team comes from the seed's low bit,
// the category multiset from the composition, and the arrangement from one
// seeded shuffle. Two peers holding the same descriptor always hold the
// same board.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cluegrid_protocol::types::{CardCategory, CardId, Team};

use crate::rng::DealRng;

/// How many cards of each kind go into a deal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardComposition {
    /// Total cards on the board.
    pub board_size: u32,
    /// Cards belonging to the team that takes the first turn.
    pub first_team_cards: u8,
    /// Cards belonging to the other team.
    pub second_team_cards: u8,
}

impl Default for BoardComposition {
    fn default() -> Self {
        Self {
            board_size: 25,
            first_team_cards: 9,
            second_team_cards: 8,
        }
    }
}

/// A dealt board.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    categories: BTreeMap<CardId, CardCategory>,
    starting_team: Team,
}

impl Board {
    /// Deal a board from the session seed.
    pub fn deal(seed: u64, composition: &BoardComposition) -> Board {
        let starting_team = if seed & 1 == 0 { Team::A } else { Team::B };
        let (a_cards, b_cards) = match starting_team {
            Team::A => (composition.first_team_cards, composition.second_team_cards),
            _ => (composition.second_team_cards, composition.first_team_cards),
        };

        let mut deck: Vec<CardCategory> = Vec::with_capacity(composition.board_size as usize);
        deck.extend(std::iter::repeat_n(CardCategory::TeamA, usize::from(a_cards)));
        deck.extend(std::iter::repeat_n(CardCategory::TeamB, usize::from(b_cards)));
        deck.push(CardCategory::Assassin);
        while deck.len() < composition.board_size as usize {
            deck.push(CardCategory::Neutral);
        }
        deck.truncate(composition.board_size as usize);

        DealRng::new(seed).shuffle(&mut deck);

        let categories = deck
            .into_iter()
            .enumerate()
            .map(|(i, category)| (CardId(i as u32), category))
            .collect();
        Board {
            categories,
            starting_team,
        }
    }

    /// The team that takes the first turn.
    pub fn starting_team(&self) -> Team {
        self.starting_team
    }

    pub fn category(&self, card: CardId) -> Option<CardCategory> {
        self.categories.get(&card).copied()
    }

    pub fn size(&self) -> usize {
        self.categories.len()
    }

    /// How many cards a playing team starts with.
    pub fn cards_for(&self, team: Team) -> u8 {
        let target = match team {
            Team::A => CardCategory::TeamA,
            Team::B => CardCategory::TeamB,
            _ => return 0,
        };
        #[expect(clippy::cast_possible_truncation)]
        let count = self
            .categories
            .values()
            .filter(|c| **c == target)
            .count() as u8;
        count
    }
}
