mod card;
mod deck;
mod difficulty;
mod ids;

pub use ids::{CardId, ParseIdError};

pub use card::{Card, CardError};
pub use deck::{Deck, DeckError};
pub use difficulty::Difficulty;
