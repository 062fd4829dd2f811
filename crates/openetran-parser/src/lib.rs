//! Input-deck parser.
//!
//! Decks are line-oriented: tokens are case-insensitive, commas count as
//! whitespace, and `*` starts a comment line. The first logical line sets
//! the simulation mode; conductor or span/line cards follow; the rest of
//! the deck is a sequence of device blocks, each a keyword line with its
//! parameters followed by a `pairs` line and a `poles` line.

pub mod deck;
pub mod error;
pub mod lexer;
mod read;

pub use deck::{
    CableCard, ConductorCard, Control, Deck, DeviceCard, LineCard, SpanCard, SpanKind, Wiring,
};
pub use error::{Error, Result};
pub use read::parse_deck;
