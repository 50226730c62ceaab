//! Services layered over the card store.

pub mod archive;
pub mod cache;
pub mod cards;
pub mod images;
pub mod locks;
pub mod picker;
