//! Ranking core: trending score, feeds, comment trees and counter mutators

pub mod feed;
pub mod score;
pub mod tree;
pub mod votes;
