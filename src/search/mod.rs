pub mod bm25;
pub mod fusion;
pub mod hybrid;
pub mod mmr;
pub mod vector;
