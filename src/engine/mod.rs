pub mod fare;
pub mod ledger;
pub mod lifecycle;
pub mod matching;
pub mod orders;
pub mod participants;
pub mod proof;

#[cfg(test)]
pub(crate) mod testing;
