pub mod block;
pub mod ledger;
pub mod miner;
pub mod transaction;
pub mod txpool;
