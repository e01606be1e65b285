pub mod chain;
pub mod logs;
pub mod token;

pub use chain::{Action, Chain};
pub use logs::{BigTx, TradeLog, TransferLog};
pub use token::{CmcTokenInfo, CmcTokens, SourcePrice, Token, TokenBalance};
