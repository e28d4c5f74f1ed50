pub mod accounts;
pub mod clearing;
pub mod collector;
pub mod distributor;
pub mod fees;
pub mod ledger;
pub mod margin;
pub mod reconciliation;
pub mod transfer;

pub use accounts::AccountStore;
pub use fees::{FeeTransfer, FeeTransferType};
pub use ledger::{EntryType, Ledger, LedgerEntry, TransferBalance, TransferResponse};
pub use transfer::{MarketAccounts, PartyTransfer, TransferRequest, TransferType};
