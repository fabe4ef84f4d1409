pub mod address;
pub mod block;
pub mod transaction;

pub use address::{address_from_pubkey, exec_address};
pub use block::{AccountBalance, BlockOverview, Header, PeerInfo, SendReply, TransactionDetail};
pub use transaction::{Signature, Transaction, TxHash, TRANSFER_EXECER, WRITE_EXECER};
