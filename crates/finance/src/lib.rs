//! `vendhub-finance` — replicas of the money-movement entities, plus the two
//! locally writable ones (bank accounts and payouts).

pub mod bank_account;
pub mod payout;
pub mod transaction;
pub mod voucher;

pub use bank_account::BankAccount;
pub use payout::Payout;
pub use transaction::Transaction;
pub use voucher::Voucher;

use vendhub_store::EntityDescriptor;

/// Descriptors of every entity this crate replicates.
pub fn descriptors() -> [&'static EntityDescriptor; 4] {
    [
        &transaction::TRANSACTION,
        &voucher::VOUCHER,
        &bank_account::BANK_ACCOUNT,
        &payout::PAYOUT,
    ]
}
