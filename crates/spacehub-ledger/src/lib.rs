//! SpaceHub Ledger - earnings and payouts
//!
//! The ledger turns a paid booking into one earning record split between the
//! host and the platform, and tracks it through
//! `pending → available → paid_out`.
//!
//! # Invariants
//!
//! 1. `amount == platform_fee + host_payout` on every record, exactly
//! 2. At most one original record per booking
//! 3. A withdrawal pays out exactly the requested amount, oldest records first
//! 4. Splitting a record conserves amount, fee and payout across the two halves
//! 5. No record is ever attributed to two withdrawals

pub mod allocator;
pub mod ledger;
pub mod policy;
pub mod summary;

pub use allocator::{plan_withdrawal, PayoutAllocator, Withdrawal, WithdrawalReceipt};
pub use ledger::EarningsLedger;
pub use policy::LedgerPolicy;
pub use summary::{EarningsSummary, MonthlyEarnings};
