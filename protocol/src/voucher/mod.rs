//! # Vouchers
//!
//! The voucher record, its lifecycle, the write-ahead transfer lock that
//! brackets a handover, and the storage traits the core leans on.
//!
//! - [`model`]: `VoucherId`, `Status` and its transition function,
//!   `ShareSet`, `Voucher`.
//! - [`lock`]: `TransferLock`, `TransferLockManager`, crash recovery.
//! - [`store`]: `VoucherRepository` / `WitnessShareCache` plus in-memory
//!   implementations.
//! - [`issuance`]: minting and witness-share publication.

pub mod issuance;
pub mod lock;
pub mod model;
pub mod store;

pub use issuance::{issue_voucher, sync_witness_share, IssuanceError, IssuedVoucher, WitnessEnvelope};
pub use lock::{recover_expired_locks, LockError, LockState, TransferLock, TransferLockManager};
pub use model::{ShareSet, Status, StatusError, StatusEvent, Voucher, VoucherId};
pub use store::{
    MemoryVoucherStore, MemoryWitnessCache, StoreError, VoucherRepository, WitnessShareCache,
};
