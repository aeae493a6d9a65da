//! Domain layer: booking state machine, reward ledger entries, payout
//! arithmetic, and partner processor accounts.
//!
//! Everything here is pure: the merge, cancellation, period, and
//! commission functions take values and return values, so the PostgreSQL
//! ledger and the in-memory test ledger share one set of semantics.

pub mod booking;
pub mod ids;
pub mod partner;
pub mod payout;
pub mod reward;

pub use booking::{Booking, BookingSource, BookingStatus, ConfirmSignal};
pub use ids::{BookingId, PayoutId};
pub use partner::Partner;
pub use payout::{Payout, PayoutPeriod, PayoutStatus};
pub use reward::{RewardEntry, RewardEntryKind};
