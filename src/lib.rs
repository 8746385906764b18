pub mod macros;
pub mod patch;

mod clock;
mod history;
mod memo;
mod produce;
mod store;

pub use clock::{Clock, SystemClock};
pub use history::{History, HistoryError, HistoryOptions};
pub use memo::{Dep, Deps, Memo, MemoCache};
pub use patch::{PatchError, PatchOp, Pointer};
pub use produce::Produce;
pub use store::{MutateOptions, Store, StoreOptions, Subscription};
