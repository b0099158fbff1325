pub mod filter;
pub mod record_store;
pub mod view_state;

pub use filter::{FilterMode, FilteredView};
pub use record_store::{CorruptStorePolicy, RecordStore};
pub use view_state::ViewState;
