//! Process-wide conversation summary cache shared by independent observers.
//!
//! The store is an explicit injectable value passed by reference to its
//! consumers — there is no global state. Observers subscribe for snapshot
//! notifications; concurrent refreshes deduplicate onto one server fetch;
//! rename and remove mutate the cache only after the server acknowledges.

mod backend;
mod store;

pub use backend::ConversationBackend;
pub use chat_api::ConversationSummary;
pub use store::{ConversationStore, ListenerId};
