//! View state owners. Each view holds its own snapshot of store data; remote
//! failures are logged here and never propagate further.

pub mod create;
pub mod detail;
pub mod list;

pub use create::{CreatePostView, InFlight, InFlightGuard, ALREADY_SUBMITTING};
pub use detail::{DetailState, Draft, Mode, PostDetailView};
pub use list::PostListView;
