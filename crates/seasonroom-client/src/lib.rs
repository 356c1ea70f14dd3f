pub mod api;
pub mod backend;
pub mod cache;
pub mod dto;
pub mod error;
pub mod refresh;
pub mod session;
pub mod tokens;
pub mod validate;

pub use api::ApiClient;
pub use backend::ReservationBackend;
pub use cache::{CalendarCache, MonthSnapshot};
pub use dto::GuestInfo;
pub use error::{ClientError, SessionError};
pub use refresh::{RefreshCoordinator, RefreshError};
pub use session::ReservationSession;
pub use tokens::{FileTokenStore, MemoryTokenStore, TokenPair, TokenStore};
