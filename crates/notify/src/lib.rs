pub mod api;
pub mod backoff;
pub mod center;
pub mod error;
pub mod frame;
pub mod health;
pub mod machine;
pub mod session;
pub mod store;
pub mod transport;
pub mod view;

pub use api::{NotificationApi, NotificationBackend};
pub use backoff::ReconnectPolicy;
pub use center::{CenterHandle, NotificationCenter, Visibility};
pub use error::{ClientError, ClientResult};
pub use frame::{Frame, FrameError};
pub use health::{HealthProbe, HttpHealthProbe};
pub use machine::{ConnectionMachine, ConnectionState, Effect};
pub use session::Session;
pub use store::NotificationStore;
pub use transport::{SseTransport, Transport, TransportEvent, TransportStream};
pub use view::{Banner, Indicator, LoadState, ViewState};
