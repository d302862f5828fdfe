//! Session state and orchestration.
//!
//! - `SessionState` / `SessionWatcher`: the observable state cell
//! - `NavigationSink` / `ChannelNavigator`: where navigation intents go
//! - `SessionManager`: the single writer, serializing login, logout,
//!   register and startup reconciliation

pub mod manager;
pub mod navigation;
pub mod state;

pub use manager::SessionManager;
pub use navigation::{ChannelNavigator, NavigationSink};
pub use state::{SessionState, SessionWatcher};
