use std::fmt;

use serde::{Deserialize, Serialize};

/// Destinations a session operation can ask the router to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// `/` after logout
    Root,
    /// `/profile` after a successful login
    Profile,
    /// `/success` after a successful registration
    Success,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Root => "/",
            Route::Profile => "/profile",
            Route::Success => "/success",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
