mod auth;
mod health_check;
mod user;

pub use auth::{get_current_user, login, logout, refresh, register, whoami};
pub use health_check::health_check;
pub use user::{change_password, get_preferences, update_preferences, Preferences, PreferencesUpdate};
