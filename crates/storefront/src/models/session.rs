//! Session-related types.
//!
//! The session is populated by the authentication front end; the storefront
//! only reads the identity it leaves behind.

use serde::{Deserialize, Serialize};

use quitanda_core::UserId;

/// Session-stored user identity.
///
/// Minimal data needed to act on behalf of the logged-in user and to address
/// their order confirmations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Display name used in confirmations.
    pub name: String,
    /// Address order confirmations are sent to.
    pub email: String,
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
