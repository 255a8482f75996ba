// session.rs

/// The identity provider's view of the logged-in user. Both values are
/// opaque to the core; the contact string travels on messages so the
/// counterparty has something human-readable to show.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub contact: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, contact: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            contact: contact.into(),
        }
    }
}
