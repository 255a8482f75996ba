// config.rs
#[derive(Debug, Clone)]
pub struct Config {
    pub store_namespace: String,
    pub session_user_id: String,
    pub session_contact: String,
}

impl Config {
    pub fn init() -> Config {
        let store_namespace =
            std::env::var("STORE_NAMESPACE").unwrap_or_else(|_| "lensmarket".to_string());
        let session_user_id =
            std::env::var("SESSION_USER_ID").unwrap_or_else(|_| "demo-client".to_string());
        let session_contact = std::env::var("SESSION_CONTACT")
            .unwrap_or_else(|_| "client@lensmarket.dev".to_string());

        Config {
            store_namespace,
            session_user_id,
            session_contact,
        }
    }
}
