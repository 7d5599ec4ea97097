use jsonwebtoken::{DecodingKey, EncodingKey};
use sha2::{Digest, Sha512};

use crate::{config::AppConfig, db::DbPool, services::mail::Mailer};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub mailer: Mailer,
    pub jwt_encoding: EncodingKey,
    pub jwt_decoding: DecodingKey,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, mailer: Mailer) -> Self {
        // Stretch the configured secret so short values still yield a
        // full-width signing key.
        let digest = Sha512::digest(config.jwt_secret.as_bytes());
        let jwt_encoding = EncodingKey::from_secret(&digest[..]);
        let jwt_decoding = DecodingKey::from_secret(&digest[..]);
        Self {
            config,
            db,
            mailer,
            jwt_encoding,
            jwt_decoding,
        }
    }
}
