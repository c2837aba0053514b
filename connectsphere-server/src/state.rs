use anyhow::Result;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::db::Database;
use crate::uploads::UploadStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub auth: AuthService,
    pub uploads: UploadStore,
}

impl AppState {
    pub fn new(db: Database, settings: &Settings) -> Result<Self> {
        let auth = AuthService::new(
            settings.auth.jwt_secret.clone(),
            settings.auth.token_ttl_hours,
            settings.auth.bcrypt_cost,
        );
        let uploads = UploadStore::new(&settings.uploads.dir)?;
        Ok(Self { db, auth, uploads })
    }
}
