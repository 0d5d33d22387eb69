use std::sync::Arc;

use crate::clients::{NotificationDispatcher, build_dispatcher};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    ApplicationService, AuthService, Clock, SeaOrmApplicationService, SeaOrmAuthService,
    SessionTokens, SystemClock,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub clock: Arc<dyn Clock>,

    pub notifications: NotificationDispatcher,

    pub auth_service: Arc<dyn AuthService>,

    pub application_service: Arc<dyn ApplicationService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::from_config(&config).await?;
        let notifications = build_dispatcher(&config.notifier)?;
        Self::from_parts(config, store, notifications, Arc::new(SystemClock))
    }

    /// Wires the services around an existing store, delivery channel and
    /// clock.
    pub fn from_parts(
        config: Config,
        store: Store,
        notifications: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Self> {
        let tokens = SessionTokens::from_config(&config.security)?;

        let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            notifications.clone(),
            tokens,
            Arc::clone(&clock),
            config.security.clone(),
        ));

        let application_service: Arc<dyn ApplicationService> = Arc::new(
            SeaOrmApplicationService::new(
                store.clone(),
                notifications.clone(),
                Arc::clone(&clock),
            ),
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            clock,
            notifications,
            auth_service,
            application_service,
        })
    }
}
