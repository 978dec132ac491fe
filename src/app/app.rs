use crate::api::v1::*;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::http::*;
use crate::infra_file::*;
use crate::infra_memory::*;
use crate::logger::*;
use crate::realtime::*;
use crate::settings::Settings;
use std::sync::Arc;
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Every client service, wired once from [`Settings`].
pub struct App {
    pub tokens: Arc<dyn TokenStore>,
    pub api: Arc<ApiClient>,
    pub auth: AuthApi,
    pub users: UserApi,
    pub connections: ConnectionApi,
    pub messages: MessageApi,
    pub presence: PresenceApi,
    pub notifications: NotificationApi,
    pub love_sparks: LoveSparkApi,
    pub realtime: RealtimeClient,
}

impl App {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let storage: Arc<dyn CredentialStore> = match settings.storage.backend.as_str() {
            "file" => Arc::new(FileCredentialStore::new(
                &settings.storage.path,
                "soullink",
            )),
            "memory" => Arc::new(MemoryCredentialStore::new()),
            other => return Err(anyhow::anyhow!("Unknown storage backend: {}", other)),
        };

        let api_config = ApiClientConfig::from(&settings.http);
        let transport: Arc<dyn HttpTransport> =
            Arc::new(ReqwestTransport::try_new(HTTP_CONNECT_TIMEOUT)?);

        let refresher: Arc<dyn TokenRefresher> = Arc::new(HttpTokenRefresher::new(
            transport.clone(),
            &api_config.base_url,
            api_config.timeout,
        ));
        let tokens: Arc<dyn TokenStore> = Arc::new(RealTokenStore::new(storage, refresher));

        let api = Arc::new(ApiClient::new(api_config, transport, tokens.clone()));
        debug!(backend = %settings.storage.backend, "services wired");

        let realtime = RealtimeClient::new(
            RealtimeConfig::from(&settings.realtime),
            Arc::new(WsConnector),
            tokens.clone(),
        );

        Ok(App {
            tokens,
            auth: AuthApi::new(api.clone()),
            users: UserApi::new(api.clone()),
            connections: ConnectionApi::new(api.clone()),
            messages: MessageApi::new(api.clone()),
            presence: PresenceApi::new(api.clone()),
            notifications: NotificationApi::new(api.clone()),
            love_sparks: LoveSparkApi::new(api.clone()),
            api,
            realtime,
        })
    }

    pub async fn shutdown(&self) {
        info!("client shutting down...");
        self.realtime.shutdown().await;
        info!("client shut down");
    }
}
