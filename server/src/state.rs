use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::SessionAuthority;
use crate::config::{Config, ConfigError, GatewayProvider};
use crate::gateway::{GatewayError, MockGateway, PaymentGateway, RazorpayGateway};
use crate::services::{
    AdmissionController, CredentialCodec, CredentialSigner, OrderBuilder, PaymentSessionManager,
    PricingTable, QrCodec, StatsAggregator, TicketIssuer,
};
use crate::store::TicketStore;

/// Verification secret the mock gateway signs callbacks with when none is configured.
pub const MOCK_GATEWAY_SECRET: &str = "mock-gateway-secret";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderBuilder>,
    pub payments: Arc<PaymentSessionManager>,
    pub issuer: Arc<TicketIssuer>,
    pub admission: Arc<AdmissionController>,
    pub stats: Arc<StatsAggregator>,
    pub store: Arc<dyn TicketStore>,
    pub codec: Arc<dyn CredentialCodec>,
    pub sessions: Arc<SessionAuthority>,
}

impl AppState {
    /// Wires the configured gateway provider.
    pub fn from_config(config: &Config, store: Arc<dyn TicketStore>) -> Result<Self, StartupError> {
        let (gateway, secret): (Arc<dyn PaymentGateway>, Option<String>) =
            match config.gateway.provider {
                GatewayProvider::Razorpay => (
                    Arc::new(RazorpayGateway::new(
                        &config.gateway.base_url,
                        config.gateway.key_id.clone(),
                        config.gateway.key_secret.clone(),
                    )?),
                    config.gateway.key_secret.clone(),
                ),
                GatewayProvider::Mock => {
                    tracing::warn!("Using the mock payment gateway");
                    (
                        Arc::new(MockGateway::new()),
                        Some(
                            config
                                .gateway
                                .key_secret
                                .clone()
                                .unwrap_or_else(|| MOCK_GATEWAY_SECRET.to_string()),
                        ),
                    )
                }
            };

        Ok(Self::with_gateway(config, store, gateway, secret.as_deref())?)
    }

    pub fn with_gateway(
        config: &Config,
        store: Arc<dyn TicketStore>,
        gateway: Arc<dyn PaymentGateway>,
        gateway_secret: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let pricing = Arc::new(PricingTable::new(config.tiers.clone())?);
        let signer = CredentialSigner::new(config.credential_secret.as_deref());
        if !signer.is_enforcing() {
            tracing::warn!("CREDENTIAL_SECRET not set; credentials are issued unsigned");
        }
        let codec: Arc<dyn CredentialCodec> = Arc::new(QrCodec);

        Ok(Self {
            orders: Arc::new(OrderBuilder::new(
                pricing.clone(),
                config.max_quantity,
                &config.currency,
            )),
            payments: Arc::new(PaymentSessionManager::new(gateway, gateway_secret)),
            issuer: Arc::new(TicketIssuer::new(store.clone(), signer.clone(), codec.clone())),
            admission: Arc::new(AdmissionController::new(store.clone(), signer)),
            stats: Arc::new(StatsAggregator::new(store.clone(), pricing)),
            store,
            codec,
            sessions: Arc::new(SessionAuthority::new(
                &config.session_secret,
                config.admin_ids.clone(),
            )),
        })
    }
}

impl FromRef<AppState> for Arc<SessionAuthority> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}
