use std::sync::Arc;

use crate::backend::Backend;
use crate::bill::BillPaymentService;
use crate::config::{AppConfig, BackendKind};
use crate::transfer::{ClaimIssuer, ClaimService, TransferCoordinator};

use super::types::ApiError;

/// Everything wired on top of a configured backend
pub struct Services {
    pub backend: BackendKind,
    pub coordinator: Arc<TransferCoordinator>,
    pub claims: Arc<ClaimService>,
    pub bills: Arc<BillPaymentService>,
}

impl Services {
    pub fn new(backend: Backend, config: &AppConfig) -> Self {
        let issuer = ClaimIssuer::new(backend.store.clone(), config.claims.max_attempts);
        let coordinator = Arc::new(TransferCoordinator::new(
            backend.ledger.clone(),
            backend.directory.clone(),
            backend.store.clone(),
            config.fees.clone(),
            issuer,
        ));
        let claims = Arc::new(ClaimService::new(backend.ledger, backend.store));
        let bills = Arc::new(BillPaymentService::new(
            coordinator.clone(),
            config.currency.clone(),
            config.default_country.clone(),
        ));
        Self {
            backend: backend.kind,
            coordinator,
            claims,
            bills,
        }
    }
}

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    /// `None` when the backend is missing its credentials
    pub services: Option<Arc<Services>>,
    pub currency: String,
    pub default_country: String,
}

impl AppState {
    pub fn new(backend: Option<Backend>, config: &AppConfig) -> Self {
        Self {
            services: backend.map(|b| Arc::new(Services::new(b, config))),
            currency: config.currency.clone(),
            default_country: config.default_country.clone(),
        }
    }

    pub fn services(&self) -> Result<&Services, ApiError> {
        self.services
            .as_deref()
            .ok_or_else(|| ApiError::service_unavailable("Server configuration error"))
    }
}
