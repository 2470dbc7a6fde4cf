use std::sync::Arc;

use crate::platform::{
    error::PlatformError,
    ports::{IntentHandlerPort, IntentRegistration, PlatformAdapterPort},
};

/// Fans every registration out to all connected platform adapters, so
/// one compiled script serves every platform at once.
#[derive(Default, Clone)]
pub struct PlatformRegistry {
    adapters: Vec<Arc<dyn PlatformAdapterPort>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, adapter: Arc<dyn PlatformAdapterPort>) {
        self.adapters.push(adapter);
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn reg_intent(
        &self,
        registration: &IntentRegistration,
        handler: &Arc<dyn IntentHandlerPort>,
    ) -> Result<(), PlatformError> {
        for adapter in &self.adapters {
            adapter.reg_intent(registration.clone(), Arc::clone(handler))?;
        }
        Ok(())
    }

    pub fn reg_custom_slot(&self, type_name: &str, values: &[String]) -> Result<(), PlatformError> {
        for adapter in &self.adapters {
            adapter.reg_custom_slot(type_name, values)?;
        }
        Ok(())
    }

    pub fn on_launch(&self, handler: &Arc<dyn IntentHandlerPort>) -> Result<(), PlatformError> {
        for adapter in &self.adapters {
            adapter.on_launch(Arc::clone(handler))?;
        }
        Ok(())
    }

    pub fn on_error(&self, handler: &Arc<dyn IntentHandlerPort>) -> Result<(), PlatformError> {
        for adapter in &self.adapters {
            adapter.on_error(Arc::clone(handler))?;
        }
        Ok(())
    }
}
