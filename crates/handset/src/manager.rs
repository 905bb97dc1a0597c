//! Driver Lifecycle Manager
//!
//! Builds, fetches and tears down session handles, one per execution
//! context. Handle creation validates the platform and endpoint, builds the
//! capability set, connects, applies the configured timeouts and stores the
//! handle under the caller's context.

use crate::capabilities::CapabilitySet;
use crate::config::Settings;
use crate::platform::Platform;
use crate::registry::{ContextId, SessionRegistry};
use crate::result::{HandsetError, HandsetResult};
use crate::session::{SessionConnector, SessionHandle};
use reqwest::Url;
use std::sync::Arc;

/// Owns the context → handle mapping
pub struct DriverManager {
    settings: Arc<Settings>,
    connector: Arc<dyn SessionConnector>,
    registry: SessionRegistry,
}

impl std::fmt::Debug for DriverManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverManager")
            .field("platform", &self.settings.platform())
            .field("active_contexts", &self.registry.len())
            .finish()
    }
}

impl DriverManager {
    /// Create a manager
    #[must_use]
    pub fn new(settings: Arc<Settings>, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            settings,
            connector,
            registry: SessionRegistry::new(),
        }
    }

    /// Settings the manager builds capabilities from
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Create a handle from a platform selector string
    ///
    /// A handle already stored for `context` is displaced: it is logged and
    /// quit best-effort so its device session does not leak.
    pub fn create_handle(&self, context: &ContextId, selector: &str) -> HandsetResult<Arc<SessionHandle>> {
        let platform: Platform = selector.parse()?;
        self.create_handle_for(context, platform)
    }

    /// Create a handle for a validated platform
    pub fn create_handle_for(
        &self,
        context: &ContextId,
        platform: Platform,
    ) -> HandsetResult<Arc<SessionHandle>> {
        let endpoint = parse_endpoint(&self.settings.framework().appium_url)?;
        let capabilities = CapabilitySet::for_platform(&self.settings, platform)?;

        tracing::info!(
            %context,
            %platform,
            endpoint = %endpoint,
            capabilities = capabilities.len(),
            "creating session handle"
        );
        let session = self.connector.connect(&endpoint, &capabilities)?;
        let handle = Arc::new(SessionHandle::new(platform, session, capabilities.app_id()));

        if let Err(e) = handle.set_timeouts(&self.settings.framework().timeouts) {
            // The session exists on the server; do not strand it
            if let Err(quit) = handle.quit() {
                tracing::warn!(%context, error = %quit, "failed to quit session after timeout setup error");
            }
            return Err(e);
        }

        if let Some(displaced) = self.registry.insert(context.clone(), Arc::clone(&handle)) {
            tracing::warn!(
                %context,
                session = displaced.session_id(),
                "handle created while another was live for this context; quitting the old one"
            );
            if let Err(e) = displaced.quit() {
                tracing::warn!(%context, error = %e, "failed to quit displaced session");
            }
        }

        tracing::info!(%context, session = handle.session_id(), %platform, "session handle ready");
        Ok(handle)
    }

    /// Handle for `context`
    pub fn get_handle(&self, context: &ContextId) -> HandsetResult<Arc<SessionHandle>> {
        self.registry
            .get(context)
            .ok_or_else(|| HandsetError::not_initialized(context))
    }

    /// Whether `context` has a handle
    #[must_use]
    pub fn has_handle(&self, context: &ContextId) -> bool {
        self.registry.contains(context)
    }

    /// Quit and forget the handle for `context`
    ///
    /// Quit errors are logged, never returned. The stored reference is
    /// removed before the quit is attempted, so it is cleared whatever the
    /// outcome.
    pub fn destroy_handle(&self, context: &ContextId) {
        let Some(handle) = self.registry.remove(context) else {
            tracing::warn!(%context, "destroy requested but no session handle exists");
            return;
        };

        match handle.quit() {
            Ok(()) => tracing::info!(%context, session = handle.session_id(), "session handle destroyed"),
            Err(e) => tracing::warn!(
                %context,
                session = handle.session_id(),
                error = %e,
                "session quit failed; handle released anyway"
            ),
        }
    }

    /// Force-restart the application under test
    pub fn reset_application(&self, context: &ContextId) -> HandsetResult<()> {
        let handle = self.get_handle(context)?;
        handle.restart_app().map_err(|e| HandsetError::ResetFailed {
            source: Box::new(e),
        })?;
        tracing::info!(%context, app = handle.app_id(), "application reset");
        Ok(())
    }

    /// Background the application for `seconds`, then restore it
    pub fn send_to_background(&self, context: &ContextId, seconds: i64) -> HandsetResult<()> {
        let handle = self.get_handle(context)?;
        handle
            .background(seconds)
            .map_err(|e| HandsetError::BackgroundFailed {
                seconds,
                source: Box::new(e),
            })?;
        tracing::info!(%context, seconds, "application restored from background");
        Ok(())
    }

    /// Platform name of the context's session
    pub fn current_platform_name(&self, context: &ContextId) -> HandsetResult<String> {
        Ok(self.get_handle(context)?.platform_name())
    }

    /// Device name of the context's session
    pub fn current_device_name(&self, context: &ContextId) -> HandsetResult<String> {
        Ok(self.get_handle(context)?.device_name())
    }

    /// Number of contexts holding a handle
    #[must_use]
    pub fn active_contexts(&self) -> usize {
        self.registry.len()
    }
}

/// Validate the automation server address
pub fn parse_endpoint(raw: &str) -> HandsetResult<Url> {
    let invalid = |message: &str| HandsetError::InvalidEndpoint {
        endpoint: raw.to_string(),
        message: message.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}
