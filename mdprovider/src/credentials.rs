//! API keys held in memory, never printed.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::{ProviderError, ProviderId};

/// A credential string whose `Debug` output is redacted and whose bytes are
/// overwritten when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        bytes.fill(0);
        std::hint::black_box(&bytes);
    }
}

fn poisoned<T>(_: PoisonError<T>) -> ProviderError {
    ProviderError::other("credential store lock poisoned")
}

#[derive(Default)]
pub struct SecureCredentialManager {
    keys: RwLock<HashMap<ProviderId, SecretString>>,
}

impl SecureCredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any key already held for `provider`.
    pub fn set_api_key(
        &self,
        provider: ProviderId,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ProviderError::authentication(format!(
                "{provider} api key must not be blank"
            )));
        }

        self.keys.write().map_err(poisoned)?.insert(provider, api_key);
        Ok(())
    }

    pub fn api_key(&self, provider: ProviderId) -> Result<Option<SecretString>, ProviderError> {
        Ok(self.keys.read().map_err(poisoned)?.get(&provider).cloned())
    }

    pub fn has_credentials(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.keys.read().map_err(poisoned)?.contains_key(&provider))
    }

    pub fn clear(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.keys.write().map_err(poisoned)?.remove(&provider).is_some())
    }
}

impl fmt::Debug for SecureCredentialManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut providers = f.debug_set();
        if let Ok(keys) = self.keys.read() {
            providers.entries(keys.keys());
        }
        providers.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_never_reach_debug_output() {
        let secret = SecretString::new("sk-very-secret");
        assert_eq!(format!("{secret:?}"), "SecretString(***)");
        assert_eq!(secret.expose(), "sk-very-secret");

        let manager = SecureCredentialManager::new();
        manager
            .set_api_key(ProviderId::OpenAi, "sk-test")
            .expect("key should store");
        assert_eq!(format!("{manager:?}"), "{OpenAi}");
    }

    #[test]
    fn keys_can_be_replaced_and_cleared() {
        let manager = SecureCredentialManager::new();
        assert!(!manager.has_credentials(ProviderId::OpenAi).expect("read"));

        manager
            .set_api_key(ProviderId::OpenAi, "sk-first")
            .expect("key should store");
        manager
            .set_api_key(ProviderId::OpenAi, "sk-second")
            .expect("key should store");
        let key = manager
            .api_key(ProviderId::OpenAi)
            .expect("read")
            .expect("key should exist");
        assert_eq!(key.expose(), "sk-second");

        assert!(manager.clear(ProviderId::OpenAi).expect("write"));
        assert!(!manager.clear(ProviderId::OpenAi).expect("write"));
    }

    #[test]
    fn blank_keys_are_refused() {
        let error = SecureCredentialManager::new()
            .set_api_key(ProviderId::OpenAi, "   ")
            .expect_err("blank key should fail");
        assert_eq!(error.kind, crate::ProviderErrorKind::Authentication);
        assert_eq!(error.message, "openai api key must not be blank");
    }
}
