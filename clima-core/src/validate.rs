//! Credential diagnostics: one cheap probe per provider, reported as a
//! provider-name → bool table. Never used on the request-serving path.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::provider::WeatherProvider;

/// Probe every provider and collect the outcomes keyed by provider name.
///
/// A keyless provider reports `true` and an unconfigured one `false`, both
/// without network traffic; everything else reflects whether the probe
/// request was answered.
pub async fn validate_keys(
    providers: &[Arc<dyn WeatherProvider>],
) -> BTreeMap<&'static str, bool> {
    let mut results = BTreeMap::new();

    for provider in providers {
        let ok = provider.validate_key().await;
        tracing::debug!("[{}] key validation: {ok}", provider.id());
        results.insert(provider.id().as_str(), ok);
    }

    results
}
