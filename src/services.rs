//! Encapsulation for setting up external services.

use crate::{
    config::Config,
    core::NotificationChannel,
    notification::{GarminChannel, PagerDutyChannel},
    suggest::SuggestClient,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Builds one channel for every provider section present in the configuration.
pub fn build_channels(config: &Config) -> Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

    if let Some(pd) = &config.pagerduty {
        let channel = PagerDutyChannel::new(pd, config.default_timeout_ms)
            .context("failed to build PagerDuty HTTP client")?;
        info!(endpoint = %pd.endpoint, "PagerDuty channel enabled.");
        channels.push(Arc::new(channel));
    }

    if let Some(garmin) = &config.garmin {
        let channel = GarminChannel::new(garmin, config.default_timeout_ms)
            .context("failed to build Garmin HTTP client")?;
        info!(endpoint = %garmin.endpoint, imei = %garmin.imei, "Garmin channel enabled.");
        channels.push(Arc::new(channel));
    }

    Ok(channels)
}

/// Builds the suggestion client if it is enabled in the configuration.
pub fn build_suggester(config: &Config) -> Result<Option<Arc<SuggestClient>>> {
    let Some(suggest) = &config.suggest else {
        return Ok(None);
    };
    let client = SuggestClient::new(suggest).context("failed to build suggestion HTTP client")?;
    info!(model = %suggest.model, "Suggestions enabled.");
    Ok(Some(Arc::new(client)))
}
