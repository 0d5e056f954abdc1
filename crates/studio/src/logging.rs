use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "video_api=info,reference_image=info,studio=info";

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `filter`. Returns false if a subscriber was already set.
pub fn init(filter: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or(DEFAULT_FILTER)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::StudioConfig;

    #[test]
    fn test_init_from_config_is_idempotent() {
        let config: StudioConfig = serde_json::from_str(r#"{"log_filter":"studio=debug"}"#).unwrap();
        assert_eq!(config.log_filter.as_deref(), Some("studio=debug"));
        config.init_logging();
        assert!(!init(None));
        tracing::debug!(target: "studio", "logging initialised");
    }
}
