use crate::domain::entities::Target;
use crate::domain::value_objects::Strategy;

#[derive(Debug, Clone)]
pub struct Config {
    // Core settings
    pub listen_addr: String,
    pub db_path: String,
    pub db_reload_secs: u64,
    pub debug: bool,

    // Dispatch settings
    pub strategy: Strategy,
    pub max_retries: u32,
    pub callback_url: Option<String>,
    pub transport_timeout_ms: u64,
    pub servers: Vec<Target>,

    // Latency settings
    pub latency_limit: usize,
    pub latency_window_secs: u64,
    pub latency_retention: usize,

    // Shutdown settings
    pub drain_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            db_path: "balancer.db".to_string(),
            db_reload_secs: 5,
            debug: false,
            strategy: Strategy::WeightedRandom,
            max_retries: 2,
            callback_url: None,
            transport_timeout_ms: 5000,
            servers: Vec::new(),
            latency_limit: 5,
            latency_window_secs: 300,
            latency_retention: 1000,
            drain_timeout_secs: 10,
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Build the config from an arbitrary variable lookup.
///
/// Unset or unparseable values fall back to their defaults.
pub fn load_config_from<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let parse_or = |key: &str, default: u64| -> u64 {
        lookup(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    };

    let listen_addr = lookup("SMSLB_LISTEN_ADDR").unwrap_or(defaults.listen_addr);
    let db_path = lookup("SMSLB_DB_PATH").unwrap_or(defaults.db_path);
    let db_reload_secs = parse_or("SMSLB_DB_RELOAD_SECS", defaults.db_reload_secs);
    let debug = lookup("DEBUG").is_some();

    let strategy = match lookup("SMSLB_STRATEGY") {
        Some(name) => Strategy::from_name(name.trim()).unwrap_or_else(|| {
            tracing::warn!("unknown strategy {:?}, using {}", name, defaults.strategy);
            defaults.strategy
        }),
        None => defaults.strategy,
    };

    let max_retries = lookup("SMSLB_MAX_RETRIES")
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(defaults.max_retries);

    let callback_url = lookup("SMSLB_CALLBACK_URL").filter(|v| !v.trim().is_empty());

    let transport_timeout_ms = parse_or("SMSLB_TRANSPORT_TIMEOUT_MS", defaults.transport_timeout_ms);

    let servers = lookup("SMSLB_SERVERS")
        .map(|v| parse_servers(&v))
        .unwrap_or_default();

    let latency_limit = parse_or("SMSLB_LATENCY_LIMIT", defaults.latency_limit as u64) as usize;
    let latency_window_secs = parse_or("SMSLB_LATENCY_WINDOW_SECS", defaults.latency_window_secs);
    let mut latency_retention =
        parse_or("SMSLB_LATENCY_RETENTION", defaults.latency_retention as u64) as usize;
    // Retention below the averaging limit would silently shrink every average
    if latency_retention < latency_limit {
        tracing::warn!(
            "latency retention {} is below limit {}, raising it to {}",
            latency_retention,
            latency_limit,
            latency_limit
        );
        latency_retention = latency_limit;
    }

    let drain_timeout_secs = parse_or("SMSLB_DRAIN_TIMEOUT_SECS", defaults.drain_timeout_secs);

    Ok(Config {
        listen_addr,
        db_path,
        db_reload_secs,
        debug,
        strategy,
        max_retries,
        callback_url,
        transport_timeout_ms,
        servers,
        latency_limit,
        latency_window_secs,
        latency_retention,
        drain_timeout_secs,
    })
}

/// Parse a `url|weight,url|weight` seed list.
///
/// A missing weight means 1.0. Entries with an empty url or an
/// unparseable weight are skipped.
pub fn parse_servers(raw: &str) -> Vec<Target> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (url, weight) = match entry.split_once('|') {
                Some((url, weight)) => (url.trim(), weight.trim().parse::<f64>().ok()),
                None => (entry, Some(1.0)),
            };
            match weight {
                Some(weight) if !url.is_empty() => Some(Target::new(url, weight)),
                _ => {
                    tracing::warn!("skipping malformed server entry {:?}", entry);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_config_from(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:8000");
        assert_eq!(cfg.strategy, Strategy::WeightedRandom);
        assert_eq!(cfg.max_retries, 2);
        assert!(cfg.callback_url.is_none());
        assert!(cfg.servers.is_empty());
    }

    #[test]
    fn test_load_config_defaults() {
        let cfg = load_with(&[]);
        assert_eq!(cfg.listen_addr, "0.0.0.0:8000");
        assert_eq!(cfg.db_path, "balancer.db");
        assert_eq!(cfg.db_reload_secs, 5);
        assert_eq!(cfg.latency_limit, 5);
        assert_eq!(cfg.latency_window_secs, 300);
        assert_eq!(cfg.latency_retention, 1000);
        assert_eq!(cfg.transport_timeout_ms, 5000);
        assert_eq!(cfg.drain_timeout_secs, 10);
        assert!(!cfg.debug);
    }

    #[test]
    fn test_load_config_from_process_env() {
        std::env::set_var("SMSLB_DB_PATH", "/tmp/process-env.db");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.db_path, "/tmp/process-env.db");
        std::env::remove_var("SMSLB_DB_PATH");
    }

    #[test]
    fn test_load_config_with_custom_values() {
        let cfg = load_with(&[
            ("SMSLB_LISTEN_ADDR", "127.0.0.1:9000"),
            ("SMSLB_DB_PATH", "/tmp/test.db"),
            ("SMSLB_STRATEGY", "round_robin"),
            ("SMSLB_MAX_RETRIES", "4"),
            ("SMSLB_CALLBACK_URL", "https://balancer.example/callback"),
            ("SMSLB_LATENCY_LIMIT", "10"),
            ("SMSLB_LATENCY_WINDOW_SECS", "60"),
            ("SMSLB_TRANSPORT_TIMEOUT_MS", "250"),
            ("DEBUG", "1"),
        ]);
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        assert_eq!(cfg.db_path, "/tmp/test.db");
        assert_eq!(cfg.strategy, Strategy::RoundRobin);
        assert_eq!(cfg.max_retries, 4);
        assert_eq!(
            cfg.callback_url.as_deref(),
            Some("https://balancer.example/callback")
        );
        assert_eq!(cfg.latency_limit, 10);
        assert_eq!(cfg.latency_window_secs, 60);
        assert_eq!(cfg.transport_timeout_ms, 250);
        assert!(cfg.debug);
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        let cfg = load_with(&[
            ("SMSLB_DB_RELOAD_SECS", "not_a_number"),
            ("SMSLB_MAX_RETRIES", "-1"),
        ]);
        assert_eq!(cfg.db_reload_secs, 5);
        assert_eq!(cfg.max_retries, 2);
    }

    #[test]
    fn test_load_config_raises_retention_to_limit() {
        let cfg = load_with(&[
            ("SMSLB_LATENCY_RETENTION", "2"),
            ("SMSLB_LATENCY_LIMIT", "5"),
        ]);
        assert_eq!(cfg.latency_limit, 5);
        assert_eq!(cfg.latency_retention, 5);
    }

    #[test]
    fn test_retention_from_config_keeps_full_average() {
        use crate::adapters::outbound::DashMapLatencyStore;
        use crate::domain::entities::LatencyRecord;
        use crate::domain::ports::LatencyStore;

        let cfg = load_with(&[
            ("SMSLB_LATENCY_RETENTION", "2"),
            ("SMSLB_LATENCY_LIMIT", "5"),
        ]);
        let store = DashMapLatencyStore::with_retention(cfg.latency_retention);
        let now = chrono::Utc::now();
        for (i, micros) in [10, 20, 30, 40, 50].into_iter().enumerate() {
            let start = now - chrono::Duration::seconds(10 - i as i64);
            store.record(LatencyRecord::success(
                "server1",
                start,
                start + chrono::Duration::microseconds(micros),
            ));
        }

        let avg = store.rolling_average_at(
            "server1",
            cfg.latency_limit,
            std::time::Duration::from_secs(cfg.latency_window_secs),
            now,
        );
        assert_eq!(avg, 30.0);
    }

    #[test]
    fn test_load_config_keeps_retention_above_limit() {
        let cfg = load_with(&[
            ("SMSLB_LATENCY_RETENTION", "50"),
            ("SMSLB_LATENCY_LIMIT", "5"),
        ]);
        assert_eq!(cfg.latency_retention, 50);
    }

    #[test]
    fn test_load_config_unknown_strategy_uses_default() {
        let cfg = load_with(&[("SMSLB_STRATEGY", "round_rogers")]);
        assert_eq!(cfg.strategy, Strategy::WeightedRandom);
    }

    #[test]
    fn test_load_config_empty_callback_is_none() {
        let cfg = load_with(&[("SMSLB_CALLBACK_URL", "  ")]);
        assert!(cfg.callback_url.is_none());
    }

    #[test]
    fn test_load_config_servers() {
        let cfg = load_with(&[(
            "SMSLB_SERVERS",
            "http://p1/send|0.3, http://p2/send|0.7",
        )]);
        assert_eq!(
            cfg.servers,
            vec![
                Target::new("http://p1/send", 0.3),
                Target::new("http://p2/send", 0.7)
            ]
        );
    }

    #[test]
    fn test_parse_servers_default_weight() {
        assert_eq!(
            parse_servers("http://p1/send"),
            vec![Target::new("http://p1/send", 1.0)]
        );
    }

    #[test]
    fn test_parse_servers_skips_malformed() {
        let servers = parse_servers("http://p1/send|abc,|0.5,,http://p2/send|0.2");
        assert_eq!(servers, vec![Target::new("http://p2/send", 0.2)]);
    }
}
