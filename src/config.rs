use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP/WebSocket server listens on
    pub bind_addr: SocketAddr,
    /// How long a "room closed" notice stays up before returning to home
    pub room_closed_delay: Duration,
    /// Optional JSON catalog replacing the built-in items
    pub catalog_path: Option<PathBuf>,
    /// Fixed seed for role, item and turn order randomness (tests, demos)
    pub rng_seed: Option<u64>,
    /// Directory served as the static frontend
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 7790)),
            room_closed_delay: Duration::from_millis(2000),
            catalog_path: None,
            rng_seed: None,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = match std::env::var("SPYROOM_BIND_ADDR") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!(
                    "Ignoring invalid SPYROOM_BIND_ADDR {:?}: {}, using {}",
                    raw,
                    e,
                    defaults.bind_addr
                );
                defaults.bind_addr
            }),
            Err(_) => defaults.bind_addr,
        };

        let room_closed_delay = std::env::var("ROOM_CLOSED_DELAY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.room_closed_delay);

        let catalog_path = std::env::var("ITEM_CATALOG_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let rng_seed = std::env::var("SPYROOM_RNG_SEED")
            .ok()
            .and_then(|s| s.parse().ok());

        let static_dir = std::env::var("STATIC_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        Self {
            bind_addr,
            room_closed_delay,
            catalog_path,
            rng_seed,
            static_dir,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "SPYROOM_BIND_ADDR",
        "ROOM_CLOSED_DELAY_MS",
        "ITEM_CATALOG_PATH",
        "SPYROOM_RNG_SEED",
        "STATIC_DIR",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.bind_addr.port(), 7790);
        assert_eq!(config.room_closed_delay, Duration::from_secs(2));
        assert!(config.catalog_path.is_none());
        assert!(config.rng_seed.is_none());
        assert_eq!(config.static_dir, PathBuf::from("static"));
    }

    #[test]
    #[serial]
    fn test_values_from_env() {
        clear_env();
        std::env::set_var("SPYROOM_BIND_ADDR", "127.0.0.1:9000");
        std::env::set_var("ROOM_CLOSED_DELAY_MS", "50");
        std::env::set_var("ITEM_CATALOG_PATH", "/tmp/items.json");
        std::env::set_var("SPYROOM_RNG_SEED", "42");

        let config = Config::from_env();
        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.room_closed_delay, Duration::from_millis(50));
        assert_eq!(config.catalog_path, Some(PathBuf::from("/tmp/items.json")));
        assert_eq!(config.rng_seed, Some(42));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("SPYROOM_BIND_ADDR", "not an address");
        std::env::set_var("ROOM_CLOSED_DELAY_MS", "soon");
        std::env::set_var("SPYROOM_RNG_SEED", "-1");

        let config = Config::from_env();
        assert_eq!(config.bind_addr.port(), 7790);
        assert_eq!(config.room_closed_delay, Duration::from_secs(2));
        assert!(config.rng_seed.is_none());
        clear_env();
    }
}
