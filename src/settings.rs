use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Mode {
    Pool,
    Solo,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Pool => f.write_str("pool"),
            Mode::Solo => f.write_str("solo"),
        }
    }
}

/// Immutable runtime configuration, merged from the JSON config file and
/// command-line overrides. Pool credentials are only demanded when pool
/// mode actually starts.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    mode: Option<Mode>,
    pool_host: Option<String>,
    pool_port: Option<u16>,
    pool_user: Option<String>,
    pool_pass: Option<String>,
    node_host: String,
    node_port: u16,
    node_coinbase: Option<String>,
    local_host: String,
    local_port: u16,
    stats_port: u16,
    vardiff: VardiffConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    mode: Option<Mode>,
    #[serde(default)]
    pool: PoolSection,
    #[serde(default)]
    node: NodeSection,
    #[serde(default)]
    local: LocalSection,
    #[serde(default)]
    vardiff: VardiffSection,
}

#[derive(Debug, Default, Deserialize)]
struct PoolSection {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    pass: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeSection {
    host: Option<String>,
    port: Option<u16>,
    coinbase: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalSection {
    host: Option<String>,
    port: Option<u16>,
    stats_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VardiffSection {
    target_share_sec: Option<f64>,
    retarget_sec: Option<f64>,
    variance_percent: Option<f64>,
    min_diff: Option<f64>,
    max_diff: Option<f64>,
    initial_diff: Option<f64>,
}

impl Settings {
    pub(crate) fn load(options: Options) -> Result<Self> {
        let file = match &options.config {
            Some(path) => {
                let contents = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                serde_json::from_str::<ConfigFile>(&contents)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => ConfigFile::default(),
        };

        let defaults = VardiffConfig::default();
        let vardiff = VardiffConfig {
            target_share_secs: file
                .vardiff
                .target_share_sec
                .unwrap_or(defaults.target_share_secs),
            retarget_secs: file.vardiff.retarget_sec.unwrap_or(defaults.retarget_secs),
            variance: file
                .vardiff
                .variance_percent
                .map(|percent| percent / 100.0)
                .unwrap_or(defaults.variance),
            min_diff: file.vardiff.min_diff.unwrap_or(defaults.min_diff),
            max_diff: file.vardiff.max_diff.unwrap_or(defaults.max_diff),
            initial_diff: options
                .initial_diff
                .or(file.vardiff.initial_diff)
                .unwrap_or(defaults.initial_diff),
        };

        let settings = Self {
            mode: file.mode,
            pool_host: file.pool.host,
            pool_port: file.pool.port,
            pool_user: file.pool.user,
            pool_pass: file.pool.pass,
            node_host: file.node.host.unwrap_or_else(|| "127.0.0.1".into()),
            node_port: file.node.port.unwrap_or(8114),
            node_coinbase: file.node.coinbase,
            local_host: options
                .address
                .or(file.local.host)
                .unwrap_or_else(|| "0.0.0.0".into()),
            local_port: options.port.or(file.local.port).unwrap_or(3333),
            stats_port: options.stats_port.or(file.local.stats_port).unwrap_or(8080),
            vardiff,
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result {
        let vardiff = &self.vardiff;
        ensure!(
            vardiff.min_diff > 0.0 && vardiff.min_diff <= vardiff.max_diff,
            "vardiff.minDiff must be positive and no greater than maxDiff"
        );
        ensure!(
            (vardiff.min_diff..=vardiff.max_diff).contains(&vardiff.initial_diff),
            "vardiff.initialDiff must lie between minDiff and maxDiff"
        );
        ensure!(
            vardiff.target_share_secs > 0.0 && vardiff.retarget_secs > 0.0,
            "vardiff intervals must be positive"
        );
        ensure!(
            (0.0..1.0).contains(&vardiff.variance),
            "vardiff.variancePercent must be in [0, 100)"
        );
        Ok(())
    }

    pub(crate) fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub(crate) fn pool_host(&self) -> Result<&str> {
        self.pool_host
            .as_deref()
            .context("pool.host is not configured")
    }

    pub(crate) fn pool_port(&self) -> Result<u16> {
        self.pool_port.context("pool.port is not configured")
    }

    pub(crate) fn pool_user(&self) -> Result<&str> {
        self.pool_user
            .as_deref()
            .context("pool.user is not configured")
    }

    pub(crate) fn pool_pass(&self) -> Option<&str> {
        self.pool_pass.as_deref()
    }

    pub(crate) fn node_host(&self) -> &str {
        &self.node_host
    }

    pub(crate) fn node_port(&self) -> u16 {
        self.node_port
    }

    pub(crate) fn node_coinbase(&self) -> Option<&str> {
        self.node_coinbase.as_deref()
    }

    pub(crate) fn local_host(&self) -> &str {
        &self.local_host
    }

    pub(crate) fn local_port(&self) -> u16 {
        self.local_port
    }

    pub(crate) fn stats_port(&self) -> u16 {
        self.stats_port
    }

    pub(crate) fn vardiff(&self) -> VardiffConfig {
        self.vardiff
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::for_tests_with_node("127.0.0.1", 1)
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_vardiff(vardiff: VardiffConfig) -> Self {
        Self {
            vardiff,
            ..Self::for_tests()
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_pool(host: &str, port: u16) -> Self {
        Self {
            pool_host: Some(host.into()),
            pool_port: Some(port),
            ..Self::for_tests()
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests_with_node(host: &str, port: u16) -> Self {
        Self {
            mode: Some(Mode::Solo),
            pool_host: Some("127.0.0.1".into()),
            pool_port: Some(1),
            pool_user: Some("test.worker".into()),
            pool_pass: None,
            node_host: host.into(),
            node_port: port,
            node_coinbase: None,
            local_host: "127.0.0.1".into(),
            local_port: 0,
            stats_port: 0,
            vardiff: VardiffConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "roost-settings-{}-{}.json",
            process::id(),
            rand::random::<u32>(),
        ));
        fs::write(&path, contents).unwrap();
        path
    }

    fn load(contents: &str) -> Settings {
        let path = write_config(contents);
        let settings = Settings::load(Options {
            config: Some(path.clone()),
            ..Options::default()
        })
        .unwrap();
        let _ = fs::remove_file(path);
        settings
    }

    #[test]
    fn defaults_without_config() {
        let settings = Settings::load(Options::default()).unwrap();

        assert_eq!(settings.mode(), None);
        assert_eq!(settings.local_host(), "0.0.0.0");
        assert_eq!(settings.local_port(), 3333);
        assert_eq!(settings.stats_port(), 8080);
        assert_eq!(settings.node_host(), "127.0.0.1");
        assert_eq!(settings.node_port(), 8114);
        assert!(settings.pool_host().is_err());
        assert_eq!(settings.vardiff().target_share_secs, 30.0);
        assert_eq!(settings.vardiff().initial_diff, 1.0);
    }

    #[test]
    fn full_config_file() {
        let settings = load(
            r#"{
                "mode": "pool",
                "pool": {"host": "ckb.pool.example", "port": 1800, "user": "addr.rig", "pass": "x"},
                "node": {"host": "10.0.0.2", "port": 8114, "coinbase": "ckb1qexample"},
                "local": {"host": "0.0.0.0", "port": 16200, "statsPort": 16201},
                "vardiff": {
                    "targetShareSec": 20,
                    "retargetSec": 90,
                    "variancePercent": 25,
                    "minDiff": 0.01,
                    "maxDiff": 1000000,
                    "initialDiff": 8
                }
            }"#,
        );

        assert_eq!(settings.mode(), Some(Mode::Pool));
        assert_eq!(settings.pool_host().unwrap(), "ckb.pool.example");
        assert_eq!(settings.pool_port().unwrap(), 1800);
        assert_eq!(settings.pool_user().unwrap(), "addr.rig");
        assert_eq!(settings.pool_pass(), Some("x"));
        assert_eq!(settings.node_coinbase(), Some("ckb1qexample"));
        assert_eq!(settings.local_port(), 16200);
        assert_eq!(settings.stats_port(), 16201);

        let vardiff = settings.vardiff();
        assert_eq!(vardiff.target_share_secs, 20.0);
        assert_eq!(vardiff.retarget_secs, 90.0);
        assert_eq!(vardiff.variance, 0.25);
        assert_eq!(vardiff.min_diff, 0.01);
        assert_eq!(vardiff.initial_diff, 8.0);
    }

    #[test]
    fn cli_overrides_file() {
        let path = write_config(r#"{"mode": "solo", "local": {"port": 4000}}"#);

        let settings = Settings::load(Options {
            config: Some(path.clone()),
            address: Some("127.0.0.1".into()),
            port: Some(5000),
            initial_diff: Some(0.5),
            ..Options::default()
        })
        .unwrap();
        let _ = fs::remove_file(path);

        assert_eq!(settings.mode(), Some(Mode::Solo));
        assert_eq!(settings.local_host(), "127.0.0.1");
        assert_eq!(settings.local_port(), 5000);
        assert_eq!(settings.vardiff().initial_diff, 0.5);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let path = write_config(r#"{"mode": "cloud"}"#);
        let result = Settings::load(Options {
            config: Some(path.clone()),
            ..Options::default()
        });
        let _ = fs::remove_file(path);

        assert!(result.is_err());
    }

    #[test]
    fn bad_vardiff_bounds_are_rejected() {
        let path = write_config(r#"{"vardiff": {"minDiff": 10, "maxDiff": 1}}"#);
        let result = Settings::load(Options {
            config: Some(path.clone()),
            ..Options::default()
        });
        let _ = fs::remove_file(path);

        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let result = Settings::load(Options {
            config: Some("/nonexistent/roost.json".into()),
            ..Options::default()
        });
        assert!(result.is_err());
    }
}
