use super::*;

use std::path::Path;
use std::sync::atomic::AtomicU32;

/// Cluster count used when nothing else is configured
pub const DEFAULT_MEMORY_BUDGET_CLUSTERS: u32 = 1024;

/// Shared count of network buffer clusters
///
/// Limits left unpinned by a [ProtocolPolicy] are a quarter of this value and
/// follow it when it changes.
#[derive(Clone, Debug)]
pub struct MemoryBudget {
    clusters: Arc<AtomicU32>,
}

impl MemoryBudget {
    pub fn new(clusters: u32) -> Self {
        Self {
            clusters: Arc::new(AtomicU32::new(clusters)),
        }
    }
    pub fn clusters(&self) -> u32 {
        self.clusters.load(Ordering::Acquire)
    }
    pub fn set_clusters(&self, clusters: u32) {
        self.clusters.store(clusters, Ordering::Release);
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_BUDGET_CLUSTERS)
    }
}

/////////////////////////////////////////////////////////

pub fn default_config_yaml() -> &'static str {
    r#"---
memory_budget_clusters: 1024
ipv4:
    family: 'v4'
    strict_overlap: false
    default_ttl: 30
    tick_duration_ms: 500
    max_datagram_size: 65535
    eviction_policy: 'aimd'
    oversize_check: 'incremental'
    traffic_class_check: 'exact'
    report_time_exceeded: false
    pressure_drain: 'half'
    hash_buckets: 64
    max_fragments: ~
    max_queues: 200
ipv6:
    family: 'v6'
    strict_overlap: true
    default_ttl: 60
    tick_duration_ms: 500
    max_datagram_size: 65535
    eviction_policy: 'hard_cap'
    oversize_check: 'incremental'
    traffic_class_check: 'ecn'
    report_time_exceeded: true
    pressure_drain: 'all'
    hash_buckets: 64
    max_fragments: ~
    max_queues: ~
"#
}

/// Reassembly settings for both protocols
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReassemblyConfig {
    pub memory_budget_clusters: u32,
    pub ipv4: ProtocolPolicy,
    pub ipv6: ProtocolPolicy,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            memory_budget_clusters: DEFAULT_MEMORY_BUDGET_CLUSTERS,
            ipv4: ProtocolPolicy::ipv4(),
            ipv6: ProtocolPolicy::ipv6(),
        }
    }
}

impl ReassemblyConfig {
    fn builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        config::Config::builder().add_source(config::File::from_str(
            default_config_yaml(),
            config::FileFormat::Yaml,
        ))
    }

    fn finish(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> EyreResult<Self> {
        let settings: Self = builder
            .build()
            .wrap_err("failed to build reassembly config")?
            .try_deserialize()
            .wrap_err("failed to deserialize reassembly config")?;
        settings.validate()?;
        Ok(settings)
    }

    /// The built-in defaults
    pub fn load_default() -> EyreResult<Self> {
        Self::finish(Self::builder())
    }

    /// Defaults overlaid with a YAML file; keys absent from the file keep their defaults
    pub fn load(config_file: &Path) -> EyreResult<Self> {
        let Some(config_file_str) = config_file.to_str() else {
            bail!("config file path is not valid UTF-8");
        };
        let builder = Self::builder().add_source(config::File::new(
            config_file_str,
            config::FileFormat::Yaml,
        ));
        Self::finish(builder).wrap_err_with(|| format!("loading {}", config_file.display()))
    }

    /// Overlay a YAML document on the defaults
    pub fn from_yaml_str(yaml: &str) -> EyreResult<Self> {
        Self::finish(
            Self::builder().add_source(config::File::from_str(yaml, config::FileFormat::Yaml)),
        )
    }

    /// Parse a complete JSON document
    pub fn from_json_str(json: &str) -> EyreResult<Self> {
        let settings: Self =
            serde_json::from_str(json).wrap_err("failed to parse reassembly config")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json_string(&self) -> EyreResult<String> {
        serde_json::to_string_pretty(self).wrap_err("failed to serialize reassembly config")
    }

    pub fn validate(&self) -> EyreResult<()> {
        self.ipv4.validate().wrap_err("invalid ipv4 policy")?;
        self.ipv6.validate().wrap_err("invalid ipv6 policy")?;
        if self.ipv4.family != ProtocolFamily::V4 {
            bail!("ipv4 policy has family {}", self.ipv4.family);
        }
        if self.ipv6.family != ProtocolFamily::V6 {
            bail!("ipv6 policy has family {}", self.ipv6.family);
        }
        Ok(())
    }

    pub fn memory_budget(&self) -> MemoryBudget {
        MemoryBudget::new(self.memory_budget_clusters)
    }
}
