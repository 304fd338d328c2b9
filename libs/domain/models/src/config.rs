//! The single JSON configuration document the operator hands SPECTRA
//! at startup.
//!
//! Unknown top-level sections are ignored; unknown keys inside a known
//! section produce a `ConfigWarning` rather than a hard failure. This is
//! implemented by round-tripping through `serde_json::Value` and diffing
//! the known-field set, rather than `serde(deny_unknown_fields)`,
//! because an operator typo should warn, not take the process down.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfigEntry {
    pub api_id: i32,
    pub api_hash: String,
    pub session_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigProxyType {
    Direct,
    Socks5,
    Http,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "type", default = "default_proxy_type")]
    pub proxy_type: ConfigProxyType,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub rotation: Option<String>,
}

fn default_proxy_type() -> ConfigProxyType {
    ConfigProxyType::Direct
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            enabled: false,
            proxy_type: ConfigProxyType::Direct,
            host: String::new(),
            port: 0,
            username: None,
            password: None,
            rotation: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArchiveConfig {
    #[serde(default = "default_true")]
    pub download_media: bool,
    #[serde(default)]
    pub download_avatars: bool,
    #[serde(default)]
    pub archive_topics: bool,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default)]
    pub media_types: Vec<String>,
}

fn default_max_file_size_mb() -> u64 {
    500
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            download_media: true,
            download_avatars: false,
            archive_topics: false,
            max_file_size_mb: default_max_file_size_mb(),
            media_types: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InvitationDelaysConfig {
    #[serde(default = "default_invite_min_seconds")]
    pub min_seconds: u64,
    #[serde(default = "default_invite_max_seconds")]
    pub max_seconds: u64,
    #[serde(default = "default_invite_variance")]
    pub variance: f64,
}

fn default_invite_min_seconds() -> u64 {
    120
}
fn default_invite_max_seconds() -> u64 {
    600
}
fn default_invite_variance() -> f64 {
    0.3
}

impl Default for InvitationDelaysConfig {
    fn default() -> Self {
        InvitationDelaysConfig {
            min_seconds: default_invite_min_seconds(),
            max_seconds: default_invite_max_seconds(),
            variance: default_invite_variance(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardingConfig {
    #[serde(default = "default_true")]
    pub enable_deduplication: bool,
    #[serde(default)]
    pub secondary_unique_destination: Option<i64>,
    #[serde(default)]
    pub auto_invite_accounts: bool,
    #[serde(default)]
    pub invitation_delays: InvitationDelaysConfig,
    #[serde(default)]
    pub forward_to_all_saved: Option<bool>,
    #[serde(default)]
    pub copy_into_destination: Option<bool>,
    #[serde(default)]
    pub prepend_origin_info: Option<bool>,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        ForwardingConfig {
            enable_deduplication: true,
            secondary_unique_destination: None,
            auto_invite_accounts: false,
            invitation_delays: InvitationDelaysConfig::default(),
            forward_to_all_saved: None,
            copy_into_destination: None,
            prepend_origin_info: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeduplicationConfig {
    #[serde(default)]
    pub enable_near_duplicates: bool,
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_hash_similarity_threshold: u8,
    #[serde(default = "default_phash_threshold")]
    pub perceptual_hash_distance_threshold: u32,
}

fn default_fuzzy_threshold() -> u8 {
    85
}
fn default_phash_threshold() -> u32 {
    6
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        DeduplicationConfig {
            enable_near_duplicates: false,
            fuzzy_hash_similarity_threshold: default_fuzzy_threshold(),
            perceptual_hash_distance_threshold: default_phash_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_discovery_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub include_private: bool,
    #[serde(default = "default_true")]
    pub include_public: bool,
}

fn default_discovery_max_messages() -> u32 {
    1000
}
fn default_discovery_max_depth() -> u32 {
    2
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            max_messages: default_discovery_max_messages(),
            max_depth: default_discovery_max_depth(),
            include_private: false,
            include_public: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_message_delay_seconds")]
    pub message_delay_seconds: f64,
    #[serde(default = "default_join_delay_seconds")]
    pub join_delay_seconds: f64,
}

fn default_message_delay_seconds() -> f64 {
    0.5
}
fn default_join_delay_seconds() -> f64 {
    30.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            message_delay_seconds: default_message_delay_seconds(),
            join_delay_seconds: default_join_delay_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParallelConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_max_workers")]
    pub max_workers: u32,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn default_max_workers() -> u32 {
    4
}

impl Default for ParallelConfig {
    fn default() -> Self {
        ParallelConfig {
            enabled: true,
            max_workers: default_max_workers(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    RoundRobin,
    Smart,
    Pinned,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountRotationConfig {
    #[serde(default = "default_rotation_mode")]
    pub mode: RotationMode,
    #[serde(default = "default_cooldown_hours")]
    pub cooldown_hours: f64,
    #[serde(default = "default_max_ops_per_account")]
    pub max_operations_per_account: u64,
    #[serde(default = "default_flood_wait_multiplier")]
    pub flood_wait_multiplier: f64,
}

fn default_rotation_mode() -> RotationMode {
    RotationMode::Smart
}
fn default_cooldown_hours() -> f64 {
    1.0
}
fn default_max_ops_per_account() -> u64 {
    1000
}
fn default_flood_wait_multiplier() -> f64 {
    1.5
}

impl Default for AccountRotationConfig {
    fn default() -> Self {
        AccountRotationConfig {
            mode: default_rotation_mode(),
            cooldown_hours: default_cooldown_hours(),
            max_operations_per_account: default_max_ops_per_account(),
            flood_wait_multiplier: default_flood_wait_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "spectra.db".to_string()
}

impl Default for DbConfig {
    fn default() -> Self {
        DbConfig { path: default_db_path() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), file: None }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpectraConfig {
    #[serde(default)]
    pub accounts: Vec<AccountConfigEntry>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
    #[serde(default)]
    pub deduplication: DeduplicationConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub parallel: ParallelConfig,
    #[serde(default)]
    pub account_rotation: AccountRotationConfig,
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub default_forwarding_destination_id: Option<i64>,
}

impl Default for SpectraConfig {
    fn default() -> Self {
        SpectraConfig {
            accounts: Vec::new(),
            proxy: ProxyConfig::default(),
            archive: ArchiveConfig::default(),
            forwarding: ForwardingConfig::default(),
            deduplication: DeduplicationConfig::default(),
            discovery: DiscoveryConfig::default(),
            parallel: ParallelConfig::default(),
            account_rotation: AccountRotationConfig::default(),
            db: DbConfig::default(),
            logging: LoggingConfig::default(),
            default_forwarding_destination_id: None,
        }
    }
}

/// Resolved near-duplicate thresholds after applying the operator's
/// precedence rule (see DESIGN.md): `deduplication` wins over
/// `forwarding` when both name a threshold.
#[derive(Debug, Clone, Copy)]
pub struct NearDuplicateThresholds {
    pub perceptual_hash_distance: u32,
    pub fuzzy_similarity: u8,
}

impl SpectraConfig {
    pub fn near_duplicate_thresholds(&self) -> NearDuplicateThresholds {
        NearDuplicateThresholds {
            perceptual_hash_distance: self.deduplication.perceptual_hash_distance_threshold,
            fuzzy_similarity: self.deduplication.fuzzy_hash_similarity_threshold,
        }
    }

    pub fn forward_to_all_saved(&self) -> bool {
        self.forwarding.forward_to_all_saved.unwrap_or(false)
    }

    pub fn copy_into_destination(&self) -> bool {
        self.forwarding.copy_into_destination.unwrap_or(false)
    }

    pub fn prepend_origin_info(&self) -> bool {
        self.forwarding.prepend_origin_info.unwrap_or(false)
    }

    /// Applies `TG_API_ID` / `TG_API_HASH` environment overrides to every
    /// configured account, taking precedence over file values.
    pub fn apply_env_overrides(&mut self) {
        let env_api_id = std::env::var("TG_API_ID").ok().and_then(|v| v.parse::<i32>().ok());
        let env_api_hash = std::env::var("TG_API_HASH").ok();
        for account in &mut self.accounts {
            if let Some(id) = env_api_id {
                account.api_id = id;
            }
            if let Some(ref hash) = env_api_hash {
                account.api_hash = hash.clone();
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub section: String,
    pub key: String,
}

/// Recognised top-level section names — anything else is silently
/// ignored.
const KNOWN_TOP_LEVEL_SECTIONS: &[&str] = &[
    "accounts",
    "proxy",
    "archive",
    "forwarding",
    "deduplication",
    "discovery",
    "parallel",
    "account_rotation",
    "db",
    "logging",
    "default_forwarding_destination_id",
];

const KNOWN_KEYS_BY_SECTION: &[(&str, &[&str])] = &[
    ("proxy", &["enabled", "type", "host", "port", "username", "password", "rotation"]),
    ("archive", &["download_media", "download_avatars", "archive_topics", "max_file_size_mb", "media_types"]),
    (
        "forwarding",
        &[
            "enable_deduplication",
            "secondary_unique_destination",
            "auto_invite_accounts",
            "invitation_delays",
            "forward_to_all_saved",
            "copy_into_destination",
            "prepend_origin_info",
        ],
    ),
    ("deduplication", &["enable_near_duplicates", "fuzzy_hash_similarity_threshold", "perceptual_hash_distance_threshold"]),
    ("discovery", &["max_messages", "max_depth", "include_private", "include_public"]),
    ("parallel", &["enabled", "max_workers", "rate_limit"]),
    ("account_rotation", &["mode", "cooldown_hours", "max_operations_per_account", "flood_wait_multiplier"]),
    ("db", &["path"]),
    ("logging", &["level", "file"]),
];

/// Parses the configuration document, returning the typed config plus
/// any warnings about unrecognised keys inside known sections — an
/// unknown key inside a known section is a warning, not a failure.
pub fn load_config(raw_json: &str) -> Result<(SpectraConfig, Vec<ConfigWarning>), serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(raw_json)?;
    let mut warnings = Vec::new();

    if let serde_json::Value::Object(top) = &value {
        for (section_name, section_value) in top {
            if !KNOWN_TOP_LEVEL_SECTIONS.contains(&section_name.as_str()) {
                continue; // unknown sections are ignored entirely
            }
            if let Some((_, known_keys)) = KNOWN_KEYS_BY_SECTION.iter().find(|(s, _)| s == section_name) {
                if let serde_json::Value::Object(section_map) = section_value {
                    let known: BTreeSet<&str> = known_keys.iter().copied().collect();
                    for key in section_map.keys() {
                        if !known.contains(key.as_str()) {
                            warnings.push(ConfigWarning { section: section_name.clone(), key: key.clone() });
                        }
                    }
                }
            }
        }
    }

    let mut config: SpectraConfig = serde_json::from_value(value)?;
    config.apply_env_overrides();
    Ok((config, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SpectraConfig::default();
        assert_eq!(config.db.path, "spectra.db");
        assert_eq!(config.account_rotation.mode, RotationMode::Smart);
    }

    #[test]
    fn unknown_top_level_section_is_ignored() {
        let json = r#"{"something_new": {"a": 1}}"#;
        let (_config, warnings) = load_config(json).unwrap();
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_key_in_known_section_warns() {
        let json = r#"{"db": {"path": "x.db", "mystery_key": true}}"#;
        let (config, warnings) = load_config(json).unwrap();
        assert_eq!(config.db.path, "x.db");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].section, "db");
        assert_eq!(warnings[0].key, "mystery_key");
    }

    #[test]
    fn deduplication_precedence_over_forwarding_thresholds() {
        let config = SpectraConfig::default();
        let thresholds = config.near_duplicate_thresholds();
        assert_eq!(thresholds.perceptual_hash_distance, 6);
        assert_eq!(thresholds.fuzzy_similarity, 85);
    }
}
