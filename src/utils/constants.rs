/// Default paths, commands and timings for the redeploy workflow
///
/// Every value here can be overridden through `redeploy.toml` or CLI flags.

/// Directory (relative to the project root) that holds one subdirectory per backup
pub const DEFAULT_BACKUP_ROOT: &str = "backups";

/// Prefix of every backup directory name
pub const BACKUP_DIR_PREFIX: &str = "backup_";

/// Sortable timestamp format used in backup directory names
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_LOGS_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "global_config.yml";
pub const DEFAULT_DATABASE_FILE: &str = "data/xianyu_data.db";

// Source control
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_BRANCH: &str = "main";

/// Wait between `up -d` and the liveness check
pub const DEFAULT_SETTLE_DELAY: &str = "10s";

/// Number of aggregated log lines printed when the liveness check fails
pub const DEFAULT_LOG_TAIL_LINES: usize = 20;

/// Project-local configuration file name
pub const LOCAL_CONFIG_FILE: &str = "redeploy.toml";

/// Application directory under the user config dir
pub const APP_CONFIG_DIR: &str = "redeploy";

/// Command shown in the summary for following logs
pub const LOG_FOLLOW_COMMAND: &str = "docker compose logs -f";
