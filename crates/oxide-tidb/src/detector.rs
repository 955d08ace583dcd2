//! TiDB detection.
//!
//! Three probes are tried in order, each only when the previous one failed
//! or said nothing:
//!
//! 1. `SELECT @@tidb_version`: any non-empty value.
//! 2. `SELECT VERSION()`: contains `TiDB`.
//! 3. `SHOW VARIABLES LIKE 'version_comment'`: the value contains `TiDB`.
//!
//! A failing probe is no signal. The answer is cached on the session.

use oxide_schema::Session;
use tracing::debug;

/// Session capability key for AUTO_RANDOM support.
pub const CAPABILITY: &str = "tidb.auto_random";

const VENDOR: &str = "TiDB";

/// Returns true if the session is connected to TiDB.
pub fn supports_auto_random(session: &mut Session) -> bool {
    session.capability(CAPABILITY, probe)
}

fn probe(session: &mut Session) -> bool {
    match session.select_value("SELECT @@tidb_version") {
        Ok(Some(value)) if !value.trim().is_empty() => {
            debug!(tier = "tidb_version", "TiDB detected");
            return true;
        }
        Ok(_) => debug!(tier = "tidb_version", "no signal"),
        Err(err) => debug!(tier = "tidb_version", error = %err, "probe failed"),
    }

    match session.select_value("SELECT VERSION()") {
        Ok(Some(version)) if version.contains(VENDOR) => {
            debug!(tier = "version", version = %version, "TiDB detected");
            return true;
        }
        Ok(version) => debug!(tier = "version", version = ?version, "no signal"),
        Err(err) => debug!(tier = "version", error = %err, "probe failed"),
    }

    match session.select_rows("SHOW VARIABLES LIKE 'version_comment'") {
        Ok(rows) => {
            let found = rows
                .iter()
                .filter_map(|row| row.get(1).cloned().flatten())
                .any(|value| value.contains(VENDOR));
            debug!(tier = "version_comment", detected = found, "probe finished");
            found
        }
        Err(err) => {
            debug!(tier = "version_comment", error = %err, "probe failed");
            false
        }
    }
}
