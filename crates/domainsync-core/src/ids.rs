use rand::Rng;

/// Generate a run-scoped identifier of the form `{prefix}_{unix-millis}_{hex}`.
///
/// Plan ids and update ids share this shape so that log lines and snapshot
/// keys sort chronologically when listed.
pub fn generate_id(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..0xff_ffff);
    format!("{}_{}_{:06x}", prefix, millis, suffix)
}
