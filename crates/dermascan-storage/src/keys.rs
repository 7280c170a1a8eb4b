//! Shared key generation for storage backends.
//!
//! Originals live at `{owner_id}/original/{angle}.{ext}` and are overwritten on
//! each new diagnosis. Resized variants are append-only under
//! `{owner_id}/resized/`.

use dermascan_core::AngleLabel;

/// Key of the original capture for one angle.
pub fn original_key(owner_id: &str, angle: AngleLabel, extension: &str) -> String {
    format!("{}/original/{}.{}", owner_id, angle, normalize_extension(extension))
}

/// Unique key for a resized variant.
///
/// `{owner_id}/resized/{timestamp_ms}-{index}-{rand8}-{angle}.{ext}`
pub fn resized_key(owner_id: &str, index: usize, angle: AngleLabel, extension: &str) -> String {
    let timestamp = chrono::Utc::now().timestamp_millis();
    let suffix = format!("{:08x}", rand::random::<u32>());
    format!(
        "{}/resized/{}-{}-{}-{}.{}",
        owner_id,
        timestamp,
        index,
        suffix,
        angle,
        normalize_extension(extension)
    )
}

fn normalize_extension(extension: &str) -> String {
    let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() {
        "jpg".to_string()
    } else {
        ext
    }
}
