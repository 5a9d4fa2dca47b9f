mod slug;

pub use slug::slugify;

use chrono::NaiveDate;

/// Slug of the tag attached to records confirmed present on both sides
pub const SYNC_TAG_SLUG: &str = "ssot-synced-from-infoblox";

/// Display name of the synced tag
pub const SYNC_TAG_NAME: &str = "SSoT Synced from Infoblox";

/// Colour of the synced tag
pub const SYNC_TAG_COLOR: &str = "40bfae";

/// Key of the date-valued custom field holding the last sync date
pub const LAST_SYNCED_FIELD: &str = "ssot-synced-to-nautobot";

/// Label of the last sync date custom field
pub const LAST_SYNCED_LABEL: &str = "Last synced from Infoblox on";

/// Get current timestamp in ISO 8601 format
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Today's date (UTC), used as the "last synced" value
pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}
