//! Core constants shared by the permalink, layer and import modules.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// Viewport width (CSS pixels) under which the viewer switches to its phone layout.
pub const PHONE_BREAKPOINT_PX: u32 = 576;

/// Delay before a burst of store changes is written back to the URL.
pub const URL_DEBOUNCE_MS: u64 = 300;

/// Offset between LV03 and LV95 easting.
pub const LV03_TO_LV95_EAST_OFFSET: f64 = 2_000_000.0;

/// Offset between LV03 and LV95 northing.
pub const LV03_TO_LV95_NORTH_OFFSET: f64 = 1_000_000.0;

/// LV95 extent served by the viewer (min east, min north, max east, max north).
pub const LV95_EXTENT: [f64; 4] = [2_420_000.0, 1_030_000.0, 2_900_000.0, 1_350_000.0];

/// Same extent expressed in WGS84 degrees (min lon, min lat, max lon, max lat).
pub const LV95_EXTENT_WGS84: [f64; 4] = [5.140_242, 45.398_181, 11.477_44, 48.230_651];

/// Decimal places kept for WGS84 coordinates coming from legacy permalinks.
pub const WGS84_PRECISION: i32 = 6;

/// Decimal places kept for metric coordinates written to the URL.
pub const METRIC_PRECISION: i32 = 2;

/// Decimal places kept for zoom levels written to the URL.
pub const ZOOM_PRECISION: i32 = 3;

/// Pitch of a camera looking straight down, in degrees.
pub const TOP_DOWN_PITCH: f64 = -90.0;

/// Longest feature description kept after sanitization.
pub const MAX_DESCRIPTION_LENGTH: usize = 4000;

/// Appended to a description cut at [`MAX_DESCRIPTION_LENGTH`].
pub const TRUNCATION_PLACEHOLDER: &str = "[...]";

/// Hosts whose iframes survive description sanitization (suffix match).
pub const TRUSTED_IFRAME_HOSTS: &[&str] = &["admin.ch", "swisstopo.ch", "geo.admin.ch"];

/// Largest import accepted, in bytes.
pub const MAX_IMPORT_SIZE_BYTES: usize = 250 * 1024 * 1024;

/// Background id meaning "no background".
pub const VOID_BACKGROUND: &str = "void";

/// Background id used by legacy permalinks for "no background".
pub const LEGACY_VOID_BACKGROUND: &str = "voidLayer";

pub const DEFAULT_LANG: &str = "en";
pub const DEFAULT_TOPIC: &str = "ech";
pub const DEFAULT_BACKGROUND: &str = "ch.swisstopo.pixelkarte-farbe";

/// Center of the LV95 extent, used when the URL carries no position.
pub const DEFAULT_CENTER: (f64, f64) = (2_660_000.0, 1_190_000.0);
pub const DEFAULT_ZOOM: f64 = 1.0;
