pub const DEFAULT_QUALITY: u8 = 80;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

pub const DEFAULT_EFFORT: u8 = 4;
pub const MAX_EFFORT: u8 = 9;

pub const ZOPFLI_ITERATIONS: u8 = 15;
pub const LIBDEFLATER_MAX_LEVEL: u8 = 12;

/// 0x3FFF x 0x3FFF, the largest image decoded unless `--limit-input-pixels` says otherwise.
pub const DEFAULT_LIMIT_INPUT_PIXELS: u64 = 0x3FFF * 0x3FFF;

/// Splits argv into one segment per chained command.
pub const COMMAND_SEPARATOR: &str = "--";

pub const SUPPORTED_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "avif", "gif", "tif", "tiff", "bmp",
];

pub const PROGRESS_BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}";

// Common output message prefixes
pub const WARNING_PREFIX: &str = "⚠️ ";
pub const ERROR_PREFIX: &str = "❌";
pub const INFO_PREFIX: &str = "📋";
pub const DEBUG_PREFIX: &str = "🔍";
pub const HINT_PREFIX: &str = "💡";
