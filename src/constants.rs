/// Warning verbosity handed to every backend.
pub const WARNING_LEVEL: u8 = 2;

pub const MANIFEST_SYMBOL: &[u8] = b"dyncode_manifest\0";
pub const INVOKE_SYMBOL: &[u8] = b"dyncode_invoke\0";
pub const FREE_SYMBOL: &[u8] = b"dyncode_free\0";

pub const RESOURCES_TABLE: &str = "EMBEDDED_RESOURCES";

pub const RUSTC_ENV: &str = "DYNCODE_RUSTC";
pub const WORK_DIR_ENV: &str = "DYNCODE_WORK_DIR";
pub const EDITION_ENV: &str = "DYNCODE_EDITION";
pub const COMPILE_TIMEOUT_ENV: &str = "DYNCODE_COMPILE_TIMEOUT_MS";

pub const DEFAULT_RUSTC: &str = "rustc";
pub const DEFAULT_EDITION: &str = "2021";
