// Stable error codes surfaced to API clients

pub mod configuration {
    pub const INVALID_SETTING: &str = "CONFIG_1001";
}

pub mod module {
    pub const LIFECYCLE_FAILED: &str = "MODULE_2001";
    pub const NOT_FOUND: &str = "MODULE_2002";
    pub const CONFLICT: &str = "MODULE_2003";
}

pub mod plugin {
    pub const LOAD_FAILED: &str = "PLUGIN_3001";
}

pub mod integrity {
    pub const TAG_MISMATCH: &str = "INTEGRITY_4001";
}

pub mod crypto {
    pub const OPERATION_FAILED: &str = "CRYPTO_5001";
}

pub mod cache {
    pub const PROVIDER_FAILED: &str = "CACHE_6001";
}

pub mod event {
    pub const DISPATCH_FAILED: &str = "EVENT_7001";
}

pub mod internal {
    pub const UNEXPECTED: &str = "INTERNAL_9001";
}
