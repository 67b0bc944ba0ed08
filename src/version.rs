const fn unwrap_or_cargo_version(opt: Option<&'static str>) -> &'static str {
    match opt {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

/// Build version, overridable at compile time through `QUOTAWATCH_VERSION`.
pub const VERSION: &str = unwrap_or_cargo_version(option_env!("QUOTAWATCH_VERSION"));
