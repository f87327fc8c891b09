//! Validation helpers for recorder settings.
use std::ops::RangeInclusive;

use crate::config::{MAX_AGGREGATE_SCAN_RATE, MAX_CHANNELS};

/// Log levels accepted in configuration files.
pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Log output formats accepted in configuration files.
pub const VALID_LOG_FORMATS: [&str; 3] = ["pretty", "compact", "json"];

/// Validates if a given value is within a specified numeric range.
///
/// # Arguments
///
/// * `value` - The value to validate.
/// * `range` - The inclusive range to validate against.
///
/// # Returns
///
/// * `Ok(())` if the value is within the range.
/// * `Err(&'static str)` if the value is outside the range.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the specified range")
    }
}

/// Validates the number of acquired channels (1..=8).
pub fn is_valid_channel_count(num_channels: usize) -> Result<(), &'static str> {
    is_in_range(num_channels, 1..=MAX_CHANNELS)
        .map_err(|_| "Channel count must be between 1 and 8")
}

/// Validates a per-channel sampling rate against the aggregate scan bound.
///
/// The hardware shares `250000` conversions per second between all active channels,
/// so the per-channel rate may not exceed `250000 / num_channels`.
pub fn is_valid_sampling_rate(rate_hz: u32, num_channels: usize) -> Result<(), String> {
    if rate_hz == 0 {
        return Err("Sampling rate must be greater than 0 Hz".to_string());
    }
    let channels = num_channels.max(1) as u32;
    let limit = MAX_AGGREGATE_SCAN_RATE / channels;
    if rate_hz > limit {
        return Err(format!(
            "Sampling rate {rate_hz} Hz exceeds {limit} Hz for {num_channels} channel(s)"
        ));
    }
    Ok(())
}

/// Validates a voltage range. Bounds need not be symmetric, but must be finite and ordered.
pub fn is_valid_voltage_range(min: f64, max: f64) -> Result<(), &'static str> {
    if !min.is_finite() || !max.is_finite() {
        return Err("Voltage bounds must be finite");
    }
    if min >= max {
        return Err("Minimum voltage must be below maximum voltage");
    }
    Ok(())
}

/// Validates a log level name (case insensitive).
pub fn is_valid_log_level(level: &str) -> Result<(), &'static str> {
    if VALID_LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err("Log level must be one of: trace, debug, info, warn, error")
    }
}

/// Validates a log output format name (case insensitive).
pub fn is_valid_log_format(format: &str) -> Result<(), &'static str> {
    if VALID_LOG_FORMATS.contains(&format.to_lowercase().as_str()) {
        Ok(())
    } else {
        Err("Log format must be one of: pretty, compact, json")
    }
}

/// Validates if a given string is a valid file path.
pub fn is_valid_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("File path cannot be empty");
    }
    if path.contains('\0') {
        return Err("File path cannot contain null bytes");
    }
    Ok(())
}
