//! FFI bindings for Vibe Flux
//!
//! C-compatible entry points for the pure computations. Structured inputs and
//! outputs are JSON strings. Every returned string is allocated here and must
//! be freed with `vibe_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;

use serde::Serialize;

use crate::analyzer::AnalysisProcessor;
use crate::indicator::classify;
use crate::presets::LocationType;
use crate::resonance::{
    check_badges, detect_rank_up, format_vibrations, rank_progress, AccrualContext,
    PointsBreakdown, UserAccrualState,
};
use crate::types::{MeasurementResult, Sample, MAX_DURATION_SECONDS, MIN_DURATION_SECONDS};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Serialize `value`, recording failures as the last error
fn to_json_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Scoring
// ============================================================================

/// Analyze a JSON array of samples and return the measurement result JSON.
///
/// # Safety
/// - `samples_json` must be a valid null-terminated C string.
/// - `location_type` may be NULL (default bands) or a location type name such as "library".
/// - Returns a newly allocated string that must be freed with `vibe_free_string`.
/// - Returns NULL on error; call `vibe_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vibe_analyze_samples(
    samples_json: *const c_char,
    duration_seconds: u32,
    location_type: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(samples_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid samples string pointer");
            return ptr::null_mut();
        }
    };

    if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&duration_seconds) {
        set_last_error(&format!(
            "duration_seconds must be between {MIN_DURATION_SECONDS} and {MAX_DURATION_SECONDS}"
        ));
        return ptr::null_mut();
    }

    let samples: Vec<Sample> = match serde_json::from_str(&json_str) {
        Ok(samples) => samples,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let mut processor = AnalysisProcessor::new(duration_seconds);
    if !location_type.is_null() {
        let parsed = cstr_to_string(location_type)
            .ok_or_else(|| "Invalid location_type string pointer".to_string())
            .and_then(|s| s.parse::<LocationType>().map_err(|e| e.to_string()));
        match parsed {
            Ok(location) => processor = processor.for_location(location),
            Err(msg) => {
                set_last_error(&msg);
                return ptr::null_mut();
            }
        }
    }

    match processor.analyze(&samples) {
        Ok(result) => to_json_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Classify a vibe score (0-100) and return the indicator JSON.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `vibe_free_string`.
/// - Returns NULL if `vibe_score` is outside 0-100.
#[no_mangle]
pub unsafe extern "C" fn vibe_classify(vibe_score: c_int) -> *mut c_char {
    clear_last_error();

    match u8::try_from(vibe_score) {
        Ok(score) if score <= 100 => to_json_cstr(&classify(score)),
        _ => {
            set_last_error("vibe_score must be between 0 and 100");
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Accrual
// ============================================================================

/// Vibrations earned by a measurement with the given score and context.
///
/// # Safety
/// - Returns -1 if `vibe_score` is outside 0-100; call `vibe_last_error`.
#[no_mangle]
pub unsafe extern "C" fn vibe_calculate_points(
    vibe_score: c_int,
    is_first_today: bool,
    is_new_location: bool,
    streak_days: u32,
) -> i64 {
    clear_last_error();

    let score = match u8::try_from(vibe_score) {
        Ok(score) if score <= 100 => score,
        _ => {
            set_last_error("vibe_score must be between 0 and 100");
            return -1;
        }
    };
    let context = AccrualContext {
        is_first_today,
        is_new_location,
    };
    let total = PointsBreakdown::compute(score, &context, streak_days).total;
    i64::try_from(total).unwrap_or(i64::MAX)
}

/// Rank progress JSON for a vibrations total on the standard ladder.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `vibe_free_string`.
#[no_mangle]
pub unsafe extern "C" fn vibe_rank_progress(vibrations: u64) -> *mut c_char {
    clear_last_error();
    to_json_cstr(&rank_progress(vibrations))
}

/// Rank reached by moving from `old_vibrations` to `new_vibrations`.
///
/// # Safety
/// - Returns a newly allocated rank JSON that must be freed with `vibe_free_string`.
/// - Returns NULL with no last error when there is no rank-up.
#[no_mangle]
pub unsafe extern "C" fn vibe_detect_rank_up(old_vibrations: u64, new_vibrations: u64) -> *mut c_char {
    clear_last_error();
    match detect_rank_up(old_vibrations, new_vibrations) {
        Some(rank) => to_json_cstr(rank),
        None => ptr::null_mut(),
    }
}

/// Newly earned badges for a user state and measurement result.
///
/// # Safety
/// - `state_json` and `result_json` must be valid null-terminated C strings.
/// - Returns a newly allocated JSON array that must be freed with `vibe_free_string`.
/// - Returns NULL on error; call `vibe_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn vibe_check_badges(
    state_json: *const c_char,
    result_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let (state_str, result_str) = match (cstr_to_string(state_json), cstr_to_string(result_json)) {
        (Some(state), Some(result)) => (state, result),
        _ => {
            set_last_error("Invalid state or result string pointer");
            return ptr::null_mut();
        }
    };

    let parsed = serde_json::from_str::<UserAccrualState>(&state_str).and_then(|state| {
        serde_json::from_str::<MeasurementResult>(&result_str).map(|result| (state, result))
    });
    match parsed {
        Ok((state, result)) => to_json_cstr(&check_badges(&state, &result)),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Compact display of a vibrations total ("1.5K").
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `vibe_free_string`.
#[no_mangle]
pub unsafe extern "C" fn vibe_format_vibrations(vibrations: u64) -> *mut c_char {
    string_to_cstr(&format_vibrations(vibrations))
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a Vibe function.
///
/// # Safety
/// - `s` must be a pointer returned by a Vibe function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn vibe_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Vibe function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn vibe_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn vibe_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        vibe_free_string(ptr);
        s
    }

    fn steady_samples_json(count: usize) -> CString {
        let samples: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"timestamp": {}, "sound": 50.0, "light": 400.0, "motion": {{"x": 0.0, "y": 0.0, "z": 9.8}}}}"#,
                    i * 100
                )
            })
            .collect();
        CString::new(format!("[{}]", samples.join(","))).unwrap()
    }

    #[test]
    fn test_ffi_analyze_samples() {
        let json = steady_samples_json(50);
        unsafe {
            let out = take_string(vibe_analyze_samples(json.as_ptr(), 5, ptr::null()));
            let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
            assert_eq!(parsed["vibe_score"], 100);
            assert_eq!(parsed["comfort_rating"], 10);
            assert_eq!(parsed["frequency_data"].as_array().unwrap().len(), 5);
        }
    }

    #[test]
    fn test_ffi_analyze_with_location() {
        let json = steady_samples_json(50);
        let library = CString::new("library").unwrap();
        let unknown = CString::new("moon").unwrap();
        unsafe {
            let out = take_string(vibe_analyze_samples(json.as_ptr(), 5, library.as_ptr()));
            let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
            // 50 dB is loud for a library
            assert!(parsed["sound_score"].as_u64().unwrap() < 100);

            assert!(vibe_analyze_samples(json.as_ptr(), 5, unknown.as_ptr()).is_null());
            assert!(!vibe_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_error_handling() {
        let empty = CString::new("[]").unwrap();
        let invalid = CString::new("not json").unwrap();
        unsafe {
            assert!(vibe_analyze_samples(invalid.as_ptr(), 17, ptr::null()).is_null());
            let error = CStr::from_ptr(vibe_last_error()).to_str().unwrap();
            assert!(!error.is_empty());

            assert!(vibe_analyze_samples(empty.as_ptr(), 17, ptr::null()).is_null());
            assert!(vibe_analyze_samples(empty.as_ptr(), 60, ptr::null()).is_null());
            assert!(vibe_analyze_samples(ptr::null(), 17, ptr::null()).is_null());
        }
    }

    #[test]
    fn test_ffi_points() {
        unsafe {
            assert_eq!(vibe_calculate_points(95, true, true, 10), 70);
            assert_eq!(vibe_calculate_points(50, false, false, 0), 10);
            assert_eq!(vibe_calculate_points(101, false, false, 0), -1);
            assert_eq!(vibe_calculate_points(-3, false, false, 0), -1);
            assert!(!vibe_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_ranks() {
        unsafe {
            let progress = take_string(vibe_rank_progress(300));
            let parsed: serde_json::Value = serde_json::from_str(&progress).unwrap();
            assert_eq!(parsed["current"]["name"], "Sensor");
            assert_eq!(parsed["to_next"], 200);

            assert!(vibe_detect_rank_up(100, 150).is_null());
            assert!(vibe_last_error().is_null());
            let rank = take_string(vibe_detect_rank_up(90, 120));
            assert!(rank.contains("\"Sensor\""));
        }
    }

    #[test]
    fn test_ffi_badges_and_display() {
        let state = CString::new(r#"{"user_id": "u1", "total_measurements": 1}"#).unwrap();
        let result = CString::new(
            r#"{"sound_db": 50.0, "light_lux": 400.0, "stability_percent": 100.0,
                "sound_score": 100, "light_score": 100, "stability_score": 100,
                "vibe_score": 100, "comfort_rating": 10, "frequency_data": [],
                "duration_seconds": 17, "sample_count": 170,
                "created_at": "2024-01-15T12:00:00Z"}"#,
        )
        .unwrap();
        unsafe {
            let badges = take_string(vibe_check_badges(state.as_ptr(), result.as_ptr()));
            let parsed: serde_json::Value = serde_json::from_str(&badges).unwrap();
            let ids: Vec<&str> = parsed
                .as_array()
                .unwrap()
                .iter()
                .map(|b| b["id"].as_str().unwrap())
                .collect();
            assert_eq!(ids, vec!["first_vibe", "perfect_10"]);

            let indicator = take_string(vibe_classify(80));
            assert!(indicator.contains("Great Vibe"));
            assert!(vibe_classify(101).is_null());

            assert_eq!(take_string(vibe_format_vibrations(1500)), "1.5K");
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = vibe_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
