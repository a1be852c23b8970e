//! User-Agent Parsing
//!
//! Best-effort extraction of device/browser/OS descriptors from a raw
//! User-Agent string for the "logged-in devices" listing. Accuracy is not a
//! correctness property; the parser is swappable (see
//! [`crate::service::SessionService`], which takes it as a plain function).

use crate::models::session::DeviceInfo;

/// Parse a User-Agent string into best-effort device descriptors.
///
/// Unknown or empty input yields all-`None` fields rather than an error.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    if user_agent.trim().is_empty() {
        return DeviceInfo::default();
    }

    // Order matters: Chrome-derived browsers keep "Chrome" in their UA.
    let browser = if user_agent.contains("Edg/") || user_agent.contains("Edge/") {
        Some("Edge")
    } else if user_agent.contains("OPR/") || user_agent.contains("Opera") {
        Some("Opera")
    } else if user_agent.contains("Chrome/") {
        Some("Chrome")
    } else if user_agent.contains("Firefox/") {
        Some("Firefox")
    } else if user_agent.contains("Safari/") {
        Some("Safari")
    } else if user_agent.contains("curl/") {
        Some("curl")
    } else {
        None
    };

    let os = if user_agent.contains("Windows") {
        Some("Windows")
    } else if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        Some("iOS")
    } else if user_agent.contains("Mac OS X") || user_agent.contains("Macintosh") {
        Some("macOS")
    } else if user_agent.contains("Android") {
        Some("Android")
    } else if user_agent.contains("Linux") {
        Some("Linux")
    } else {
        None
    };

    let device = if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        Some("Tablet")
    } else if user_agent.contains("Mobile")
        || user_agent.contains("iPhone")
        || user_agent.contains("Android")
    {
        Some("Mobile")
    } else {
        Some("Desktop")
    };

    DeviceInfo {
        device: device.map(str::to_string),
        browser: browser.map(str::to_string),
        os: os.map(str::to_string),
    }
}
