//! Chip-level system control: restart and reset-cause reporting.
//!
//! - **`target_os = "espidf"`**: `esp_restart()` / `esp_reset_reason()`.
//! - **all other targets**: the process exits in place of a restart.

use log::warn;

use crate::app::RestartReason;

/// Restart the chip. Never returns.
#[cfg(target_os = "espidf")]
pub fn restart(reason: RestartReason) -> ! {
    warn!("Restarting: {}", reason);
    // Give the UART a moment to drain the line above.
    esp_idf_hal::delay::FreeRtos::delay_ms(100);
    esp_idf_hal::reset::restart()
}

#[cfg(not(target_os = "espidf"))]
pub fn restart(reason: RestartReason) -> ! {
    warn!("Restarting (sim): {}", reason);
    std::process::exit(0)
}

/// Cause of the most recent reset, for the boot banner.
#[cfg(target_os = "espidf")]
pub fn last_reset_reason() -> &'static str {
    use esp_idf_svc::sys::*;

    // SAFETY: reads a value latched by the ROM at boot.
    #[allow(non_upper_case_globals)]
    match unsafe { esp_reset_reason() } {
        esp_reset_reason_t_ESP_RST_POWERON => "power-on",
        esp_reset_reason_t_ESP_RST_SW => "software restart",
        esp_reset_reason_t_ESP_RST_PANIC => "panic",
        esp_reset_reason_t_ESP_RST_INT_WDT
        | esp_reset_reason_t_ESP_RST_TASK_WDT
        | esp_reset_reason_t_ESP_RST_WDT => "watchdog",
        esp_reset_reason_t_ESP_RST_BROWNOUT => "brownout",
        esp_reset_reason_t_ESP_RST_DEEPSLEEP => "deep sleep wake",
        _ => "unknown",
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn last_reset_reason() -> &'static str {
    "power-on"
}
