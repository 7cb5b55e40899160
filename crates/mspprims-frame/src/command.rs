//! Well-known command IDs.
//!
//! v1 frames carry an 8-bit command, so the IDs the host sends live in the
//! single-byte space. v2 frames widen the field to 16 bits.

/// Firmware identifier ("INAV", "BTFL", ...).
pub const FC_VARIANT: u8 = 2;

/// Firmware version triple.
pub const FC_VERSION: u8 = 3;

/// Reboot the controller.
pub const REBOOT: u8 = 68;

/// Free-form debug text pushed by the controller.
pub const DEBUG_MSG: u8 = 253;

/// Synthetic command marking the end of a session's message stream.
pub const CLOSED: u16 = 0xFFFF;

/// Returns a human-readable name for a command ID.
pub fn command_name(id: u16) -> &'static str {
    if id == CLOSED {
        return "CLOSED";
    }
    match u8::try_from(id) {
        Ok(FC_VARIANT) => "FC_VARIANT",
        Ok(FC_VERSION) => "FC_VERSION",
        Ok(REBOOT) => "REBOOT",
        Ok(DEBUG_MSG) => "DEBUG_MSG",
        _ => "UNKNOWN",
    }
}
