//! HID usages, report IDs and the composite report descriptor shared by the
//! USB and BLE transports.

use num_enum::IntoPrimitive;
use usbd_hid::descriptor::generator_prelude::*;

/// Usage code meaning "no event indicated".
pub const NO_EVENT: u8 = 0x00;
/// First modifier usage (left control).
pub const LEFT_CONTROL: u8 = 0xE0;
/// Left shift modifier usage.
pub const LEFT_SHIFT: u8 = 0xE1;
/// Left alt modifier usage.
pub const LEFT_ALT: u8 = 0xE2;
/// Left GUI modifier usage.
pub const LEFT_GUI: u8 = 0xE3;
/// Right control modifier usage.
pub const RIGHT_CONTROL: u8 = 0xE4;
/// Right shift modifier usage.
pub const RIGHT_SHIFT: u8 = 0xE5;
/// Right alt modifier usage.
pub const RIGHT_ALT: u8 = 0xE6;
/// Last modifier usage (right GUI).
pub const RIGHT_GUI: u8 = 0xE7;

/// Maps a modifier usage to its bit in the report modifier byte. Non-modifier
/// usages map to `None`.
#[must_use]
pub const fn modifier_bit(code: u8) -> Option<u8> {
    if code >= LEFT_CONTROL && code <= RIGHT_GUI {
        Some(1 << (code - LEFT_CONTROL))
    } else {
        None
    }
}

/// Report IDs of the extra-key channels in the composite descriptor. The
/// boot-keyboard report travels on its interface without an ID byte.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, IntoPrimitive)]
pub enum ReportId {
    /// System control usages (power, sleep, wake).
    System = 0x02,
    /// Consumer control usages (media keys).
    Consumer = 0x03,
}

/// HostReport describes the composite report layout and its companion
/// descriptor: a boot-compatible keyboard collection plus the system and
/// consumer control collections used for extra-key reports.
#[gen_hid_descriptor(
    (collection = APPLICATION, usage_page = GENERIC_DESKTOP, usage = KEYBOARD) = {
        (usage_page = KEYBOARD, usage_min = 0xE0, usage_max = 0xE7) = {
            #[packed_bits 8] #[item_settings data,variable,absolute] modifier=input;
        };
        (usage_min = 0x00, usage_max = 0xFF) = {
            #[item_settings constant,variable,absolute] reserved=input;
        };
        (usage_page = KEYBOARD, usage_min = 0x00, usage_max = 0xDD) = {
            #[item_settings data,array,absolute] keycodes=input;
        };
    },
    (collection = APPLICATION, usage_page = GENERIC_DESKTOP, usage = SYSTEM_CONTROL) = {
        (report_id = 0x02,) = {
            (usage_min = 0x81, usage_max = 0xB7, logical_min = 1) = {
                #[item_settings data,array,absolute,not_null] system_usage_id=input;
            };
        };
    },
    (collection = APPLICATION, usage_page = CONSUMER, usage = CONSUMER_CONTROL) = {
        (report_id = 0x03,) = {
            (usage_page = CONSUMER, usage_min = 0x00, usage_max = 0x514) = {
                #[item_settings data,array,absolute,not_null] media_usage_id=input;
            };
        };
    }
)]
#[allow(dead_code)]
#[derive(Default)]
pub struct HostReport {
    /// Modifier bitmap of the keyboard collection.
    pub modifier: u8,
    /// Reserved byte of the keyboard collection.
    pub reserved: u8,
    /// Key slots of the keyboard collection.
    pub keycodes: [u8; 6],
    /// Currently asserted system control usage, 0 when released.
    pub system_usage_id: u16,
    /// Currently asserted consumer control usage, 0 when released.
    pub media_usage_id: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifier_bits() {
        assert_eq!(modifier_bit(LEFT_CONTROL), Some(0x01));
        assert_eq!(modifier_bit(LEFT_SHIFT), Some(0x02));
        assert_eq!(modifier_bit(RIGHT_GUI), Some(0x80));
        assert_eq!(modifier_bit(0x04), None);
        assert_eq!(modifier_bit(NO_EVENT), None);
    }

    #[test]
    fn descriptor_is_generated() {
        assert!(!HostReport::desc().is_empty());
    }
}
