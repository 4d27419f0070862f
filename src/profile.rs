//! Known module families and their capabilities.

use core::fmt;

/// Module families the crate knows how to size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorModel {
    /// AS608 (162 templates).
    As608,
    /// R307 (1000 templates).
    R307,
    /// GT-511C3 (200 templates).
    Gt511c3,
    /// ZFM-60 (300 templates).
    Zfm60,
    /// ZFM-20 (256 templates).
    Zfm20,
}

/// Static characteristics of one module family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub model: SensorModel,
    pub name: &'static str,
    pub vendor: &'static str,
    /// Number of template slots in the module's library.
    pub capacity: u16,
    /// Data packet size in bytes.
    pub packet_size: u16,
    pub default_baud_rate: u32,
    /// Has a controllable (aura) LED.
    pub supports_led: bool,
    /// Has a touch-detection output.
    pub supports_touch_detection: bool,
}

/// The profile catalog, in declaration order.
pub static CATALOG: [Profile; 5] = [
    Profile {
        model: SensorModel::As608,
        name: "AS608",
        vendor: "Adafruit",
        capacity: 162,
        packet_size: 128,
        default_baud_rate: 57600,
        supports_led: true,
        supports_touch_detection: true,
    },
    Profile {
        model: SensorModel::R307,
        name: "R307",
        vendor: "ZHONGSEN",
        capacity: 1000,
        packet_size: 256,
        default_baud_rate: 57600,
        supports_led: true,
        supports_touch_detection: true,
    },
    Profile {
        model: SensorModel::Gt511c3,
        name: "GT-511C3",
        vendor: "Grow",
        capacity: 200,
        packet_size: 512,
        default_baud_rate: 9600,
        supports_led: false,
        supports_touch_detection: false,
    },
    Profile {
        model: SensorModel::Zfm60,
        name: "ZFM-60",
        vendor: "ZHONGSEN",
        capacity: 300,
        packet_size: 128,
        default_baud_rate: 57600,
        supports_led: true,
        supports_touch_detection: true,
    },
    Profile {
        model: SensorModel::Zfm20,
        name: "ZFM-20",
        vendor: "ZHONGSEN",
        capacity: 256,
        packet_size: 128,
        default_baud_rate: 57600,
        supports_led: false,
        supports_touch_detection: true,
    },
];

impl SensorModel {
    /// Every cataloged model.
    pub const ALL: [SensorModel; 5] = [
        SensorModel::As608,
        SensorModel::R307,
        SensorModel::Gt511c3,
        SensorModel::Zfm60,
        SensorModel::Zfm20,
    ];

    /// The catalog entry for this model.
    pub fn profile(self) -> &'static Profile {
        match self {
            Self::As608 => &CATALOG[0],
            Self::R307 => &CATALOG[1],
            Self::Gt511c3 => &CATALOG[2],
            Self::Zfm60 => &CATALOG[3],
            Self::Zfm20 => &CATALOG[4],
        }
    }

    pub fn name(self) -> &'static str {
        self.profile().name
    }

    pub fn capacity(self) -> u16 {
        self.profile().capacity
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog entry whose capacity is exactly `capacity`.
pub fn by_capacity(capacity: u16) -> Option<&'static Profile> {
    CATALOG.iter().find(|profile| profile.capacity == capacity)
}

/// The lowest-capacity profile, used as the conservative default.
pub fn smallest() -> &'static Profile {
    CATALOG
        .iter()
        .min_by_key(|profile| profile.capacity)
        .unwrap_or(&CATALOG[0])
}

/// The highest-capacity profile.
pub fn largest() -> &'static Profile {
    CATALOG
        .iter()
        .max_by_key(|profile| profile.capacity)
        .unwrap_or(&CATALOG[0])
}

/// Catalog entries ordered by capacity, largest first.
pub fn by_capacity_descending() -> impl Iterator<Item = &'static Profile> {
    let mut ordered: [&'static Profile; 5] = [
        &CATALOG[0],
        &CATALOG[1],
        &CATALOG[2],
        &CATALOG[3],
        &CATALOG[4],
    ];
    ordered.sort_by(|a, b| b.capacity.cmp(&a.capacity));
    ordered.into_iter()
}
