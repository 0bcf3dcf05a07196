//! # Device Capabilities
//!
//! Capability flags derived from a device's protocol version.
//!
//! ## Lookup Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Capability Lookup                                  │
//! │                                                                         │
//! │  DeviceConfig.protocol_version ──► CapabilityTable.lookup(v)           │
//! │                                         │                               │
//! │                 ┌───────────────────────┼──────────────────┐            │
//! │                 ▼                       ▼                  ▼            │
//! │          known version           known version      unknown version     │
//! │          exact entry             exact entry        default entry       │
//! │                                                                         │
//! │  The table is an explicit immutable value constructed at startup and   │
//! │  passed by reference wherever it is needed. There is no global         │
//! │  mutable registry.                                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// ApiSupport
// =============================================================================

/// Feature flags for one device protocol version.
///
/// Capability flags are a pure function of the protocol version. They gate
/// which commands the session issues, which sample-frame layout the codec
/// expects, and which channels the upload payload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSupport {
    /// Device accepts the logging-interval write form of the config command.
    pub can_mutate_logging_interval: bool,

    /// Device answers the stored-sample-count command.
    pub can_get_sample_count: bool,

    /// Device carries a temperature sensor; gates the "temperature" upload
    /// channel.
    pub has_temperature_sensor: bool,

    /// Device identity has an extended suffix read with a second command.
    pub has_extended_id: bool,

    /// Second particle channel carries a count.
    pub has_particle_count: bool,

    /// Second particle channel carries a concentration instead of a count.
    pub has_particle_concentration: bool,

    /// Device accepts the enter-bootloader command.
    pub can_enter_bootloader_mode: bool,

    /// Config response carries hardware/firmware version fields.
    pub has_device_version_info: bool,

    /// Device attaches a GPS fix to samples; switches the codec to the
    /// long sample-frame layout.
    pub has_gps: bool,
}

impl ApiSupport {
    /// Conservative fallback used for protocol versions the table does not
    /// know. Assumes the common command set and no optional hardware:
    /// claiming a sensor the device lacks would put garbage channels in the
    /// upload payload, while under-claiming only narrows it.
    pub const fn fallback() -> Self {
        ApiSupport {
            can_mutate_logging_interval: true,
            can_get_sample_count: true,
            has_temperature_sensor: false,
            has_extended_id: false,
            has_particle_count: true,
            has_particle_concentration: false,
            can_enter_bootloader_mode: false,
            has_device_version_info: true,
            has_gps: false,
        }
    }
}

// =============================================================================
// CapabilityTable
// =============================================================================

/// Immutable protocol-version → [`ApiSupport`] lookup.
///
/// Construct once at startup with [`CapabilityTable::standard`] and pass by
/// reference; `lookup` never fails - unknown versions get the fallback entry.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    entries: HashMap<u16, ApiSupport>,
    fallback: ApiSupport,
}

impl CapabilityTable {
    /// Builds the table for the known device generations.
    pub fn standard() -> Self {
        let mut entries = HashMap::new();

        // Generation 1: original units. Read-only config, particle count
        // only, no temperature sensor.
        entries.insert(
            1,
            ApiSupport {
                can_mutate_logging_interval: false,
                can_get_sample_count: false,
                has_temperature_sensor: false,
                has_extended_id: false,
                has_particle_count: true,
                has_particle_concentration: false,
                can_enter_bootloader_mode: false,
                has_device_version_info: false,
                has_gps: false,
            },
        );

        // Generation 2: adds the temperature sensor and writable logging
        // interval.
        entries.insert(
            2,
            ApiSupport {
                can_mutate_logging_interval: true,
                can_get_sample_count: false,
                has_temperature_sensor: true,
                has_extended_id: false,
                has_particle_count: true,
                has_particle_concentration: false,
                can_enter_bootloader_mode: false,
                has_device_version_info: false,
                has_gps: false,
            },
        );

        // Generation 3: field-updatable firmware; adds sample count,
        // version info and bootloader entry.
        entries.insert(
            3,
            ApiSupport {
                can_mutate_logging_interval: true,
                can_get_sample_count: true,
                has_temperature_sensor: true,
                has_extended_id: false,
                has_particle_count: true,
                has_particle_concentration: false,
                can_enter_bootloader_mode: true,
                has_device_version_info: true,
                has_gps: false,
            },
        );

        // Generation 4: concentration units replace the raw second count;
        // serial numbers grew an extended suffix.
        entries.insert(
            4,
            ApiSupport {
                can_mutate_logging_interval: true,
                can_get_sample_count: true,
                has_temperature_sensor: true,
                has_extended_id: true,
                has_particle_count: false,
                has_particle_concentration: true,
                can_enter_bootloader_mode: true,
                has_device_version_info: true,
                has_gps: false,
            },
        );

        // Generation 5: GPS-equipped outdoor units.
        entries.insert(
            5,
            ApiSupport {
                can_mutate_logging_interval: true,
                can_get_sample_count: true,
                has_temperature_sensor: true,
                has_extended_id: true,
                has_particle_count: false,
                has_particle_concentration: true,
                can_enter_bootloader_mode: true,
                has_device_version_info: true,
                has_gps: true,
            },
        );

        CapabilityTable {
            entries,
            fallback: ApiSupport::fallback(),
        }
    }

    /// Looks up the capability set for a protocol version.
    ///
    /// Unknown versions fall back to [`ApiSupport::fallback`] so a newer
    /// device still syncs with the common command set.
    pub fn lookup(&self, protocol_version: u16) -> ApiSupport {
        self.entries
            .get(&protocol_version)
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Protocol versions the table knows exactly.
    pub fn known_versions(&self) -> Vec<u16> {
        let mut versions: Vec<u16> = self.entries.keys().copied().collect();
        versions.sort_unstable();
        versions
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_versions_have_exact_entries() {
        let table = CapabilityTable::standard();
        assert_eq!(table.known_versions(), vec![1, 2, 3, 4, 5]);

        let v1 = table.lookup(1);
        assert!(!v1.has_temperature_sensor);
        assert!(!v1.can_mutate_logging_interval);
        assert!(v1.has_particle_count);

        let v5 = table.lookup(5);
        assert!(v5.has_gps);
        assert!(v5.has_particle_concentration);
        assert!(!v5.has_particle_count);
    }

    #[test]
    fn unknown_version_gets_fallback() {
        let table = CapabilityTable::standard();
        assert_eq!(table.lookup(99), ApiSupport::fallback());
        assert_eq!(table.lookup(0), ApiSupport::fallback());
    }

    #[test]
    fn fallback_claims_no_optional_hardware() {
        let api = ApiSupport::fallback();
        assert!(!api.has_temperature_sensor);
        assert!(!api.has_gps);
        assert!(!api.has_extended_id);
        assert!(!api.has_particle_concentration);
        assert!(!api.can_enter_bootloader_mode);
    }

    #[test]
    fn particle_channels_are_mutually_exclusive_in_table() {
        let table = CapabilityTable::standard();
        for v in table.known_versions() {
            let api = table.lookup(v);
            assert!(
                !(api.has_particle_count && api.has_particle_concentration),
                "version {v} claims both particle channels"
            );
        }
    }
}
